//! Append-only `[GOOD]`/`[BAD]` log of checked URLs.
//!
//! One line per checked entity, in tree order: the playlist, then each of
//! its checked streams and their checked chunks. The file is opened in
//! append mode and never truncated or read back.

use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use crate::tree::{Checkable, PlaylistTree};

#[derive(Debug, Clone)]
pub struct CheckLog {
    path: PathBuf,
}

impl CheckLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append a line for every checked entity in `tree`. Returns the number
    /// of lines written.
    pub fn record(&self, tree: &PlaylistTree) -> io::Result<usize> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut out = BufWriter::new(file);

        let mut written = 0;
        for (url, good) in entries(tree) {
            out.write_all(format_entry(url, good).as_bytes())?;
            written += 1;
        }
        out.flush()?;
        Ok(written)
    }
}

/// `[GOOD]<url>\n` or `[BAD]<url>\n`.
pub fn format_entry(url: &str, good: bool) -> String {
    let tag = if good { "[GOOD]" } else { "[BAD]" };
    format!("{tag}{url}\n")
}

fn entries(tree: &PlaylistTree) -> Vec<(&str, bool)> {
    let mut entries = Vec::new();
    for playlist in tree.playlists() {
        push_checked(&mut entries, playlist);
        for stream in playlist.streams() {
            push_checked(&mut entries, stream);
            for chunk in stream.chunks() {
                push_checked(&mut entries, chunk);
            }
        }
    }
    entries
}

fn push_checked<'a>(entries: &mut Vec<(&'a str, bool)>, entity: &'a dyn Checkable) {
    let state = entity.accessibility();
    if state.is_checked() {
        entries.push((entity.url(), !state.is_bad()));
    }
}
