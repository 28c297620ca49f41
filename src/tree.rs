//! Playlist → Stream → Chunk entity tree
//!
//! Every entity carries its own [`Accessibility`], which moves out of
//! `Unchecked` at most once per run. URL lookups go through indices built as
//! bodies are attached; when the same URL occurs more than once, the first
//! registered entity owns it.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{ManifestError, TreeError};
use crate::manifest::{self, Manifest};

/// Number of body characters kept in content diagnostics.
pub const PREVIEW_CHARS: usize = 100;

/// Reachability of a single entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Accessibility {
    #[default]
    Unchecked,
    Accessible,
    NotAccessible(String),
}

impl Accessibility {
    pub fn is_checked(&self) -> bool {
        !matches!(self, Self::Unchecked)
    }

    /// Checked and failed.
    pub fn is_bad(&self) -> bool {
        matches!(self, Self::NotAccessible(_))
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::NotAccessible(reason) => Some(reason),
            _ => None,
        }
    }

    /// Move out of `Unchecked`. Terminal states never change.
    fn settle(&mut self, next: Self) -> bool {
        if self.is_checked() {
            return false;
        }
        *self = next;
        true
    }
}

/// An entity with a URL identity and an accessibility state.
pub trait Checkable {
    fn url(&self) -> &str;

    fn accessibility(&self) -> &Accessibility;

    fn accessibility_mut(&mut self) -> &mut Accessibility;

    /// Returns `false` (and changes nothing) when the entity was already checked.
    fn mark_accessible(&mut self) -> bool {
        self.accessibility_mut().settle(Accessibility::Accessible)
    }

    /// Returns `false` (and changes nothing) when the entity was already checked.
    fn mark_not_accessible(&mut self, reason: impl Into<String>) -> bool
    where
        Self: Sized,
    {
        self.accessibility_mut()
            .settle(Accessibility::NotAccessible(reason.into()))
    }
}

macro_rules! impl_checkable {
    ($($ty:ty),+) => {
        $(impl Checkable for $ty {
            fn url(&self) -> &str {
                &self.url
            }

            fn accessibility(&self) -> &Accessibility {
                &self.state
            }

            fn accessibility_mut(&mut self) -> &mut Accessibility {
                &mut self.state
            }
        })+
    };
}

impl_checkable!(Playlist, Stream, Chunk);

/// Root entity: a master playlist.
#[derive(Debug, Clone)]
pub struct Playlist {
    url: String,
    state: Accessibility,
    body: Option<String>,
    streams: Vec<Stream>,
}

impl Playlist {
    fn new(url: String) -> Self {
        Self {
            url,
            state: Accessibility::Unchecked,
            body: None,
            streams: Vec::new(),
        }
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Streams in manifest order.
    pub fn streams(&self) -> &[Stream] {
        &self.streams
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.streams.iter().flat_map(|s| s.chunks.iter())
    }
}

/// A variant stream owned by exactly one playlist.
#[derive(Debug, Clone)]
pub struct Stream {
    url: String,
    attributes: HashMap<String, String>,
    state: Accessibility,
    body: Option<String>,
    chunks: Vec<Chunk>,
}

impl Stream {
    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Chunks in manifest order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }
}

/// A media segment owned by exactly one stream. Bodies are never kept.
#[derive(Debug, Clone)]
pub struct Chunk {
    url: String,
    state: Accessibility,
}

/// Result of feeding a fetched stream body into the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamAttach {
    /// Parsed; this many chunks were added.
    Populated(usize),
    /// Body was not a valid media playlist; the stream is now `NotAccessible`.
    Invalid(ManifestError),
    /// The owning stream already had a body (duplicate URL fetched twice).
    AlreadyAttached,
    /// No stream in the tree has this URL.
    NotFound,
}

/// The full entity graph for one run.
#[derive(Debug, Default)]
pub struct PlaylistTree {
    playlists: Vec<Playlist>,
    playlist_index: HashMap<String, usize>,
    stream_index: HashMap<String, (usize, usize)>,
    chunk_index: HashMap<String, (usize, usize, usize)>,
}

impl PlaylistTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a playlist awaiting content.
    pub fn build(&mut self, url: impl Into<String>) -> &mut Playlist {
        let url = url.into();
        let idx = self.playlists.len();
        self.playlist_index.entry(url.clone()).or_insert(idx);
        self.playlists.push(Playlist::new(url));
        &mut self.playlists[idx]
    }

    pub fn playlists(&self) -> &[Playlist] {
        &self.playlists
    }

    pub fn find_playlist_mut(&mut self, url: &str) -> Option<&mut Playlist> {
        let idx = *self.playlist_index.get(url)?;
        self.playlists.get_mut(idx)
    }

    pub fn find_stream_by_url(&self, url: &str) -> Option<&Stream> {
        let &(p, s) = self.stream_index.get(url)?;
        self.playlists.get(p)?.streams.get(s)
    }

    pub fn find_stream_mut(&mut self, url: &str) -> Option<&mut Stream> {
        let &(p, s) = self.stream_index.get(url)?;
        self.playlists.get_mut(p)?.streams.get_mut(s)
    }

    pub fn find_chunk_by_url(&self, url: &str) -> Option<&Chunk> {
        let &(p, s, c) = self.chunk_index.get(url)?;
        self.playlists.get(p)?.streams.get(s)?.chunks.get(c)
    }

    pub fn find_chunk_mut(&mut self, url: &str) -> Option<&mut Chunk> {
        let &(p, s, c) = self.chunk_index.get(url)?;
        self.playlists.get_mut(p)?.streams.get_mut(s)?.chunks.get_mut(c)
    }

    /// Store a playlist body and populate its streams in manifest order.
    ///
    /// The body is kept even when it does not parse. A parse failure is
    /// returned to the caller untouched so it can be reported against the
    /// playlist; the playlist's state is not changed here. A playlist that
    /// already failed keeps no body and gets no streams.
    pub fn attach_playlist_body(&mut self, url: &str, body: String) -> Result<usize, TreeError> {
        let p = *self
            .playlist_index
            .get(url)
            .ok_or_else(|| TreeError::UnknownPlaylist(url.to_string()))?;

        let playlist = &mut self.playlists[p];
        if playlist.body.is_some() {
            debug!(url, "playlist body already attached");
            return Ok(0);
        }
        if playlist.state.is_bad() {
            debug!(url, "playlist already failed, body ignored");
            return Ok(0);
        }

        let parsed = manifest::parse(&body, url);
        playlist.body = Some(body);

        let refs = match parsed? {
            Manifest::Master(refs) => refs,
            Manifest::Media(_) => {
                return Err(ManifestError::UnexpectedKind {
                    expected: "master",
                    found: "media",
                }
                .into())
            }
        };

        for stream_ref in refs {
            let s = playlist.streams.len();
            self.stream_index
                .entry(stream_ref.url.clone())
                .or_insert((p, s));
            playlist.streams.push(Stream {
                url: stream_ref.url,
                attributes: stream_ref.attributes,
                state: Accessibility::Unchecked,
                body: None,
                chunks: Vec::new(),
            });
        }

        Ok(playlist.streams.len())
    }

    /// Store a stream body on the first stream owning `url` and populate its
    /// chunks. An unparsable body marks that stream `NotAccessible` with a
    /// truncated preview instead of failing.
    pub fn attach_stream_body(&mut self, url: &str, body: String) -> StreamAttach {
        let Some(&(p, s)) = self.stream_index.get(url) else {
            return StreamAttach::NotFound;
        };

        let stream = &mut self.playlists[p].streams[s];
        if stream.body.is_some() {
            return StreamAttach::AlreadyAttached;
        }

        let parsed = manifest::parse(&body, url).and_then(|m| match m {
            Manifest::Media(chunks) => Ok(chunks),
            Manifest::Master(_) => Err(ManifestError::UnexpectedKind {
                expected: "media",
                found: "master",
            }),
        });

        let chunks = match parsed {
            Ok(chunks) => chunks,
            Err(err) => {
                stream.mark_not_accessible(format!(
                    "bad content of the stream ({err}, limited to {PREVIEW_CHARS} chars):\n{}",
                    preview(&body)
                ));
                stream.body = Some(body);
                return StreamAttach::Invalid(err);
            }
        };

        stream.body = Some(body);
        for chunk_ref in chunks {
            let c = stream.chunks.len();
            self.chunk_index
                .entry(chunk_ref.url.clone())
                .or_insert((p, s, c));
            stream.chunks.push(Chunk {
                url: chunk_ref.url,
                state: Accessibility::Unchecked,
            });
        }

        StreamAttach::Populated(stream.chunks.len())
    }

    /// URLs of every stream under a playlist that has a body attached.
    pub fn stream_urls(&self) -> Vec<String> {
        self.playlists
            .iter()
            .filter(|p| p.body.is_some())
            .flat_map(|p| p.streams.iter().map(|s| s.url.clone()))
            .collect()
    }

    /// URLs of every chunk of every populated stream.
    pub fn chunk_urls(&self) -> Vec<String> {
        self.playlists
            .iter()
            .flat_map(Playlist::chunks)
            .map(|c| c.url.clone())
            .collect()
    }
}

/// First [`PREVIEW_CHARS`] characters of `body`.
pub fn preview(body: &str) -> String {
    body.chars().take(PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &str = "#EXTM3U\n\
        #EXT-X-STREAM-INF:BANDWIDTH=800000\n\
        a/index.m3u8\n\
        #EXT-X-STREAM-INF:BANDWIDTH=1600000\n\
        b/index.m3u8\n";

    const MEDIA: &str = "#EXTM3U\n\
        #EXT-X-TARGETDURATION:4\n\
        #EXTINF:4.0,\n\
        c1.ts\n\
        #EXTINF:4.0,\n\
        c2.ts\n\
        #EXT-X-ENDLIST\n";

    fn tree_with_master() -> PlaylistTree {
        let mut tree = PlaylistTree::new();
        tree.build("https://cdn.test/p/master.m3u8");
        tree.attach_playlist_body("https://cdn.test/p/master.m3u8", MASTER.to_string())
            .unwrap();
        tree
    }

    #[test]
    fn streams_follow_manifest_order() {
        let tree = tree_with_master();
        let urls: Vec<_> = tree.playlists()[0].streams().iter().map(Checkable::url).collect();
        assert_eq!(urls, ["https://cdn.test/p/a/index.m3u8", "https://cdn.test/p/b/index.m3u8"]);
        assert_eq!(tree.stream_urls(), urls);
        assert_eq!(
            tree.find_stream_by_url("https://cdn.test/p/b/index.m3u8")
                .and_then(|s| s.attributes().get("BANDWIDTH"))
                .map(String::as_str),
            Some("1600000")
        );
    }

    #[test]
    fn stream_body_populates_chunks() {
        let mut tree = tree_with_master();
        let attach = tree.attach_stream_body("https://cdn.test/p/a/index.m3u8", MEDIA.to_string());
        assert_eq!(attach, StreamAttach::Populated(2));
        assert_eq!(
            tree.chunk_urls(),
            ["https://cdn.test/p/a/c1.ts", "https://cdn.test/p/a/c2.ts"]
        );
        assert!(tree.find_chunk_by_url("https://cdn.test/p/a/c2.ts").is_some());

        let again = tree.attach_stream_body("https://cdn.test/p/a/index.m3u8", MEDIA.to_string());
        assert_eq!(again, StreamAttach::AlreadyAttached);
        assert_eq!(tree.chunk_urls().len(), 2);
    }

    #[test]
    fn invalid_stream_body_marks_stream_with_preview() {
        let mut tree = tree_with_master();
        let garbage = "x".repeat(500);
        let attach = tree.attach_stream_body("https://cdn.test/p/b/index.m3u8", garbage);
        assert_eq!(attach, StreamAttach::Invalid(ManifestError::MissingHeader));

        let stream = tree.find_stream_by_url("https://cdn.test/p/b/index.m3u8").unwrap();
        let reason = stream.accessibility().reason().unwrap();
        assert!(reason.starts_with("bad content of the stream"));
        assert!(reason.ends_with(&"x".repeat(PREVIEW_CHARS)));
        assert!(!reason.contains(&"x".repeat(PREVIEW_CHARS + 1)));
        assert!(stream.chunks().is_empty());
    }

    #[test]
    fn nested_master_is_invalid_stream_content() {
        let mut tree = tree_with_master();
        let attach = tree.attach_stream_body("https://cdn.test/p/a/index.m3u8", MASTER.to_string());
        assert!(matches!(
            attach,
            StreamAttach::Invalid(ManifestError::UnexpectedKind { .. })
        ));
    }

    #[test]
    fn invalid_playlist_body_propagates() {
        let mut tree = PlaylistTree::new();
        tree.build("https://cdn.test/p.m3u8");
        let err = tree
            .attach_playlist_body("https://cdn.test/p.m3u8", "not a playlist".into())
            .unwrap_err();
        assert_eq!(err, TreeError::InvalidManifest(ManifestError::MissingHeader));

        // The body is kept, the state is left to the caller.
        let playlist = &tree.playlists()[0];
        assert_eq!(playlist.body(), Some("not a playlist"));
        assert_eq!(playlist.accessibility(), &Accessibility::Unchecked);
        assert!(tree.stream_urls().is_empty());
    }

    #[test]
    fn unknown_playlist_is_reported() {
        let mut tree = PlaylistTree::new();
        let err = tree.attach_playlist_body("https://nowhere.test/", MASTER.into()).unwrap_err();
        assert_eq!(err, TreeError::UnknownPlaylist("https://nowhere.test/".into()));
    }

    #[test]
    fn lookup_miss_is_none() {
        let mut tree = tree_with_master();
        assert!(tree.find_stream_by_url("https://cdn.test/other.m3u8").is_none());
        assert!(tree.find_chunk_mut("https://cdn.test/other.ts").is_none());
        assert_eq!(
            tree.attach_stream_body("https://cdn.test/other.m3u8", MEDIA.into()),
            StreamAttach::NotFound
        );
    }

    #[test]
    fn chunk_lookup_by_url() {
        let mut tree = tree_with_master();
        tree.attach_stream_body("https://cdn.test/p/b/index.m3u8", MEDIA.to_string());

        let chunk = tree.find_chunk_by_url("https://cdn.test/p/b/c2.ts").unwrap();
        assert_eq!(chunk.url(), "https://cdn.test/p/b/c2.ts");
        assert_eq!(chunk.accessibility(), &Accessibility::Unchecked);

        assert!(tree.find_chunk_by_url("https://cdn.test/p/b/c3.ts").is_none());
        assert!(tree.find_chunk_by_url("https://cdn.test/p/a/c1.ts").is_none());
    }

    #[test]
    fn failed_playlist_ignores_later_body() {
        let mut tree = PlaylistTree::new();
        tree.build("https://cdn.test/p/master.m3u8");
        tree.build("https://cdn.test/p/master.m3u8");
        tree.find_playlist_mut("https://cdn.test/p/master.m3u8")
            .unwrap()
            .mark_not_accessible("request timed out");

        let attached = tree
            .attach_playlist_body("https://cdn.test/p/master.m3u8", MASTER.to_string())
            .unwrap();
        assert_eq!(attached, 0);
        assert_eq!(tree.playlists()[0].body(), None);
        assert!(tree.playlists()[0].streams().is_empty());
        assert!(tree.stream_urls().is_empty());
    }

    #[test]
    fn marking_is_idempotent() {
        let mut tree = tree_with_master();
        let stream = tree.find_stream_mut("https://cdn.test/p/a/index.m3u8").unwrap();
        assert!(stream.mark_not_accessible("timed out"));
        assert!(!stream.mark_not_accessible("bad content"));
        assert!(!stream.mark_accessible());
        assert_eq!(
            stream.accessibility(),
            &Accessibility::NotAccessible("timed out".into())
        );

        let playlist = tree.find_playlist_mut("https://cdn.test/p/master.m3u8").unwrap();
        assert!(playlist.mark_accessible());
        assert!(!playlist.mark_accessible());
        assert!(!playlist.mark_not_accessible("late failure"));
        assert_eq!(playlist.accessibility(), &Accessibility::Accessible);
    }

    #[test]
    fn duplicate_stream_urls_resolve_to_first_owner() {
        let mut tree = PlaylistTree::new();
        for url in ["https://cdn.test/p/one.m3u8", "https://cdn.test/p/two.m3u8"] {
            tree.build(url);
            tree.attach_playlist_body(url, MASTER.to_string()).unwrap();
        }
        // Both playlists reference the same stream URLs; nothing is deduplicated.
        assert_eq!(tree.stream_urls().len(), 4);

        tree.find_stream_mut("https://cdn.test/p/a/index.m3u8")
            .unwrap()
            .mark_accessible();

        let first = &tree.playlists()[0].streams()[0];
        let second = &tree.playlists()[1].streams()[0];
        assert_eq!(first.accessibility(), &Accessibility::Accessible);
        assert_eq!(second.accessibility(), &Accessibility::Unchecked);
    }

    #[test]
    fn preview_counts_characters() {
        let body = "é".repeat(150);
        assert_eq!(preview(&body).chars().count(), PREVIEW_CHARS);
    }
}
