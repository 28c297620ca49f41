//! HLS manifest parsing
//!
//! Classifies `.m3u8` text as either:
//! - a master playlist (`#EXT-X-STREAM-INF` variant streams), or
//! - a media playlist (`#EXTINF` segments)
//!
//! and resolves every referenced URI against the URL the manifest was
//! fetched from. The parser is read-only; nothing is ever re-serialized.

use std::collections::HashMap;

use url::Url;

use crate::error::ManifestError;

const HEADER: &str = "#EXTM3U";
const STREAM_INF: &str = "#EXT-X-STREAM-INF:";
const EXTINF: &str = "#EXTINF:";
const MEDIA_SEQUENCE: &str = "#EXT-X-MEDIA-SEQUENCE:";

/// Tags that only occur in media playlists.
const MEDIA_TAGS: &[&str] = &[
    EXTINF,
    MEDIA_SEQUENCE,
    "#EXT-X-TARGETDURATION:",
    "#EXT-X-ENDLIST",
    "#EXT-X-PLAYLIST-TYPE:",
    "#EXT-X-BYTERANGE:",
    "#EXT-X-DISCONTINUITY-SEQUENCE:",
];

/// A variant stream referenced by a master playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRef {
    /// Absolute URL of the variant's media playlist.
    pub url: String,
    /// `#EXT-X-STREAM-INF` attributes, keys as written.
    pub attributes: HashMap<String, String>,
}

impl StreamRef {
    pub fn bandwidth(&self) -> Option<u64> {
        self.attributes.get("BANDWIDTH").and_then(|v| v.parse().ok())
    }

    pub fn resolution(&self) -> Option<&str> {
        self.attributes.get("RESOLUTION").map(String::as_str)
    }
}

/// A media segment referenced by a media playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRef {
    /// Absolute URL of the segment.
    pub url: String,
    /// Media sequence number (`#EXT-X-MEDIA-SEQUENCE` + position), saturating
    /// at `u64::MAX`.
    pub sequence: u64,
}

/// Parsed manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Manifest {
    Master(Vec<StreamRef>),
    Media(Vec<ChunkRef>),
}

/// Parse manifest `body` fetched from `base_url`.
///
/// Fails with [`ManifestError`] when the body is empty, lacks the `#EXTM3U`
/// header, mixes variant-stream and segment directives, or leaves a tag
/// without its URI line. A failure never yields a partial entry list.
pub fn parse(body: &str, base_url: &str) -> Result<Manifest, ManifestError> {
    let body = body.strip_prefix('\u{feff}').unwrap_or(body);

    let lines: Vec<(usize, &str)> = body
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
        .collect();

    let Some(((_, first), rest)) = lines.split_first() else {
        return Err(ManifestError::Empty);
    };
    if *first != HEADER {
        return Err(ManifestError::MissingHeader);
    }

    let has_variants = rest.iter().any(|(_, line)| line.starts_with(STREAM_INF));
    let has_segments = rest
        .iter()
        .any(|(_, line)| MEDIA_TAGS.iter().any(|tag| line.starts_with(tag)));

    let base = Url::parse(base_url).map_err(|e| ManifestError::InvalidUri {
        uri: base_url.to_string(),
        reason: e.to_string(),
    })?;

    match (has_variants, has_segments) {
        (true, true) => Err(ManifestError::MixedDirectives),
        (true, false) => parse_master(rest, &base).map(Manifest::Master),
        (false, true) => parse_media(rest, &base).map(Manifest::Media),
        (false, false) => Err(ManifestError::NoEntries),
    }
}

fn parse_master(lines: &[(usize, &str)], base: &Url) -> Result<Vec<StreamRef>, ManifestError> {
    let mut streams = Vec::new();
    let mut pending: Option<(usize, HashMap<String, String>)> = None;

    for &(line_no, line) in lines {
        if let Some(rest) = line.strip_prefix(STREAM_INF) {
            if let Some((prev, _)) = pending {
                return Err(ManifestError::MissingUri {
                    tag: "#EXT-X-STREAM-INF",
                    line: prev,
                });
            }
            pending = Some((line_no, parse_attributes(rest)));
        } else if !line.starts_with('#') {
            let Some((_, attributes)) = pending.take() else {
                return Err(ManifestError::UnexpectedUri {
                    line: line_no,
                    expected: "#EXT-X-STREAM-INF",
                });
            };
            streams.push(StreamRef {
                url: resolve_url(base, line)?,
                attributes,
            });
        }
    }

    if let Some((line, _)) = pending {
        return Err(ManifestError::MissingUri {
            tag: "#EXT-X-STREAM-INF",
            line,
        });
    }

    Ok(streams)
}

fn parse_media(lines: &[(usize, &str)], base: &Url) -> Result<Vec<ChunkRef>, ManifestError> {
    let mut chunks = Vec::new();
    let mut media_sequence = 0u64;
    let mut pending: Option<usize> = None;

    for &(line_no, line) in lines {
        if let Some(rest) = line.strip_prefix(MEDIA_SEQUENCE) {
            media_sequence = rest.trim().parse().unwrap_or(0);
        } else if line.starts_with(EXTINF) {
            if let Some(prev) = pending {
                return Err(ManifestError::MissingUri {
                    tag: "#EXTINF",
                    line: prev,
                });
            }
            pending = Some(line_no);
        } else if !line.starts_with('#') {
            if pending.take().is_none() {
                return Err(ManifestError::UnexpectedUri {
                    line: line_no,
                    expected: "#EXTINF",
                });
            }
            chunks.push(ChunkRef {
                url: resolve_url(base, line)?,
                sequence: media_sequence.saturating_add(chunks.len() as u64),
            });
        }
    }

    if let Some(line) = pending {
        return Err(ManifestError::MissingUri {
            tag: "#EXTINF",
            line,
        });
    }

    Ok(chunks)
}

/// Parse an attribute list such as `BANDWIDTH=1280000,CODECS="avc1,mp4a"`.
///
/// Quoted values may contain commas; quotes are stripped.
fn parse_attributes(attr_str: &str) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    let mut chars = attr_str.chars().peekable();

    while chars.peek().is_some() {
        let key: String = chars.by_ref().take_while(|&c| c != '=').collect();
        let key = key.trim();
        if key.is_empty() {
            break;
        }

        let value: String = if chars.peek() == Some(&'"') {
            chars.next();
            let v = chars.by_ref().take_while(|&c| c != '"').collect();
            // Drop everything up to and including the separating comma.
            for c in chars.by_ref() {
                if c == ',' {
                    break;
                }
            }
            v
        } else {
            chars.by_ref().take_while(|&c| c != ',').collect()
        };

        attrs.insert(key.to_string(), value.trim().to_string());
    }

    attrs
}

fn resolve_url(base: &Url, reference: &str) -> Result<String, ManifestError> {
    base.join(reference)
        .map(String::from)
        .map_err(|e| ManifestError::InvalidUri {
            uri: reference.to_string(),
            reason: e.to_string(),
        })
}
