//! Final verdict over a checked [`PlaylistTree`].
//!
//! A playlist is unhealthy when it is itself not accessible, when any of its
//! streams failed, or when any chunk under a stream that did not fail itself
//! is not accessible. Unchecked entities are never reported.

use serde::Serialize;

use crate::tree::{Checkable, PlaylistTree};

/// A chunk that failed its reachability check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BadChunk {
    pub url: String,
    pub reason: String,
}

/// A stream that failed, or that owns failing chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BadStream {
    pub url: String,
    /// Set when the stream itself is not accessible; its chunks are then
    /// not inspected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bad_chunks: Vec<BadChunk>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlaylistProblem {
    NotAccessible { reason: String },
    BadStreams { streams: Vec<BadStream> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnhealthyPlaylist {
    pub url: String,
    #[serde(flatten)]
    pub problem: PlaylistProblem,
}

/// Entity counts for the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub playlists: usize,
    pub streams: usize,
    pub chunks: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub totals: Totals,
    pub unhealthy: Vec<UnhealthyPlaylist>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.unhealthy.is_empty()
    }

    /// Process exit status: 0 when everything checked out, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        u8::from(!self.is_healthy())
    }
}

/// Walk the tree once and classify every playlist.
pub fn evaluate(tree: &PlaylistTree) -> HealthReport {
    let mut report = HealthReport::default();

    for playlist in tree.playlists() {
        report.totals.playlists += 1;
        report.totals.streams += playlist.streams().len();
        report.totals.chunks += playlist.chunks().count();

        if let Some(reason) = playlist.accessibility().reason() {
            report.unhealthy.push(UnhealthyPlaylist {
                url: playlist.url().to_string(),
                problem: PlaylistProblem::NotAccessible {
                    reason: reason.to_string(),
                },
            });
            continue;
        }

        let mut bad_streams = Vec::new();
        for stream in playlist.streams() {
            if let Some(reason) = stream.accessibility().reason() {
                bad_streams.push(BadStream {
                    url: stream.url().to_string(),
                    reason: Some(reason.to_string()),
                    bad_chunks: Vec::new(),
                });
                continue;
            }

            let bad_chunks: Vec<BadChunk> = stream
                .chunks()
                .iter()
                .filter_map(|chunk| {
                    chunk.accessibility().reason().map(|reason| BadChunk {
                        url: chunk.url().to_string(),
                        reason: reason.to_string(),
                    })
                })
                .collect();

            if !bad_chunks.is_empty() {
                bad_streams.push(BadStream {
                    url: stream.url().to_string(),
                    reason: None,
                    bad_chunks,
                });
            }
        }

        if !bad_streams.is_empty() {
            report.unhealthy.push(UnhealthyPlaylist {
                url: playlist.url().to_string(),
                problem: PlaylistProblem::BadStreams {
                    streams: bad_streams,
                },
            });
        }
    }

    report
}
