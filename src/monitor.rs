//! Three-pass health check of one or more master playlists.
//!
//! 1. Fetch every playlist (bodies kept) and parse them into the tree.
//! 2. Fetch every stream of every playlist that has a body.
//! 3. Fetch every chunk of every populated stream, reachability only.
//!
//! Each pass completes before the next starts. Outcomes are applied to the
//! tree by per-pass [`OutcomeHandler`]s; a URL whose owner cannot be found
//! is logged and skipped.

use tracing::{debug, info, instrument, warn};

use crate::checker::{ConcurrentChecker, OutcomeHandler, PassStats};
use crate::error::{CheckError, FailureReason, TreeError};
use crate::report::{self, HealthReport};
use crate::tree::{preview, Checkable, PlaylistTree, StreamAttach, PREVIEW_CHARS};

/// Stats for each of the three passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Passes {
    pub playlists: PassStats,
    pub streams: PassStats,
    pub chunks: PassStats,
}

/// Everything a finished run produced.
#[derive(Debug)]
pub struct MonitorRun {
    pub tree: PlaylistTree,
    pub report: HealthReport,
    pub passes: Passes,
}

/// Sequences the checking passes over an injected checker and tree.
pub struct Monitor {
    checker: ConcurrentChecker,
    tree: PlaylistTree,
    concurrency: usize,
}

impl Monitor {
    pub fn new(checker: ConcurrentChecker, tree: PlaylistTree, concurrency: usize) -> Self {
        Self {
            checker,
            tree,
            concurrency,
        }
    }

    /// Check `playlist_urls` and everything beneath them.
    ///
    /// Only misconfiguration fails; every network or content problem ends
    /// up in the returned report.
    #[instrument(skip_all, fields(playlists = playlist_urls.len()))]
    pub async fn run(mut self, playlist_urls: &[String]) -> Result<MonitorRun, CheckError> {
        for url in playlist_urls {
            self.tree.build(url.clone());
        }

        let playlists = self
            .checker
            .run(
                playlist_urls.to_vec(),
                self.concurrency,
                true,
                &mut PlaylistPass {
                    tree: &mut self.tree,
                },
            )
            .await?;
        log_pass("playlists fetched", &playlists);

        let streams = self
            .checker
            .run(
                self.tree.stream_urls(),
                self.concurrency,
                true,
                &mut StreamPass {
                    tree: &mut self.tree,
                },
            )
            .await?;
        log_pass("streams fetched", &streams);

        let chunks = self
            .checker
            .run(
                self.tree.chunk_urls(),
                self.concurrency,
                false,
                &mut ChunkPass {
                    tree: &mut self.tree,
                },
            )
            .await?;
        log_pass("chunks fetched", &chunks);

        let report = report::evaluate(&self.tree);
        Ok(MonitorRun {
            tree: self.tree,
            report,
            passes: Passes {
                playlists,
                streams,
                chunks,
            },
        })
    }
}

fn log_pass(message: &str, stats: &PassStats) {
    info!(
        total = stats.total,
        failed = stats.failed,
        elapsed_ms = u64::try_from(stats.elapsed.as_millis()).unwrap_or(u64::MAX),
        "{message}"
    );
}

struct PlaylistPass<'a> {
    tree: &'a mut PlaylistTree,
}

impl OutcomeHandler for PlaylistPass<'_> {
    fn on_failure(&mut self, url: &str, reason: &FailureReason) {
        info!(url, %reason, "playlist not accessible");
        if let Some(playlist) = self.tree.find_playlist_mut(url) {
            playlist.mark_not_accessible(reason.to_string());
        }
    }

    fn on_success(&mut self, url: &str, body: Option<String>) {
        match self.tree.attach_playlist_body(url, body.unwrap_or_default()) {
            Ok(streams) => {
                debug!(url, streams, "playlist parsed");
                if let Some(playlist) = self.tree.find_playlist_mut(url) {
                    playlist.mark_accessible();
                }
            }
            Err(err @ TreeError::InvalidManifest(_)) => {
                info!(url, error = %err, "playlist content rejected");
                if let Some(playlist) = self.tree.find_playlist_mut(url) {
                    let reason = format!(
                        "{err} (limited to {PREVIEW_CHARS} chars):\n{}",
                        preview(playlist.body().unwrap_or_default())
                    );
                    playlist.mark_not_accessible(reason);
                }
            }
            Err(err @ TreeError::UnknownPlaylist(_)) => {
                warn!(url, error = %err, "fetched playlist has no owner");
            }
        }
    }
}

struct StreamPass<'a> {
    tree: &'a mut PlaylistTree,
}

impl OutcomeHandler for StreamPass<'_> {
    fn on_failure(&mut self, url: &str, reason: &FailureReason) {
        match self.tree.find_stream_mut(url) {
            Some(stream) => {
                stream.mark_not_accessible(reason.to_string());
            }
            None => debug!(url, "failed stream has no owner"),
        }
    }

    fn on_success(&mut self, url: &str, body: Option<String>) {
        match self.tree.attach_stream_body(url, body.unwrap_or_default()) {
            StreamAttach::Populated(chunks) => {
                debug!(url, chunks, "stream parsed");
                if let Some(stream) = self.tree.find_stream_mut(url) {
                    stream.mark_accessible();
                }
            }
            StreamAttach::Invalid(err) => info!(url, error = %err, "stream content rejected"),
            StreamAttach::AlreadyAttached => debug!(url, "stream body already attached"),
            StreamAttach::NotFound => debug!(url, "fetched stream has no owner"),
        }
    }
}

struct ChunkPass<'a> {
    tree: &'a mut PlaylistTree,
}

impl OutcomeHandler for ChunkPass<'_> {
    fn on_failure(&mut self, url: &str, reason: &FailureReason) {
        match self.tree.find_chunk_mut(url) {
            Some(chunk) => {
                chunk.mark_not_accessible(reason.to_string());
            }
            None => debug!(url, "failed chunk has no owner"),
        }
    }

    fn on_success(&mut self, url: &str, _body: Option<String>) {
        match self.tree.find_chunk_mut(url) {
            Some(chunk) => {
                chunk.mark_accessible();
            }
            None => debug!(url, "chunk has no owner"),
        }
    }
}
