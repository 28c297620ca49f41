//! Bounded-concurrency URL checking
//!
//! At most `concurrency` fetch tasks live in a [`JoinSet`] at once; the next
//! URL is spawned each time one finishes. Results funnel back to the driver,
//! which is the single place handlers run, so handlers may mutate caller
//! state without extra locking.
//!
//! Each URL produces exactly one outcome, even when the fetch panics.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::task::JoinSet;
use tracing::{debug, error, instrument, warn};

use crate::error::{CheckError, FailureReason};
use crate::fetcher::{Fetched, Fetcher};

/// Per-URL result of a checking pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Success { url: String, body: Option<String> },
    Failure { url: String, reason: FailureReason },
}

impl CheckOutcome {
    pub fn url(&self) -> &str {
        match self {
            Self::Success { url, .. } | Self::Failure { url, .. } => url,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Receives outcomes as fetches complete, in completion order.
pub trait OutcomeHandler {
    fn on_failure(&mut self, url: &str, reason: &FailureReason);

    /// `body` is `None` when bodies were not captured.
    fn on_success(&mut self, url: &str, body: Option<String>);
}

/// Adapts a pair of closures to [`OutcomeHandler`].
pub struct Callbacks<F, S> {
    on_failure: F,
    on_success: S,
}

impl<F, S> Callbacks<F, S>
where
    F: FnMut(&str, &FailureReason),
    S: FnMut(&str, Option<String>),
{
    pub fn new(on_failure: F, on_success: S) -> Self {
        Self {
            on_failure,
            on_success,
        }
    }
}

impl<F, S> OutcomeHandler for Callbacks<F, S>
where
    F: FnMut(&str, &FailureReason),
    S: FnMut(&str, Option<String>),
{
    fn on_failure(&mut self, url: &str, reason: &FailureReason) {
        (self.on_failure)(url, reason);
    }

    fn on_success(&mut self, url: &str, body: Option<String>) {
        (self.on_success)(url, body);
    }
}

/// Collects outcomes into a list.
impl OutcomeHandler for Vec<CheckOutcome> {
    fn on_failure(&mut self, url: &str, reason: &FailureReason) {
        self.push(CheckOutcome::Failure {
            url: url.to_string(),
            reason: reason.clone(),
        });
    }

    fn on_success(&mut self, url: &str, body: Option<String>) {
        self.push(CheckOutcome::Success {
            url: url.to_string(),
            body,
        });
    }
}

/// Summary of one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassStats {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

/// Fetches URL lists in parallel through a shared [`Fetcher`].
#[derive(Clone)]
pub struct ConcurrentChecker {
    fetcher: Arc<dyn Fetcher>,
}

impl ConcurrentChecker {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    /// Fetch every URL with at most `concurrency` in flight and route each
    /// outcome to `handler` exactly once.
    ///
    /// Returns only after every URL has an outcome. An empty list returns
    /// immediately without touching the handler. `concurrency == 0` is
    /// rejected before anything is dispatched.
    #[instrument(skip_all, fields(urls = urls.len(), concurrency = concurrency, capture_body = capture_body))]
    pub async fn run<H: OutcomeHandler>(
        &self,
        urls: Vec<String>,
        concurrency: usize,
        capture_body: bool,
        handler: &mut H,
    ) -> Result<PassStats, CheckError> {
        if concurrency == 0 {
            return Err(CheckError::InvalidConcurrency(concurrency));
        }

        let start = Instant::now();
        let total = urls.len();
        let mut stats = PassStats {
            total,
            succeeded: 0,
            failed: 0,
            elapsed: Duration::ZERO,
        };
        if urls.is_empty() {
            return Ok(stats);
        }

        let mut workers = JoinSet::new();
        let mut pending = urls.iter().cloned().enumerate();
        for _ in 0..concurrency {
            let Some((index, url)) = pending.next() else {
                break;
            };
            self.spawn_fetch(&mut workers, index, url, capture_body);
        }

        let mut delivered = vec![false; total];
        while let Some(joined) = workers.join_next().await {
            if let Some((index, url)) = pending.next() {
                self.spawn_fetch(&mut workers, index, url, capture_body);
            }

            match joined {
                Ok((index, result)) => {
                    delivered[index] = true;
                    dispatch(handler, &urls[index], result, &mut stats);
                }
                // Index unknown; settled in the sweep below.
                Err(e) => error!(error = %e, "check worker did not finish"),
            }
        }

        for (index, url) in urls.iter().enumerate() {
            if !delivered[index] {
                warn!(url = %url, "no outcome from worker");
                let reason = FailureReason::Worker("task aborted".into());
                dispatch(handler, url, Err(reason), &mut stats);
            }
        }

        stats.elapsed = start.elapsed();
        Ok(stats)
    }

    /// Start one fetch. Panics inside the fetcher become a `Worker` failure.
    fn spawn_fetch(
        &self,
        workers: &mut JoinSet<(usize, Result<Fetched, FailureReason>)>,
        index: usize,
        url: String,
        capture_body: bool,
    ) {
        let fetcher = self.fetcher.clone();
        workers.spawn(async move {
            let result = AssertUnwindSafe(fetcher.fetch(&url, capture_body))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(FailureReason::Worker("fetch panicked".into())));
            (index, result)
        });
    }

    /// Like [`run`](Self::run), returning the outcomes in completion order.
    pub async fn collect(
        &self,
        urls: Vec<String>,
        concurrency: usize,
        capture_body: bool,
    ) -> Result<Vec<CheckOutcome>, CheckError> {
        let mut outcomes = Vec::with_capacity(urls.len());
        self.run(urls, concurrency, capture_body, &mut outcomes).await?;
        Ok(outcomes)
    }
}

fn dispatch<H: OutcomeHandler>(
    handler: &mut H,
    url: &str,
    result: Result<Fetched, FailureReason>,
    stats: &mut PassStats,
) {
    match result {
        Ok(fetched) => {
            debug!(url, status = fetched.status, "reachable");
            stats.succeeded += 1;
            handler.on_success(url, fetched.body);
        }
        Err(reason) => {
            debug!(url, %reason, "not reachable");
            stats.failed += 1;
            handler.on_failure(url, &reason);
        }
    }
}
