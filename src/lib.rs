//! `hlsmon` - HLS distribution health checker
//!
//! # Features
//!
//! - **Bounded concurrency**: one shared ceiling on in-flight fetches per pass
//! - **Three-level model**: playlist → variant streams → media chunks
//! - **Content validation**: a manifest that downloads but is not valid HLS
//!   is reported as a content problem, not a network problem
//! - **Structured report**: per-playlist verdict with reasons, as text or JSON
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use hlsmon::{ConcurrentChecker, FetchConfig, HttpFetcher, Monitor, PlaylistTree};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let fetcher = HttpFetcher::new(&FetchConfig::default())?;
//!     let checker = ConcurrentChecker::new(Arc::new(fetcher));
//!     let monitor = Monitor::new(checker, PlaylistTree::new(), 8);
//!
//!     let run = monitor
//!         .run(&["https://example.com/live/master.m3u8".to_string()])
//!         .await?;
//!     println!("healthy: {}", run.report.is_healthy());
//!     Ok(())
//! }
//! ```

pub mod check_log;
pub mod checker;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod manifest;
pub mod monitor;
pub mod report;
pub mod tree;

pub use check_log::CheckLog;
pub use checker::{Callbacks, CheckOutcome, ConcurrentChecker, OutcomeHandler, PassStats};
pub use config::{FileConfig, MonitorConfig, Overrides};
pub use error::{CheckError, ConfigError, FailureReason, ManifestError, TreeError};
pub use fetcher::{FetchConfig, Fetched, Fetcher, HttpFetcher};
pub use manifest::{ChunkRef, Manifest, StreamRef};
pub use monitor::{Monitor, MonitorRun, Passes};
pub use report::{HealthReport, PlaylistProblem};
pub use tree::{Accessibility, Checkable, Chunk, Playlist, PlaylistTree, Stream, StreamAttach};

/// Version of hlsmon
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
