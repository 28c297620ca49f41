//! Error taxonomy for the checker.
//!
//! Per-URL problems ([`FailureReason`], [`ManifestError`]) are recoverable:
//! they end up as the reason on a `NotAccessible` entity and never abort a
//! run. Misconfiguration ([`ConfigError`], [`CheckError`]) is fatal and is
//! surfaced before any request goes out.

use std::path::PathBuf;

use thiserror::Error;

/// Why a single URL could not be confirmed reachable.
///
/// The `Display` output is the human-readable reason stored on the entity
/// and printed in the report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    #[error("malformed URL: {0}")]
    InvalidUrl(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out")]
    Timeout,

    #[error("HTTP status {code} {text}")]
    Status { code: u16, text: String },

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("check worker failed: {0}")]
    Worker(String),
}

impl FailureReason {
    pub fn status(code: u16, text: impl Into<String>) -> Self {
        Self::Status {
            code,
            text: text.into(),
        }
    }

    /// HTTP status code, when the failure came from a non-2xx response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// A manifest that was retrieved but is not valid HLS text.
///
/// This is the `InvalidManifestFormat` condition: a content problem, kept
/// distinct from [`FailureReason`] which covers network problems.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManifestError {
    #[error("manifest is empty")]
    Empty,

    #[error("missing #EXTM3U header")]
    MissingHeader,

    #[error("manifest mixes variant-stream and segment directives")]
    MixedDirectives,

    #[error("{tag} on line {line} is not followed by a URI")]
    MissingUri { tag: &'static str, line: usize },

    #[error("URI on line {line} is not preceded by {expected}")]
    UnexpectedUri { line: usize, expected: &'static str },

    #[error("manifest has neither variant streams nor segments")]
    NoEntries,

    #[error("expected a {expected} playlist, found a {found} playlist")]
    UnexpectedKind {
        expected: &'static str,
        found: &'static str,
    },

    #[error("cannot resolve `{uri}` against the manifest URL: {reason}")]
    InvalidUri { uri: String, reason: String },
}

/// Fatal misuse of the concurrent checker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckError {
    #[error("concurrency must be a positive integer, got {0}")]
    InvalidConcurrency(usize),
}

/// Errors raised while building a [`MonitorConfig`](crate::config::MonitorConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no playlist URLs given")]
    NoPlaylists,

    #[error("concurrency must be a positive integer, got {0}")]
    InvalidConcurrency(i64),

    #[error("{name} must be greater than zero")]
    InvalidTimeout { name: &'static str },

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Errors from [`PlaylistTree`](crate::tree::PlaylistTree) mutations that the
/// caller has to report against the owning entity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("no playlist registered for {0}")]
    UnknownPlaylist(String),

    #[error("invalid playlist format: {0}")]
    InvalidManifest(#[from] ManifestError),
}
