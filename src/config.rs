//! Run configuration.
//!
//! Values come from command-line flags, then an optional TOML file
//! (`--config`, or `~/.config/hlsmon/config.toml` when present), then the
//! built-in defaults. Validation happens once, before any request is sent.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::fetcher::FetchConfig;

pub const DEFAULT_CONCURRENCY: i64 = 10;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Optional defaults file.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub concurrency: Option<i64>,
    pub timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
    pub log_file: Option<PathBuf>,
}

impl FileConfig {
    /// Load `path`, or the default location when `path` is `None`.
    ///
    /// A missing default file yields empty defaults; an explicitly given
    /// file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let path = default_path();
                if !path.exists() {
                    return Ok(Self::default());
                }
                path
            }
        };

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse { path, source })
    }
}

/// Return the path to the default config file.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hlsmon")
        .join("config.toml")
}

/// Values given on the command line; `None` defers to the file or default.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Comma-separated playlist URLs.
    pub playlist_urls: String,
    pub concurrency: Option<i64>,
    pub log_file: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
}

/// Validated settings for one run.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub playlist_urls: Vec<String>,
    pub concurrency: usize,
    pub log_file: Option<PathBuf>,
    pub fetch: FetchConfig,
}

impl MonitorConfig {
    pub fn resolve(cli: Overrides, file: FileConfig) -> Result<Self, ConfigError> {
        let playlist_urls = split_urls(&cli.playlist_urls);
        if playlist_urls.is_empty() {
            return Err(ConfigError::NoPlaylists);
        }

        let concurrency = cli
            .concurrency
            .or(file.concurrency)
            .unwrap_or(DEFAULT_CONCURRENCY);
        let concurrency = usize::try_from(concurrency)
            .ok()
            .filter(|&n| n > 0)
            .ok_or(ConfigError::InvalidConcurrency(concurrency))?;

        let timeout = cli
            .timeout_secs
            .or(file.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout == 0 {
            return Err(ConfigError::InvalidTimeout { name: "timeout" });
        }
        let connect_timeout = cli
            .connect_timeout_secs
            .or(file.connect_timeout_secs)
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS);
        if connect_timeout == 0 {
            return Err(ConfigError::InvalidTimeout {
                name: "connect timeout",
            });
        }

        let mut fetch = FetchConfig {
            timeout: Duration::from_secs(timeout),
            connect_timeout: Duration::from_secs(connect_timeout),
            ..FetchConfig::default()
        };
        if let Some(user_agent) = cli.user_agent.or(file.user_agent) {
            fetch.user_agent = user_agent;
        }

        Ok(Self {
            playlist_urls,
            concurrency,
            log_file: cli.log_file.or(file.log_file),
            fetch,
        })
    }
}

/// Split a comma-separated URL list, trimming entries and dropping empties.
pub fn split_urls(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(String::from)
        .collect()
}
