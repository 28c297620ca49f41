//! Single-URL reachability fetch
//!
//! One GET per call. Ordinary network and HTTP problems never surface as
//! `Err` from the transport; they are classified into a [`FailureReason`]:
//! - connect/DNS errors
//! - timeouts (request or body read)
//! - non-2xx status (code kept in the reason)
//! - unreadable bodies

use std::error::Error as StdError;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

use crate::error::FailureReason;

/// A 2xx response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub status: u16,
    /// Present only when the body was requested.
    pub body: Option<String>,
}

/// Performs one fetch. Implementations must be shareable across worker tasks.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, capture_body: bool) -> Result<Fetched, FailureReason>;
}

/// Transport settings for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Whole-request timeout, body included.
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: format!("hlsmon/{}", crate::VERSION),
            max_redirects: 10,
        }
    }
}

/// [`Fetcher`] backed by a pooled reqwest client.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            // Let the server negotiate HTTP/2; many CDNs still serve 1.1
            .http2_adaptive_window(true)
            .pool_max_idle_per_host(16)
            .pool_idle_timeout(Duration::from_secs(60))
            .tcp_nodelay(true)
            .use_rustls_tls()
            .brotli(true)
            .gzip(true)
            .deflate(true)
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[instrument(skip(self), fields(url = %url))]
    async fn fetch(&self, url: &str, capture_body: bool) -> Result<Fetched, FailureReason> {
        let parsed = Url::parse(url).map_err(|e| FailureReason::InvalidUrl(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FailureReason::InvalidUrl(format!(
                "unsupported scheme `{}`",
                parsed.scheme()
            )));
        }

        let response = self.client.get(parsed).send().await.map_err(classify)?;
        let status = response.status();
        debug!(status = %status, version = ?response.version(), "Response received");

        if !status.is_success() {
            return Err(FailureReason::status(
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown"),
            ));
        }

        // Reachability-only checks drop the response unread.
        let body = if capture_body {
            Some(response.text().await.map_err(|e| {
                if e.is_timeout() {
                    FailureReason::Timeout
                } else {
                    FailureReason::Body(error_chain(&e))
                }
            })?)
        } else {
            None
        };

        Ok(Fetched {
            status: status.as_u16(),
            body,
        })
    }
}

fn classify(err: reqwest::Error) -> FailureReason {
    if err.is_timeout() {
        FailureReason::Timeout
    } else if err.is_connect() {
        FailureReason::Connect(error_chain(&err))
    } else if err.is_builder() {
        FailureReason::InvalidUrl(error_chain(&err))
    } else if err.is_body() || err.is_decode() {
        FailureReason::Body(error_chain(&err))
    } else {
        FailureReason::Network(error_chain(&err))
    }
}

/// Flatten an error and its sources into one line.
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
