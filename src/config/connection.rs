use std::fmt::Debug;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::ConnectionOptions;
use crate::Error;
use crate::Result;

/// Endpoint, credentials and receive loop parameters of the HTTP transport
#[derive(Serialize, Deserialize, Clone)]
pub struct ConnectionConfig {
    /// Base URL of the streaming API
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Path of the filtered stream, relative to `endpoint`
    #[serde(default = "default_filter_path")]
    pub filter_path: String,

    /// Path of the unfiltered sample stream, relative to `endpoint`
    #[serde(default = "default_sample_path")]
    pub sample_path: String,

    /// Ask the server to send stall warnings when we fall behind
    #[serde(default = "default_stall_warnings")]
    pub stall_warnings: bool,

    /// Read timeout; the server sends keep-alives well within it (milliseconds)
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// How many times the receive loop reconnects after a network failure
    #[serde(default = "default_retry_count")]
    pub retry_count: usize,

    /// Delay between two reconnect attempts of the receive loop (milliseconds)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Bearer token sent in the `Authorization` header
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Debug for ConnectionConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("endpoint", &self.endpoint)
            .field("filter_path", &self.filter_path)
            .field("sample_path", &self.sample_path)
            .field("stall_warnings", &self.stall_warnings)
            .field("read_timeout_ms", &self.read_timeout_ms)
            .field("retry_count", &self.retry_count)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            filter_path: default_filter_path(),
            sample_path: default_sample_path(),
            stall_warnings: default_stall_warnings(),
            read_timeout_ms: default_read_timeout_ms(),
            retry_count: default_retry_count(),
            retry_delay_ms: default_retry_delay_ms(),
            bearer_token: None,
        }
    }
}

impl ConnectionConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(Error::InvalidConfig(format!(
                "endpoint must be an http(s) URL, got {}",
                self.endpoint
            )));
        }

        if self.filter_path.is_empty() || self.sample_path.is_empty() {
            return Err(Error::InvalidConfig("stream paths cannot be empty".into()));
        }

        if self.read_timeout_ms == 0 {
            return Err(Error::InvalidConfig("read_timeout_ms must be greater than 0".into()));
        }

        if matches!(&self.bearer_token, Some(token) if token.trim().is_empty()) {
            return Err(Error::InvalidConfig("bearer_token cannot be blank".into()));
        }

        Ok(())
    }

    pub fn filter_url(&self) -> String {
        join_url(&self.endpoint, &self.filter_path)
    }

    pub fn sample_url(&self) -> String {
        join_url(&self.endpoint, &self.sample_path)
    }

    pub fn options(&self) -> ConnectionOptions {
        ConnectionOptions {
            stall_warnings: self.stall_warnings,
            timeout: Duration::from_millis(self.read_timeout_ms),
            retry_count: self.retry_count,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

fn join_url(
    endpoint: &str,
    path: &str,
) -> String {
    format!("{}/{}", endpoint.trim_end_matches('/'), path.trim_start_matches('/'))
}

fn default_endpoint() -> String {
    "https://stream.twitter.com/1.1".to_string()
}
fn default_filter_path() -> String {
    "statuses/filter.json".to_string()
}
fn default_sample_path() -> String {
    "statuses/sample.json".to_string()
}
fn default_stall_warnings() -> bool {
    true
}
fn default_read_timeout_ms() -> u64 {
    90_000
}
fn default_retry_count() -> usize {
    5
}
fn default_retry_delay_ms() -> u64 {
    5_000
}
