use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::constants::MIN_POLL_WAIT_MS;
use crate::constants::RESTART_BACKOFF_MS;
use crate::constants::STOP_TIMEOUT_MS;
use crate::Error;
use crate::Result;

/// Polling loop and restart policy of the dynamic stream
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StreamConfig {
    /// Interval between two term checks (milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Lower bound of the wait between two ticks, however long a tick took (milliseconds)
    #[serde(default = "default_min_poll_wait_ms")]
    pub min_poll_wait_ms: u64,

    /// Grace period after a disconnect before a new connection is opened (milliseconds)
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,

    /// Backoff of the outer restart loop after a failed polling session (milliseconds)
    #[serde(default = "default_restart_backoff_ms")]
    pub restart_backoff_ms: u64,

    /// Open a sample stream when no terms are tracked
    #[serde(default)]
    pub unfiltered: bool,

    /// Restrict the stream to these languages (BCP 47 codes); empty means all
    #[serde(default)]
    pub languages: Vec<String>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            min_poll_wait_ms: default_min_poll_wait_ms(),
            stop_timeout_ms: default_stop_timeout_ms(),
            restart_backoff_ms: default_restart_backoff_ms(),
            unfiltered: false,
            languages: vec![],
        }
    }
}

impl StreamConfig {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::InvalidConfig("poll_interval_ms must be greater than 0".into()));
        }

        if self.min_poll_wait_ms == 0 {
            return Err(Error::InvalidConfig("min_poll_wait_ms must be greater than 0".into()));
        }

        if let Some(empty) = self.languages.iter().position(|l| l.trim().is_empty()) {
            return Err(Error::InvalidConfig(format!("languages[{empty}] is empty")));
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn min_poll_wait(&self) -> Duration {
        Duration::from_millis(self.min_poll_wait_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn restart_backoff(&self) -> Duration {
        Duration::from_millis(self.restart_backoff_ms)
    }

    /// `None` when no language restriction applies
    pub fn languages(&self) -> Option<Vec<String>> {
        if self.languages.is_empty() {
            None
        } else {
            Some(self.languages.clone())
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    15_000
}
fn default_min_poll_wait_ms() -> u64 {
    MIN_POLL_WAIT_MS
}
fn default_stop_timeout_ms() -> u64 {
    STOP_TIMEOUT_MS
}
fn default_restart_backoff_ms() -> u64 {
    RESTART_BACKOFF_MS
}
