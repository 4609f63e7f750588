//! Transport boundary: whatever opens the actual network stream.
//!
//! A [`StreamTransport`] carries the auth context and creates one
//! [`StreamConnection`] per (re)start. Starting a connection spawns its receive
//! loop on a separate task and returns immediately; everything the loop has to
//! report goes through the [`StreamListener`](crate::StreamListener) callbacks.

mod http;
pub use http::*;

use std::sync::Arc;
use std::time::Duration;

use crate::Result;
use crate::StreamListener;

/// Parameters handed to every new connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Ask the server for stall warnings
    pub stall_warnings: bool,
    /// Longest silence tolerated on an open stream
    pub timeout: Duration,
    /// Reconnect attempts of the receive loop before it gives up
    pub retry_count: usize,
    /// Pause between two reconnect attempts
    pub retry_delay: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            stall_warnings: true,
            timeout: Duration::from_secs(90),
            retry_count: 5,
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// What a connection was asked to stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamRequest {
    /// Only messages matching one of the terms
    Filter {
        track: Vec<String>,
        languages: Option<Vec<String>>,
    },
    /// A sample of all messages
    Sample { languages: Option<Vec<String>> },
}

/// Creates connections; holds the credentials they authenticate with.
pub trait StreamTransport: Send + Sync + 'static {
    fn open(
        &self,
        listener: Arc<dyn StreamListener>,
        options: &ConnectionOptions,
    ) -> Box<dyn StreamConnection>;
}

/// One streaming connection. Owned by the stream manager, never shared.
pub trait StreamConnection: Send {
    /// Starts streaming messages that match `track` in the background
    fn filter(
        &mut self,
        track: Vec<String>,
        languages: Option<Vec<String>>,
    ) -> Result<()>;

    /// Starts streaming an unfiltered sample in the background
    fn sample(
        &mut self,
        languages: Option<Vec<String>>,
    ) -> Result<()>;

    /// Asks the receive loop to stop. Returns without waiting for it.
    fn disconnect(&mut self);

    /// Whether the receive loop is still going
    fn is_running(&self) -> bool;
}
