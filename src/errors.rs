//! Error hierarchy for the dynamic streaming client.
//!
//! Errors are split by the task that produces them: [`StreamError`] is raised on the
//! connection task and travels back to the controlling task through the
//! [`ExceptionSlot`](crate::ExceptionSlot); [`Error`] is what the polling loop and the
//! binary deal with.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration loading failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Configuration validation failures
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// The term source could not produce a term set
    #[error(transparent)]
    TermSource(#[from] TermSourceError),

    /// Failure captured on the connection task and re-raised by the polling loop
    #[error("Streaming failed: {0}")]
    Stream(Arc<StreamError>),

    /// Signal handler installation or delivery failures
    #[error("Signal error: {0}")]
    Signal(String),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum TermSourceError {
    /// The track file could not be read
    #[error("Failed to read terms from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Source specific failures (databases, remote lookups, ...)
    #[error("Term source unavailable: {0}")]
    Unavailable(String),
}

/// Failures raised inside the connection task's receive loop.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// HTTP client failures (connect, TLS, body read)
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// Socket level failures
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// No data (not even a keep-alive) arrived within the read timeout
    #[error("No data received for {0:?}")]
    Timeout(Duration),

    /// Invalid endpoint or request construction
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A message handler failed while processing a payload
    #[error("Handler failed: {0}")]
    Handler(String),
}

impl From<Arc<StreamError>> for Error {
    fn from(e: Arc<StreamError>) -> Self {
        Error::Stream(e)
    }
}

impl From<StreamError> for Error {
    fn from(e: StreamError) -> Self {
        Error::Stream(Arc::new(e))
    }
}
