//! Configuration management for the streaming client.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support
//! - Environment variable overrides
//! - Component-wise validation
mod connection;
mod stream;
mod terms;
pub use connection::*;
pub use stream::*;
pub use terms::*;

use std::env;
use std::fmt::Debug;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Prefix of the environment variables read by [`StreamerConfig::new`],
/// e.g. `FIREHOSE__STREAM__POLL_INTERVAL_MS=5000`.
pub const ENV_PREFIX: &str = "FIREHOSE";

/// Main configuration container for the streaming client
///
/// Combines all subsystem configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct StreamerConfig {
    /// Polling loop and restart policy
    #[serde(default)]
    pub stream: StreamConfig,
    /// Endpoint, credentials and receive loop parameters
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Where the tracked terms come from
    #[serde(default)]
    pub terms: TermsConfig,
    /// Where received statuses are written
    #[serde(default)]
    pub output: OutputConfig,
}

impl Debug for StreamerConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("StreamerConfig")
            .field("stream", &self.stream)
            .field("connection", &self.connection)
            .field("terms", &self.terms)
            .field("output", &self.output)
            .finish()
    }
}

impl StreamerConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Configuration sources are merged in the following order (later sources override earlier):
    /// 1. Type defaults (lowest priority)
    /// 2. Configuration file from `CONFIG_PATH` environment variable (if set)
    /// 3. Environment variables with `FIREHOSE__` prefix (highest priority)
    ///
    /// # Note
    /// Validation is deferred so that command line overrides can still be applied.
    /// Callers MUST call `validate()` before using the configuration.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("CONFIG_PATH", "config/streamer.toml");
    /// std::env::set_var("FIREHOSE__STREAM__UNFILTERED", "true");
    /// let cfg = StreamerConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(Self::environment());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(Self::environment())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates every section and returns the validated instance.
    pub fn validate(self) -> Result<Self> {
        self.stream.validate()?;
        self.connection.validate()?;
        self.terms.validate(self.stream.unfiltered)?;
        Ok(self)
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .ignore_empty(true)
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("stream.languages")
    }
}
