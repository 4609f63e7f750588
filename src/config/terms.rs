use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Where the tracked terms come from
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct TermsConfig {
    /// File with one term per line, re-read on every polling tick
    #[serde(default)]
    pub track_file: Option<PathBuf>,
}

impl TermsConfig {
    /// A filtered stream cannot run without a track file.
    pub fn validate(
        &self,
        unfiltered: bool,
    ) -> Result<()> {
        match &self.track_file {
            Some(path) if path.as_os_str().is_empty() => {
                Err(Error::InvalidConfig("track_file path cannot be empty".into()))
            }
            None if !unfiltered => Err(Error::InvalidConfig(
                "track_file is required unless the stream is unfiltered".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// Where received statuses are written
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct OutputConfig {
    /// Output file; standard output when unset
    #[serde(default)]
    pub outfile: Option<PathBuf>,
}
