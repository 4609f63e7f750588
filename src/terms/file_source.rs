use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::trace;

use super::TermSet;
use super::TermSource;
use crate::Result;
use crate::TermSourceError;

/// Reads the tracked terms from a text file, one term per line.
///
/// Surrounding whitespace is stripped and blank lines are skipped; everything
/// else, including inner spaces, punctuation and quotes, is kept verbatim.
#[derive(Debug, Clone)]
pub struct FileTermSource {
    path: PathBuf,
}

impl FileTermSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileTermSource { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TermSource for FileTermSource {
    async fn fetch_terms(&self) -> Result<TermSet> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| TermSourceError::Read {
                path: self.path.clone(),
                source,
            })?;

        let terms = parse_terms(&contents);
        trace!(path = %self.path.display(), count = terms.len(), "Read track file");
        Ok(terms)
    }
}

pub(crate) fn parse_terms(contents: &str) -> TermSet {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
