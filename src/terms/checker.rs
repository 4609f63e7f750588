use async_trait::async_trait;
use tracing::debug;
use tracing::info;

use super::TermChecker;
use super::TermSet;
use super::TermSource;
use crate::Result;

/// [`TermChecker`] backed by any [`TermSource`]
pub struct DefaultTermChecker<S: TermSource> {
    source: S,

    /// Last set returned by the source
    tracking: TermSet,
}

impl<S: TermSource> DefaultTermChecker<S> {
    pub fn new(source: S) -> Self {
        DefaultTermChecker {
            source,
            tracking: TermSet::new(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

#[async_trait]
impl<S: TermSource> TermChecker for DefaultTermChecker<S> {
    async fn check(&mut self) -> Result<bool> {
        let new_terms = self.source.fetch_terms().await?;

        let changed = self.tracking != new_terms;
        if changed {
            let added = new_terms.difference(&self.tracking).count();
            let removed = self.tracking.difference(&new_terms).count();
            info!(added, removed, total = new_terms.len(), "Tracked terms changed");
        } else {
            debug!(total = new_terms.len(), "Tracked terms unchanged");
        }

        self.tracking = new_terms;
        Ok(changed)
    }

    fn reset(&mut self) {
        self.tracking = TermSet::new();
    }

    fn tracking_terms(&self) -> Vec<String> {
        self.tracking.iter().cloned().collect()
    }
}
