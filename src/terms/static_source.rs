use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::TermSet;
use super::TermSource;
use crate::Result;

/// In-memory [`TermSource`]. Clones share the same set, so one handle can be
/// given to the checker while another one edits the terms at runtime.
#[derive(Debug, Clone, Default)]
pub struct StaticTermSource {
    terms: Arc<RwLock<TermSet>>,
}

impl StaticTermSource {
    pub fn new<I, T>(terms: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        StaticTermSource {
            terms: Arc::new(RwLock::new(terms.into_iter().map(Into::into).collect())),
        }
    }

    /// Replaces the whole set
    pub fn set_terms<I, T>(
        &self,
        terms: I,
    ) where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        *self.terms.write() = terms.into_iter().map(Into::into).collect();
    }

    pub fn insert(
        &self,
        term: impl Into<String>,
    ) -> bool {
        self.terms.write().insert(term.into())
    }

    pub fn remove(
        &self,
        term: &str,
    ) -> bool {
        self.terms.write().remove(term)
    }
}

#[async_trait]
impl TermSource for StaticTermSource {
    async fn fetch_terms(&self) -> Result<TermSet> {
        Ok(self.terms.read().clone())
    }
}
