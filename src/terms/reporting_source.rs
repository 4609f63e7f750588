use std::sync::Arc;

use async_trait::async_trait;

use super::TermSet;
use super::TermSource;
use crate::Result;
use crate::ThroughputReporter;

/// Wraps a [`TermSource`] and reports throughput before every fetch.
///
/// The polling loop fetches terms once per tick, so this yields one throughput
/// report (and one counter reset) per tick.
pub struct ReportingTermSource<S, R> {
    inner: S,
    reporter: Arc<R>,
}

impl<S, R> ReportingTermSource<S, R>
where
    S: TermSource,
    R: ThroughputReporter,
{
    pub fn new(
        inner: S,
        reporter: Arc<R>,
    ) -> Self {
        ReportingTermSource { inner, reporter }
    }
}

#[async_trait]
impl<S, R> TermSource for ReportingTermSource<S, R>
where
    S: TermSource,
    R: ThroughputReporter,
{
    async fn fetch_terms(&self) -> Result<TermSet> {
        self.reporter.print_status();
        self.inner.fetch_terms().await
    }
}
