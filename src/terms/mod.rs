//! Tracked term management.
//!
//! A [`TermSource`] produces the set of terms the stream should currently track;
//! a [`TermChecker`] remembers the last observed set and tells the polling loop
//! whether it changed since the previous tick.

mod checker;
mod file_source;
mod reporting_source;
mod static_source;
pub use checker::*;
pub use file_source::*;
pub use reporting_source::*;
pub use static_source::*;


use std::collections::BTreeSet;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::Result;

/// A set of unique filter terms. Ordered so that every listing of it is stable.
pub type TermSet = BTreeSet<String>;

/// Produces the current desired set of filter terms.
///
/// Implementations may read files, query databases or hold the set in memory.
/// Every call returns a complete set; the caller never merges results.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TermSource: Send + Sync + 'static {
    async fn fetch_terms(&self) -> Result<TermSet>;
}

/// Tracks the last observed term set and detects changes to it.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TermChecker: Send + 'static {
    /// Fetches the current terms, compares them with the stored set and stores them.
    ///
    /// Returns `true` unless the two sets are equal. The stored set is replaced
    /// whatever the outcome of the comparison.
    async fn check(&mut self) -> Result<bool>;

    /// Forgets the stored set, so the next `check` reports any non-empty set as a change.
    fn reset(&mut self);

    /// The stored set, in a stable order.
    fn tracking_terms(&self) -> Vec<String>;
}
