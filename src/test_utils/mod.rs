//! Shared helpers for the unit tests of this crate
mod fake_transport;

pub use fake_transport::*;

/// A complete status payload as delivered by the filter endpoint
pub(crate) const STATUS_FIXTURE: &str = include_str!("fixtures/status.json");
