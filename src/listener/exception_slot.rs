use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tracing::debug;

use crate::StreamError;

/// Holds the latest fatal error raised on the connection task.
///
/// Written by the connection task, read and cleared by the polling loop. Both
/// operations are a single atomic swap. A second error stored before the first
/// is taken replaces it.
#[derive(Default)]
pub struct ExceptionSlot {
    latest: ArcSwapOption<StreamError>,
}

impl ExceptionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(
        &self,
        error: StreamError,
    ) {
        if let Some(previous) = self.latest.swap(Some(Arc::new(error))) {
            debug!(%previous, "Replaced a captured stream error that was never collected");
        }
    }

    pub fn take(&self) -> Option<Arc<StreamError>> {
        self.latest.swap(None)
    }

    pub fn is_empty(&self) -> bool {
        self.latest.load().is_none()
    }
}
