//! The boundary between a transport's receive loop and the rest of the crate.
//!
//! A transport hands every raw payload to a [`StreamListener`]. The default
//! listener, [`JsonStreamListener`], classifies the payload into a [`Message`]
//! and dispatches it to a [`MessageHandler`]. Failures on the connection task are
//! parked in an [`ExceptionSlot`] until the polling loop collects them.

mod exception_slot;
mod handler;
mod json_listener;
mod message;
mod printing;
pub use exception_slot::*;
pub use handler::*;
pub use json_listener::*;
pub use message::*;
pub use printing::*;


use std::sync::Arc;

use crate::StreamError;

/// Callbacks a transport invokes from its receive loop.
///
/// All methods run on the connection task. The boolean results tell the
/// receive loop whether to keep reading (`true`) or to stop (`false`).
pub trait StreamListener: Send + Sync + 'static {
    /// A raw payload (one line of the stream) arrived
    fn on_data(
        &self,
        raw: &str,
    ) -> bool;

    /// The endpoint answered with a non-200 status code
    fn on_error(
        &self,
        status_code: u16,
    ) -> bool;

    /// The receive loop failed; must not panic
    fn on_exception(
        &self,
        error: StreamError,
    );

    /// Removes and returns the latest captured failure. Called by the polling loop.
    fn take_exception(&self) -> Option<Arc<StreamError>>;
}
