//! A long-lived streaming client whose filter terms can change at runtime.
//!
//! [`DynamicStream`] polls a [`TermChecker`] and keeps one connection of a
//! [`StreamTransport`] in line with the current terms, restarting it when they
//! change or when the connection dies. Payloads reach a [`StreamListener`],
//! by default a [`JsonStreamListener`] that classifies them and dispatches to a
//! [`MessageHandler`].

mod config;
mod constants;
mod errors;
mod listener;
mod stream;
mod terms;
mod transport;

pub use config::*;
pub use errors::*;
pub use listener::*;
pub use stream::*;
pub use terms::*;
pub use transport::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
