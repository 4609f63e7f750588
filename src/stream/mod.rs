//! The dynamic stream: a polling loop that keeps one streaming connection in
//! line with the tracked terms, and the outer loop restarting it after failures.

mod dynamic_stream;
mod supervisor;
pub use dynamic_stream::*;
pub use supervisor::*;

#[cfg(test)]
mod dynamic_stream_test;
