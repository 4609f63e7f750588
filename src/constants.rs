// -
// Polling

/// Lower bound of the wait between two polling ticks
pub(crate) const MIN_POLL_WAIT_MS: u64 = 100;

/// Grace period granted to a disconnected stream before a new one is opened
pub(crate) const STOP_TIMEOUT_MS: u64 = 1000;

/// Backoff applied by the outer restart loop after a failed polling session
pub(crate) const RESTART_BACKOFF_MS: u64 = 1000;

// -
// HTTP transport

/// TCP connect timeout of the HTTP client
pub(crate) const CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Longest payload line buffered while waiting for its newline
pub(crate) const MAX_LINE_BYTES: usize = 1024 * 1024;

// -
// Envelope keys, checked in this order

pub(crate) const KEY_DELETE: &str = "delete";
pub(crate) const KEY_SCRUB_GEO: &str = "scrub_geo";
pub(crate) const KEY_LIMIT: &str = "limit";
pub(crate) const KEY_STATUS_WITHHELD: &str = "status_withheld";
pub(crate) const KEY_USER_WITHHELD: &str = "user_withheld";
pub(crate) const KEY_DISCONNECT: &str = "disconnect";
pub(crate) const KEY_WARNING: &str = "warning";

/// Presence of this key marks a regular status
pub(crate) const KEY_STATUS_MARKER: &str = "in_reply_to_status_id";
