#[cfg(test)]
use mockall::automock;
use serde_json::Value;
use tracing::trace;

/// Typed callbacks for classified messages.
///
/// Every method returns whether the receive loop should continue. The default
/// implementations only trace the message and continue, so implementors override
/// just the messages they care about.
#[cfg_attr(test, automock)]
pub trait MessageHandler: Send + Sync + 'static {
    fn on_status(
        &self,
        status: &Value,
    ) -> bool {
        trace!(id = ?status.get("id"), "status received");
        true
    }

    fn on_delete(
        &self,
        status_id: u64,
        user_id: u64,
    ) -> bool {
        trace!(status_id, user_id, "delete received");
        true
    }

    fn on_scrub_geo(
        &self,
        user_id: u64,
        up_to_status_id: u64,
    ) -> bool {
        trace!(user_id, up_to_status_id, "scrub_geo received");
        true
    }

    fn on_limit(
        &self,
        track: u64,
    ) -> bool {
        trace!(track, "limit received");
        true
    }

    fn on_status_withheld(
        &self,
        status_id: u64,
        user_id: u64,
        countries: &[String],
    ) -> bool {
        trace!(status_id, user_id, ?countries, "status withheld");
        true
    }

    fn on_user_withheld(
        &self,
        user_id: u64,
        countries: &[String],
    ) -> bool {
        trace!(user_id, ?countries, "user withheld");
        true
    }

    fn on_disconnect(
        &self,
        code: u32,
        stream_name: &str,
        reason: &str,
    ) -> bool {
        trace!(code, stream_name, reason, "disconnect received");
        true
    }

    fn on_stall_warning(
        &self,
        code: &str,
        message: &str,
        percent_full: u32,
    ) -> bool {
        trace!(code, message, percent_full, "stall warning received");
        true
    }

    fn on_unknown(
        &self,
        entity: &Value,
    ) -> bool {
        trace!(?entity, "unknown message received");
        true
    }
}

/// Handler that keeps every default: traces each message and never stops the stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHandler;

impl MessageHandler for TracingHandler {}
