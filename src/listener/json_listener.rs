use std::sync::Arc;

use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::ExceptionSlot;
use super::IgnoreReason;
use super::Message;
use super::MessageHandler;
use super::StreamListener;
use crate::StreamError;

/// [`StreamListener`] that parses JSON payloads and dispatches them to a [`MessageHandler`].
///
/// Malformed payloads never close the connection: they are logged and skipped.
pub struct JsonStreamListener<H: MessageHandler> {
    handler: Arc<H>,
    exception: ExceptionSlot,
}

impl<H: MessageHandler> JsonStreamListener<H> {
    pub fn new(handler: Arc<H>) -> Self {
        JsonStreamListener {
            handler,
            exception: ExceptionSlot::new(),
        }
    }

    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }

    /// Hands a classified message to the matching handler method
    pub fn dispatch(
        &self,
        message: Message,
    ) -> bool {
        match message {
            Message::Status(status) => self.handler.on_status(&status),
            Message::Delete { status_id, user_id } => self.handler.on_delete(status_id, user_id),
            Message::ScrubGeo {
                user_id,
                up_to_status_id,
            } => self.handler.on_scrub_geo(user_id, up_to_status_id),
            Message::Limit { track } => {
                info!(track, "Limit notice: matching messages were withheld");
                self.handler.on_limit(track)
            }
            Message::StatusWithheld {
                status_id,
                user_id,
                countries,
            } => self.handler.on_status_withheld(status_id, user_id, &countries),
            Message::UserWithheld { user_id, countries } => {
                self.handler.on_user_withheld(user_id, &countries)
            }
            Message::Disconnect {
                code,
                stream_name,
                reason,
            } => {
                warn!(code, %stream_name, %reason, "Disconnect notice received");
                self.handler.on_disconnect(code, &stream_name, &reason)
            }
            Message::StallWarning {
                code,
                message,
                percent_full,
            } => {
                warn!(%code, percent_full, "Stall warning: {}", message);
                self.handler.on_stall_warning(&code, &message, percent_full)
            }
            Message::Unknown(entity) => self.handler.on_unknown(&entity),
            Message::Ignorable(reason) => {
                match reason {
                    IgnoreReason::InvalidJson(e) => debug!("Invalid data received: {}", e),
                    IgnoreReason::NotAnObject => debug!("Non-object received"),
                    IgnoreReason::Malformed { kind, error } => {
                        warn!(kind, %error, "Malformed envelope skipped")
                    }
                }
                true
            }
        }
    }
}

impl<H: MessageHandler> StreamListener for JsonStreamListener<H> {
    fn on_data(
        &self,
        raw: &str,
    ) -> bool {
        self.dispatch(Message::parse(raw))
    }

    fn on_error(
        &self,
        status_code: u16,
    ) -> bool {
        error!(status_code, "Stream endpoint returned an error status");
        false
    }

    fn on_exception(
        &self,
        error: StreamError,
    ) {
        error!(%error, "Exception in the streaming task");
        self.exception.store(error);
    }

    fn take_exception(&self) -> Option<Arc<StreamError>> {
        self.exception.take()
    }
}
