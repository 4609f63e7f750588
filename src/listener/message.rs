use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Map;
use serde_json::Value;

use crate::constants::KEY_DELETE;
use crate::constants::KEY_DISCONNECT;
use crate::constants::KEY_LIMIT;
use crate::constants::KEY_SCRUB_GEO;
use crate::constants::KEY_STATUS_MARKER;
use crate::constants::KEY_STATUS_WITHHELD;
use crate::constants::KEY_USER_WITHHELD;
use crate::constants::KEY_WARNING;

/// One classified payload of the stream
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// A regular status, kept as the parsed object
    Status(Value),
    /// A status was deleted
    Delete { status_id: u64, user_id: u64 },
    /// Location data of `user_id` must be removed up to `up_to_status_id`
    ScrubGeo { user_id: u64, up_to_status_id: u64 },
    /// `track` matching messages were withheld because of rate limiting
    Limit { track: u64 },
    StatusWithheld {
        status_id: u64,
        user_id: u64,
        countries: Vec<String>,
    },
    UserWithheld { user_id: u64, countries: Vec<String> },
    /// The server is about to close the connection
    Disconnect {
        code: u32,
        stream_name: String,
        reason: String,
    },
    /// We are falling behind the delivery rate
    StallWarning {
        code: String,
        message: String,
        percent_full: u32,
    },
    /// An object carrying none of the known markers
    Unknown(Value),
    /// Nothing to dispatch; the stream goes on
    Ignorable(IgnoreReason),
}

/// Why a payload was not dispatched
#[derive(Debug, Clone, PartialEq)]
pub enum IgnoreReason {
    InvalidJson(String),
    NotAnObject,
    /// The envelope key was present but its body did not have the expected shape
    Malformed { kind: &'static str, error: String },
}

#[derive(Deserialize)]
struct DeleteEnvelope {
    status: DeletedStatus,
}

#[derive(Deserialize)]
struct DeletedStatus {
    id: u64,
    user_id: u64,
}

#[derive(Deserialize)]
struct ScrubGeoEnvelope {
    user_id: u64,
    up_to_status_id: u64,
}

#[derive(Deserialize)]
struct LimitEnvelope {
    track: u64,
}

#[derive(Deserialize)]
struct StatusWithheldEnvelope {
    id: u64,
    user_id: u64,
    withheld_in_countries: Vec<String>,
}

#[derive(Deserialize)]
struct UserWithheldEnvelope {
    id: u64,
    withheld_in_countries: Vec<String>,
}

#[derive(Deserialize)]
struct DisconnectEnvelope {
    code: u32,
    stream_name: String,
    reason: String,
}

#[derive(Deserialize)]
struct WarningEnvelope {
    code: String,
    message: String,
    percent_full: u32,
}

impl Message {
    /// Classifies a raw payload.
    ///
    /// Envelope keys are tried in a fixed order and the first one present wins:
    /// `delete`, `scrub_geo`, `limit`, `status_withheld`, `user_withheld`,
    /// `disconnect`, `warning`. Otherwise an object with `in_reply_to_status_id`
    /// is a status and anything else is unknown. Invalid JSON and non-object
    /// values are ignorable.
    pub fn parse(raw: &str) -> Message {
        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => return Message::Ignorable(IgnoreReason::InvalidJson(e.to_string())),
        };

        match value {
            Value::Object(object) => Self::from_object(object),
            _ => Message::Ignorable(IgnoreReason::NotAnObject),
        }
    }

    fn from_object(mut object: Map<String, Value>) -> Message {
        if let Some(body) = object.remove(KEY_DELETE) {
            return envelope(KEY_DELETE, body, |d: DeleteEnvelope| Message::Delete {
                status_id: d.status.id,
                user_id: d.status.user_id,
            });
        }

        if let Some(body) = object.remove(KEY_SCRUB_GEO) {
            return envelope(KEY_SCRUB_GEO, body, |s: ScrubGeoEnvelope| Message::ScrubGeo {
                user_id: s.user_id,
                up_to_status_id: s.up_to_status_id,
            });
        }

        if let Some(body) = object.remove(KEY_LIMIT) {
            return envelope(KEY_LIMIT, body, |l: LimitEnvelope| Message::Limit { track: l.track });
        }

        if let Some(body) = object.remove(KEY_STATUS_WITHHELD) {
            return envelope(KEY_STATUS_WITHHELD, body, |s: StatusWithheldEnvelope| {
                Message::StatusWithheld {
                    status_id: s.id,
                    user_id: s.user_id,
                    countries: s.withheld_in_countries,
                }
            });
        }

        if let Some(body) = object.remove(KEY_USER_WITHHELD) {
            return envelope(KEY_USER_WITHHELD, body, |u: UserWithheldEnvelope| {
                Message::UserWithheld {
                    user_id: u.id,
                    countries: u.withheld_in_countries,
                }
            });
        }

        if let Some(body) = object.remove(KEY_DISCONNECT) {
            return envelope(KEY_DISCONNECT, body, |d: DisconnectEnvelope| Message::Disconnect {
                code: d.code,
                stream_name: d.stream_name,
                reason: d.reason,
            });
        }

        if let Some(body) = object.remove(KEY_WARNING) {
            return envelope(KEY_WARNING, body, |w: WarningEnvelope| Message::StallWarning {
                code: w.code,
                message: w.message,
                percent_full: w.percent_full,
            });
        }

        if object.contains_key(KEY_STATUS_MARKER) {
            Message::Status(Value::Object(object))
        } else {
            Message::Unknown(Value::Object(object))
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Message::Status(_) => "status",
            Message::Delete { .. } => KEY_DELETE,
            Message::ScrubGeo { .. } => KEY_SCRUB_GEO,
            Message::Limit { .. } => KEY_LIMIT,
            Message::StatusWithheld { .. } => KEY_STATUS_WITHHELD,
            Message::UserWithheld { .. } => KEY_USER_WITHHELD,
            Message::Disconnect { .. } => KEY_DISCONNECT,
            Message::StallWarning { .. } => KEY_WARNING,
            Message::Unknown(_) => "unknown",
            Message::Ignorable(_) => "ignorable",
        }
    }
}

fn envelope<T: DeserializeOwned>(
    kind: &'static str,
    body: Value,
    build: impl FnOnce(T) -> Message,
) -> Message {
    match serde_json::from_value::<T>(body) {
        Ok(parsed) => build(parsed),
        Err(e) => Message::Ignorable(IgnoreReason::Malformed {
            kind,
            error: e.to_string(),
        }),
    }
}
