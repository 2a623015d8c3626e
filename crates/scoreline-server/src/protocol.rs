//! Wire format for the live feed.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(pub i64);

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a client asked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientIntent {
    /// Start receiving commentary for a match.
    Subscribe(MatchId),
    /// Stop receiving commentary for a match.
    Unsubscribe(MatchId),
}

/// Result of parsing one inbound frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InboundFrame {
    /// A recognized request.
    Intent(ClientIntent),
    /// Valid JSON that is not a recognized request.
    Ignored,
    /// Not JSON at all.
    InvalidJson,
}

/// Parse a text frame.
///
/// `matchId` must be an integer. Integral floats such as `5.0` count,
/// fractional or non-numeric values do not.
pub fn parse_frame(text: &str) -> InboundFrame {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        return InboundFrame::InvalidJson;
    };
    let Some(object) = value.as_object() else {
        return InboundFrame::Ignored;
    };
    let Some(match_id) = object.get("matchId").and_then(integer_id) else {
        return InboundFrame::Ignored;
    };
    match object.get("type").and_then(Value::as_str) {
        Some("subscribe") => InboundFrame::Intent(ClientIntent::Subscribe(match_id)),
        Some("unsubscribe") => InboundFrame::Intent(ClientIntent::Unsubscribe(match_id)),
        _ => InboundFrame::Ignored,
    }
}

#[allow(
    clippy::float_cmp,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss
)]
fn integer_id(value: &Value) -> Option<MatchId> {
    if let Some(n) = value.as_i64() {
        return Some(MatchId(n));
    }
    let n = value.as_f64()?;
    let in_range = n >= i64::MIN as f64 && n < i64::MAX as f64;
    (n.is_finite() && n.trunc() == n && in_range).then(|| MatchId(n as i64))
}

/// Control messages sent to one client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once on accept.
    Welcome,
    /// Subscribe acknowledgement.
    Subscribed {
        /// Match subscribed to.
        #[serde(rename = "matchId")]
        match_id: MatchId,
    },
    /// Unsubscribe acknowledgement.
    Unsubscribed {
        /// Match unsubscribed from.
        #[serde(rename = "matchId")]
        match_id: MatchId,
    },
    /// Recoverable protocol error.
    Error {
        /// Human-readable description.
        message: String,
    },
}

impl ServerMessage {
    /// Reply to an unparseable frame.
    pub fn invalid_json() -> Self {
        Self::Error {
            message: "Invalid JSON".to_string(),
        }
    }
}

#[derive(Serialize)]
struct DataFrame<'a, T: Serialize> {
    #[serde(rename = "type")]
    kind: &'static str,
    data: &'a T,
}

/// Encode `{type: "match_created", data}`.
pub fn encode_match_created<T: Serialize>(data: &T) -> serde_json::Result<String> {
    serde_json::to_string(&DataFrame {
        kind: "match_created",
        data,
    })
}

/// Encode `{type: "commentary", data}`.
pub fn encode_commentary<T: Serialize>(data: &T) -> serde_json::Result<String> {
    serde_json::to_string(&DataFrame {
        kind: "commentary",
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn subscribe_and_unsubscribe_parse() {
        assert_eq!(
            parse_frame(r#"{"type":"subscribe","matchId":5}"#),
            InboundFrame::Intent(ClientIntent::Subscribe(MatchId(5)))
        );
        assert_eq!(
            parse_frame(r#"{"type":"unsubscribe","matchId":-3}"#),
            InboundFrame::Intent(ClientIntent::Unsubscribe(MatchId(-3)))
        );
    }

    #[test]
    fn integral_float_is_accepted() {
        assert_eq!(
            parse_frame(r#"{"type":"subscribe","matchId":7.0}"#),
            InboundFrame::Intent(ClientIntent::Subscribe(MatchId(7)))
        );
    }

    #[test]
    fn non_integer_match_ids_are_ignored() {
        for frame in [
            r#"{"type":"subscribe","matchId":"abc"}"#,
            r#"{"type":"subscribe","matchId":"5"}"#,
            r#"{"type":"subscribe","matchId":1.5}"#,
            r#"{"type":"subscribe","matchId":null}"#,
            r#"{"type":"subscribe"}"#,
            r#"{"type":"subscribe","matchId":1e300}"#,
        ] {
            assert_eq!(parse_frame(frame), InboundFrame::Ignored, "{frame}");
        }
    }

    #[test]
    fn unknown_types_and_shapes_are_ignored() {
        assert_eq!(parse_frame(r#"{"type":"ping","matchId":1}"#), InboundFrame::Ignored);
        assert_eq!(parse_frame(r#"{"matchId":1}"#), InboundFrame::Ignored);
        assert_eq!(parse_frame("[1,2,3]"), InboundFrame::Ignored);
        assert_eq!(parse_frame("42"), InboundFrame::Ignored);
    }

    #[test]
    fn garbage_is_invalid_json() {
        assert_eq!(parse_frame("not json"), InboundFrame::InvalidJson);
        assert_eq!(parse_frame(""), InboundFrame::InvalidJson);
    }

    #[test]
    fn control_messages_serialize() {
        assert_eq!(
            serde_json::to_value(ServerMessage::Welcome).unwrap(),
            json!({"type": "welcome"})
        );
        assert_eq!(
            serde_json::to_value(ServerMessage::Subscribed { match_id: MatchId(5) }).unwrap(),
            json!({"type": "subscribed", "matchId": 5})
        );
        assert_eq!(
            serde_json::to_value(ServerMessage::Unsubscribed { match_id: MatchId(5) }).unwrap(),
            json!({"type": "unsubscribed", "matchId": 5})
        );
        assert_eq!(
            serde_json::to_value(ServerMessage::invalid_json()).unwrap(),
            json!({"type": "error", "message": "Invalid JSON"})
        );
    }

    #[test]
    fn data_frames_wrap_payload() {
        let text = encode_commentary(&json!({"minute": 12, "text": "Goal!"})).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({"type": "commentary", "data": {"minute": 12, "text": "Goal!"}}));

        let text = encode_match_created(&json!({"id": 1})).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "match_created");
        assert_eq!(value["data"]["id"], 1);
    }
}
