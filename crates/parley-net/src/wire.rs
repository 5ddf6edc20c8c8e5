//! JSON wire codec.
//!
//! Every frame is a JSON text message:
//!
//! ```text
//! outbound: {"event": "<name>", "payload": <any>, "timestamp": <epoch ms>}
//! inbound:  {"event": "<name>", "payload": <any>}            (timestamp optional)
//! ```
//!
//! Inbound frames without a timestamp are stamped with the local clock.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::NetError;

/// An outbound frame as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    /// Event name.
    pub event: String,
    /// Arbitrary JSON payload.
    pub payload: Value,
    /// Send time, Unix epoch milliseconds.
    pub timestamp: u64,
}

#[derive(Deserialize)]
struct InboundFrame {
    event: String,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    timestamp: Option<u64>,
}

/// Normalized inbound event handed to the router.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    /// Event name.
    pub event_type: String,
    /// Event payload.
    pub data: Value,
    /// Frame timestamp, or local receive time when the frame carried none.
    pub timestamp: u64,
}

/// Serialize an outbound frame to JSON text.
pub fn encode(event: &str, payload: &Value, now_ms: u64) -> Result<String, NetError> {
    let frame = WireMessage {
        event: event.to_string(),
        payload: payload.clone(),
        timestamp: now_ms,
    };
    serde_json::to_string(&frame).map_err(|e| NetError::Encode {
        reason: e.to_string(),
    })
}

/// Parse an inbound JSON text frame.
pub fn decode(text: &str, now_ms: u64) -> Result<InboundEvent, NetError> {
    let frame: InboundFrame = serde_json::from_str(text).map_err(|e| NetError::ProtocolDecode {
        reason: e.to_string(),
    })?;
    if frame.event.is_empty() {
        return Err(NetError::ProtocolDecode {
            reason: "empty event name".to_string(),
        });
    }
    Ok(InboundEvent {
        event_type: frame.event,
        data: frame.payload,
        timestamp: frame.timestamp.unwrap_or(now_ms),
    })
}

/// Chat-class payload fields used for duplicate detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message identity. Synthesized when the sender omitted it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Sender name or id.
    pub sender: String,
    /// Message body.
    pub content: String,
    /// Message time, Unix epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

impl ChatMessage {
    /// Extract chat fields from an event payload. A missing timestamp is
    /// filled with `fallback_ts`.
    pub fn from_payload(payload: &Value, fallback_ts: u64) -> Result<Self, NetError> {
        let mut message: ChatMessage =
            serde_json::from_value(payload.clone()).map_err(|e| NetError::ProtocolDecode {
                reason: format!("malformed chat payload: {e}"),
            })?;
        if message.timestamp.is_none() {
            message.timestamp = Some(fallback_ts);
        }
        if message.id.as_deref().is_some_and(str::is_empty) {
            message.id = None;
        }
        Ok(message)
    }

    /// Write `id` and `timestamp` back into an object payload so subscribers
    /// and the server see the normalized values.
    pub fn write_into(&self, payload: &mut Value) {
        if let Value::Object(map) = payload {
            stamp(map, "id", self.id.clone().map(Value::String));
            stamp(map, "timestamp", self.timestamp.map(Value::from));
        }
    }
}

fn stamp(map: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    if let Some(value) = value {
        map.insert(key.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_has_event_payload_and_timestamp() {
        let text = encode("move", &json!({"x": 1}), 42).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["event"], "move");
        assert_eq!(value["payload"]["x"], 1);
        assert_eq!(value["timestamp"], 42);
    }

    #[test]
    fn test_decode_uses_frame_timestamp() {
        let event = decode(r#"{"event":"tick","payload":[1,2],"timestamp":7}"#, 100).unwrap();
        assert_eq!(event.event_type, "tick");
        assert_eq!(event.data, json!([1, 2]));
        assert_eq!(event.timestamp, 7);
    }

    #[test]
    fn test_decode_defaults_timestamp_to_now() {
        let event = decode(r#"{"event":"tick","payload":null}"#, 100).unwrap();
        assert_eq!(event.timestamp, 100);
    }

    #[test]
    fn test_decode_missing_payload_is_null() {
        let event = decode(r#"{"event":"ping"}"#, 0).unwrap();
        assert_eq!(event.data, Value::Null);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode("{not json", 0).unwrap_err();
        assert_eq!(err.code(), "protocol_decode");
        assert!(decode(r#"{"payload":1}"#, 0).is_err());
        assert!(decode(r#"{"event":""}"#, 0).is_err());
    }

    #[test]
    fn test_chat_message_from_payload_fills_timestamp() {
        let msg = ChatMessage::from_payload(&json!({"sender": "ana", "content": "hi"}), 55).unwrap();
        assert_eq!(msg.id, None);
        assert_eq!(msg.timestamp, Some(55));
    }

    #[test]
    fn test_chat_message_empty_id_treated_as_missing() {
        let msg =
            ChatMessage::from_payload(&json!({"id": "", "sender": "a", "content": "b"}), 0).unwrap();
        assert_eq!(msg.id, None);
    }

    #[test]
    fn test_chat_message_requires_sender_and_content() {
        assert!(ChatMessage::from_payload(&json!({"content": "hi"}), 0).is_err());
        assert!(ChatMessage::from_payload(&json!("hi"), 0).is_err());
    }

    #[test]
    fn test_write_into_preserves_extra_fields() {
        let mut payload = json!({"sender": "a", "content": "b", "room": "lobby"});
        let msg = ChatMessage {
            id: Some("m1".into()),
            sender: "a".into(),
            content: "b".into(),
            timestamp: Some(9),
        };
        msg.write_into(&mut payload);
        assert_eq!(payload["id"], "m1");
        assert_eq!(payload["timestamp"], 9);
        assert_eq!(payload["room"], "lobby");
    }
}
