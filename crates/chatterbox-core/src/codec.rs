//! JSON codec for the real-time channel.
//!
//! Each WebSocket text message carries exactly one JSON object. Inbound text
//! is validated here and nowhere else.

use serde_json::Value;

use crate::error::{ChatError, ChatResult};
use crate::event::ServerEvent;
use crate::frame::{Frame, WireFrame};

/// Decode one inbound frame.
///
/// * `Err(ChatError::InvalidFrame)`: not JSON, or not a JSON object. The
///   connection that produced it must be terminated.
/// * `Ok(None)`: a well-formed object the relay does not act on (missing or
///   unknown `type`, missing fields, empty recipient).
/// * `Ok(Some(frame))`: a typed frame ready for routing.
pub fn decode_frame(text: &str) -> ChatResult<Option<Frame>> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| ChatError::InvalidFrame(format!("malformed JSON: {e}")))?;
    if !value.is_object() {
        return Err(ChatError::InvalidFrame("frame is not a JSON object".into()));
    }

    match serde_json::from_value::<WireFrame>(value) {
        Ok(wire) => Ok(wire.into_frame()),
        Err(_) => Ok(None),
    }
}

/// Encode a frame in its wire form (client side).
pub fn encode_frame(frame: &Frame) -> ChatResult<String> {
    Ok(serde_json::to_string(&WireFrame::from(frame))?)
}

/// Encode an outbound event.
pub fn encode_event(event: &ServerEvent) -> ChatResult<String> {
    Ok(serde_json::to_string(event)?)
}

/// Decode an outbound event (client side).
pub fn decode_event(text: &str) -> ChatResult<ServerEvent> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::PresenceStatus;
    use crate::frame::SignalKind;
    use serde_json::json;

    #[test]
    fn typing_defaults_to_not_typing() {
        let frame = decode_frame(r#"{"type":"typing","recipient_id":"bob"}"#).unwrap();
        assert_eq!(
            frame,
            Some(Frame::Typing {
                recipient_id: "bob".into(),
                is_typing: false,
            })
        );
    }

    #[test]
    fn message_with_recipient_is_direct() {
        let text = r#"{"type":"message","recipient_id":"bob","content":"hi","timestamp":"2024-01-01T00:00:00Z","message_id":"m1"}"#;
        let frame = decode_frame(text).unwrap().unwrap();
        assert_eq!(
            frame,
            Frame::DirectMessage {
                recipient_id: "bob".into(),
                content: "hi".into(),
                timestamp: Some(json!("2024-01-01T00:00:00Z")),
                message_id: Some("m1".into()),
            }
        );
    }

    #[test]
    fn group_id_takes_precedence_over_recipient() {
        let text = r#"{"type":"message","recipient_id":"bob","group_id":"g1","content":"all"}"#;
        let frame = decode_frame(text).unwrap().unwrap();
        assert!(matches!(frame, Frame::GroupMessage { ref group_id, .. } if group_id == "g1"));
    }

    #[test]
    fn message_without_target_is_discarded() {
        assert_eq!(decode_frame(r#"{"type":"message","content":"lost"}"#).unwrap(), None);
        assert_eq!(
            decode_frame(r#"{"type":"message","recipient_id":"","content":"lost"}"#).unwrap(),
            None
        );
    }

    #[test]
    fn signal_kinds_decode() {
        let frame = decode_frame(r#"{"type":"ice-candidate","recipient_id":"bob","data":{"c":1}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            frame,
            Frame::Signal {
                kind: SignalKind::IceCandidate,
                recipient_id: "bob".into(),
                payload: json!({"c": 1}),
            }
        );

        let frame = decode_frame(r#"{"type":"call-end","recipient_id":"bob"}"#).unwrap();
        assert_eq!(frame, Some(Frame::CallEnd { recipient_id: "bob".into() }));
    }

    #[test]
    fn status_is_not_validated() {
        let frame = decode_frame(r#"{"type":"status","recipient_id":"bob","message_id":"m1","status":"bogus"}"#)
            .unwrap()
            .unwrap();
        assert!(matches!(frame, Frame::Status { ref status, .. } if status == &json!("bogus")));
    }

    #[test]
    fn status_without_message_id_is_discarded() {
        assert_eq!(
            decode_frame(r#"{"type":"status","recipient_id":"bob","status":"read"}"#).unwrap(),
            None
        );
    }

    #[test]
    fn unknown_or_missing_type_is_discarded() {
        assert_eq!(decode_frame(r#"{"type":"dance","recipient_id":"bob"}"#).unwrap(), None);
        assert_eq!(decode_frame(r#"{"recipient_id":"bob"}"#).unwrap(), None);
        assert_eq!(decode_frame(r#"{"type":42}"#).unwrap(), None);
    }

    #[test]
    fn malformed_json_is_fatal() {
        assert!(matches!(
            decode_frame("{not json"),
            Err(ChatError::InvalidFrame(_))
        ));
        assert!(matches!(decode_frame("[1,2]"), Err(ChatError::InvalidFrame(_))));
        assert!(matches!(decode_frame("\"text\""), Err(ChatError::InvalidFrame(_))));
    }

    #[test]
    fn encoded_frame_decodes_to_itself() {
        let frame = Frame::GroupMessage {
            group_id: "g1".into(),
            content: "hello".into(),
            timestamp: None,
        };
        let text = encode_frame(&frame).unwrap();
        assert_eq!(decode_frame(&text).unwrap(), Some(frame));
    }

    #[test]
    fn presence_event_wire_shape() {
        let text = encode_event(&ServerEvent::presence("alice", PresenceStatus::Online)).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            json!({"type": "user_status", "user_id": "alice", "status": "online"})
        );
    }

    #[test]
    fn direct_message_event_omits_group_id() {
        let event = ServerEvent::Message {
            sender_id: "alice".into(),
            group_id: None,
            content: "hi".into(),
            timestamp: None,
            message_id: Some("m1".into()),
        };
        let value: Value = serde_json::from_str(&encode_event(&event).unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"type": "message", "sender_id": "alice", "content": "hi", "message_id": "m1"})
        );
        assert_eq!(decode_event(&value.to_string()).unwrap(), event);
    }
}
