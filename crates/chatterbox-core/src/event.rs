//! Outbound events: what the relay pushes to a connected client.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::frame::SignalKind;

/// Reachability of a user as announced by presence events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

impl std::fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Online => f.write_str("online"),
            Self::Offline => f.write_str("offline"),
        }
    }
}

/// A server-to-client event, discriminated by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Presence change of another user.
    #[serde(rename = "user_status")]
    UserStatus {
        user_id: String,
        status: PresenceStatus,
    },
    #[serde(rename = "typing")]
    Typing { user_id: String, is_typing: bool },
    /// Chat message; `group_id` is set for group sends, `message_id` for direct ones.
    #[serde(rename = "message")]
    Message {
        sender_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        group_id: Option<String>,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
    },
    #[serde(rename = "offer")]
    Offer {
        sender_id: String,
        #[serde(default)]
        data: Value,
    },
    #[serde(rename = "answer")]
    Answer {
        sender_id: String,
        #[serde(default)]
        data: Value,
    },
    #[serde(rename = "ice-candidate")]
    IceCandidate {
        sender_id: String,
        #[serde(default)]
        data: Value,
    },
    #[serde(rename = "call-end")]
    CallEnd { sender_id: String },
    #[serde(rename = "status")]
    Status {
        message_id: String,
        #[serde(default)]
        status: Value,
    },
}

impl ServerEvent {
    /// Build a presence event.
    pub fn presence(user_id: impl Into<String>, status: PresenceStatus) -> Self {
        Self::UserStatus {
            user_id: user_id.into(),
            status,
        }
    }

    /// Build the relayed form of a signaling payload.
    pub fn signal(kind: SignalKind, sender_id: impl Into<String>, data: Value) -> Self {
        let sender_id = sender_id.into();
        match kind {
            SignalKind::Offer => Self::Offer { sender_id, data },
            SignalKind::Answer => Self::Answer { sender_id, data },
            SignalKind::IceCandidate => Self::IceCandidate { sender_id, data },
        }
    }
}
