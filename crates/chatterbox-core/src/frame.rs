//! Inbound frames: what a client may send over the real-time channel.
//!
//! [`Frame`] is the closed, typed form the relay operates on. The JSON shape
//! on the wire is [`WireFrame`]; conversion between the two happens once, in
//! the codec, so nothing downstream ever looks up fields by name.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Call-signaling payload kinds relayed between peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

impl SignalKind {
    /// Wire name of this signal kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::IceCandidate => "ice-candidate",
        }
    }
}

/// A validated inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Typing indicator for a one-to-one conversation.
    Typing { recipient_id: String, is_typing: bool },
    /// One-to-one chat message.
    DirectMessage {
        recipient_id: String,
        content: String,
        timestamp: Option<Value>,
        message_id: Option<String>,
    },
    /// Group chat message; members are resolved by the caller before routing.
    GroupMessage {
        group_id: String,
        content: String,
        timestamp: Option<Value>,
    },
    /// WebRTC offer/answer/ICE candidate, relayed verbatim.
    Signal {
        kind: SignalKind,
        recipient_id: String,
        payload: Value,
    },
    /// The sender hung up.
    CallEnd { recipient_id: String },
    /// Delivery status update for a message.
    ///
    /// `status` is opaque here: the relay forwards whatever the client sent.
    Status {
        recipient_id: String,
        message_id: String,
        status: Value,
    },
}

impl Frame {
    /// Short label used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Typing { .. } => "typing",
            Self::DirectMessage { .. } => "message_direct",
            Self::GroupMessage { .. } => "message_group",
            Self::Signal { kind, .. } => kind.as_str(),
            Self::CallEnd { .. } => "call-end",
            Self::Status { .. } => "status",
        }
    }
}

/// JSON shape of an inbound frame, discriminated by `type`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub(crate) enum WireFrame {
    #[serde(rename = "typing")]
    Typing {
        recipient_id: String,
        #[serde(default)]
        is_typing: bool,
    },
    #[serde(rename = "message")]
    Message {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        recipient_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        group_id: Option<String>,
        #[serde(default)]
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
    },
    #[serde(rename = "offer")]
    Offer {
        recipient_id: String,
        #[serde(default)]
        data: Value,
    },
    #[serde(rename = "answer")]
    Answer {
        recipient_id: String,
        #[serde(default)]
        data: Value,
    },
    #[serde(rename = "ice-candidate")]
    IceCandidate {
        recipient_id: String,
        #[serde(default)]
        data: Value,
    },
    #[serde(rename = "call-end")]
    CallEnd { recipient_id: String },
    #[serde(rename = "status")]
    Status {
        recipient_id: String,
        message_id: String,
        #[serde(default)]
        status: Value,
    },
    #[serde(other)]
    Unknown,
}

/// Empty identifiers count as absent.
fn present(id: Option<String>) -> Option<String> {
    id.filter(|s| !s.is_empty())
}

impl WireFrame {
    /// Convert to the typed form. `None` means the frame carries nothing the
    /// relay acts on and is discarded.
    pub(crate) fn into_frame(self) -> Option<Frame> {
        match self {
            Self::Typing {
                recipient_id,
                is_typing,
            } => Some(Frame::Typing {
                recipient_id: present(Some(recipient_id))?,
                is_typing,
            }),
            Self::Message {
                recipient_id,
                group_id,
                content,
                timestamp,
                message_id,
            } => {
                // A group id wins over a recipient id.
                if let Some(group_id) = present(group_id) {
                    Some(Frame::GroupMessage {
                        group_id,
                        content,
                        timestamp,
                    })
                } else {
                    Some(Frame::DirectMessage {
                        recipient_id: present(recipient_id)?,
                        content,
                        timestamp,
                        message_id,
                    })
                }
            }
            Self::Offer { recipient_id, data } => signal(SignalKind::Offer, recipient_id, data),
            Self::Answer { recipient_id, data } => signal(SignalKind::Answer, recipient_id, data),
            Self::IceCandidate { recipient_id, data } => {
                signal(SignalKind::IceCandidate, recipient_id, data)
            }
            Self::CallEnd { recipient_id } => Some(Frame::CallEnd {
                recipient_id: present(Some(recipient_id))?,
            }),
            Self::Status {
                recipient_id,
                message_id,
                status,
            } => Some(Frame::Status {
                recipient_id: present(Some(recipient_id))?,
                message_id: present(Some(message_id))?,
                status,
            }),
            Self::Unknown => None,
        }
    }
}

fn signal(kind: SignalKind, recipient_id: String, payload: Value) -> Option<Frame> {
    Some(Frame::Signal {
        kind,
        recipient_id: present(Some(recipient_id))?,
        payload,
    })
}

impl From<&Frame> for WireFrame {
    fn from(frame: &Frame) -> Self {
        match frame.clone() {
            Frame::Typing {
                recipient_id,
                is_typing,
            } => Self::Typing {
                recipient_id,
                is_typing,
            },
            Frame::DirectMessage {
                recipient_id,
                content,
                timestamp,
                message_id,
            } => Self::Message {
                recipient_id: Some(recipient_id),
                group_id: None,
                content,
                timestamp,
                message_id,
            },
            Frame::GroupMessage {
                group_id,
                content,
                timestamp,
            } => Self::Message {
                recipient_id: None,
                group_id: Some(group_id),
                content,
                timestamp,
                message_id: None,
            },
            Frame::Signal {
                kind,
                recipient_id,
                payload,
            } => match kind {
                SignalKind::Offer => Self::Offer {
                    recipient_id,
                    data: payload,
                },
                SignalKind::Answer => Self::Answer {
                    recipient_id,
                    data: payload,
                },
                SignalKind::IceCandidate => Self::IceCandidate {
                    recipient_id,
                    data: payload,
                },
            },
            Frame::CallEnd { recipient_id } => Self::CallEnd { recipient_id },
            Frame::Status {
                recipient_id,
                message_id,
                status,
            } => Self::Status {
                recipient_id,
                message_id,
                status,
            },
        }
    }
}
