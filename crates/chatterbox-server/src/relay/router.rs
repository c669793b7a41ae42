//! Message router: turns a validated inbound frame into deliveries.
//!
//! Every path is a best-effort relay. An offline recipient is a silent drop;
//! a failing fan-out target is skipped. Nothing here persists anything:
//! message records are written by the REST surface on its own path, so a
//! message may be stored without being delivered live and vice versa.
//!
//! Delivery status updates are forwarded without checking the status value.
//! The REST status-update path validates it; this path does not.

use chatterbox_core::{encode_event, Frame, ServerEvent};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use super::registry::SessionRegistry;

/// Routes frames from one sender to their recipients' sessions.
#[derive(Debug, Clone)]
pub struct MessageRouter {
    registry: Arc<SessionRegistry>,
}

impl MessageRouter {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Dispatch `frame` sent by `sender_id`.
    ///
    /// `members` is the resolved member set for a group send and is ignored
    /// for every other frame. Returns how many sessions the event was queued
    /// for.
    pub fn dispatch(
        &self,
        sender_id: &str,
        frame: Frame,
        members: Option<&HashSet<String>>,
    ) -> usize {
        let kind = frame.kind();
        match frame {
            Frame::Typing {
                recipient_id,
                is_typing,
            } => self.send_to(
                &recipient_id,
                &ServerEvent::Typing {
                    user_id: sender_id.to_string(),
                    is_typing,
                },
                kind,
            ),

            Frame::DirectMessage {
                recipient_id,
                content,
                timestamp,
                message_id,
            } => self.send_to(
                &recipient_id,
                &ServerEvent::Message {
                    sender_id: sender_id.to_string(),
                    group_id: None,
                    content,
                    timestamp,
                    message_id,
                },
                kind,
            ),

            Frame::GroupMessage {
                group_id,
                content,
                timestamp,
            } => {
                let Some(members) = members else {
                    debug!(sender = %sender_id, group_id = %group_id, "group send without resolved members");
                    return 0;
                };
                let event = ServerEvent::Message {
                    sender_id: sender_id.to_string(),
                    group_id: Some(group_id.clone()),
                    content,
                    timestamp,
                    message_id: None,
                };
                self.fan_out(sender_id, &group_id, members, &event)
            }

            Frame::Signal {
                kind: signal_kind,
                recipient_id,
                payload,
            } => self.send_to(
                &recipient_id,
                &ServerEvent::signal(signal_kind, sender_id, payload),
                kind,
            ),

            Frame::CallEnd { recipient_id } => self.send_to(
                &recipient_id,
                &ServerEvent::CallEnd {
                    sender_id: sender_id.to_string(),
                },
                kind,
            ),

            Frame::Status {
                recipient_id,
                message_id,
                status,
            } => self.send_to(&recipient_id, &ServerEvent::Status { message_id, status }, kind),
        }
    }

    /// Deliver to a single recipient if it is online.
    fn send_to(&self, recipient_id: &str, event: &ServerEvent, kind: &str) -> usize {
        let Some(handle) = self.registry.lookup(recipient_id) else {
            debug!(recipient = %recipient_id, kind, "recipient offline, dropping");
            return 0;
        };
        let Some(text) = encode(event) else {
            return 0;
        };
        match handle.deliver(text) {
            Ok(()) => 1,
            Err(e) => {
                warn!(recipient = %recipient_id, kind, error = %e, "delivery failed");
                0
            }
        }
    }

    /// Deliver to every online member except the sender.
    fn fan_out(
        &self,
        sender_id: &str,
        group_id: &str,
        members: &HashSet<String>,
        event: &ServerEvent,
    ) -> usize {
        let Some(text) = encode(event) else {
            return 0;
        };

        let mut delivered = 0;
        for member in members.iter().filter(|m| m.as_str() != sender_id) {
            let Some(handle) = self.registry.lookup(member) else {
                continue;
            };
            match handle.deliver(text.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(group_id = %group_id, member = %member, error = %e, "group delivery failed");
                }
            }
        }

        debug!(
            sender = %sender_id,
            group_id = %group_id,
            members = members.len(),
            delivered,
            "group fan-out"
        );
        delivered
    }
}

fn encode(event: &ServerEvent) -> Option<Arc<str>> {
    match encode_event(event) {
        Ok(text) => Some(text.into()),
        Err(e) => {
            warn!(error = %e, "failed to encode event");
            None
        }
    }
}
