//! Presence broadcaster: tells every other live session when a user comes
//! online or goes offline.

use chatterbox_core::{encode_event, PresenceStatus, ServerEvent};
use std::sync::Arc;
use tracing::{debug, warn};

use super::registry::SessionRegistry;

/// Emits presence events to all registered sessions but the subject's own.
#[derive(Debug, Clone)]
pub struct PresenceBroadcaster {
    registry: Arc<SessionRegistry>,
}

impl PresenceBroadcaster {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Announce `status` for `user_id` to every other live session.
    ///
    /// Each recipient is attempted independently; a failed send is logged and
    /// skipped. Returns the number of sessions the event was queued for.
    pub fn broadcast(&self, user_id: &str, status: PresenceStatus) -> usize {
        let text: Arc<str> = match encode_event(&ServerEvent::presence(user_id, status)) {
            Ok(text) => text.into(),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "failed to encode presence event");
                return 0;
            }
        };

        let mut delivered = 0;
        for (peer, handle) in self.registry.sessions_except(user_id) {
            match handle.deliver(text.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(user_id = %user_id, peer = %peer, error = %e, "presence delivery failed");
                }
            }
        }

        debug!(user_id = %user_id, %status, delivered, "presence broadcast");
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::registry::{Outbound, SessionHandle};
    use chatterbox_core::decode_event;
    use tokio::sync::mpsc;

    fn register(registry: &SessionRegistry, user: &str, cap: usize) -> mpsc::Receiver<Outbound> {
        let (tx, rx) = mpsc::channel(cap);
        registry.register(user, SessionHandle::new(registry.next_conn_id(), tx));
        rx
    }

    fn next_event(rx: &mut mpsc::Receiver<Outbound>) -> Option<ServerEvent> {
        match rx.try_recv().ok()? {
            Outbound::Event(text) => Some(decode_event(&text).unwrap()),
            Outbound::Close(_) => None,
        }
    }

    #[test]
    fn everyone_but_subject_hears_once() {
        let registry = Arc::new(SessionRegistry::new());
        let mut alice = register(&registry, "alice", 8);
        let mut bob = register(&registry, "bob", 8);
        let mut carol = register(&registry, "carol", 8);

        let presence = PresenceBroadcaster::new(registry);
        assert_eq!(presence.broadcast("alice", PresenceStatus::Online), 2);

        let expected = ServerEvent::presence("alice", PresenceStatus::Online);
        assert_eq!(next_event(&mut bob), Some(expected.clone()));
        assert_eq!(next_event(&mut carol), Some(expected));
        assert!(next_event(&mut bob).is_none());
        assert!(next_event(&mut alice).is_none());
    }

    #[test]
    fn failed_recipient_does_not_block_others() {
        let registry = Arc::new(SessionRegistry::new());
        let _alice = register(&registry, "alice", 8);
        let mut full = register(&registry, "full", 1);
        let closed = register(&registry, "closed", 8);
        let mut dave = register(&registry, "dave", 8);
        drop(closed);

        let presence = PresenceBroadcaster::new(registry);
        // Fill the single slot so the next send fails.
        presence.broadcast("dave", PresenceStatus::Online);
        assert!(next_event(&mut dave).is_none());

        let delivered = presence.broadcast("alice", PresenceStatus::Offline);
        assert_eq!(delivered, 1);
        assert_eq!(
            next_event(&mut dave),
            Some(ServerEvent::presence("alice", PresenceStatus::Offline))
        );
        // Only the first event made it into the full queue.
        assert_eq!(
            next_event(&mut full),
            Some(ServerEvent::presence("dave", PresenceStatus::Online))
        );
        assert!(next_event(&mut full).is_none());
    }
}
