//! Connection lifecycle: CONNECTING -> ACTIVE -> CLOSED.
//!
//! One task per connection. Frames from a connection are handled strictly
//! in arrival order; the only thing other tasks can do to a connection is
//! enqueue on its outbound channel.

use chatterbox_core::{decode_frame, ChatError, Frame, PresenceStatus};
use futures_util::StreamExt;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, info, warn};

use crate::auth::Identity;
use crate::relay::{CloseReason, ConnId, Outbound, Relay, SessionHandle};
use crate::server::ServerState;
use crate::transport::websocket::{close_with, ws_recv_text, ws_send_text, WebSocketConnection};

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Active,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::Closed => "closed",
        })
    }
}

/// Why a connection task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Refused before activation (rate limit or bad credential).
    Rejected,
    ClientClosed,
    /// The client sent a frame that is not a JSON object.
    ProtocolError,
    TransportError,
    /// A newer connection took over this identity.
    Superseded,
    Shutdown,
}

/// Registry membership of an active connection.
///
/// Opening registers the session and announces the user online. Dropping
/// releases the entry and announces the user offline, on every exit path
/// including task cancellation. A superseded connection no longer owns the
/// entry, so its drop is silent.
pub struct ActiveSession {
    relay: Relay,
    user_id: String,
    conn_id: ConnId,
}

impl ActiveSession {
    pub fn open(relay: &Relay, user_id: &str, tx: mpsc::Sender<Outbound>) -> Self {
        let registry = relay.registry();
        let conn_id = registry.next_conn_id();

        let _transition = relay.presence_transition();
        if let Some(previous) = registry.register(user_id, SessionHandle::new(conn_id, tx)) {
            // If the close cannot be queued, dropping the last sender still
            // ends the old connection once it drains its queue.
            if let Err(e) = previous.close(CloseReason::Superseded) {
                debug!(user_id = %user_id, conn_id = previous.conn_id(), error = %e, "supersede notice not queued");
            }
        }
        relay.presence().broadcast(user_id, PresenceStatus::Online);

        Self {
            relay: relay.clone(),
            user_id: user_id.to_string(),
            conn_id,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn conn_id(&self) -> ConnId {
        self.conn_id
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        // A reconnect waits here until the offline event is queued, so it can
        // never be overtaken by this connection's announcement.
        let _transition = self.relay.presence_transition();
        if self.relay.registry().release(&self.user_id, self.conn_id) {
            self.relay
                .presence()
                .broadcast(&self.user_id, PresenceStatus::Offline);
        }
    }
}

/// Drive one accepted connection to completion.
pub async fn handle_connection(
    state: Arc<ServerState>,
    conn: WebSocketConnection,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> ExitReason {
    let remote = conn.remote_addr;
    let (mut sink, mut source) = conn.ws_stream.split();
    debug!(remote = %remote, state = %ConnectionState::Connecting, "connection opened");

    let allowed = state.limiter.lock().check_and_record(remote.ip());
    if !allowed {
        warn!(remote = %remote, "handshake rate limit exceeded");
        close_with(&mut sink, CloseCode::Policy, "rate limited").await;
        return ExitReason::Rejected;
    }

    let identity = match state.verifier.verify(&conn.credential) {
        Ok(identity) => identity,
        Err(e) => {
            info!(remote = %remote, error = %e, "authentication failed");
            close_with(&mut sink, CloseCode::Policy, "authentication failed").await;
            return ExitReason::Rejected;
        }
    };

    let (tx, mut rx) = mpsc::channel::<Outbound>(state.outbound_buffer);
    let session = ActiveSession::open(&state.relay, &identity.user_id, tx);
    info!(
        remote = %remote,
        user_id = %identity.user_id,
        username = identity.username.as_deref().unwrap_or(""),
        conn_id = session.conn_id(),
        state = %ConnectionState::Active,
        "session active"
    );

    let reason = loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                close_with(&mut sink, CloseCode::Away, "server shutting down").await;
                break ExitReason::Shutdown;
            }

            outbound = rx.recv() => match outbound {
                Some(Outbound::Event(text)) => {
                    if let Err(e) = ws_send_text(&mut sink, &text).await {
                        debug!(user_id = %identity.user_id, error = %e, "outbound send failed");
                        break ExitReason::TransportError;
                    }
                }
                Some(Outbound::Close(CloseReason::Superseded)) | None => {
                    close_with(&mut sink, CloseCode::Normal, "session superseded").await;
                    break ExitReason::Superseded;
                }
            },

            inbound = ws_recv_text(&mut source) => match inbound {
                Ok(Some(text)) => {
                    if let Err(e) = handle_text(&state, &identity, &text).await {
                        warn!(user_id = %identity.user_id, error = %e, "protocol error");
                        close_with(&mut sink, CloseCode::Invalid, "malformed frame").await;
                        break ExitReason::ProtocolError;
                    }
                }
                Ok(None) => break ExitReason::ClientClosed,
                Err(ChatError::InvalidFrame(e)) => {
                    warn!(user_id = %identity.user_id, error = %e, "protocol error");
                    close_with(&mut sink, CloseCode::Invalid, "malformed frame").await;
                    break ExitReason::ProtocolError;
                }
                Err(e) => {
                    debug!(user_id = %identity.user_id, error = %e, "transport error");
                    break ExitReason::TransportError;
                }
            },
        }
    };

    drop(session);
    info!(
        remote = %remote,
        user_id = %identity.user_id,
        ?reason,
        state = %ConnectionState::Closed,
        "session closed"
    );
    reason
}

/// Decode and route one inbound text frame.
///
/// Only a frame that is not a JSON object is an error; everything the relay
/// does not act on is discarded here.
async fn handle_text(state: &ServerState, identity: &Identity, text: &str) -> Result<(), ChatError> {
    let Some(frame) = decode_frame(text)? else {
        debug!(user_id = %identity.user_id, "discarding unrecognized frame");
        return Ok(());
    };

    let members = match &frame {
        Frame::GroupMessage { group_id, .. } => {
            let members = state.groups.members_of(group_id).await;
            if state.require_group_membership && !members.contains(&identity.user_id) {
                debug!(user_id = %identity.user_id, group_id = %group_id, "sender is not a group member");
                return Ok(());
            }
            Some(members)
        }
        _ => None,
    };

    state
        .relay
        .router()
        .dispatch(&identity.user_id, frame, members.as_ref());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatterbox_core::{decode_event, ServerEvent};

    fn next_event(rx: &mut mpsc::Receiver<Outbound>) -> Option<ServerEvent> {
        match rx.try_recv().ok()? {
            Outbound::Event(text) => Some(decode_event(&text).unwrap()),
            Outbound::Close(_) => None,
        }
    }

    #[test]
    fn open_and_drop_announce_presence() {
        let relay = Relay::new();
        let (watcher_tx, mut watcher_rx) = mpsc::channel(8);
        let watcher = ActiveSession::open(&relay, "watcher", watcher_tx);

        let (tx, _rx) = mpsc::channel(8);
        let session = ActiveSession::open(&relay, "alice", tx);
        assert_eq!(session.user_id(), "alice");
        assert_eq!(relay.registry().count(), 2);
        assert_eq!(
            next_event(&mut watcher_rx),
            Some(ServerEvent::presence("alice", PresenceStatus::Online))
        );

        drop(session);
        assert!(relay.registry().lookup("alice").is_none());
        assert_eq!(
            next_event(&mut watcher_rx),
            Some(ServerEvent::presence("alice", PresenceStatus::Offline))
        );
        assert!(watcher_rx.try_recv().is_err());
        drop(watcher);
    }

    #[test]
    fn superseded_session_is_closed_and_drops_silently() {
        let relay = Relay::new();
        let (watcher_tx, mut watcher_rx) = mpsc::channel(8);
        let _watcher = ActiveSession::open(&relay, "watcher", watcher_tx);

        let (old_tx, mut old_rx) = mpsc::channel(8);
        let old = ActiveSession::open(&relay, "alice", old_tx);
        let (new_tx, _new_rx) = mpsc::channel(8);
        let new = ActiveSession::open(&relay, "alice", new_tx);

        assert!(matches!(
            old_rx.try_recv(),
            Ok(Outbound::Close(CloseReason::Superseded))
        ));

        // online (old), online (new)
        assert!(next_event(&mut watcher_rx).is_some());
        assert!(next_event(&mut watcher_rx).is_some());

        drop(old);
        assert_eq!(
            relay.registry().lookup("alice").unwrap().conn_id(),
            new.conn_id()
        );
        assert!(watcher_rx.try_recv().is_err());

        drop(new);
        assert_eq!(
            next_event(&mut watcher_rx),
            Some(ServerEvent::presence("alice", PresenceStatus::Offline))
        );
    }

    #[test]
    fn reconnect_racing_a_drop_leaves_watchers_consistent() {
        for _ in 0..200 {
            let relay = Relay::new();
            let (watcher_tx, mut watcher_rx) = mpsc::channel(16);
            let _watcher = ActiveSession::open(&relay, "watcher", watcher_tx);

            let (old_tx, _old_rx) = mpsc::channel(8);
            let old = ActiveSession::open(&relay, "alice", old_tx);
            let (new_tx, _new_rx) = mpsc::channel(8);

            let dropper = std::thread::spawn(move || drop(old));
            let opener = {
                let relay = relay.clone();
                std::thread::spawn(move || ActiveSession::open(&relay, "alice", new_tx))
            };
            dropper.join().unwrap();
            let new = opener.join().unwrap();

            let mut last = None;
            while let Some(event) = next_event(&mut watcher_rx) {
                last = Some(event);
            }
            assert!(relay.registry().lookup("alice").is_some());
            assert_eq!(
                last,
                Some(ServerEvent::presence("alice", PresenceStatus::Online))
            );
            drop(new);
        }
    }

    #[test]
    fn state_names() {
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
        assert_eq!(ConnectionState::Closed.to_string(), "closed");
    }
}
