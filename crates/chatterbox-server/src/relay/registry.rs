//! Session registry: the single source of truth for who is reachable.
//!
//! Maps a user id to the outbound handle of its live connection. Every
//! connection task registers itself here on entering the active state and
//! releases its entry on exit; routers and the presence broadcaster only
//! read from it.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info};

/// Server-assigned id distinguishing successive connections of one user.
pub type ConnId = u64;

/// Work queued for a connection task by other tasks.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// Serialized event text to write to the socket.
    Event(Arc<str>),
    /// Close the socket and end the session.
    Close(CloseReason),
}

/// Why another task asked a connection to close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// A newer connection registered for the same user.
    Superseded,
}

/// A per-recipient delivery failure. Never surfaced to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The recipient's outbound queue is full.
    Full,
    /// The recipient's connection task has gone away.
    Closed,
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => f.write_str("outbound queue full"),
            Self::Closed => f.write_str("connection closed"),
        }
    }
}

impl<T> From<TrySendError<T>> for DeliveryError {
    fn from(e: TrySendError<T>) -> Self {
        match e {
            TrySendError::Full(_) => Self::Full,
            TrySendError::Closed(_) => Self::Closed,
        }
    }
}

/// Handle to a live connection's outbound queue.
///
/// Only the owning connection task writes to the socket; everyone else
/// enqueues through this handle without blocking.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    conn_id: ConnId,
    tx: mpsc::Sender<Outbound>,
}

impl SessionHandle {
    pub fn new(conn_id: ConnId, tx: mpsc::Sender<Outbound>) -> Self {
        Self { conn_id, tx }
    }

    pub fn conn_id(&self) -> ConnId {
        self.conn_id
    }

    /// Queue an event for this connection.
    pub fn deliver(&self, text: Arc<str>) -> Result<(), DeliveryError> {
        self.tx.try_send(Outbound::Event(text))?;
        Ok(())
    }

    /// Ask this connection to close.
    pub fn close(&self, reason: CloseReason) -> Result<(), DeliveryError> {
        self.tx.try_send(Outbound::Close(reason))?;
        Ok(())
    }
}

/// Registry of live sessions, keyed by user id.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    /// Monotonic connection id counter.
    next_conn_id: AtomicU64,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            next_conn_id: AtomicU64::new(1),
        }
    }

    /// Allocate a fresh connection id.
    pub fn next_conn_id(&self) -> ConnId {
        self.next_conn_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Register `handle` for `user_id`, replacing any existing entry.
    ///
    /// Returns the replaced handle so the caller can close it.
    pub fn register(&self, user_id: &str, handle: SessionHandle) -> Option<SessionHandle> {
        let conn_id = handle.conn_id;
        let previous = self.sessions.write().insert(user_id.to_string(), handle);
        info!(
            user_id = %user_id,
            conn_id,
            replaced = ?previous.as_ref().map(SessionHandle::conn_id),
            "session registered"
        );
        previous
    }

    /// Remove whatever entry `user_id` has. Idempotent.
    pub fn deregister(&self, user_id: &str) -> Option<SessionHandle> {
        let removed = self.sessions.write().remove(user_id);
        if removed.is_some() {
            debug!(user_id = %user_id, "session deregistered");
        }
        removed
    }

    /// Remove the entry for `user_id` only if it still belongs to `conn_id`.
    ///
    /// Returns `true` if an entry was removed. A connection that was
    /// superseded gets `false` and must leave the newer entry alone.
    pub fn release(&self, user_id: &str, conn_id: ConnId) -> bool {
        let mut sessions = self.sessions.write();
        match sessions.get(user_id) {
            Some(handle) if handle.conn_id == conn_id => {
                sessions.remove(user_id);
                debug!(user_id = %user_id, conn_id, "session released");
                true
            }
            _ => false,
        }
    }

    /// Look up the live handle for `user_id`.
    pub fn lookup(&self, user_id: &str) -> Option<SessionHandle> {
        self.sessions.read().get(user_id).cloned()
    }

    /// Snapshot every session except `user_id`'s own.
    pub fn sessions_except(&self, user_id: &str) -> Vec<(String, SessionHandle)> {
        self.sessions
            .read()
            .iter()
            .filter(|(uid, _)| uid.as_str() != user_id)
            .map(|(uid, handle)| (uid.clone(), handle.clone()))
            .collect()
    }

    /// Number of live sessions.
    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }
}
