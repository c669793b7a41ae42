//! The real-time relay: session registry, presence and routing.

pub mod presence;
pub mod registry;
pub mod router;

pub use presence::PresenceBroadcaster;
pub use registry::{
    CloseReason, ConnId, DeliveryError, Outbound, SessionHandle, SessionRegistry,
};
pub use router::MessageRouter;

use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// The registry plus the two components that read it, built once at startup
/// and shared by every connection task.
#[derive(Debug, Clone)]
pub struct Relay {
    registry: Arc<SessionRegistry>,
    presence: PresenceBroadcaster,
    router: MessageRouter,
    /// Serializes registry change + presence announcement pairs.
    transitions: Arc<Mutex<()>>,
}

impl Default for Relay {
    fn default() -> Self {
        Self::new()
    }
}

impl Relay {
    pub fn new() -> Self {
        let registry = Arc::new(SessionRegistry::new());
        Self {
            presence: PresenceBroadcaster::new(registry.clone()),
            router: MessageRouter::new(registry.clone()),
            registry,
            transitions: Arc::new(Mutex::new(())),
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn presence(&self) -> &PresenceBroadcaster {
        &self.presence
    }

    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    /// Hold while registering or releasing a session and announcing it, so
    /// watchers see a user's presence events in registry order.
    pub fn presence_transition(&self) -> MutexGuard<'_, ()> {
        self.transitions.lock()
    }
}
