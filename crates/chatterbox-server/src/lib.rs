//! chatterbox-server: the ChatterBox real-time relay.
//!
//! Authenticates WebSocket clients, tracks who is online, and relays chat,
//! typing, delivery status and call signaling between live sessions.

pub mod auth;
pub mod config;
pub mod connection;
pub mod groups;
pub mod relay;
pub mod server;
pub mod transport;

pub use auth::{AuthVerifier, Identity, JwtVerifier};
pub use config::{Overrides, ServerConfig};
pub use groups::{GroupDirectory, GroupResolver};
pub use relay::{MessageRouter, PresenceBroadcaster, Relay, SessionRegistry};
pub use server::{ChatServer, ShutdownHandle};
