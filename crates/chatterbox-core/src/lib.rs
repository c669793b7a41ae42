//! chatterbox-core: Shared protocol library for the ChatterBox relay.
//!
//! Provides the typed inbound [`Frame`], the outbound [`ServerEvent`], the
//! JSON codec that validates frames at the protocol boundary, and the bearer
//! credential helpers shared by the server and the CLI.

pub mod codec;
pub mod error;
pub mod event;
pub mod frame;
pub mod token;

// Re-export commonly used items at crate root.
pub use codec::{decode_event, decode_frame, encode_event, encode_frame};
pub use error::{ChatError, ChatResult};
pub use event::{PresenceStatus, ServerEvent};
pub use frame::{Frame, SignalKind};
pub use token::{create_token, sign_claims, verify_token, Claims};
