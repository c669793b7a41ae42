//! Credential verification and handshake throttling.

pub mod rate_limit;

pub use rate_limit::RateLimiter;

use chatterbox_core::{verify_token, ChatError, ChatResult};
use tracing::debug;

/// The authenticated identity behind a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Opaque user id; the registry key.
    pub user_id: String,
    pub username: Option<String>,
}

/// Turns a bearer credential into an identity.
pub trait AuthVerifier: Send + Sync {
    fn verify(&self, credential: &str) -> ChatResult<Identity>;
}

/// Verifies HS256 tokens signed with the shared secret.
pub struct JwtVerifier {
    secret: Vec<u8>,
    leeway_secs: u64,
}

impl JwtVerifier {
    pub fn new(secret: impl Into<Vec<u8>>, leeway_secs: u64) -> Self {
        Self {
            secret: secret.into(),
            leeway_secs,
        }
    }
}

impl AuthVerifier for JwtVerifier {
    fn verify(&self, credential: &str) -> ChatResult<Identity> {
        if credential.is_empty() {
            return Err(ChatError::AuthFailed("missing credential".into()));
        }

        let claims = verify_token(&self.secret, credential, self.leeway_secs).map_err(|e| {
            debug!(error = %e, "credential rejected");
            ChatError::AuthFailed(e.to_string())
        })?;

        Ok(Identity {
            user_id: claims.sub,
            username: claims.username,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatterbox_core::create_token;

    #[test]
    fn valid_token_yields_subject() {
        let verifier = JwtVerifier::new(b"s3cret".to_vec(), 0);
        let token = create_token(b"s3cret", "64f0c0ffee", Some("alice"), 60).unwrap();
        let identity = verifier.verify(&token).unwrap();
        assert_eq!(identity.user_id, "64f0c0ffee");
        assert_eq!(identity.username.as_deref(), Some("alice"));
    }

    #[test]
    fn missing_and_forged_credentials_fail() {
        let verifier = JwtVerifier::new(b"s3cret".to_vec(), 0);
        assert!(matches!(verifier.verify(""), Err(ChatError::AuthFailed(_))));

        let forged = create_token(b"other", "alice", None, 60).unwrap();
        assert!(matches!(verifier.verify(&forged), Err(ChatError::AuthFailed(_))));
    }
}
