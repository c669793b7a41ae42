//! Bearer credentials for the real-time endpoint.
//!
//! Credentials are HS256 JSON Web Tokens carrying the user id in `sub`, the
//! same tokens the REST surface hands out at sign-in.

use jsonwebtoken::{
    decode, encode, get_current_timestamp, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

use crate::error::{ChatError, ChatResult};

/// Token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Expiry, seconds since the Unix epoch.
    pub exp: u64,
}

/// Sign arbitrary claims with the shared secret.
pub fn sign_claims(secret: &[u8], claims: &Claims) -> ChatResult<String> {
    let token = encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret),
    )?;
    Ok(token)
}

/// Create a credential for `subject` that expires `ttl_secs` from now.
pub fn create_token(
    secret: &[u8],
    subject: &str,
    username: Option<&str>,
    ttl_secs: u64,
) -> ChatResult<String> {
    let claims = Claims {
        sub: subject.to_string(),
        username: username.map(str::to_string),
        exp: get_current_timestamp().saturating_add(ttl_secs),
    };
    sign_claims(secret, &claims)
}

/// Verify a credential's signature and expiry and return its claims.
pub fn verify_token(secret: &[u8], token: &str, leeway_secs: u64) -> ChatResult<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = leeway_secs;
    validation.set_required_spec_claims(&["exp", "sub"]);

    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)?;
    if data.claims.sub.is_empty() {
        return Err(ChatError::Token("empty subject".into()));
    }
    Ok(data.claims)
}
