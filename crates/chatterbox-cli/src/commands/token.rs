//! `chatterbox token <subject>` — mint a credential for local testing.

use anyhow::{Context, Result};
use tracing::info;

/// Sign a credential for `subject` and print it.
pub fn run(secret: &str, subject: &str, username: Option<&str>, ttl_secs: u64) -> Result<()> {
    if subject.is_empty() {
        anyhow::bail!("subject must not be empty");
    }
    let token = chatterbox_core::create_token(secret.as_bytes(), subject, username, ttl_secs)
        .context("failed to sign credential")?;

    info!(subject, ttl_secs, "credential issued");
    println!("{token}");
    Ok(())
}
