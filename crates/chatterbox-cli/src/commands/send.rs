//! `chatterbox send <credential> <recipient> <text>` — one-off direct message.

use anyhow::{Context, Result};
use chatterbox_client::ChatClient;
use chatterbox_core::Frame;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

pub async fn run(server: &str, credential: &str, recipient: &str, text: &str) -> Result<()> {
    let mut client = ChatClient::connect(server, credential)
        .await
        .with_context(|| format!("failed to connect to {server}"))?;

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();

    client
        .send(&Frame::DirectMessage {
            recipient_id: recipient.to_string(),
            content: text.to_string(),
            timestamp: Some(serde_json::json!(timestamp)),
            message_id: None,
        })
        .await
        .context("failed to send message")?;
    debug!(recipient, "message sent");

    client.close().await?;
    Ok(())
}
