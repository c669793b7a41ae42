//! WebSocket listener using tokio-tungstenite.
//!
//! Clients connect to `/ws/<credential>`. The credential is pulled out of the
//! request path during the upgrade; any other path is refused with 404 before
//! the upgrade completes.

use chatterbox_core::{ChatError, ChatResult};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, WebSocketConfig};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn};

pub type WsStream = WebSocketStream<TcpStream>;
pub type WsSink = SplitSink<WsStream, Message>;
pub type WsSource = SplitStream<WsStream>;

/// Path prefix of the relay endpoint.
pub const ENDPOINT_PREFIX: &str = "/ws";

/// Maximum size of one inbound message (1 MiB).
const MAX_WS_MESSAGE_SIZE: usize = 1_048_576;

/// Upper bound on the HTTP upgrade.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// A handle to an accepted WebSocket connection.
pub struct WebSocketConnection {
    pub ws_stream: WsStream,
    pub remote_addr: SocketAddr,
    /// Credential taken from the request path; may be empty.
    pub credential: String,
}

/// Extract the credential from a request path.
///
/// `/ws/<credential>` yields the credential, `/ws` and `/ws/` yield an empty
/// one. Anything else is not the relay endpoint.
pub fn credential_from_path(path: &str) -> Option<&str> {
    let rest = path.strip_prefix(ENDPOINT_PREFIX)?;
    if rest.is_empty() {
        return Some("");
    }
    let credential = rest.strip_prefix('/')?;
    if credential.contains('/') {
        return None;
    }
    Some(credential)
}

fn not_found() -> ErrorResponse {
    let mut response = ErrorResponse::new(Some("not found".to_string()));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}

/// Upgrade one TCP stream, capturing the credential from the path.
async fn accept(stream: TcpStream, remote_addr: SocketAddr) -> ChatResult<WebSocketConnection> {
    let mut credential = None;
    let callback = |request: &Request, response: Response| {
        match credential_from_path(request.uri().path()) {
            Some(c) => {
                credential = Some(c.to_string());
                Ok(response)
            }
            None => {
                debug!(remote = %remote_addr, path = %request.uri().path(), "rejecting upgrade");
                Err(not_found())
            }
        }
    };

    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(MAX_WS_MESSAGE_SIZE);

    let ws_stream = tokio::time::timeout(
        HANDSHAKE_TIMEOUT,
        tokio_tungstenite::accept_hdr_async_with_config(stream, callback, Some(config)),
    )
    .await
    .map_err(|_| ChatError::Timeout)?
    .map_err(|e| ChatError::Transport(format!("WS handshake failed: {e}")))?;

    Ok(WebSocketConnection {
        ws_stream,
        remote_addr,
        credential: credential.unwrap_or_default(),
    })
}

/// Start accepting connections on an already bound listener.
///
/// Returns a receiver that yields upgraded connections and the accept task,
/// which the caller aborts to stop listening.
pub fn start_listener(
    tcp_listener: TcpListener,
) -> (mpsc::Receiver<WebSocketConnection>, JoinHandle<()>) {
    if let Ok(addr) = tcp_listener.local_addr() {
        info!(addr = %addr, "WebSocket listener started");
    }

    let (tx, rx) = mpsc::channel::<WebSocketConnection>(64);

    let task = tokio::spawn(async move {
        loop {
            match tcp_listener.accept().await {
                Ok((stream, addr)) => {
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        match accept(stream, addr).await {
                            Ok(conn) => {
                                debug!(remote = %addr, "WebSocket connection accepted");
                                if tx.send(conn).await.is_err() {
                                    warn!("WebSocket connection channel closed");
                                }
                            }
                            Err(e) => {
                                warn!(remote = %addr, error = %e, "WebSocket handshake failed");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "TCP accept failed");
                }
            }
        }
    });

    (rx, task)
}

/// Send a close frame. Errors are ignored; the peer may already be gone.
pub async fn close_with(sink: &mut WsSink, code: CloseCode, reason: &str) {
    let frame = CloseFrame {
        code,
        reason: reason.to_owned().into(),
    };
    if let Err(e) = sink.send(Message::Close(Some(frame))).await {
        debug!(error = %e, "close frame not sent");
    }
    let _ = sink.close().await;
}

/// Send one text message.
pub async fn ws_send_text(sink: &mut WsSink, text: &str) -> ChatResult<()> {
    sink.send(Message::Text(text.to_owned()))
        .await
        .map_err(|e| ChatError::Transport(format!("WS send failed: {e}")))
}

/// Receive the next text payload.
///
/// Returns `None` once the peer has closed. Binary messages are accepted if
/// they hold UTF-8; anything else is an invalid frame.
pub async fn ws_recv_text(source: &mut WsSource) -> ChatResult<Option<String>> {
    loop {
        match source.next().await {
            Some(Ok(Message::Text(text))) => return Ok(Some(text)),
            Some(Ok(Message::Binary(data))) => {
                return String::from_utf8(data)
                    .map(Some)
                    .map_err(|_| ChatError::InvalidFrame("binary message is not UTF-8".into()));
            }
            Some(Ok(Message::Close(_))) => return Ok(None),
            // Pongs to pings are queued by tungstenite itself.
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                return Err(ChatError::Transport(format!("WS recv failed: {e}")));
            }
            None => return Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_after_prefix() {
        assert_eq!(credential_from_path("/ws/abc.def.ghi"), Some("abc.def.ghi"));
    }

    #[test]
    fn bare_endpoint_has_empty_credential() {
        assert_eq!(credential_from_path("/ws"), Some(""));
        assert_eq!(credential_from_path("/ws/"), Some(""));
    }

    #[test]
    fn other_paths_rejected() {
        assert_eq!(credential_from_path("/"), None);
        assert_eq!(credential_from_path("/api/messages"), None);
        assert_eq!(credential_from_path("/wsx/token"), None);
        assert_eq!(credential_from_path("/ws/a/b"), None);
    }

    #[test]
    fn not_found_response() {
        assert_eq!(not_found().status(), StatusCode::NOT_FOUND);
    }
}
