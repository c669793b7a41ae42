//! WebSocket client: a writer half owned by [`ChatClient`] and a reader task
//! that decodes server events into a channel.

use chatterbox_core::{decode_event, encode_frame, ChatError, ChatResult, Frame, ServerEvent};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

type Stream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Something the server told us.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Event(ServerEvent),
    /// The connection ended. `code` is the close code, if the server sent one.
    Closed { code: Option<u16>, reason: String },
}

/// Build the relay URL for `credential` under `base` (e.g. `ws://host:8000`).
pub fn endpoint_url(base: &str, credential: &str) -> String {
    let base = base.trim_end_matches('/');
    let base = base.strip_suffix("/ws").unwrap_or(base);
    format!("{base}/ws/{credential}")
}

/// A connected relay client.
pub struct ChatClient {
    sink: SplitSink<Stream, Message>,
    events: mpsc::Receiver<ClientEvent>,
    reader: JoinHandle<()>,
}

impl ChatClient {
    /// Connect to the relay at `base` with a bearer credential.
    pub async fn connect(base: &str, credential: &str) -> ChatResult<Self> {
        let url = endpoint_url(base, credential);
        let (ws, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| ChatError::Transport(format!("WS connect failed: {e}")))?;
        debug!(base = %base, "connected");

        let (sink, source) = ws.split();
        let (tx, events) = mpsc::channel(256);
        let reader = tokio::spawn(read_loop(source, tx));

        Ok(Self {
            sink,
            events,
            reader,
        })
    }

    /// Send a typed frame.
    pub async fn send(&mut self, frame: &Frame) -> ChatResult<()> {
        let text = encode_frame(frame)?;
        self.send_raw(&text).await
    }

    /// Send arbitrary text as-is.
    pub async fn send_raw(&mut self, text: &str) -> ChatResult<()> {
        self.sink
            .send(Message::Text(text.to_owned()))
            .await
            .map_err(|e| ChatError::Transport(format!("WS send failed: {e}")))
    }

    /// Next event from the server; `None` after the connection has closed
    /// and every event has been read.
    pub async fn next_event(&mut self) -> Option<ClientEvent> {
        self.events.recv().await
    }

    /// Close the connection.
    pub async fn close(mut self) -> ChatResult<()> {
        let result = self
            .sink
            .send(Message::Close(None))
            .await
            .map_err(|e| ChatError::Transport(format!("WS close failed: {e}")));
        let _ = self.sink.close().await;
        result
    }
}

impl Drop for ChatClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_loop(mut source: SplitStream<Stream>, tx: mpsc::Sender<ClientEvent>) {
    let closed = loop {
        match source.next().await {
            Some(Ok(Message::Text(text))) => match decode_event(&text) {
                Ok(event) => {
                    if tx.send(ClientEvent::Event(event)).await.is_err() {
                        return;
                    }
                }
                Err(e) => warn!(error = %e, "undecodable server event"),
            },
            Some(Ok(Message::Close(frame))) => break closed_event(frame),
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                break ClientEvent::Closed {
                    code: None,
                    reason: e.to_string(),
                }
            }
            None => {
                break ClientEvent::Closed {
                    code: None,
                    reason: String::new(),
                }
            }
        }
    };
    let _ = tx.send(closed).await;
}

fn closed_event(frame: Option<CloseFrame<'_>>) -> ClientEvent {
    match frame {
        Some(frame) => ClientEvent::Closed {
            code: Some(u16::from(frame.code)),
            reason: frame.reason.into_owned(),
        },
        None => ClientEvent::Closed {
            code: None,
            reason: String::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

    #[test]
    fn endpoint_url_variants() {
        assert_eq!(endpoint_url("ws://h:8000", "tok"), "ws://h:8000/ws/tok");
        assert_eq!(endpoint_url("ws://h:8000/", "tok"), "ws://h:8000/ws/tok");
        assert_eq!(endpoint_url("ws://h:8000/ws", "tok"), "ws://h:8000/ws/tok");
    }

    #[test]
    fn close_frame_maps_code() {
        let event = closed_event(Some(CloseFrame {
            code: CloseCode::Policy,
            reason: "authentication failed".into(),
        }));
        assert_eq!(
            event,
            ClientEvent::Closed {
                code: Some(1008),
                reason: "authentication failed".into()
            }
        );
        assert_eq!(
            closed_event(None),
            ClientEvent::Closed {
                code: None,
                reason: String::new()
            }
        );
    }
}
