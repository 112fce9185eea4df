//! # Session Socket
//!
//! Owns one physical WebSocket connection to a space-scoped endpoint and
//! translates transport frames into protocol events. This layer knows
//! nothing about sessions or state machines; it only connects, sends,
//! receives, and closes.

use crate::client::error::ClientError;
use crate::shared::WireMessage;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// One event observed on the socket.
#[derive(Debug)]
pub enum SocketEvent {
    /// A decoded protocol frame.
    Frame(WireMessage),
    /// Text that was not a recognized frame; logged and dropped upstream.
    Malformed { detail: String },
    /// The transport closed. `code` is `None` when the peer vanished
    /// without a close handshake (treated as abnormal).
    Closed { code: Option<u16>, reason: String },
}

/// A live duplex connection to a space endpoint.
pub struct SessionSocket {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl SessionSocket {
    /// Open the transport. The caller wraps this in its own timeout.
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        tracing::debug!("[Socket] Connecting to {}", url);
        let (stream, _response) = connect_async(url)
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(Self { stream })
    }

    /// Encode and send one frame.
    pub async fn send(&mut self, frame: &WireMessage) -> Result<(), ClientError> {
        let text = frame
            .encode()
            .map_err(|e| ClientError::Serialization(e.to_string()))?;
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))
    }

    /// Wait for the next protocol-relevant event. Returns `None` once the
    /// stream is fully drained after a close.
    pub async fn next_event(&mut self) -> Option<SocketEvent> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Some(match WireMessage::decode(&text) {
                        Ok(frame) => SocketEvent::Frame(frame),
                        Err(e) => SocketEvent::Malformed {
                            detail: e.to_string(),
                        },
                    });
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = match frame {
                        Some(f) => (Some(u16::from(f.code)), f.reason.to_string()),
                        None => (None, String::new()),
                    };
                    return Some(SocketEvent::Closed { code, reason });
                }
                Some(Ok(Message::Binary(_))) => {
                    return Some(SocketEvent::Malformed {
                        detail: "unexpected binary frame".to_string(),
                    });
                }
                // Transport-level ping/pong is handled by tungstenite;
                // the protocol keepalive rides in text frames.
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return Some(SocketEvent::Closed {
                        code: None,
                        reason: e.to_string(),
                    });
                }
                None => return None,
            }
        }
    }

    /// Close the transport with a specific close code. Best effort; errors
    /// here mean the peer is already gone.
    pub async fn close(&mut self, code: u16) {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: "".into(),
        };
        if let Err(e) = self.stream.close(Some(frame)).await {
            tracing::debug!("[Socket] Close handshake failed: {}", e);
        }
    }
}
