//! Transport seam between the connection manager and the wire.
//!
//! The manager only talks to a [`Connector`] and the [`Socket`]s it returns.
//! [`WsConnector`] is the production WebSocket implementation on top of
//! `tokio-tungstenite`.

use std::future::Future;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::endpoint::Endpoint;
use crate::error::NetError;

/// Close code for a normal, intentional close.
pub const CLOSE_NORMAL: u16 = 1000;

/// Close code for a connection lost without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// How a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// Close code.
    pub code: u16,
    /// Close reason, possibly empty.
    pub reason: String,
}

impl CloseInfo {
    /// A normal close (code 1000).
    pub fn normal() -> Self {
        Self {
            code: CLOSE_NORMAL,
            reason: String::new(),
        }
    }

    /// An abnormal close (code 1006) with the given reason.
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self {
            code: CLOSE_ABNORMAL,
            reason: reason.into(),
        }
    }

    /// Only code 1000 counts as clean.
    pub fn is_clean(&self) -> bool {
        self.code == CLOSE_NORMAL
    }
}

/// Something read from a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// A text frame.
    Text(String),
    /// A transport error. A [`SocketEvent::Closed`] follows.
    Error(String),
    /// The connection is gone; no further events follow.
    Closed(CloseInfo),
}

/// Opens sockets to endpoints.
pub trait Connector: Send + Sync + 'static {
    /// Socket type produced by a successful handshake.
    type Socket: Socket;

    /// Perform the handshake with `endpoint`.
    fn connect(
        &self,
        endpoint: &Endpoint,
    ) -> impl Future<Output = Result<Self::Socket, NetError>> + Send;
}

/// An open bidirectional text connection.
pub trait Socket: Send + 'static {
    /// Write one text frame.
    fn send_text(&mut self, text: String) -> impl Future<Output = Result<(), NetError>> + Send;

    /// Wait for the next event. Must be cancel-safe: dropping the future
    /// before it completes loses nothing.
    fn recv(&mut self) -> impl Future<Output = SocketEvent> + Send;

    /// Close with `code`. Idempotent.
    fn close(&mut self, code: u16) -> impl Future<Output = ()> + Send;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket connector backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    type Socket = WsSocket;

    async fn connect(&self, endpoint: &Endpoint) -> Result<WsSocket, NetError> {
        let url = endpoint.url();
        let (stream, _response) =
            connect_async(url.as_str())
                .await
                .map_err(|e| NetError::HandshakeRefused {
                    endpoint: url.clone(),
                    reason: e.to_string(),
                })?;
        tracing::debug!(endpoint = %url, "WebSocket handshake complete");
        Ok(WsSocket {
            stream,
            pending_close: None,
            closed: false,
        })
    }
}

/// A live WebSocket connection.
pub struct WsSocket {
    stream: WsStream,
    /// Close reported on the call after a transport error.
    pending_close: Option<CloseInfo>,
    closed: bool,
}

impl Socket for WsSocket {
    async fn send_text(&mut self, text: String) -> Result<(), NetError> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| NetError::Transport {
                reason: e.to_string(),
            })
    }

    async fn recv(&mut self) -> SocketEvent {
        if let Some(info) = self.pending_close.take() {
            return SocketEvent::Closed(info);
        }
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return SocketEvent::Text(text.as_str().to_owned()),
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return SocketEvent::Text(text),
                    Err(_) => tracing::warn!("Ignoring non-UTF-8 binary frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    let info = frame
                        .map(|f| CloseInfo {
                            code: u16::from(f.code),
                            reason: f.reason.as_str().to_owned(),
                        })
                        .unwrap_or_else(|| CloseInfo {
                            code: u16::from(CloseCode::Status),
                            reason: String::new(),
                        });
                    return SocketEvent::Closed(info);
                }
                // Ping/pong are answered by tungstenite itself.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let reason = e.to_string();
                    self.pending_close = Some(CloseInfo::abnormal(reason.clone()));
                    return SocketEvent::Error(reason);
                }
                None => return SocketEvent::Closed(CloseInfo::abnormal("stream ended")),
            }
        }
    }

    async fn close(&mut self, code: u16) {
        if self.closed {
            return;
        }
        self.closed = true;
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: Utf8Bytes::from_static("client closing"),
        };
        if let Err(e) = self.stream.close(Some(frame)).await {
            tracing::debug!("Close handshake failed: {e}");
        }
    }
}
