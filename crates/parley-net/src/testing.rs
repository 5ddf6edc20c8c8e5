//! In-memory transport for tests.
//!
//! [`MockConnector`] decides each handshake from a per-URL script, and every
//! accepted connection yields a [`MockPeer`] through which a test plays the
//! server: pushing frames, closing with a code, and reading what the client
//! wrote. Live socket counts are tracked so tests can assert that a client
//! never holds two connections at once.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::mpsc;

use crate::endpoint::Endpoint;
use crate::error::NetError;
use crate::transport::{CloseInfo, Connector, Socket, SocketEvent};

/// Outcome of a scripted handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handshake {
    /// Accept the connection.
    Accept,
    /// Fail immediately with [`NetError::HandshakeRefused`].
    Refuse,
    /// Never complete; only a timeout ends the attempt.
    Hang,
}

#[derive(Default)]
struct LiveCounter {
    live: AtomicUsize,
    peak: AtomicUsize,
}

impl LiveCounter {
    fn opened(&self) {
        let now = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn closed(&self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

struct MockState {
    default: Handshake,
    behaviors: HashMap<String, Handshake>,
    scripts: HashMap<String, VecDeque<Handshake>>,
    attempts: Vec<String>,
    peers: Vec<MockPeer>,
    stall_close: bool,
}

impl MockState {
    fn decide(&mut self, url: &str) -> Handshake {
        if let Some(next) = self.scripts.get_mut(url).and_then(VecDeque::pop_front) {
            return next;
        }
        self.behaviors.get(url).copied().unwrap_or(self.default)
    }
}

/// Scriptable in-memory [`Connector`]. Clones share state.
#[derive(Clone)]
pub struct MockConnector {
    state: Arc<Mutex<MockState>>,
    counter: Arc<LiveCounter>,
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnector {
    /// Connector that accepts every handshake.
    pub fn new() -> Self {
        Self::with_default(Handshake::Accept)
    }

    /// Connector whose unscripted handshakes resolve as `default`.
    pub fn with_default(default: Handshake) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                default,
                behaviors: HashMap::new(),
                scripts: HashMap::new(),
                attempts: Vec::new(),
                peers: Vec::new(),
                stall_close: false,
            })),
            counter: Arc::new(LiveCounter::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Standing behaviour for `url` once its script is used up.
    pub fn set_behavior(&self, url: &str, handshake: Handshake) {
        self.lock().behaviors.insert(url.to_string(), handshake);
    }

    /// Queue one-shot outcomes for `url`, consumed before the standing behaviour.
    pub fn script(&self, url: &str, outcomes: impl IntoIterator<Item = Handshake>) {
        self.lock()
            .scripts
            .entry(url.to_string())
            .or_default()
            .extend(outcomes);
    }

    /// Make sockets accepted from now on never finish their close handshake.
    pub fn stall_close(&self, stall: bool) {
        self.lock().stall_close = stall;
    }

    /// URLs of every handshake attempted so far, in order.
    pub fn attempts(&self) -> Vec<String> {
        self.lock().attempts.clone()
    }

    /// Every accepted connection so far, in order.
    pub fn peers(&self) -> Vec<MockPeer> {
        self.lock().peers.clone()
    }

    /// Most recently accepted connection.
    pub fn last_peer(&self) -> Option<MockPeer> {
        self.lock().peers.last().cloned()
    }

    /// Sockets currently open.
    pub fn live_sockets(&self) -> usize {
        self.counter.live.load(Ordering::SeqCst)
    }

    /// Highest number of sockets ever open at the same time.
    pub fn peak_live_sockets(&self) -> usize {
        self.counter.peak.load(Ordering::SeqCst)
    }
}

impl Connector for MockConnector {
    type Socket = MockSocket;

    async fn connect(&self, endpoint: &Endpoint) -> Result<MockSocket, NetError> {
        let url = endpoint.url();
        let (decision, stall_close) = {
            let mut state = self.lock();
            state.attempts.push(url.clone());
            (state.decide(&url), state.stall_close)
        };

        match decision {
            Handshake::Accept => {
                let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
                let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
                self.counter.opened();
                let closed_with = Arc::new(Mutex::new(None));
                self.lock().peers.push(MockPeer {
                    endpoint: url,
                    inbound: inbound_tx,
                    outbound: Arc::new(Mutex::new(outbound_rx)),
                    closed_with: Arc::clone(&closed_with),
                });
                Ok(MockSocket {
                    inbound: inbound_rx,
                    outbound: outbound_tx,
                    counter: Arc::clone(&self.counter),
                    closed_with,
                    stall_close,
                    released: false,
                })
            }
            Handshake::Refuse => Err(NetError::HandshakeRefused {
                endpoint: url,
                reason: "connection refused".to_string(),
            }),
            Handshake::Hang => std::future::pending().await,
        }
    }
}

/// Client side of an in-memory connection.
pub struct MockSocket {
    inbound: mpsc::UnboundedReceiver<SocketEvent>,
    outbound: mpsc::UnboundedSender<String>,
    counter: Arc<LiveCounter>,
    closed_with: Arc<Mutex<Option<u16>>>,
    stall_close: bool,
    released: bool,
}

impl MockSocket {
    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.counter.closed();
        }
    }
}

impl Socket for MockSocket {
    async fn send_text(&mut self, text: String) -> Result<(), NetError> {
        self.outbound.send(text).map_err(|_| NetError::Transport {
            reason: "peer gone".to_string(),
        })
    }

    async fn recv(&mut self) -> SocketEvent {
        match self.inbound.recv().await {
            Some(SocketEvent::Closed(info)) => {
                self.release();
                SocketEvent::Closed(info)
            }
            Some(event) => event,
            None => {
                self.release();
                SocketEvent::Closed(CloseInfo::abnormal("peer dropped"))
            }
        }
    }

    async fn close(&mut self, code: u16) {
        if !self.released {
            *self
                .closed_with
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(code);
        }
        if self.stall_close {
            std::future::pending::<()>().await;
        }
        self.release();
    }
}

impl Drop for MockSocket {
    fn drop(&mut self) {
        self.release();
    }
}

/// Server side of an in-memory connection.
#[derive(Clone)]
pub struct MockPeer {
    endpoint: String,
    inbound: mpsc::UnboundedSender<SocketEvent>,
    outbound: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    closed_with: Arc<Mutex<Option<u16>>>,
}

impl MockPeer {
    /// URL this connection was opened to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Deliver a raw text frame to the client.
    pub fn push_text(&self, text: impl Into<String>) {
        let _ = self.inbound.send(SocketEvent::Text(text.into()));
    }

    /// Deliver a `{"event", "payload"}` frame to the client.
    pub fn push_event(&self, event: &str, payload: Value) {
        let frame = serde_json::json!({ "event": event, "payload": payload });
        self.push_text(frame.to_string());
    }

    /// Report a transport error to the client.
    pub fn push_error(&self, message: impl Into<String>) {
        let _ = self.inbound.send(SocketEvent::Error(message.into()));
    }

    /// Close the connection from the server side.
    pub fn close(&self, code: u16) {
        let _ = self.inbound.send(SocketEvent::Closed(CloseInfo {
            code,
            reason: String::new(),
        }));
    }

    /// Drain the frames the client has written so far.
    pub fn sent_frames(&self) -> Vec<String> {
        let mut rx = self
            .outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    /// Close code the client used, if it closed this connection itself.
    pub fn client_close_code(&self) -> Option<u16> {
        *self
            .closed_with
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Yield repeatedly so spawned tasks on a current-thread runtime run to
/// their next suspension point.
pub async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ep(url: &str) -> Endpoint {
        Endpoint::parse(url).unwrap()
    }

    #[tokio::test]
    async fn test_script_consumed_before_behavior() {
        let connector = MockConnector::new();
        connector.script("ws://a:1/ws", [Handshake::Refuse]);

        assert!(connector.connect(&ep("ws://a:1/ws")).await.is_err());
        assert!(connector.connect(&ep("ws://a:1/ws")).await.is_ok());
        assert_eq!(connector.attempts().len(), 2);
    }

    #[tokio::test]
    async fn test_live_count_tracks_close_and_drop() {
        let connector = MockConnector::new();
        let mut first = connector.connect(&ep("ws://a:1/ws")).await.unwrap();
        let second = connector.connect(&ep("ws://a:1/ws")).await.unwrap();
        assert_eq!(connector.live_sockets(), 2);

        first.close(1000).await;
        first.close(1000).await;
        assert_eq!(connector.live_sockets(), 1);
        drop(second);
        assert_eq!(connector.live_sockets(), 0);
        assert_eq!(connector.peak_live_sockets(), 2);
        assert_eq!(connector.peers()[0].client_close_code(), Some(1000));
    }

    #[tokio::test]
    async fn test_peer_frames_flow_both_ways() {
        let connector = MockConnector::new();
        let mut socket = connector.connect(&ep("ws://a:1/ws")).await.unwrap();
        let peer = connector.last_peer().unwrap();

        socket.send_text("up".into()).await.unwrap();
        assert_eq!(peer.sent_frames(), vec!["up".to_string()]);

        peer.push_text("down");
        assert_eq!(socket.recv().await, SocketEvent::Text("down".into()));

        peer.close(1006);
        assert!(matches!(socket.recv().await, SocketEvent::Closed(info) if info.code == 1006));
        assert_eq!(connector.live_sockets(), 0);
    }
}
