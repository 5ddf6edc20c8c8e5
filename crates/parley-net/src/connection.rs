//! Connection lifecycle: state machine, reconnection and frame delivery.
//!
//! A single driver task per client owns the live socket, the pending
//! reconnection timer and the dedup table. It reacts to two inputs:
//! commands from the [`SyncClient`](crate::client::SyncClient) handle, and
//! link events from the tasks it spawns (handshake attempts, timer fires and
//! the socket pump). Every spawned task is tagged with the epoch current at
//! spawn time; the epoch is bumped on each manual `connect()` round and each
//! `disconnect()`, so results from superseded work are dropped.
//!
//! ```text
//! Disconnected --connect--> Connecting --open--> Connected
//!                               |                   |
//!                   fail/timeout|      unclean close|  clean close / disconnect
//!                               v                   v
//!                          Reconnecting <-----------+   --> Disconnected
//!                               |
//!                        timer fires --> Connecting
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::dedup::{DedupConfig, MessageDeduplicator};
use crate::endpoint::Endpoint;
use crate::error::NetError;
use crate::notify::{Notice, Notifier};
use crate::prober::{EndpointProber, handshake};
use crate::reconnection::{ReconnectPolicy, ReconnectScheduler, ScheduleOutcome};
use crate::routing::EventRouter;
use crate::stats::LinkStats;
use crate::transport::{CLOSE_NORMAL, CloseInfo, Connector, Socket, SocketEvent};
use crate::wire::{self, ChatMessage};

/// How long a closing socket may take to finish its close handshake before
/// its pump task is aborted.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Consecutive failures after which the next attempt re-probes candidates.
const PROBE_AFTER_FAILURES: u32 = 2;

/// Lifecycle event names emitted on the router.
pub mod events {
    /// A connection was established. Payload: `{"endpoint"}`.
    pub const CONNECT: &str = "connect";
    /// The connection ended for good. Payload: `{"reason"}` plus `"code"` for
    /// server-initiated closes.
    pub const DISCONNECT: &str = "disconnect";
    /// A connection-level error. Payload: `{"message", "code"}`.
    pub const ERROR: &str = "error";
    /// A reconnection attempt was scheduled. Payload: `{"attempt", "delay_ms"}`.
    pub const RECONNECTING: &str = "reconnecting";
    /// Automatic reconnection gave up. Payload: `{"attempts"}`.
    pub const RECONNECT_EXHAUSTED: &str = "reconnect_exhausted";
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection and none pending.
    Disconnected,
    /// A handshake is in flight.
    Connecting,
    /// Connected and exchanging frames.
    Connected,
    /// Waiting for the backoff timer before the next attempt.
    Reconnecting,
}

/// Observable connection state backed by a `tokio::sync::watch` channel.
#[derive(Debug)]
pub struct ConnectionStateWatch {
    tx: watch::Sender<ConnectionState>,
}

impl Default for ConnectionStateWatch {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStateWatch {
    /// Create a watch initialized to [`ConnectionState::Disconnected`].
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectionState::Disconnected);
        Self { tx }
    }

    /// Set the state, notifying subscribers only when it changes.
    pub fn set(&self, state: ConnectionState) {
        self.tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    /// New subscriber receiver.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }

    /// Current state without blocking.
    pub fn current(&self) -> ConnectionState {
        *self.tx.borrow()
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Runtime settings for a [`SyncClient`](crate::client::SyncClient).
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Primary server URL.
    pub base_url: String,
    /// Path that replaces the one in `base_url` when non-empty.
    pub path: String,
    /// Further probe candidates, in priority order, used verbatim.
    pub fallback_urls: Vec<String>,
    /// Bound on one connection handshake.
    pub handshake_timeout: Duration,
    /// Bound on one probe handshake.
    pub probe_timeout: Duration,
    /// Backoff between reconnection attempts.
    pub reconnect_policy: ReconnectPolicy,
    /// Duplicate suppression limits.
    pub dedup: DedupConfig,
    /// Event names whose payloads are chat messages subject to dedup.
    pub message_events: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: "ws://127.0.0.1:7777".to_string(),
            path: "/ws".to_string(),
            fallback_urls: Vec::new(),
            handshake_timeout: Duration::from_millis(5000),
            probe_timeout: Duration::from_millis(2000),
            reconnect_policy: ReconnectPolicy::default(),
            dedup: DedupConfig::default(),
            message_events: vec!["message".to_string()],
        }
    }
}

impl SyncConfig {
    /// Primary endpoint followed by the fallbacks.
    pub fn candidates(&self) -> Result<Vec<Endpoint>, NetError> {
        let mut out = vec![Endpoint::from_base(&self.base_url, &self.path)?];
        for url in &self.fallback_urls {
            let endpoint = Endpoint::parse(url)?;
            if !out.contains(&endpoint) {
                out.push(endpoint);
            }
        }
        Ok(out)
    }

    /// Whether `event` carries chat messages.
    pub fn is_message_event(&self, event: &str) -> bool {
        self.message_events.iter().any(|name| name == event)
    }
}

// ---------------------------------------------------------------------------
// Driver inputs
// ---------------------------------------------------------------------------

/// Requests from the client handle.
pub(crate) enum Command {
    Connect {
        target: Option<Endpoint>,
        reply: oneshot::Sender<Result<(), NetError>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    Outbound {
        event: String,
        chat: Option<ChatMessage>,
        frame: String,
    },
    Shutdown,
}

/// Results from tasks spawned by the driver, tagged with their epoch.
enum LinkEvent<S> {
    Opened {
        epoch: u64,
        endpoint: Endpoint,
        socket: S,
    },
    HandshakeFailed {
        epoch: u64,
        error: NetError,
    },
    TimerFired {
        epoch: u64,
    },
    Frame {
        epoch: u64,
        text: String,
    },
    TransportError {
        epoch: u64,
        message: String,
    },
    Closed {
        epoch: u64,
        info: CloseInfo,
    },
}

enum Outgoing {
    Frame(String),
    Close(u16),
}

/// The live connection: a pump task owning the socket, fed by `outgoing`.
struct Link {
    endpoint: Endpoint,
    outgoing: mpsc::UnboundedSender<Outgoing>,
    pump: JoinHandle<()>,
}

impl Link {
    /// Ask the pump to close with `code`, aborting it if the close handshake
    /// outlasts [`CLOSE_GRACE`] on `clock`.
    async fn close(self, code: u16, clock: &dyn Clock) {
        let _ = self.outgoing.send(Outgoing::Close(code));
        let mut pump = self.pump;
        let finished = tokio::select! {
            _ = &mut pump => true,
            () = clock.sleep(CLOSE_GRACE) => false,
        };
        if !finished {
            tracing::warn!(endpoint = %self.endpoint, "Close handshake timed out, aborting link");
            pump.abort();
            let _ = pump.await;
        }
    }
}

/// Shuttle frames between one socket and the driver until either side closes.
async fn pump<S: Socket>(
    mut socket: S,
    epoch: u64,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
    events: mpsc::UnboundedSender<LinkEvent<S>>,
) {
    loop {
        tokio::select! {
            biased;

            request = outgoing.recv() => match request {
                Some(Outgoing::Frame(text)) => {
                    if let Err(e) = socket.send_text(text).await {
                        let _ = events.send(LinkEvent::TransportError { epoch, message: e.to_string() });
                    }
                }
                Some(Outgoing::Close(code)) => {
                    socket.close(code).await;
                    return;
                }
                None => {
                    socket.close(CLOSE_NORMAL).await;
                    return;
                }
            },

            event = socket.recv() => match event {
                SocketEvent::Text(text) => {
                    let _ = events.send(LinkEvent::Frame { epoch, text });
                }
                SocketEvent::Error(message) => {
                    let _ = events.send(LinkEvent::TransportError { epoch, message });
                }
                SocketEvent::Closed(info) => {
                    let _ = events.send(LinkEvent::Closed { epoch, info });
                    return;
                }
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Shared handles the driver publishes through.
pub(crate) struct Shared {
    pub router: Arc<EventRouter>,
    pub state: Arc<ConnectionStateWatch>,
    pub stats: Arc<LinkStats>,
    pub notifier: Arc<dyn Notifier>,
}

/// Owns all connection state. Runs as one task per client.
pub(crate) struct Driver<C: Connector> {
    config: SyncConfig,
    connector: Arc<C>,
    clock: Arc<dyn Clock>,
    shared: Shared,
    primary: Endpoint,
    fallbacks: Vec<Endpoint>,
    /// Endpoint the next plain attempt dials: explicit target or last success.
    target: Option<Endpoint>,
    scheduler: ReconnectScheduler,
    dedup: MessageDeduplicator,
    epoch: u64,
    /// Consecutive failed attempts in the current outage.
    failures: u32,
    attempt: Option<JoinHandle<()>>,
    link: Option<Link>,
    pending_connect: Option<oneshot::Sender<Result<(), NetError>>>,
    commands: mpsc::UnboundedReceiver<Command>,
    link_tx: mpsc::UnboundedSender<LinkEvent<C::Socket>>,
    link_rx: mpsc::UnboundedReceiver<LinkEvent<C::Socket>>,
}

impl<C: Connector> Driver<C> {
    pub(crate) fn new(
        config: SyncConfig,
        connector: Arc<C>,
        clock: Arc<dyn Clock>,
        shared: Shared,
        commands: mpsc::UnboundedReceiver<Command>,
    ) -> Result<Self, NetError> {
        let mut candidates = config.candidates()?.into_iter();
        let primary = candidates.next().ok_or_else(|| NetError::InvalidEndpoint {
            url: config.base_url.clone(),
            reason: "no endpoint configured".to_string(),
        })?;
        let fallbacks = candidates.collect();

        let scheduler = ReconnectScheduler::new(config.reconnect_policy.clone(), Arc::clone(&clock));
        let dedup = MessageDeduplicator::new(config.dedup.clone(), Arc::clone(&clock));
        let (link_tx, link_rx) = mpsc::unbounded_channel();

        Ok(Self {
            config,
            connector,
            clock,
            shared,
            primary,
            fallbacks,
            target: None,
            scheduler,
            dedup,
            epoch: 0,
            failures: 0,
            attempt: None,
            link: None,
            pending_connect: None,
            commands,
            link_tx,
            link_rx,
        })
    }

    /// Process inputs until the client shuts down. Commands take priority so
    /// a `disconnect()` is never queued behind link traffic.
    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },

                Some(event) = self.link_rx.recv() => self.handle_link_event(event).await,
            }
        }
        self.shutdown().await;
    }

    fn state(&self) -> ConnectionState {
        self.shared.state.current()
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state();
        if previous != state {
            tracing::debug!(?previous, ?state, epoch = self.epoch, "Connection state changed");
            self.shared.state.set(state);
        }
    }

    // -- commands -----------------------------------------------------------

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { target, reply } => match self.state() {
                ConnectionState::Connected | ConnectionState::Connecting => {
                    let _ = reply.send(Ok(()));
                }
                ConnectionState::Disconnected | ConnectionState::Reconnecting => {
                    self.begin_round(target, reply).await;
                }
            },
            Command::Disconnect { reply } => {
                self.disconnect().await;
                let _ = reply.send(());
            }
            Command::Outbound { event, chat, frame } => {
                let link = match (&self.link, self.state()) {
                    (Some(link), ConnectionState::Connected) => link,
                    _ => {
                        tracing::warn!(event = %event, "Dropping frame queued before the link went down");
                        return;
                    }
                };
                if let Some(chat) = chat {
                    self.dedup.remember(&chat);
                }
                if link.outgoing.send(Outgoing::Frame(frame)).is_ok() {
                    self.shared.stats.frame_out();
                }
            }
            Command::Shutdown => {}
        }
    }

    async fn begin_round(
        &mut self,
        target: Option<Endpoint>,
        reply: oneshot::Sender<Result<(), NetError>>,
    ) {
        self.reset_link().await;
        self.scheduler.reset();
        self.failures = 0;
        self.epoch += 1;
        if target.is_some() {
            self.target = target;
        }
        if let Some(previous) = self.pending_connect.replace(reply) {
            let _ = previous.send(Err(NetError::Cancelled));
        }
        tracing::info!(epoch = self.epoch, "Connecting");
        self.set_state(ConnectionState::Connecting);
        self.spawn_attempt(false);
    }

    async fn disconnect(&mut self) {
        self.epoch += 1;
        self.reset_link().await;
        self.scheduler.reset();
        self.failures = 0;
        self.set_state(ConnectionState::Disconnected);
        if let Some(pending) = self.pending_connect.take() {
            let _ = pending.send(Err(NetError::Cancelled));
        }
        tracing::info!(epoch = self.epoch, "Disconnected by request");
        self.shared
            .router
            .emit(events::DISCONNECT, &json!({ "reason": "manual" }));
        self.shared.notifier.notify(&Notice::Disconnected {
            reason: "manual".to_string(),
        });
    }

    async fn shutdown(&mut self) {
        self.epoch += 1;
        self.reset_link().await;
        self.scheduler.reset();
        self.set_state(ConnectionState::Disconnected);
        if let Some(pending) = self.pending_connect.take() {
            let _ = pending.send(Err(NetError::Shutdown));
        }
        tracing::debug!("Sync driver stopped");
    }

    /// Tear down everything in flight: the backoff timer, a handshake
    /// attempt and the live link. Results already queued are discarded.
    async fn reset_link(&mut self) {
        self.scheduler.cancel();
        if let Some(attempt) = self.attempt.take() {
            attempt.abort();
            let _ = attempt.await;
        }
        if let Some(link) = self.link.take() {
            link.close(CLOSE_NORMAL, self.clock.as_ref()).await;
        }
        while let Ok(event) = self.link_rx.try_recv() {
            if let LinkEvent::Opened { mut socket, .. } = event {
                socket.close(CLOSE_NORMAL).await;
            }
        }
    }

    // -- attempts -----------------------------------------------------------

    fn preferred(&self) -> Endpoint {
        self.target.clone().unwrap_or_else(|| self.primary.clone())
    }

    /// Probe order: preferred endpoint, then primary, then fallbacks.
    fn probe_order(&self) -> Vec<Endpoint> {
        let mut order = vec![self.preferred()];
        for endpoint in std::iter::once(&self.primary).chain(&self.fallbacks) {
            if !order.contains(endpoint) {
                order.push(endpoint.clone());
            }
        }
        order
    }

    fn spawn_attempt(&mut self, probe_first: bool) {
        let epoch = self.epoch;
        let connector = Arc::clone(&self.connector);
        let clock = Arc::clone(&self.clock);
        let events = self.link_tx.clone();
        let preferred = self.preferred();
        let candidates = if probe_first { self.probe_order() } else { Vec::new() };
        let handshake_timeout = self.config.handshake_timeout;
        let probe_timeout = self.config.probe_timeout;

        self.attempt = Some(tokio::spawn(async move {
            let endpoint = if probe_first {
                let prober = EndpointProber::new(Arc::clone(&connector), Arc::clone(&clock));
                match prober.probe(&candidates, probe_timeout).await {
                    Some(found) => found,
                    None => {
                        let error = NetError::NoReachableEndpoint {
                            tried: candidates.len(),
                        };
                        let _ = events.send(LinkEvent::HandshakeFailed { epoch, error });
                        return;
                    }
                }
            } else {
                preferred
            };

            let event = match handshake(connector.as_ref(), clock.as_ref(), &endpoint, handshake_timeout).await {
                Ok(socket) => LinkEvent::Opened {
                    epoch,
                    endpoint,
                    socket,
                },
                Err(error) => LinkEvent::HandshakeFailed { epoch, error },
            };
            let _ = events.send(event);
        }));
    }

    fn schedule_reconnect(&mut self) {
        let events = self.link_tx.clone();
        let epoch = self.epoch;
        let outcome = self.scheduler.schedule_next(move || {
            let _ = events.send(LinkEvent::TimerFired { epoch });
        });

        match outcome {
            ScheduleOutcome::Scheduled { attempt, delay } => {
                let delay_ms = delay.as_millis() as u64;
                self.set_state(ConnectionState::Reconnecting);
                self.shared.stats.reconnect_attempt();
                tracing::info!(attempt, delay_ms, "Reconnection scheduled");
                self.shared.router.emit(
                    events::RECONNECTING,
                    &json!({ "attempt": attempt, "delay_ms": delay_ms }),
                );
                self.shared
                    .notifier
                    .notify(&Notice::Reconnecting { attempt, delay_ms });
            }
            ScheduleOutcome::Exhausted { attempts } => {
                self.set_state(ConnectionState::Disconnected);
                tracing::error!(attempts, "Reconnection attempts exhausted");
                let error = NetError::ReconnectExhausted { attempts };
                self.shared.router.emit(events::ERROR, &error_payload(&error));
                self.shared
                    .router
                    .emit(events::RECONNECT_EXHAUSTED, &json!({ "attempts": attempts }));
                self.shared
                    .notifier
                    .notify(&Notice::ReconnectExhausted { attempts });
            }
        }
    }

    fn report_error(&self, error: &NetError) {
        let info = error.info();
        self.shared.router.emit(events::ERROR, &error_payload(error));
        self.shared.notifier.notify(&Notice::Error {
            message: info.message,
            code: info.code,
        });
    }

    // -- link events --------------------------------------------------------

    async fn handle_link_event(&mut self, event: LinkEvent<C::Socket>) {
        match event {
            LinkEvent::Opened {
                epoch,
                endpoint,
                mut socket,
            } => {
                if epoch != self.epoch || self.state() != ConnectionState::Connecting {
                    tracing::debug!(endpoint = %endpoint, epoch, "Closing superseded connection");
                    socket.close(CLOSE_NORMAL).await;
                    return;
                }
                self.on_open(endpoint, socket);
            }
            LinkEvent::HandshakeFailed { epoch, error } => {
                if epoch != self.epoch || self.state() != ConnectionState::Connecting {
                    return;
                }
                self.attempt = None;
                self.failures += 1;
                tracing::warn!(error = %error, failures = self.failures, "Connection attempt failed");
                self.report_error(&error);
                if let Some(pending) = self.pending_connect.take() {
                    let _ = pending.send(Err(error));
                }
                self.schedule_reconnect();
            }
            LinkEvent::TimerFired { epoch } => {
                if epoch != self.epoch || self.state() != ConnectionState::Reconnecting {
                    return;
                }
                let probe_first = self.failures >= PROBE_AFTER_FAILURES;
                tracing::debug!(attempt = self.scheduler.attempts(), probe_first, "Reconnection timer fired");
                self.set_state(ConnectionState::Connecting);
                self.spawn_attempt(probe_first);
            }
            LinkEvent::Frame { epoch, text } => {
                if epoch == self.epoch && self.link.is_some() {
                    self.deliver(&text);
                }
            }
            LinkEvent::TransportError { epoch, message } => {
                if epoch == self.epoch && self.link.is_some() {
                    tracing::warn!(error = %message, "Transport error");
                    self.report_error(&NetError::Transport { reason: message });
                }
            }
            LinkEvent::Closed { epoch, info } => {
                if epoch != self.epoch || self.link.take().is_none() {
                    return;
                }
                self.on_close(info);
            }
        }
    }

    fn on_open(&mut self, endpoint: Endpoint, socket: C::Socket) {
        self.attempt = None;
        self.scheduler.reset();
        self.failures = 0;
        self.target = Some(endpoint.clone());

        let (outgoing, requests) = mpsc::unbounded_channel();
        let pump = tokio::spawn(pump(socket, self.epoch, requests, self.link_tx.clone()));
        self.link = Some(Link {
            endpoint: endpoint.clone(),
            outgoing,
            pump,
        });

        self.set_state(ConnectionState::Connected);
        self.shared.stats.connected();
        tracing::info!(endpoint = %endpoint, epoch = self.epoch, "Connected");
        self.shared
            .router
            .emit(events::CONNECT, &json!({ "endpoint": endpoint.url() }));
        self.shared.notifier.notify(&Notice::Connected {
            endpoint: endpoint.url(),
        });
        if let Some(pending) = self.pending_connect.take() {
            let _ = pending.send(Ok(()));
        }
    }

    fn on_close(&mut self, info: CloseInfo) {
        if info.is_clean() {
            tracing::info!(code = info.code, "Server closed the connection");
            self.set_state(ConnectionState::Disconnected);
            self.shared.router.emit(
                events::DISCONNECT,
                &json!({ "reason": "server", "code": info.code }),
            );
            self.shared.notifier.notify(&Notice::Disconnected {
                reason: "server".to_string(),
            });
            return;
        }

        let error = NetError::UncleanClose {
            code: info.code,
            reason: info.reason,
        };
        tracing::warn!(error = %error, "Connection lost");
        self.report_error(&error);
        self.failures = 1;
        self.schedule_reconnect();
    }

    /// Decode one inbound frame, filter chat duplicates, and fan it out.
    fn deliver(&mut self, text: &str) {
        self.shared.stats.frame_in();
        let mut event = match wire::decode(text, self.clock.now_ms()) {
            Ok(event) => event,
            Err(e) => {
                self.shared.stats.decode_failure();
                tracing::warn!(error = %e, "Dropping undecodable frame");
                return;
            }
        };

        if self.config.is_message_event(&event.event_type) {
            let mut chat = match ChatMessage::from_payload(&event.data, event.timestamp) {
                Ok(chat) => chat,
                Err(e) => {
                    self.shared.stats.decode_failure();
                    tracing::warn!(event = %event.event_type, error = %e, "Dropping malformed chat frame");
                    return;
                }
            };
            if !self.dedup.admit(&mut chat) {
                self.shared.stats.duplicate();
                tracing::debug!(id = chat.id.as_deref().unwrap_or(""), "Dropping duplicate message");
                return;
            }
            chat.write_into(&mut event.data);
        }

        self.shared.router.emit(&event.event_type, &event.data);
    }
}

fn error_payload(error: &NetError) -> Value {
    serde_json::to_value(error.info()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_payload_shape() {
        let payload = error_payload(&NetError::HandshakeRefused {
            endpoint: "ws://a:1/ws".into(),
            reason: "refused".into(),
        });
        let object = payload.as_object().unwrap();
        assert_eq!(object.len(), 2);
        assert_eq!(payload["code"], "handshake_refused");
        assert!(payload["message"].as_str().unwrap().contains("ws://a:1/ws"));
    }

    #[test]
    fn test_state_watch_starts_disconnected() {
        let watch = ConnectionStateWatch::new();
        assert_eq!(watch.current(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_state_watch_notifies_on_change_only() {
        let watch = ConnectionStateWatch::new();
        let mut rx = watch.subscribe();

        watch.set(ConnectionState::Disconnected);
        assert!(!rx.has_changed().unwrap());

        watch.set(ConnectionState::Connecting);
        assert!(rx.has_changed().unwrap());
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), ConnectionState::Connecting);
    }

    #[test]
    fn test_candidates_primary_then_fallbacks() {
        let config = SyncConfig {
            base_url: "ws://chat.example:9000/old".into(),
            path: "/ws".into(),
            fallback_urls: vec![
                "ws://backup.example:9000/ws".into(),
                "ws://chat.example:9000/ws".into(),
            ],
            ..SyncConfig::default()
        };
        let urls: Vec<String> = config
            .candidates()
            .unwrap()
            .iter()
            .map(Endpoint::url)
            .collect();
        assert_eq!(
            urls,
            vec!["ws://chat.example:9000/ws", "ws://backup.example:9000/ws"]
        );
    }

    #[test]
    fn test_candidates_reject_bad_fallback() {
        let config = SyncConfig {
            fallback_urls: vec!["ftp://nope".into()],
            ..SyncConfig::default()
        };
        assert!(matches!(
            config.candidates(),
            Err(NetError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn test_message_event_lookup() {
        let config = SyncConfig::default();
        assert!(config.is_message_event("message"));
        assert!(!config.is_message_event("presence"));
    }
}
