//! [`SyncClient`]: the public handle over one connection driver.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};

use crate::clock::{Clock, SystemClock};
use crate::connection::{Command, ConnectionState, ConnectionStateWatch, Driver, Shared, SyncConfig};
use crate::dedup::synthesize_id;
use crate::endpoint::Endpoint;
use crate::error::NetError;
use crate::notify::{LogNotifier, Notifier};
use crate::routing::{EventHandler, EventRouter, Outbound, Subscription};
use crate::stats::{LinkStats, StatsSnapshot};
use crate::transport::Connector;
use crate::wire::{self, ChatMessage};

/// Outbound path handed to the router: checks the state, stamps chat
/// messages with an id and queues the encoded frame for the driver.
struct OutboundPath {
    commands: mpsc::UnboundedSender<Command>,
    state: Arc<ConnectionStateWatch>,
    clock: Arc<dyn Clock>,
    message_events: Vec<String>,
}

impl Outbound for OutboundPath {
    fn send_event(&self, event: &str, mut payload: Value) -> Result<(), NetError> {
        if self.state.current() != ConnectionState::Connected {
            return Err(NetError::SendWhileDisconnected {
                event: event.to_string(),
            });
        }

        let now = self.clock.now_ms();
        let chat = if self.message_events.iter().any(|name| name == event) {
            ChatMessage::from_payload(&payload, now).ok().map(|mut chat| {
                if chat.id.is_none() {
                    chat.id = Some(synthesize_id(chat.timestamp.unwrap_or(now)));
                }
                chat.write_into(&mut payload);
                chat
            })
        } else {
            None
        };

        let frame = wire::encode(event, &payload, now)?;
        self.commands
            .send(Command::Outbound {
                event: event.to_string(),
                chat,
                frame,
            })
            .map_err(|_| NetError::Shutdown)
    }
}

/// Handle to a realtime connection.
///
/// Construct with [`SyncClient::start`] inside a Tokio runtime. The handle
/// is cheap to share behind an `Arc`; dropping it stops the driver and
/// closes any live socket.
pub struct SyncClient {
    commands: mpsc::UnboundedSender<Command>,
    router: Arc<EventRouter>,
    state: Arc<ConnectionStateWatch>,
    stats: Arc<LinkStats>,
}

impl SyncClient {
    /// Spawn a driver for `config` using `connector` for handshakes, `clock`
    /// for all timing and `notifier` for user-facing notices.
    ///
    /// Fails if the configured endpoints do not parse.
    pub fn start<C: Connector>(
        config: SyncConfig,
        connector: C,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, NetError> {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let state = Arc::new(ConnectionStateWatch::new());
        let stats = Arc::new(LinkStats::default());
        let router = Arc::new(EventRouter::with_outbound(Arc::new(OutboundPath {
            commands: commands.clone(),
            state: Arc::clone(&state),
            clock: Arc::clone(&clock),
            message_events: config.message_events.clone(),
        })));

        let shared = Shared {
            router: Arc::clone(&router),
            state: Arc::clone(&state),
            stats: Arc::clone(&stats),
            notifier,
        };
        let driver = Driver::new(config, Arc::new(connector), clock, shared, command_rx)?;
        tokio::spawn(driver.run());

        Ok(Self {
            commands,
            router,
            state,
            stats,
        })
    }

    /// [`SyncClient::start`] with the system clock and [`LogNotifier`].
    pub fn with_defaults<C: Connector>(config: SyncConfig, connector: C) -> Result<Self, NetError> {
        Self::start(config, connector, Arc::new(SystemClock), Arc::new(LogNotifier))
    }

    /// Connect to the configured endpoint (or the last one that worked).
    ///
    /// Resolves once the first handshake of this round concludes. Returns
    /// `Ok` immediately when already connected or connecting. Later
    /// automatic reconnections do not touch this call.
    pub async fn connect(&self) -> Result<(), NetError> {
        self.request_connect(None).await
    }

    /// Like [`connect`](Self::connect), but dial `endpoint` and prefer it for
    /// later reconnections.
    pub async fn connect_to(&self, endpoint: Endpoint) -> Result<(), NetError> {
        self.request_connect(Some(endpoint)).await
    }

    async fn request_connect(&self, target: Option<Endpoint>) -> Result<(), NetError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Connect { target, reply })
            .map_err(|_| NetError::Shutdown)?;
        response.await.map_err(|_| NetError::Shutdown)?
    }

    /// Move to `Disconnected`, cancelling any pending attempt or timer and
    /// closing the live socket. Takes effect ahead of queued link traffic.
    pub async fn disconnect(&self) {
        let (reply, done) = oneshot::channel();
        if self.commands.send(Command::Disconnect { reply }).is_ok() {
            let _ = done.await;
        }
    }

    /// Send `payload` as `event`. Fails with
    /// [`NetError::SendWhileDisconnected`] unless connected; nothing is queued.
    pub fn send(&self, event: &str, payload: Value) -> Result<(), NetError> {
        self.router.send(event, payload)
    }

    /// Subscribe `handler` to `event` for as long as the returned
    /// [`Subscription`] lives.
    pub fn on<H: EventHandler + 'static>(&self, event: &str, handler: H) -> Subscription {
        self.router.on(event, handler)
    }

    /// Remove a subscription. Idempotent.
    pub fn off(&self, subscription: &Subscription) -> bool {
        self.router.off(subscription.event(), subscription.id())
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state.current()
    }

    /// Receiver that observes every state change.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// The event router.
    pub fn router(&self) -> &Arc<EventRouter> {
        &self.router
    }

    /// Link counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

impl Drop for SyncClient {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::connection::events;
    use crate::dedup::DedupConfig;
    use crate::notify::Notice;
    use crate::reconnection::ReconnectPolicy;
    use crate::testing::{Handshake, MockConnector, settle};
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    const PRIMARY: &str = "ws://primary.test:7777/ws";
    const BACKUP: &str = "ws://backup.test:7777/ws";
    const START_MS: u64 = 1_000_000;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn test_config() -> SyncConfig {
        SyncConfig {
            base_url: "ws://primary.test:7777".into(),
            path: "/ws".into(),
            fallback_urls: vec![BACKUP.into()],
            handshake_timeout: ms(1000),
            probe_timeout: ms(500),
            reconnect_policy: ReconnectPolicy {
                base_delay: ms(2000),
                multiplier: 1.5,
                max_delay: ms(10_000),
                max_attempts: 3,
                jitter: 0.0,
            },
            dedup: DedupConfig::default(),
            message_events: vec!["message".into()],
        }
    }

    struct Harness {
        client: Arc<SyncClient>,
        clock: Arc<ManualClock>,
        connector: MockConnector,
        notices: Arc<Mutex<Vec<Notice>>>,
    }

    impl Harness {
        fn new(connector: MockConnector) -> Self {
            let clock = Arc::new(ManualClock::new(START_MS));
            let notices = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&notices);
            let client = SyncClient::start(
                test_config(),
                connector.clone(),
                clock.clone(),
                Arc::new(move |n: &Notice| sink.lock().unwrap().push(n.clone())),
            )
            .unwrap();
            Self {
                client: Arc::new(client),
                clock,
                connector,
                notices,
            }
        }

        fn record(&self, event: &str) -> Arc<Mutex<Vec<Value>>> {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&seen);
            self.client
                .on(event, move |data: &Value| sink.lock().unwrap().push(data.clone()))
                .detach();
            seen
        }

        fn spawn_connect(&self) -> tokio::task::JoinHandle<Result<(), NetError>> {
            let client = Arc::clone(&self.client);
            tokio::spawn(async move { client.connect().await })
        }

        async fn advance(&self, by: u64) {
            self.clock.advance(ms(by));
            settle().await;
        }
    }

    #[tokio::test]
    async fn test_connect_success_emits_connect() {
        let h = Harness::new(MockConnector::new());
        let connects = h.record(events::CONNECT);
        let mut states = h.client.subscribe_state();

        h.client.connect().await.unwrap();
        assert_eq!(h.client.state(), ConnectionState::Connected);
        assert_eq!(*connects.lock().unwrap(), vec![json!({ "endpoint": PRIMARY })]);
        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), ConnectionState::Connected);
        assert_eq!(h.client.stats().connects, 1);
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let h = Harness::new(MockConnector::new());
        h.client.connect().await.unwrap();
        h.client.connect().await.unwrap();
        settle().await;
        assert_eq!(h.connector.attempts().len(), 1);
        assert_eq!(h.connector.live_sockets(), 1);
    }

    #[tokio::test]
    async fn test_connect_while_connecting_returns_immediately() {
        let h = Harness::new(MockConnector::with_default(Handshake::Hang));
        let first = h.spawn_connect();
        settle().await;
        assert_eq!(h.client.state(), ConnectionState::Connecting);

        h.client.connect().await.unwrap();
        assert_eq!(h.connector.attempts().len(), 1);
        assert!(!first.is_finished());
    }

    #[tokio::test]
    async fn test_connect_to_explicit_endpoint() {
        let h = Harness::new(MockConnector::new());
        let target = Endpoint::parse("ws://elsewhere.test:9000/live").unwrap();
        h.client.connect_to(target).await.unwrap();
        assert_eq!(h.connector.attempts(), vec!["ws://elsewhere.test:9000/live"]);
    }

    #[tokio::test]
    async fn test_handshake_timeout_schedules_first_reconnect() {
        let h = Harness::new(MockConnector::with_default(Handshake::Hang));
        let reconnecting = h.record(events::RECONNECTING);
        let errors = h.record(events::ERROR);

        let pending = h.spawn_connect();
        settle().await;
        h.advance(1000).await;

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(NetError::HandshakeTimeout { .. })));
        assert_eq!(h.client.state(), ConnectionState::Reconnecting);
        assert_eq!(
            *reconnecting.lock().unwrap(),
            vec![json!({ "attempt": 1, "delay_ms": 2000 })]
        );
        assert_eq!(errors.lock().unwrap()[0]["code"], "handshake_timeout");
    }

    #[tokio::test]
    async fn test_backoff_then_exhaustion() {
        let h = Harness::new(MockConnector::with_default(Handshake::Refuse));
        let reconnecting = h.record(events::RECONNECTING);
        let exhausted = h.record(events::RECONNECT_EXHAUSTED);

        assert!(h.client.connect().await.is_err());
        settle().await;
        for delay in [2000, 3000, 4500] {
            assert_eq!(h.client.state(), ConnectionState::Reconnecting);
            h.advance(delay).await;
        }

        let delays: Vec<u64> = reconnecting
            .lock()
            .unwrap()
            .iter()
            .map(|v| v["delay_ms"].as_u64().unwrap())
            .collect();
        assert_eq!(delays, vec![2000, 3000, 4500]);
        assert_eq!(h.client.state(), ConnectionState::Disconnected);
        assert_eq!(*exhausted.lock().unwrap(), vec![json!({ "attempts": 3 })]);
        assert!(
            h.notices
                .lock()
                .unwrap()
                .contains(&Notice::ReconnectExhausted { attempts: 3 })
        );

        let attempts = h.connector.attempts().len();
        h.advance(120_000).await;
        assert_eq!(h.connector.attempts().len(), attempts);
        assert_eq!(h.clock.pending_timers(), 0);

        // A manual connect starts a fresh round.
        h.connector.set_behavior(PRIMARY, Handshake::Accept);
        h.client.connect().await.unwrap();
        assert_eq!(h.client.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_clean_close_does_not_reconnect() {
        let h = Harness::new(MockConnector::new());
        let disconnects = h.record(events::DISCONNECT);
        h.client.connect().await.unwrap();

        h.connector.last_peer().unwrap().close(1000);
        settle().await;

        assert_eq!(h.client.state(), ConnectionState::Disconnected);
        assert_eq!(
            *disconnects.lock().unwrap(),
            vec![json!({ "reason": "server", "code": 1000 })]
        );
        h.advance(60_000).await;
        assert_eq!(h.connector.attempts().len(), 1);
        assert_eq!(h.clock.pending_timers(), 0);
    }

    #[tokio::test]
    async fn test_unclean_close_reconnects() {
        let h = Harness::new(MockConnector::new());
        let errors = h.record(events::ERROR);
        h.client.connect().await.unwrap();

        h.connector.last_peer().unwrap().close(1006);
        settle().await;
        assert_eq!(h.client.state(), ConnectionState::Reconnecting);
        assert_eq!(errors.lock().unwrap()[0]["code"], "unclean_close");

        h.advance(2000).await;
        assert_eq!(h.client.state(), ConnectionState::Connected);
        assert_eq!(h.connector.attempts(), vec![PRIMARY, PRIMARY]);
        assert_eq!(h.connector.live_sockets(), 1);
    }

    #[tokio::test]
    async fn test_transport_error_alone_keeps_connection() {
        let h = Harness::new(MockConnector::new());
        let errors = h.record(events::ERROR);
        h.client.connect().await.unwrap();

        h.connector.last_peer().unwrap().push_error("hiccup");
        settle().await;
        assert_eq!(h.client.state(), ConnectionState::Connected);
        assert_eq!(errors.lock().unwrap()[0]["code"], "transport");
    }

    #[tokio::test]
    async fn test_disconnect_cancels_pending_timer() {
        let h = Harness::new(MockConnector::with_default(Handshake::Refuse));
        let disconnects = h.record(events::DISCONNECT);
        assert!(h.client.connect().await.is_err());
        settle().await;
        assert_eq!(h.client.state(), ConnectionState::Reconnecting);

        h.client.disconnect().await;
        settle().await;
        assert_eq!(h.client.state(), ConnectionState::Disconnected);
        assert_eq!(h.clock.pending_timers(), 0);

        h.advance(60_000).await;
        assert_eq!(h.connector.attempts().len(), 1);
        assert_eq!(*disconnects.lock().unwrap(), vec![json!({ "reason": "manual" })]);
    }

    #[tokio::test]
    async fn test_disconnect_during_handshake_wins() {
        let h = Harness::new(MockConnector::with_default(Handshake::Hang));
        let pending = h.spawn_connect();
        settle().await;

        h.client.disconnect().await;
        assert_eq!(pending.await.unwrap(), Err(NetError::Cancelled));
        assert_eq!(h.client.state(), ConnectionState::Disconnected);

        h.advance(10_000).await;
        assert_eq!(h.client.state(), ConnectionState::Disconnected);
        assert_eq!(h.connector.attempts().len(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_closes_socket_cleanly() {
        let h = Harness::new(MockConnector::new());
        h.client.connect().await.unwrap();
        let peer = h.connector.last_peer().unwrap();

        h.client.disconnect().await;
        assert_eq!(h.connector.live_sockets(), 0);
        assert_eq!(peer.client_close_code(), Some(1000));
    }

    #[tokio::test]
    async fn test_stalled_close_is_aborted_after_grace() {
        let h = Harness::new(MockConnector::new());
        h.connector.stall_close(true);
        h.client.connect().await.unwrap();
        let peer = h.connector.last_peer().unwrap();

        let client = Arc::clone(&h.client);
        let disconnect = tokio::spawn(async move { client.disconnect().await });
        settle().await;
        assert!(!disconnect.is_finished());
        assert_eq!(peer.client_close_code(), Some(1000));
        assert_eq!(h.connector.live_sockets(), 1);

        h.advance(1999).await;
        assert!(!disconnect.is_finished());
        h.advance(1).await;
        disconnect.await.unwrap();
        assert_eq!(h.client.state(), ConnectionState::Disconnected);
        assert_eq!(h.connector.live_sockets(), 0);
    }

    #[tokio::test]
    async fn test_send_while_disconnected_is_rejected() {
        let h = Harness::new(MockConnector::new());
        let result = h.client.send("message", json!({ "sender": "ana", "content": "hi" }));

        assert_eq!(
            result,
            Err(NetError::SendWhileDisconnected {
                event: "message".into()
            })
        );
        assert_eq!(h.client.router().last_rejected_send().as_deref(), Some("message"));
        assert!(h.connector.peers().is_empty());
        assert_eq!(h.client.stats().frames_out, 0);
    }

    #[tokio::test]
    async fn test_send_writes_wire_frame() {
        let h = Harness::new(MockConnector::new());
        h.client.connect().await.unwrap();

        h.client.send("move", json!({ "x": 3 })).unwrap();
        settle().await;

        let frames = h.connector.last_peer().unwrap().sent_frames();
        assert_eq!(frames.len(), 1);
        let frame: Value = serde_json::from_str(&frames[0]).unwrap();
        assert_eq!(frame["event"], "move");
        assert_eq!(frame["payload"], json!({ "x": 3 }));
        assert_eq!(frame["timestamp"], START_MS);
        assert_eq!(h.client.stats().frames_out, 1);
    }

    #[tokio::test]
    async fn test_same_id_delivered_once() {
        let h = Harness::new(MockConnector::new());
        let messages = h.record("message");
        h.client.connect().await.unwrap();
        let peer = h.connector.last_peer().unwrap();

        let payload = json!({ "id": "x", "sender": "ana", "content": "hi" });
        peer.push_event("message", payload.clone());
        peer.push_event("message", payload);
        settle().await;

        let delivered = messages.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0]["id"], "x");
        assert_eq!(delivered[0]["timestamp"], START_MS);
        assert_eq!(h.client.stats().duplicates_dropped, 1);
    }

    #[tokio::test]
    async fn test_content_window_boundary() {
        let h = Harness::new(MockConnector::new());
        let messages = h.record("message");
        h.client.connect().await.unwrap();
        let peer = h.connector.last_peer().unwrap();

        let at = |ts: u64| json!({ "sender": "ana", "content": "gg", "timestamp": ts });
        peer.push_event("message", at(START_MS));
        peer.push_event("message", at(START_MS + 2999));
        settle().await;
        assert_eq!(messages.lock().unwrap().len(), 1);

        // Exactly one window apart is no longer the same message.
        peer.push_event("message", at(START_MS + 3000));
        settle().await;
        assert_eq!(messages.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_different_senders_both_delivered() {
        let h = Harness::new(MockConnector::new());
        let messages = h.record("message");
        h.client.connect().await.unwrap();
        let peer = h.connector.last_peer().unwrap();

        peer.push_event("message", json!({ "sender": "ana", "content": "gg" }));
        peer.push_event("message", json!({ "sender": "bo", "content": "gg" }));
        settle().await;

        let delivered = messages.lock().unwrap();
        assert_eq!(delivered.len(), 2);
        assert_ne!(delivered[0]["id"], delivered[1]["id"]);
    }

    #[tokio::test]
    async fn test_non_message_events_bypass_dedup() {
        let h = Harness::new(MockConnector::new());
        let moves = h.record("move");
        h.client.connect().await.unwrap();
        let peer = h.connector.last_peer().unwrap();

        peer.push_event("move", json!({ "x": 1 }));
        peer.push_event("move", json!({ "x": 1 }));
        settle().await;
        assert_eq!(*moves.lock().unwrap(), vec![json!({ "x": 1 }), json!({ "x": 1 })]);
    }

    #[tokio::test]
    async fn test_optimistic_send_echo_is_suppressed() {
        let h = Harness::new(MockConnector::new());
        let messages = h.record("message");
        h.client.connect().await.unwrap();
        let peer = h.connector.last_peer().unwrap();

        h.client
            .send("message", json!({ "sender": "me", "content": "hello" }))
            .unwrap();
        settle().await;

        let frame: Value = serde_json::from_str(&peer.sent_frames()[0]).unwrap();
        assert!(frame["payload"]["id"].is_string());
        peer.push_event("message", frame["payload"].clone());
        settle().await;
        assert!(messages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_decode_error_drops_frame_only() {
        let h = Harness::new(MockConnector::new());
        let messages = h.record("message");
        h.client.connect().await.unwrap();
        let peer = h.connector.last_peer().unwrap();

        peer.push_text("not json");
        peer.push_text(r#"{"payload": 1}"#);
        peer.push_event("message", json!({ "oops": true }));
        peer.push_event("message", json!({ "sender": "ana", "content": "still here" }));
        settle().await;

        assert_eq!(h.client.state(), ConnectionState::Connected);
        assert_eq!(messages.lock().unwrap().len(), 1);
        assert_eq!(h.client.stats().decode_failures, 3);
    }

    #[tokio::test]
    async fn test_reprobes_after_two_failures() {
        let connector = MockConnector::with_default(Handshake::Accept);
        connector.set_behavior(PRIMARY, Handshake::Refuse);
        let h = Harness::new(connector);

        assert!(h.client.connect().await.is_err());
        settle().await;
        h.advance(2000).await;
        assert_eq!(h.client.state(), ConnectionState::Reconnecting);
        h.advance(3000).await;

        assert_eq!(h.client.state(), ConnectionState::Connected);
        assert_eq!(
            h.connector.attempts(),
            vec![PRIMARY, PRIMARY, PRIMARY, BACKUP, BACKUP]
        );
        assert_eq!(h.connector.last_peer().unwrap().endpoint(), BACKUP);
        assert_eq!(h.connector.live_sockets(), 1);
        assert_eq!(h.connector.peak_live_sockets(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_during_reprobe_discards_its_result() {
        let connector = MockConnector::with_default(Handshake::Hang);
        connector.set_behavior(PRIMARY, Handshake::Refuse);
        let h = Harness::new(connector);

        assert!(h.client.connect().await.is_err());
        settle().await;
        h.advance(2000).await;
        h.advance(3000).await;
        // Probing: primary refused, backup still hanging.
        assert_eq!(h.client.state(), ConnectionState::Connecting);
        assert_eq!(h.connector.attempts(), vec![PRIMARY, PRIMARY, PRIMARY, BACKUP]);

        h.client.disconnect().await;
        assert_eq!(h.client.state(), ConnectionState::Disconnected);

        h.connector.set_behavior(BACKUP, Handshake::Accept);
        h.advance(10_000).await;
        assert_eq!(h.client.state(), ConnectionState::Disconnected);
        assert_eq!(h.connector.attempts().len(), 4);
        assert_eq!(h.connector.live_sockets(), 0);
        assert_eq!(h.connector.peak_live_sockets(), 0);
        assert_eq!(h.clock.pending_timers(), 0);
    }

    #[tokio::test]
    async fn test_never_more_than_one_live_socket() {
        let h = Harness::new(MockConnector::new());
        for _ in 0..5 {
            h.client.connect().await.unwrap();
            h.connector.last_peer().unwrap().close(1006);
            settle().await;
            h.client.connect().await.unwrap();
            h.client.disconnect().await;
        }
        settle().await;
        assert_eq!(h.connector.peak_live_sockets(), 1);
        assert_eq!(h.connector.live_sockets(), 0);
    }

    #[tokio::test]
    async fn test_notifier_sees_lifecycle() {
        let h = Harness::new(MockConnector::new());
        h.client.connect().await.unwrap();
        h.connector.last_peer().unwrap().close(1000);
        settle().await;

        assert_eq!(
            *h.notices.lock().unwrap(),
            vec![
                Notice::Connected {
                    endpoint: PRIMARY.into()
                },
                Notice::Disconnected {
                    reason: "server".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_unsubscribed_handler_stops_receiving() {
        let h = Harness::new(MockConnector::new());
        let seen = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&seen);
        let sub = h.client.on("move", move |_: &Value| *sink.lock().unwrap() += 1);
        h.client.connect().await.unwrap();
        let peer = h.connector.last_peer().unwrap();

        peer.push_event("move", json!(1));
        settle().await;
        assert!(h.client.off(&sub));
        assert!(!h.client.off(&sub));
        peer.push_event("move", json!(2));
        settle().await;
        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_drop_stops_driver_and_closes_socket() {
        let h = Harness::new(MockConnector::new());
        h.client.connect().await.unwrap();
        assert_eq!(h.connector.live_sockets(), 1);

        let Harness {
            client, connector, ..
        } = h;
        drop(client);
        settle().await;
        assert_eq!(connector.live_sockets(), 0);
    }

    #[tokio::test]
    async fn test_invalid_config_fails_to_start() {
        let config = SyncConfig {
            base_url: "not a url".into(),
            ..test_config()
        };
        let result = SyncClient::start(
            config,
            MockConnector::new(),
            Arc::new(ManualClock::new(0)),
            Arc::new(LogNotifier),
        );
        assert!(matches!(result, Err(NetError::InvalidEndpoint { .. })));
    }
}
