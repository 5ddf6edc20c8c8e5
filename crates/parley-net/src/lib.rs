//! Realtime sync core: connection lifecycle with reconnection and endpoint
//! probing, duplicate suppression for chat events, and event routing.

pub mod client;
pub mod clock;
pub mod connection;
pub mod dedup;
pub mod endpoint;
pub mod error;
pub mod notify;
pub mod prober;
pub mod reconnection;
pub mod routing;
pub mod stats;
pub mod transport;
pub mod wire;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::SyncClient;
pub use clock::{Clock, ManualClock, SystemClock};
pub use connection::{ConnectionState, ConnectionStateWatch, SyncConfig, events};
pub use dedup::{DedupConfig, MessageDeduplicator};
pub use endpoint::Endpoint;
pub use error::{ErrorInfo, NetError};
pub use notify::{LogNotifier, Notice, NoticeLevel, Notifier};
pub use prober::EndpointProber;
pub use reconnection::{ReconnectPolicy, ReconnectScheduler, ScheduleOutcome};
pub use routing::{EventHandler, EventRouter, Subscription, SubscriptionId};
pub use stats::StatsSnapshot;
pub use transport::{Connector, Socket, WsConnector};
pub use wire::{ChatMessage, InboundEvent, WireMessage};
