//! Event routing: fan inbound events out to named subscribers and route
//! outbound sends through the connection.
//!
//! Handlers are keyed by event name. A handler that panics is logged and
//! skipped; the remaining handlers for the same event still run.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::Value;

use crate::error::NetError;

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// Receives the payload of one event type.
pub trait EventHandler: Send + Sync {
    /// Handle one event payload.
    fn handle(&self, data: &Value);
}

/// Blanket implementation for closures.
impl<F> EventHandler for F
where
    F: Fn(&Value) + Send + Sync,
{
    fn handle(&self, data: &Value) {
        self(data);
    }
}

/// Identifies one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Handle returned by [`EventRouter::on`]. The handler stays registered
/// while the handle lives; dropping it unregisters. Call
/// [`detach`](Self::detach) to keep the handler for the router's lifetime.
#[derive(Debug)]
#[must_use = "dropping a Subscription unregisters its handler"]
pub struct Subscription {
    router: Weak<EventRouter>,
    event: String,
    id: SubscriptionId,
}

impl Subscription {
    /// Registration id.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Event name this subscription listens to.
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Remove the handler. Returns `false` if it was already gone.
    pub fn unsubscribe(&self) -> bool {
        self.router
            .upgrade()
            .is_some_and(|router| router.off(&self.event, self.id))
    }

    /// Give up the handle without unregistering.
    pub fn detach(mut self) -> SubscriptionId {
        self.router = Weak::new();
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Path from the router to the live connection.
pub trait Outbound: Send + Sync {
    /// Queue `payload` under `event` for the server.
    fn send_event(&self, event: &str, payload: Value) -> Result<(), NetError>;
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

type HandlerList = Vec<(SubscriptionId, Arc<dyn EventHandler>)>;

/// Maps event names to handlers and forwards sends to an [`Outbound`].
pub struct EventRouter {
    handlers: Mutex<HashMap<String, HandlerList>>,
    next_id: AtomicU64,
    outbound: Option<Arc<dyn Outbound>>,
    last_rejected: Mutex<Option<String>>,
}

impl std::fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRouter")
            .field("events", &self.lock_handlers().len())
            .field("has_outbound", &self.outbound.is_some())
            .finish()
    }
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRouter {
    /// Router with no outbound path; every [`send`](Self::send) is rejected.
    pub fn new() -> Self {
        Self {
            handlers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            outbound: None,
            last_rejected: Mutex::new(None),
        }
    }

    /// Router that forwards sends to `outbound`.
    pub fn with_outbound(outbound: Arc<dyn Outbound>) -> Self {
        Self {
            outbound: Some(outbound),
            ..Self::new()
        }
    }

    fn lock_handlers(&self) -> MutexGuard<'_, HashMap<String, HandlerList>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `handler` for `event`. Handlers for one event run in
    /// registration order.
    pub fn on<H: EventHandler + 'static>(self: &Arc<Self>, event: &str, handler: H) -> Subscription {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock_handlers()
            .entry(event.to_string())
            .or_default()
            .push((id, Arc::new(handler)));
        Subscription {
            router: Arc::downgrade(self),
            event: event.to_string(),
            id,
        }
    }

    /// Remove a registration. Removing one that is already gone is a no-op
    /// returning `false`.
    pub fn off(&self, event: &str, id: SubscriptionId) -> bool {
        let removed: HandlerList = {
            let mut handlers = self.lock_handlers();
            let Some(list) = handlers.get_mut(event) else {
                return false;
            };
            let (removed, kept): (HandlerList, HandlerList) = std::mem::take(list)
                .into_iter()
                .partition(|(existing, _)| *existing == id);
            *list = kept;
            if list.is_empty() {
                handlers.remove(event);
            }
            removed
        };
        // Dropped outside the lock: a handler may own its own Subscription.
        !removed.is_empty()
    }

    /// Invoke every handler registered for `event` with `data`. Returns how
    /// many handlers ran to completion.
    pub fn emit(&self, event: &str, data: &Value) -> usize {
        // Snapshot so handlers may subscribe or unsubscribe while running.
        let snapshot: Vec<Arc<dyn EventHandler>> = match self.lock_handlers().get(event) {
            Some(list) => list.iter().map(|(_, h)| Arc::clone(h)).collect(),
            None => return 0,
        };

        let mut completed = 0;
        for handler in snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler.handle(data))) {
                Ok(()) => completed += 1,
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| (*s).to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "non-string panic".to_string());
                    tracing::error!(event, panic = %message, "Event handler panicked");
                }
            }
        }
        completed
    }

    /// Send `payload` under `event` through the outbound path.
    ///
    /// Fails with [`NetError::SendWhileDisconnected`] when no connection is
    /// up; the rejected event name is kept for [`last_rejected_send`](Self::last_rejected_send).
    pub fn send(&self, event: &str, payload: Value) -> Result<(), NetError> {
        let result = match &self.outbound {
            Some(outbound) => outbound.send_event(event, payload),
            None => Err(NetError::SendWhileDisconnected {
                event: event.to_string(),
            }),
        };
        if let Err(NetError::SendWhileDisconnected { .. }) = &result {
            tracing::warn!(event, "Send rejected: not connected");
            *self
                .last_rejected
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(event.to_string());
        }
        result
    }

    /// Event name of the most recent send rejected for lack of a connection.
    pub fn last_rejected_send(&self) -> Option<String> {
        self.last_rejected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
