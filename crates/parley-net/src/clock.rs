//! Time source used by every timing-dependent component.
//!
//! [`SystemClock`] reads wall-clock time and sleeps on the tokio timer.
//! [`ManualClock`] only moves when told to, so reconnection delays, handshake
//! timeouts and dedup expiry can be driven step by step.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::oneshot;

/// Boxed timer future returned by [`Clock::sleep`].
pub type Sleep = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Abstraction over "now" and delayed execution.
pub trait Clock: Send + Sync + 'static {
    /// Current time as Unix epoch milliseconds.
    fn now_ms(&self) -> u64;

    /// Future that completes once `duration` has elapsed on this clock.
    fn sleep(&self, duration: Duration) -> Sleep;
}

/// Wall clock backed by [`SystemTime`] and [`tokio::time::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    fn sleep(&self, duration: Duration) -> Sleep {
        Box::pin(tokio::time::sleep(duration))
    }
}

struct PendingTimer {
    deadline_ms: u64,
    wake: oneshot::Sender<()>,
}

struct ManualInner {
    now_ms: u64,
    timers: Vec<PendingTimer>,
}

/// Clock that advances only through [`ManualClock::advance`].
///
/// Sleeps register a deadline and complete when the clock is advanced past
/// it. Dropping a sleep future cancels its timer.
pub struct ManualClock {
    inner: Mutex<ManualInner>,
}

impl ManualClock {
    /// Create a clock reading `start_ms`.
    pub fn new(start_ms: u64) -> Self {
        Self {
            inner: Mutex::new(ManualInner {
                now_ms: start_ms,
                timers: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ManualInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move time forward, completing every sleep whose deadline is reached.
    /// Timers whose sleep was dropped are discarded.
    pub fn advance(&self, by: Duration) {
        let mut inner = self.lock();
        inner.now_ms += by.as_millis() as u64;
        let now = inner.now_ms;
        inner.timers.retain(|t| !t.wake.is_closed());

        let (mut due, waiting): (Vec<_>, Vec<_>) = inner
            .timers
            .drain(..)
            .partition(|t| t.deadline_ms <= now);
        inner.timers = waiting;
        drop(inner);

        due.sort_by_key(|t| t.deadline_ms);
        for timer in due {
            let _ = timer.wake.send(());
        }
    }

    /// Number of sleeps still waiting on a future deadline.
    pub fn pending_timers(&self) -> usize {
        self.lock()
            .timers
            .iter()
            .filter(|t| !t.wake.is_closed())
            .count()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.lock().now_ms
    }

    fn sleep(&self, duration: Duration) -> Sleep {
        let (tx, rx) = oneshot::channel();
        {
            let mut inner = self.lock();
            if duration.is_zero() {
                let _ = tx.send(());
            } else {
                let deadline_ms = inner.now_ms + duration.as_millis() as u64;
                inner.timers.push(PendingTimer {
                    deadline_ms,
                    wake: tx,
                });
            }
        }
        Box::pin(async move {
            let _ = rx.await;
        })
    }
}
