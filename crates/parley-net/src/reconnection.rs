//! Reconnection backoff policy and scheduler.
//!
//! [`ReconnectPolicy::delay`] is a pure function of the attempt number:
//! `min(base_delay * multiplier^(n-1), max_delay)`. [`ReconnectScheduler`]
//! counts consecutive attempts, arms a single timer per attempt on the
//! injected clock, and reports exhaustion once `max_attempts` is exceeded.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;

use crate::clock::Clock;

/// Backoff configuration for automatic reconnection.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnection attempt. Default: 2 s.
    pub base_delay: Duration,
    /// Factor applied per further attempt. Values below 1.0 are treated as 1.0.
    /// Default: 1.5.
    pub multiplier: f64,
    /// Upper bound on any delay. Default: 30 s.
    pub max_delay: Duration,
    /// Attempts allowed before giving up. Default: 10.
    pub max_attempts: u32,
    /// Jitter fraction (0.0–1.0) applied as ±jitter. Default: 0.0.
    pub jitter: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            multiplier: 1.5,
            max_delay: Duration::from_secs(30),
            max_attempts: 10,
            jitter: 0.0,
        }
    }
}

impl ReconnectPolicy {
    /// Backoff delay for attempt `attempt` (1-based), without jitter.
    /// Attempt 0 yields zero.
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let max_ms = self.max_delay.as_millis() as f64;
        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let ms = self.base_delay.as_millis() as f64 * self.multiplier.max(1.0).powi(exponent);

        if !ms.is_finite() || ms >= max_ms {
            self.max_delay
        } else {
            Duration::from_millis(ms.round() as u64)
        }
    }

    /// [`ReconnectPolicy::delay`] with jitter applied, still capped at
    /// `max_delay`.
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let base = self.delay(attempt);
        let jitter = self.jitter.clamp(0.0, 1.0);
        if jitter == 0.0 {
            return base;
        }
        let factor = rand::rng().random_range((1.0 - jitter)..=(1.0 + jitter));
        base.mul_f64(factor).min(self.max_delay)
    }
}

/// Result of [`ReconnectScheduler::schedule_next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// A timer is armed for this attempt.
    Scheduled {
        /// 1-based attempt number.
        attempt: u32,
        /// Delay until the attempt fires.
        delay: Duration,
    },
    /// `max_attempts` was exceeded; nothing was scheduled.
    Exhausted {
        /// Attempts that were made.
        attempts: u32,
    },
}

/// Tracks consecutive reconnection attempts and owns the pending timer.
pub struct ReconnectScheduler {
    policy: ReconnectPolicy,
    clock: Arc<dyn Clock>,
    attempts: u32,
    pending: Option<JoinHandle<()>>,
}

impl ReconnectScheduler {
    /// Create a scheduler with zero attempts recorded.
    pub fn new(policy: ReconnectPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy,
            clock,
            attempts: 0,
            pending: None,
        }
    }

    /// Count one more attempt and arm a timer that runs `on_fire` after the
    /// backoff delay. Any previously pending timer is cancelled first.
    ///
    /// Once `max_attempts` is exceeded this returns
    /// [`ScheduleOutcome::Exhausted`] on every call until [`reset`](Self::reset).
    pub fn schedule_next<F>(&mut self, on_fire: F) -> ScheduleOutcome
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();

        if self.attempts >= self.policy.max_attempts {
            return ScheduleOutcome::Exhausted {
                attempts: self.policy.max_attempts,
            };
        }
        self.attempts += 1;

        let delay = self.policy.jittered_delay(self.attempts);
        let sleep = self.clock.sleep(delay);
        self.pending = Some(tokio::spawn(async move {
            sleep.await;
            on_fire();
        }));

        ScheduleOutcome::Scheduled {
            attempt: self.attempts,
            delay,
        }
    }

    /// Cancel the pending timer, if any. Safe to call when nothing is pending.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    /// Cancel any pending timer and zero the attempt count.
    pub fn reset(&mut self) {
        self.cancel();
        self.attempts = 0;
    }

    /// Attempts counted since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether a timer is armed and has not fired yet.
    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for ReconnectScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
