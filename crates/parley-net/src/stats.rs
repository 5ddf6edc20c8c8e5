//! Per-client link counters.
//!
//! Counters are relaxed atomics bumped by the driver task and read from any
//! thread through [`LinkStats::snapshot`].

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Live counters for one client.
#[derive(Debug, Default)]
pub struct LinkStats {
    frames_in: AtomicU64,
    frames_out: AtomicU64,
    duplicates_dropped: AtomicU64,
    decode_failures: AtomicU64,
    reconnect_attempts: AtomicU64,
    connects: AtomicU64,
}

/// Point-in-time copy of [`LinkStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Frames received.
    pub frames_in: u64,
    /// Frames written.
    pub frames_out: u64,
    /// Chat events dropped as duplicates.
    pub duplicates_dropped: u64,
    /// Inbound frames that failed to decode.
    pub decode_failures: u64,
    /// Reconnection attempts scheduled.
    pub reconnect_attempts: u64,
    /// Successful connections.
    pub connects: u64,
}

impl LinkStats {
    pub(crate) fn frame_in(&self) {
        self.frames_in.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn frame_out(&self) {
        self.frames_out.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn duplicate(&self) {
        self.duplicates_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn reconnect_attempt(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn connected(&self) {
        self.connects.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy out the current values.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_in: self.frames_in.load(Ordering::Relaxed),
            frames_out: self.frames_out.load(Ordering::Relaxed),
            duplicates_dropped: self.duplicates_dropped.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
            connects: self.connects.load(Ordering::Relaxed),
        }
    }
}
