//! Duplicate suppression for chat-class events.
//!
//! A message is a duplicate when
//! 1. its id is already remembered, or
//! 2. a remembered message has the same `(sender, content)` and a timestamp
//!    less than `content_window` away from it.
//!
//! Entries expire `ttl` after they were remembered (measured on the injected
//! clock, independent of traffic) and the table is hard-capped: when it
//! grows past `max_entries` the oldest half is dropped.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rand::distr::Alphanumeric;

use crate::clock::Clock;
use crate::wire::ChatMessage;

/// Dedup table limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupConfig {
    /// Lifetime of an entry after it is remembered. Default: 5 s.
    pub ttl: Duration,
    /// Timestamp distance under which same sender+content collapses. Default: 3 s.
    pub content_window: Duration,
    /// Hard cap on remembered entries. Default: 1000.
    pub max_entries: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_millis(5000),
            content_window: Duration::from_millis(3000),
            max_entries: 1000,
        }
    }
}

/// One remembered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupEntry {
    /// Message id (possibly synthesized).
    pub id: String,
    /// Sender.
    pub sender: String,
    /// Body.
    pub content: String,
    /// Message timestamp, epoch ms.
    pub timestamp: u64,
    /// Local clock reading when remembered, epoch ms.
    pub last_seen: u64,
}

/// Generate an id that is unique in practice: `<timestamp>-<random suffix>`.
pub fn synthesize_id(timestamp: u64) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();
    format!("{timestamp}-{suffix}")
}

/// Time-windowed duplicate filter. Owns its table exclusively.
pub struct MessageDeduplicator {
    config: DedupConfig,
    clock: Arc<dyn Clock>,
    entries: HashMap<String, DedupEntry>,
    /// Ids in remember order, oldest first.
    order: VecDeque<String>,
}

impl MessageDeduplicator {
    /// Create an empty filter.
    pub fn new(config: DedupConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Give `message` an id if it has none.
    pub fn ensure_id(&self, message: &mut ChatMessage) {
        if message.id.is_none() {
            let ts = message.timestamp.unwrap_or_else(|| self.clock.now_ms());
            message.id = Some(synthesize_id(ts));
        }
    }

    fn is_live(&self, entry: &DedupEntry, now: u64) -> bool {
        now.saturating_sub(entry.last_seen) <= self.config.ttl.as_millis() as u64
    }

    /// Whether `message` duplicates a live remembered entry.
    pub fn is_duplicate(&self, message: &ChatMessage) -> bool {
        let now = self.clock.now_ms();

        if let Some(entry) = message.id.as_ref().and_then(|id| self.entries.get(id))
            && self.is_live(entry, now)
        {
            return true;
        }

        let ts = message.timestamp.unwrap_or(now);
        let window = self.config.content_window.as_millis() as u64;
        self.entries.values().any(|entry| {
            self.is_live(entry, now)
                && entry.sender == message.sender
                && entry.content == message.content
                && entry.timestamp.abs_diff(ts) < window
        })
    }

    /// Record `message`. Expired entries are swept first, and the table is
    /// halved if it grows past the cap.
    pub fn remember(&mut self, message: &ChatMessage) {
        let now = self.clock.now_ms();
        self.sweep(now);

        let id = match &message.id {
            Some(id) => id.clone(),
            None => synthesize_id(message.timestamp.unwrap_or(now)),
        };
        if self.entries.contains_key(&id) {
            self.order.retain(|existing| existing != &id);
        }
        self.entries.insert(
            id.clone(),
            DedupEntry {
                id: id.clone(),
                sender: message.sender.clone(),
                content: message.content.clone(),
                timestamp: message.timestamp.unwrap_or(now),
                last_seen: now,
            },
        );
        self.order.push_back(id);

        if self.entries.len() > self.config.max_entries {
            let evict = self.entries.len() / 2;
            for _ in 0..evict {
                if let Some(oldest) = self.order.pop_front() {
                    self.entries.remove(&oldest);
                }
            }
            tracing::debug!(evicted = evict, "Dedup table over capacity, evicted oldest half");
        }
    }

    /// Assign an id if missing, then return `true` and remember the message
    /// if it should be delivered, `false` if it is a duplicate.
    pub fn admit(&mut self, message: &mut ChatMessage) -> bool {
        self.ensure_id(message);
        if self.is_duplicate(message) {
            return false;
        }
        self.remember(message);
        true
    }

    fn sweep(&mut self, now: u64) {
        while let Some(oldest) = self.order.front() {
            match self.entries.get(oldest) {
                Some(entry) if self.is_live(entry, now) => break,
                _ => {
                    if let Some(id) = self.order.pop_front() {
                        self.entries.remove(&id);
                    }
                }
            }
        }
    }

    /// Number of remembered entries, including ones awaiting the next sweep.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is remembered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
