//! Member health tracking
//!
//! Failure reports from the dispatcher are counted per member tag.
//!
//! # Health State Machine
//!
//! ```text
//! Healthy ──[max_failures consecutive failures]──> Deprioritized
//!    ^                                                  │
//!    └────────────[failure cooldown elapsed]────────────┘
//! ```
//!
//! Failures count as consecutive while each one follows the previous within
//! the cooldown; a failure arriving after a longer quiet period starts a new
//! run at one.
//!
//! Recovery happens lazily on lookup and in bulk through
//! `HealthTracker::recover_expired`, which the balancer's background task
//! calls on every check interval.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::time::Instant;

/// Health state values
const STATE_HEALTHY: u8 = 0;
const STATE_DEPRIORITIZED: u8 = 1;

/// Health statistics for a member
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthStats {
    /// Current consecutive failure count
    pub consecutive_failures: u32,
    /// Total failure reports
    pub total_failures: u64,
    /// Whether the member is currently in rotation
    pub is_healthy: bool,
    /// Number of times the member was deprioritized
    pub deprioritized_transitions: u64,
}

/// Health state of one member
#[derive(Debug)]
struct MemberHealth {
    state: AtomicU8,
    consecutive_failures: AtomicU32,
    total_failures: AtomicU64,
    deprioritized_transitions: AtomicU64,
    deprioritized_at: RwLock<Option<Instant>>,
    last_failure_at: RwLock<Option<Instant>>,
}

impl MemberHealth {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(STATE_HEALTHY),
            consecutive_failures: AtomicU32::new(0),
            total_failures: AtomicU64::new(0),
            deprioritized_transitions: AtomicU64::new(0),
            deprioritized_at: RwLock::new(None),
            last_failure_at: RwLock::new(None),
        }
    }

    fn is_deprioritized(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_DEPRIORITIZED
    }

    fn cooldown_elapsed(&self, cooldown: Duration) -> bool {
        self.deprioritized_at
            .read()
            .map_or(true, |at| at.elapsed() >= cooldown)
    }

    /// Returns true if the member left the deprioritized state
    fn try_recover(&self, cooldown: Duration) -> bool {
        if !self.is_deprioritized() || !self.cooldown_elapsed(cooldown) {
            return false;
        }
        if self
            .state
            .compare_exchange(
                STATE_DEPRIORITIZED,
                STATE_HEALTHY,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            self.consecutive_failures.store(0, Ordering::Release);
            *self.deprioritized_at.write() = None;
            return true;
        }
        false
    }

    fn stats(&self) -> HealthStats {
        HealthStats {
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
            is_healthy: !self.is_deprioritized(),
            deprioritized_transitions: self.deprioritized_transitions.load(Ordering::Relaxed),
        }
    }
}

/// Tracks consecutive failures per member tag
///
/// Thread-safe; `record_failure` and `is_healthy` may be called from any
/// number of concurrent dispatches.
#[derive(Debug)]
pub struct HealthTracker {
    members: DashMap<String, MemberHealth>,
    max_failures: u32,
    cooldown: Duration,
}

impl HealthTracker {
    /// Create a tracker
    #[must_use]
    pub fn new(max_failures: u32, cooldown: Duration) -> Self {
        Self {
            members: DashMap::new(),
            max_failures: max_failures.max(1),
            cooldown,
        }
    }

    /// Record a failed attempt through `tag`.
    ///
    /// Returns true if this failure moved the member out of rotation.
    pub fn record_failure(&self, tag: &str) -> bool {
        let entry = self
            .members
            .entry(tag.to_string())
            .or_insert_with(MemberHealth::new);

        entry.total_failures.fetch_add(1, Ordering::Relaxed);

        let now = Instant::now();
        let quiet = entry
            .last_failure_at
            .write()
            .replace(now)
            .is_some_and(|at| now.duration_since(at) > self.cooldown);
        if quiet && !entry.is_deprioritized() {
            entry.consecutive_failures.store(0, Ordering::Release);
        }

        let failures = entry.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;

        if failures >= self.max_failures
            && entry
                .state
                .compare_exchange(
                    STATE_HEALTHY,
                    STATE_DEPRIORITIZED,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
        {
            *entry.deprioritized_at.write() = Some(Instant::now());
            entry.deprioritized_transitions.fetch_add(1, Ordering::Relaxed);
            return true;
        }
        false
    }

    /// Whether `tag` is in rotation; members never reported are healthy
    #[must_use]
    pub fn is_healthy(&self, tag: &str) -> bool {
        match self.members.get(tag) {
            Some(entry) => !entry.is_deprioritized() || entry.try_recover(self.cooldown),
            None => true,
        }
    }

    /// Put every member whose cooldown elapsed back into rotation.
    ///
    /// Returns the recovered tags.
    pub fn recover_expired(&self) -> Vec<String> {
        self.members
            .iter()
            .filter(|entry| entry.value().try_recover(self.cooldown))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Forget all failures of `tag`
    pub fn reset(&self, tag: &str) {
        self.members.remove(tag);
    }

    /// Forget every member's failures, putting all of them back into rotation
    pub fn reset_all(&self) {
        self.members.clear();
    }

    /// Health statistics of `tag`
    #[must_use]
    pub fn stats(&self, tag: &str) -> HealthStats {
        self.members.get(tag).map_or(
            HealthStats {
                is_healthy: true,
                ..HealthStats::default()
            },
            |entry| entry.stats(),
        )
    }

    /// Number of members currently out of rotation
    #[must_use]
    pub fn deprioritized_count(&self) -> usize {
        self.members
            .iter()
            .filter(|entry| entry.value().is_deprioritized())
            .count()
    }
}
