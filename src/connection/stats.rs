//! Relay and outbound counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Counters kept by the relay connection manager
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Connections and packet sessions handed to the manager
    accepted: AtomicU64,
    /// Currently relaying
    active: AtomicU64,
    /// Finished without error
    completed: AtomicU64,
    /// Finished with a dial or transfer error
    errored: AtomicU64,
    /// Refused because the limit was reached
    rejected: AtomicU64,
    /// Bytes client -> upstream
    bytes_up: AtomicU64,
    /// Bytes upstream -> client
    bytes_down: AtomicU64,
}

impl ConnectionStats {
    /// Create zeroed counters
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a connection entering the relay
    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a relay that finished cleanly
    pub fn record_completed(&self, bytes_up: u64, bytes_down: u64) {
        self.active.fetch_sub(1, Ordering::Relaxed);
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.bytes_up.fetch_add(bytes_up, Ordering::Relaxed);
        self.bytes_down.fetch_add(bytes_down, Ordering::Relaxed);
    }

    /// Record a relay that failed
    pub fn record_error(&self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
        self.errored.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection refused at the limit
    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Currently relaying
    #[must_use]
    pub fn active(&self) -> u64 {
        self.active.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all counters
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            active: self.active(),
            completed: self.completed.load(Ordering::Relaxed),
            errored: self.errored.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            bytes_up: self.bytes_up.load(Ordering::Relaxed),
            bytes_down: self.bytes_down.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of `ConnectionStats`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub accepted: u64,
    pub active: u64,
    pub completed: u64,
    pub errored: u64,
    pub rejected: u64,
    pub bytes_up: u64,
    pub bytes_down: u64,
}

impl StatsSnapshot {
    /// Total bytes relayed in both directions
    #[must_use]
    pub const fn total_bytes(&self) -> u64 {
        self.bytes_up + self.bytes_down
    }
}

/// Per-outbound attempt counters
#[derive(Debug, Default)]
pub struct OutboundStats {
    connections: AtomicU64,
    errors: AtomicU64,
}

impl OutboundStats {
    /// Create zeroed counters
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a dial or listen attempt
    pub fn record_connection(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed attempt
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Total attempts
    #[must_use]
    pub fn connections(&self) -> u64 {
        self.connections.load(Ordering::Relaxed)
    }

    /// Failed attempts
    #[must_use]
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}
