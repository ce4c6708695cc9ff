//! Connection handling module
//!
//! This module provides the connection manager boundary used by hand-off
//! paths, including:
//! - The `ConnectionManager` trait and `CloseHandler` callback
//! - `ErrorDialer`, the sentinel upstream for connections with no candidate
//! - `RelayConnectionManager`, a relaying implementation with backpressure
//! - Statistics collection

mod handler;
mod manager;
mod stats;

pub use handler::{close_handler, noop_close_handler, CloseHandler, ConnectionManager, ErrorDialer};
pub use manager::RelayConnectionManager;
pub use stats::{ConnectionStats, OutboundStats, StatsSnapshot};
