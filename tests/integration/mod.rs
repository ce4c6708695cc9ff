//! Integration tests for rust-balancer
//!
//! # Test Organization
//!
//! - `common`: Mock outbounds, a scripted strategy and a recording connection manager
//! - `dispatch`: Bounded retry dispatch for dial and packet listen
//! - `handoff`: Hand-off of already accepted connections
//! - `lifecycle`: Group start / close and membership resolution
//! - `e2e`: Configuration to running groups over loopback sockets
//!
//! # Test Requirements
//!
//! - Tests only use loopback sockets and don't require network access

pub mod dispatch;
pub mod e2e;
pub mod handoff;
pub mod lifecycle;
