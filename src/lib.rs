//! rust-balancer: Load-balancing outbound group for proxy routers
//!
//! This crate provides an outbound group that spreads connections over a
//! set of member outbounds, with bounded failover when a member fails.
//!
//! # Features
//!
//! - **Bounded Failover**: Up to five attempts per request, each on a fresh pick
//! - **Pluggable Strategies**: Selection and health tracking behind a `Strategy` trait
//! - **Connection Hand-off**: Already accepted connections go straight to a member
//! - **Static Providers**: Explicit member lists resolved from the outbound registry
//! - **Connection Management**: Backpressure, statistics, and graceful shutdown
//!
//! # Architecture
//!
//! ```text
//! Request → LoadBalanceGroup → Strategy::pick → Outbound → Destination
//!                 ↑                                 │
//!                 └──── report_failure (retry) ─────┘
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use rust_balancer::config::load_config;
//! use rust_balancer::connection::RelayConnectionManager;
//! use rust_balancer::group::{GroupDeps, GroupRegistry};
//! use rust_balancer::outbound::OutboundManagerBuilder;
//! use rust_balancer::provider::ProviderManager;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Load configuration
//! let config = load_config("/etc/rust-balancer/config.json")?;
//!
//! // Create outbound manager
//! let mut builder = OutboundManagerBuilder::new();
//! builder.add_all_from_config(&config.outbounds);
//! let outbounds = Arc::new(builder.build());
//!
//! // Build and start groups
//! let deps = GroupDeps::new(
//!     outbounds,
//!     Arc::new(ProviderManager::new()),
//!     Arc::new(RelayConnectionManager::new(&config.connection)),
//! );
//! for group in GroupRegistry::with_defaults().create_all(&config.groups, &deps)? {
//!     group.start().await?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`adapter`]: Networks, destinations and connection abstractions
//! - [`balancer`]: Selection strategies and health tracking
//! - [`config`]: Configuration types and loading
//! - [`connection`]: Connection manager and statistics
//! - [`context`]: Per-request cancellation context
//! - [`error`]: Error types
//! - [`group`]: Outbound groups and their registry
//! - [`outbound`]: Outbound implementations
//! - [`provider`]: Membership providers

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod adapter;
pub mod balancer;
pub mod config;
pub mod connection;
pub mod context;
pub mod error;
pub mod group;
pub mod outbound;
pub mod provider;

// Re-export commonly used types at the crate root
pub use adapter::{Destination, InboundContext, Network};
pub use balancer::{Balancer, BalancerFactory, Strategy, StrategyContext, StrategyFactory};
pub use config::{Config, GroupConfig, OutboundConfig, StrategyConfig};
pub use connection::{ConnectionManager, ConnectionStats, RelayConnectionManager};
pub use context::RequestContext;
pub use error::{
    BalancerError, ConfigError, ConnectionError, GroupError, OutboundError, ProviderError,
    StrategyError,
};
pub use group::{GroupDeps, GroupRegistry, LoadBalanceGroup, OutboundGroup, TYPE_LOAD_BALANCE};
pub use outbound::{BlockOutbound, DirectOutbound, Outbound, OutboundManager};
pub use provider::{MemoryProvider, Provider, ProviderManager};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
