//! Outbound module
//!
//! This module provides the `Outbound` abstraction, the optional hand-off
//! capabilities, the outbound registry and two concrete outbounds.
//!
//! # Outbound Types
//!
//! - `DirectOutbound`: Connect directly to the destination, optionally through
//!   a specific interface or with a routing mark.
//! - `BlockOutbound`: Refuse all connections.
//!
//! Load-balancing groups implement `Outbound` as well, see [`crate::group`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rust_balancer::adapter::{Destination, Network};
//! use rust_balancer::context::RequestContext;
//! use rust_balancer::outbound::{DirectOutbound, BlockOutbound, OutboundManager, Outbound};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = OutboundManager::new();
//! manager.add(Arc::new(DirectOutbound::simple("direct")));
//! manager.add(Arc::new(BlockOutbound::new("adblock")));
//!
//! if let Some(outbound) = manager.get("direct") {
//!     let dest: Destination = "1.2.3.4:80".parse()?;
//!     let _conn = outbound.dial(&RequestContext::new(), Network::Tcp, &dest).await?;
//! }
//! # Ok(())
//! # }
//! ```

mod block;
mod direct;
mod manager;
mod traits;

pub use block::BlockOutbound;
pub use direct::DirectOutbound;
pub use manager::{OutboundManager, OutboundManagerBuilder};
pub use traits::{ConnectionHandler, Outbound, PacketConnectionHandler};
