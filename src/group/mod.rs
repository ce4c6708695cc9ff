//! Outbound groups
//!
//! A group is an outbound that forwards every request to one of its
//! members. Members come from providers resolved when the group starts;
//! the choice among them is delegated to a `Strategy`.
//!
//! Groups are created by type through a `GroupRegistry`:
//!
//! ```no_run
//! use std::sync::Arc;
//! use rust_balancer::config::{ConnectionConfig, GroupConfig};
//! use rust_balancer::connection::RelayConnectionManager;
//! use rust_balancer::group::{GroupDeps, GroupRegistry};
//! use rust_balancer::outbound::OutboundManager;
//! use rust_balancer::provider::ProviderManager;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let deps = GroupDeps::new(
//!     Arc::new(OutboundManager::new()),
//!     Arc::new(ProviderManager::new()),
//!     Arc::new(RelayConnectionManager::new(&ConnectionConfig::default())),
//! );
//! let registry = GroupRegistry::with_defaults();
//! let group = registry.create(&GroupConfig::load_balance("lb", vec![]), deps)?;
//! group.start().await?;
//! assert_eq!(group.now(), "");
//! # Ok(())
//! # }
//! ```

mod loadbalance;
mod registry;

use std::sync::Arc;

use async_trait::async_trait;

pub use loadbalance::{LoadBalanceGroup, MAX_ATTEMPTS};
pub use registry::{register_load_balance, GroupConstructor, GroupRegistry};

use crate::adapter::Network;
use crate::balancer::{BalancerFactory, StrategyFactory};
use crate::connection::ConnectionManager;
use crate::error::GroupError;
use crate::outbound::{Outbound, OutboundManager};
use crate::provider::ProviderManager;

/// Type name of the load-balancing group
pub const TYPE_LOAD_BALANCE: &str = "load-balance";

/// An outbound backed by a set of member outbounds
#[async_trait]
pub trait OutboundGroup: Outbound {
    /// Resolve membership and start the selection strategy.
    ///
    /// # Errors
    ///
    /// Returns `GroupError` if membership resolution or the strategy fails;
    /// the group is unusable afterwards.
    async fn start(&self) -> Result<(), GroupError>;

    /// Stop the selection strategy. Safe to call before `start`.
    ///
    /// # Errors
    ///
    /// Returns `GroupError::Strategy` if the strategy failed to stop.
    async fn close(&self) -> Result<(), GroupError>;

    /// Tag of the member a request would currently go to, empty if none.
    /// For display only.
    fn now(&self) -> String;

    /// Tags of all members
    fn all(&self) -> Vec<String>;

    /// Networks currently carried by the group
    fn network(&self) -> Vec<Network>;

    /// Re-evaluate member health now instead of at the next check interval
    fn check_outbounds(&self);

    /// Network interfaces of the host changed; earlier failures are stale
    fn interface_updated(&self);

    /// View the group as a plain outbound
    fn into_outbound(self: Arc<Self>) -> Arc<dyn Outbound>;
}

/// Shared collaborators handed to every group
///
/// Holds strong references. A group registered into `outbounds` forms a
/// cycle with it; registries are meant to live as long as the process.
#[derive(Clone)]
pub struct GroupDeps {
    /// Registry member tags are resolved against
    pub outbounds: Arc<OutboundManager>,
    /// Registry provider tags are resolved against
    pub providers: Arc<ProviderManager>,
    /// Owner of handed-off connections
    pub connections: Arc<dyn ConnectionManager>,
    /// Builds the strategy when a group starts
    pub strategies: Arc<dyn StrategyFactory>,
}

impl GroupDeps {
    /// Create dependencies using the built-in balancer strategy
    pub fn new(
        outbounds: Arc<OutboundManager>,
        providers: Arc<ProviderManager>,
        connections: Arc<dyn ConnectionManager>,
    ) -> Self {
        Self {
            outbounds,
            providers,
            connections,
            strategies: Arc::new(BalancerFactory),
        }
    }

    /// Replace the strategy factory
    #[must_use]
    pub fn with_strategies(mut self, strategies: Arc<dyn StrategyFactory>) -> Self {
        self.strategies = strategies;
        self
    }
}

impl std::fmt::Debug for GroupDeps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupDeps")
            .field("outbounds", &self.outbounds)
            .field("providers", &self.providers)
            .finish_non_exhaustive()
    }
}
