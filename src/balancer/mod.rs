//! Selection strategies
//!
//! A strategy is bound to a snapshot of a group's outbounds when the group
//! starts. The dispatcher asks it for one candidate per attempt and feeds
//! every failed attempt back through `report_failure`.
//!
//! Strategies are built through a `StrategyFactory` so groups stay
//! independent of any concrete algorithm. `BalancerFactory` builds the
//! built-in `Balancer`.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rust_balancer::balancer::{BalancerFactory, StrategyContext, StrategyFactory};
//! use rust_balancer::config::StrategyConfig;
//! use rust_balancer::outbound::{DirectOutbound, Outbound};
//! use rust_balancer::provider::{MemoryProvider, Provider};
//!
//! let direct: Arc<dyn Outbound> = Arc::new(DirectOutbound::simple("direct"));
//! let provider: Arc<dyn Provider> = Arc::new(MemoryProvider::new(vec![direct]));
//! let ctx = StrategyContext::new("lb", vec![provider], StrategyConfig::default());
//! let strategy = BalancerFactory.create(ctx).unwrap();
//! strategy.start().unwrap();
//! ```

mod health;
mod lb;
mod strategy;

use std::sync::Arc;

pub use health::{HealthStats, HealthTracker};
pub use lb::{hash_key, LbAlgorithm, LbError, LbMember, LoadBalancer};
pub use strategy::{Balancer, BalancerFactory};

use crate::adapter::{Destination, Network};
use crate::config::StrategyConfig;
use crate::context::RequestContext;
use crate::error::StrategyError;
use crate::outbound::Outbound;
use crate::provider::Provider;

/// Stateful candidate selector
///
/// Must be safe under concurrent `pick` and `report_failure` calls from
/// any number of simultaneous dispatches.
pub trait Strategy: Send + Sync {
    /// Choose a candidate for `network` / `destination`, or `None` if no
    /// member is eligible.
    fn pick(
        &self,
        ctx: &RequestContext,
        network: Network,
        destination: &Destination,
    ) -> Option<Arc<dyn Outbound>>;

    /// Feedback for a failed attempt through `outbound`. Must not block.
    ///
    /// `ctx` is the request the attempt ran under; a cancelled context
    /// means the caller gave up, not necessarily that the member failed.
    fn report_failure(&self, ctx: &RequestContext, outbound: &dyn Outbound);

    /// Networks currently carried by at least one member
    fn networks(&self) -> Vec<Network>;

    /// Log the membership and health of every member
    fn log_nodes(&self);

    /// Start background work.
    ///
    /// # Errors
    ///
    /// Returns `StrategyError` if the strategy cannot run.
    fn start(&self) -> Result<(), StrategyError>;

    /// Stop background work.
    ///
    /// # Errors
    ///
    /// Returns `StrategyError` if stopping failed.
    fn close(&self) -> Result<(), StrategyError>;

    /// Re-evaluate members now instead of at the next scheduled check
    fn check_outbounds(&self) {}

    /// Host network interfaces changed
    fn interface_updated(&self) {}
}

/// Everything a strategy is constructed from
#[derive(Clone)]
pub struct StrategyContext {
    /// Tag of the owning group, for logging
    pub group_tag: String,
    /// Resolved membership, in resolution order
    pub providers: Vec<Arc<dyn Provider>>,
    /// Strategy options from the group configuration
    pub options: StrategyConfig,
    /// Lifetime of the owning group; background work stops when it is cancelled
    pub lifetime: RequestContext,
}

impl StrategyContext {
    /// Create a context with a fresh lifetime
    pub fn new(
        group_tag: impl Into<String>,
        providers: Vec<Arc<dyn Provider>>,
        options: StrategyConfig,
    ) -> Self {
        Self {
            group_tag: group_tag.into(),
            providers,
            options,
            lifetime: RequestContext::new(),
        }
    }

    /// Bind background work to `lifetime`
    #[must_use]
    pub fn with_lifetime(mut self, lifetime: RequestContext) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// All outbounds of all providers, first occurrence of a tag wins
    #[must_use]
    pub fn outbounds(&self) -> Vec<Arc<dyn Outbound>> {
        let mut seen = std::collections::HashSet::new();
        self.providers
            .iter()
            .flat_map(|p| p.outbounds())
            .filter(|o| seen.insert(o.tag().to_string()))
            .collect()
    }
}

impl std::fmt::Debug for StrategyContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyContext")
            .field("group_tag", &self.group_tag)
            .field("providers", &self.providers.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Builds a strategy for a starting group
pub trait StrategyFactory: Send + Sync {
    /// Construct a strategy bound to the membership in `ctx`.
    ///
    /// # Errors
    ///
    /// Returns `StrategyError` if the options are unusable.
    fn create(&self, ctx: StrategyContext) -> Result<Arc<dyn Strategy>, StrategyError>;
}
