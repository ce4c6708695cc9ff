//! Built-in health-aware strategy

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::health::HealthTracker;
use super::lb::{hash_key, LbAlgorithm, LbMember, LoadBalancer};
use super::{Strategy, StrategyContext, StrategyFactory};
use crate::adapter::{Destination, Network};
use crate::context::RequestContext;
use crate::error::StrategyError;
use crate::outbound::Outbound;

/// A member of the balancer snapshot
struct Member {
    outbound: Arc<dyn Outbound>,
    key: u64,
    weight: u32,
}

/// Health-aware load balancer over a fixed member snapshot
///
/// Members that fail `max_failures` times in a row leave the rotation
/// until `failure_cooldown` elapses. A background task started by
/// `start` puts expired members back every `check_interval`.
pub struct Balancer {
    group_tag: String,
    members: Vec<Member>,
    lb: LoadBalancer,
    health: Arc<HealthTracker>,
    check_interval: Duration,
    cancel: CancellationToken,
    recovery_task: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
    closed: AtomicBool,
}

impl Balancer {
    /// Create a balancer from a strategy context
    ///
    /// # Errors
    ///
    /// Returns `StrategyError::InvalidOptions` if the options fail validation.
    pub fn new(ctx: StrategyContext) -> Result<Self, StrategyError> {
        ctx.options.validate().map_err(StrategyError::invalid_options)?;

        let members: Vec<Member> = ctx
            .outbounds()
            .into_iter()
            .map(|outbound| Member {
                key: hash_key(outbound.tag()),
                weight: ctx.options.weight(outbound.tag()),
                outbound,
            })
            .collect();

        debug!(
            "Balancer for group '{}' created with {} members ({})",
            ctx.group_tag,
            members.len(),
            ctx.options.algorithm
        );

        Ok(Self {
            group_tag: ctx.group_tag,
            members,
            lb: LoadBalancer::new(ctx.options.algorithm),
            health: Arc::new(HealthTracker::new(
                ctx.options.max_failures,
                ctx.options.failure_cooldown(),
            )),
            check_interval: ctx.options.check_interval(),
            cancel: ctx.lifetime.token().child_token(),
            recovery_task: Mutex::new(None),
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    /// Number of members in the snapshot
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Check if the snapshot is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Configured algorithm
    #[must_use]
    pub const fn algorithm(&self) -> LbAlgorithm {
        self.lb.algorithm()
    }

    /// Health tracker shared with the recovery task
    #[must_use]
    pub fn health(&self) -> &HealthTracker {
        &self.health
    }

    /// Check if `close` has run
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn affinity(destination: &Destination) -> Option<u64> {
        if destination.is_unspecified() {
            None
        } else {
            Some(hash_key(destination))
        }
    }
}

impl Strategy for Balancer {
    fn pick(
        &self,
        _ctx: &RequestContext,
        network: Network,
        destination: &Destination,
    ) -> Option<Arc<dyn Outbound>> {
        let candidates: Vec<&Member> = self
            .members
            .iter()
            .filter(|m| m.outbound.supports(network))
            .collect();

        let lb_members: Vec<LbMember> = candidates
            .iter()
            .enumerate()
            .map(|(index, m)| {
                LbMember::new(index, m.key)
                    .with_weight(m.weight)
                    .with_healthy(self.health.is_healthy(m.outbound.tag()))
            })
            .collect();

        match self.lb.select(&lb_members, Self::affinity(destination)) {
            Ok(index) => Some(Arc::clone(&candidates[index].outbound)),
            Err(e) => {
                debug!(
                    "Group '{}' has no {} candidate for {}: {}",
                    self.group_tag, network, destination, e
                );
                None
            }
        }
    }

    fn report_failure(&self, ctx: &RequestContext, outbound: &dyn Outbound) {
        if ctx.is_cancelled() {
            debug!(
                "Group '{}': ignoring failure of '{}' on a cancelled request",
                self.group_tag,
                outbound.tag()
            );
            return;
        }
        if self.health.record_failure(outbound.tag()) {
            warn!(
                "Group '{}': member '{}' deprioritized after repeated failures",
                self.group_tag,
                outbound.tag()
            );
        }
    }

    fn networks(&self) -> Vec<Network> {
        Network::ALL
            .iter()
            .copied()
            .filter(|n| self.members.iter().any(|m| m.outbound.supports(*n)))
            .collect()
    }

    fn log_nodes(&self) {
        info!(
            "Group '{}': {} members ({})",
            self.group_tag,
            self.members.len(),
            self.lb.algorithm()
        );
        for member in &self.members {
            let tag = member.outbound.tag();
            let stats = self.health.stats(tag);
            let networks: Vec<&str> = member
                .outbound
                .networks()
                .iter()
                .map(Network::as_str)
                .collect();
            info!(
                "  {} (type: {}, healthy: {}, failures: {}, weight: {}, networks: {})",
                tag,
                member.outbound.outbound_type(),
                stats.is_healthy,
                stats.consecutive_failures,
                member.weight,
                networks.join(",")
            );
        }
    }

    fn start(&self) -> Result<(), StrategyError> {
        if self.is_closed() {
            return Err(StrategyError::AlreadyClosed);
        }
        if self.started.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let health = Arc::clone(&self.health);
        let cancel = self.cancel.clone();
        let period = self.check_interval;
        let group_tag = self.group_tag.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        debug!("Recovery task of group '{}' stopped", group_tag);
                        break;
                    }
                    _ = ticker.tick() => {
                        for tag in health.recover_expired() {
                            info!("Group '{}': member '{}' back in rotation", group_tag, tag);
                        }
                    }
                }
            }
        });
        *self.recovery_task.lock() = Some(handle);

        Ok(())
    }

    fn close(&self) -> Result<(), StrategyError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.cancel.cancel();
        if let Some(handle) = self.recovery_task.lock().take() {
            handle.abort();
        }
        debug!("Balancer for group '{}' closed", self.group_tag);
        Ok(())
    }

    fn check_outbounds(&self) {
        for tag in self.health.recover_expired() {
            info!("Group '{}': member '{}' back in rotation", self.group_tag, tag);
        }
    }

    fn interface_updated(&self) {
        let deprioritized = self.health.deprioritized_count();
        self.health.reset_all();
        if deprioritized > 0 {
            info!(
                "Group '{}': {} members back in rotation after interface change",
                self.group_tag, deprioritized
            );
        }
    }
}

impl Drop for Balancer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for Balancer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tags: Vec<&str> = self.members.iter().map(|m| m.outbound.tag()).collect();
        f.debug_struct("Balancer")
            .field("group_tag", &self.group_tag)
            .field("members", &tags)
            .field("algorithm", &self.lb.algorithm())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Factory for the built-in `Balancer`
#[derive(Debug, Clone, Copy, Default)]
pub struct BalancerFactory;

impl StrategyFactory for BalancerFactory {
    fn create(&self, ctx: StrategyContext) -> Result<Arc<dyn Strategy>, StrategyError> {
        Ok(Arc::new(Balancer::new(ctx)?))
    }
}
