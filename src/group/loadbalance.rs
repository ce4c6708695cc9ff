//! Load-balancing outbound group
//!
//! Dispatches each dial or packet listen to a member chosen by the
//! strategy, retrying other picks on failure up to `MAX_ATTEMPTS` times.
//! Connections accepted elsewhere are handed to a single pick without
//! retry.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized ──start──> Starting ──ok──> Running
//!                              │
//!                              └──error──> Failed
//! (any) ──close──> Closed
//! ```
//!
//! Requests are only served in `Running`.

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use tracing::{debug, error, info};

use super::{GroupDeps, OutboundGroup, TYPE_LOAD_BALANCE};
use crate::adapter::{BoxPacketConn, BoxStream, Destination, InboundContext, Network};
use crate::balancer::{Strategy, StrategyContext};
use crate::config::{GroupConfig, StrategyConfig};
use crate::connection::{CloseHandler, ErrorDialer};
use crate::context::RequestContext;
use crate::error::{GroupError, OutboundError, ProviderError};
use crate::outbound::{ConnectionHandler, Outbound, PacketConnectionHandler};
use crate::provider::{MemoryProvider, Provider};

/// Maximum number of attempts per dial or listen
pub const MAX_ATTEMPTS: usize = 5;

const STATE_UNINITIALIZED: u8 = 0;
const STATE_STARTING: u8 = 1;
const STATE_RUNNING: u8 = 2;
const STATE_FAILED: u8 = 3;
const STATE_CLOSED: u8 = 4;

/// Load-balancing group
pub struct LoadBalanceGroup {
    tag: String,
    member_tags: Vec<String>,
    provider_tags: Vec<String>,
    options: StrategyConfig,
    deps: GroupDeps,
    state: AtomicU8,
    providers: OnceLock<Vec<Arc<dyn Provider>>>,
    strategy: OnceLock<Arc<dyn Strategy>>,
    strategy_closed: AtomicBool,
    lifetime: RequestContext,
}

impl LoadBalanceGroup {
    /// Create a group from its configuration
    pub fn new(config: &GroupConfig, deps: GroupDeps) -> Self {
        Self {
            tag: config.tag.clone(),
            member_tags: config.outbounds.clone(),
            provider_tags: config.providers.clone(),
            options: config.strategy.clone(),
            deps,
            state: AtomicU8::new(STATE_UNINITIALIZED),
            providers: OnceLock::new(),
            strategy: OnceLock::new(),
            strategy_closed: AtomicBool::new(false),
            lifetime: RequestContext::new(),
        }
    }

    /// Check if the group is serving requests
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_RUNNING
    }

    /// Check if the group has been closed
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_CLOSED
    }

    /// Resolve explicit members and provider tags into providers.
    ///
    /// Explicit members form an anonymous static provider placed first.
    fn resolve_providers(&self) -> Result<Vec<Arc<dyn Provider>>, ProviderError> {
        let mut providers: Vec<Arc<dyn Provider>> =
            Vec::with_capacity(self.provider_tags.len() + 1);

        if !self.member_tags.is_empty() {
            let outbounds = self
                .member_tags
                .iter()
                .map(|tag| {
                    self.deps
                        .outbounds
                        .get(tag)
                        .ok_or_else(|| ProviderError::outbound_not_found(tag))
                })
                .collect::<Result<Vec<_>, _>>()?;
            providers.push(Arc::new(MemoryProvider::new(outbounds)));
        }

        for tag in &self.provider_tags {
            let provider = self
                .deps
                .providers
                .get(tag)
                .ok_or_else(|| ProviderError::not_found(tag))?;
            providers.push(provider);
        }

        Ok(providers)
    }

    async fn initialize(&self) -> Result<Arc<dyn Strategy>, GroupError> {
        let providers = self.resolve_providers()?;
        for provider in &providers {
            provider.wait().await;
        }

        let ctx = StrategyContext::new(&self.tag, providers.clone(), self.options.clone())
            .with_lifetime(self.lifetime.child());
        let strategy = self.deps.strategies.create(ctx)?;

        if let Err(e) = strategy.start() {
            let _ = strategy.close();
            return Err(e.into());
        }

        let _ = self.providers.set(providers);
        Ok(strategy)
    }

    fn lifecycle_error(&self, state: u8) -> GroupError {
        let tag = self.tag.clone();
        match state {
            STATE_FAILED => GroupError::Failed { tag },
            STATE_CLOSED => GroupError::Closed { tag },
            _ => GroupError::AlreadyStarted { tag },
        }
    }

    fn close_strategy(&self) -> Result<(), GroupError> {
        let Some(strategy) = self.strategy.get() else {
            return Ok(());
        };
        if self.strategy_closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        strategy.close().map_err(GroupError::from)
    }

    fn running_strategy(&self) -> Option<&Arc<dyn Strategy>> {
        if self.is_running() {
            self.strategy.get()
        } else {
            None
        }
    }

    /// Run up to `MAX_ATTEMPTS` attempts, each against a fresh pick.
    ///
    /// Stops at the first success or when the strategy has no candidate.
    /// Every failed attempt is reported back to the strategy.
    async fn dispatch<T, F, Fut>(
        &self,
        ctx: &RequestContext,
        network: Network,
        destination: &Destination,
        attempt: F,
    ) -> Result<T, OutboundError>
    where
        T: Send,
        F: Fn(Arc<dyn Outbound>) -> Fut + Send,
        Fut: Future<Output = Result<T, OutboundError>> + Send,
    {
        let strategy = self
            .running_strategy()
            .ok_or_else(|| OutboundError::unavailable(&self.tag, "group is not running"))?;

        let mut last_err = None;
        for n in 1..=MAX_ATTEMPTS {
            let Some(outbound) = strategy.pick(ctx, network, destination) else {
                last_err = Some(OutboundError::NoOutboundAvailable);
                break;
            };

            let result = tokio::select! {
                biased;
                () = ctx.cancelled() => Err(OutboundError::Cancelled),
                r = attempt(Arc::clone(&outbound)) => r,
            };

            match result {
                Ok(conn) => return Ok(conn),
                Err(e) => {
                    error!(
                        "Group '{}' attempt {}/{} via '{}' to {} ({}) failed: {}",
                        self.tag,
                        n,
                        MAX_ATTEMPTS,
                        outbound.tag(),
                        destination,
                        network,
                        e
                    );
                    // Reported even when cancelled; the strategy sees `ctx`
                    strategy.report_failure(ctx, outbound.as_ref());
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or(OutboundError::NoOutboundAvailable))
    }

    fn pick_for_handoff(
        &self,
        ctx: &RequestContext,
        network: Network,
        destination: &Destination,
    ) -> Option<Arc<dyn Outbound>> {
        self.running_strategy()
            .and_then(|strategy| strategy.pick(ctx, network, destination))
    }
}

#[async_trait]
impl Outbound for LoadBalanceGroup {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn outbound_type(&self) -> &str {
        TYPE_LOAD_BALANCE
    }

    fn networks(&self) -> Vec<Network> {
        self.network()
    }

    async fn dial(
        &self,
        ctx: &RequestContext,
        network: Network,
        destination: &Destination,
    ) -> Result<BoxStream, OutboundError> {
        self.dispatch(ctx, network, destination, move |outbound| async move {
            outbound.dial(ctx, network, destination).await
        })
        .await
    }

    async fn listen_packet(
        &self,
        ctx: &RequestContext,
        destination: &Destination,
    ) -> Result<BoxPacketConn, OutboundError> {
        self.dispatch(ctx, Network::Udp, destination, move |outbound| async move {
            outbound.listen_packet(ctx, destination).await
        })
        .await
    }

    fn as_connection_handler(&self) -> Option<&dyn ConnectionHandler> {
        Some(self)
    }

    fn as_packet_connection_handler(&self) -> Option<&dyn PacketConnectionHandler> {
        Some(self)
    }
}

#[async_trait]
impl ConnectionHandler for LoadBalanceGroup {
    async fn new_connection(
        &self,
        ctx: RequestContext,
        conn: BoxStream,
        metadata: InboundContext,
        on_close: CloseHandler,
    ) {
        let Some(outbound) = self.pick_for_handoff(&ctx, Network::Tcp, &metadata.destination) else {
            debug!(
                "Group '{}' has no candidate for connection to {}",
                self.tag, metadata.destination
            );
            let dialer = Arc::new(ErrorDialer::no_outbound(self.tag.clone()));
            self.deps
                .connections
                .new_connection(ctx, dialer, conn, metadata, on_close)
                .await;
            return;
        };

        if let Some(handler) = outbound.as_connection_handler() {
            handler
                .new_connection(ctx.with_external_connection(), conn, metadata, on_close)
                .await;
        } else {
            self.deps
                .connections
                .new_connection(ctx, outbound, conn, metadata, on_close)
                .await;
        }
    }
}

#[async_trait]
impl PacketConnectionHandler for LoadBalanceGroup {
    async fn new_packet_connection(
        &self,
        ctx: RequestContext,
        conn: BoxPacketConn,
        metadata: InboundContext,
        on_close: CloseHandler,
    ) {
        let Some(outbound) = self.pick_for_handoff(&ctx, Network::Udp, &metadata.destination) else {
            debug!(
                "Group '{}' has no candidate for packet connection to {}",
                self.tag, metadata.destination
            );
            let dialer = Arc::new(ErrorDialer::no_outbound(self.tag.clone()));
            self.deps
                .connections
                .new_packet_connection(ctx, dialer, conn, metadata, on_close)
                .await;
            return;
        };

        if let Some(handler) = outbound.as_packet_connection_handler() {
            handler
                .new_packet_connection(ctx.with_external_connection(), conn, metadata, on_close)
                .await;
        } else {
            self.deps
                .connections
                .new_packet_connection(ctx, outbound, conn, metadata, on_close)
                .await;
        }
    }
}

#[async_trait]
impl OutboundGroup for LoadBalanceGroup {
    async fn start(&self) -> Result<(), GroupError> {
        if let Err(state) = self.state.compare_exchange(
            STATE_UNINITIALIZED,
            STATE_STARTING,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            return Err(self.lifecycle_error(state));
        }

        match self.initialize().await {
            Ok(strategy) => {
                let _ = self.strategy.set(strategy);
                if self
                    .state
                    .compare_exchange(
                        STATE_STARTING,
                        STATE_RUNNING,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_err()
                {
                    // Closed while starting
                    self.close_strategy()?;
                    return Err(GroupError::Closed {
                        tag: self.tag.clone(),
                    });
                }
                info!(
                    "Started load-balance group '{}' ({} providers)",
                    self.tag,
                    self.providers.get().map_or(0, Vec::len)
                );
                Ok(())
            }
            Err(e) => {
                let _ = self.state.compare_exchange(
                    STATE_STARTING,
                    STATE_FAILED,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
                error!("Failed to start group '{}': {}", self.tag, e);
                Err(e)
            }
        }
    }

    async fn close(&self) -> Result<(), GroupError> {
        if self.state.swap(STATE_CLOSED, Ordering::AcqRel) == STATE_CLOSED {
            return Ok(());
        }
        self.lifetime.cancel();
        debug!("Closing group '{}'", self.tag);
        self.close_strategy()
    }

    fn now(&self) -> String {
        self.pick_for_handoff(&RequestContext::new(), Network::Tcp, &Destination::Unspecified)
            .map(|outbound| outbound.tag().to_string())
            .unwrap_or_default()
    }

    fn all(&self) -> Vec<String> {
        if let Some(strategy) = self.strategy.get() {
            strategy.log_nodes();
        }

        let mut seen = HashSet::new();
        let Some(providers) = self.providers.get() else {
            // Not resolved yet, show the configured members
            return self
                .member_tags
                .iter()
                .filter(|tag| seen.insert((*tag).clone()))
                .cloned()
                .collect();
        };
        providers
            .iter()
            .flat_map(|p| p.outbounds())
            .map(|o| o.tag().to_string())
            .filter(|tag| seen.insert(tag.clone()))
            .collect()
    }

    fn network(&self) -> Vec<Network> {
        self.running_strategy()
            .map(|strategy| strategy.networks())
            .unwrap_or_default()
    }

    fn check_outbounds(&self) {
        if let Some(strategy) = self.running_strategy() {
            debug!("Checking members of group '{}'", self.tag);
            strategy.check_outbounds();
        }
    }

    fn interface_updated(&self) {
        if let Some(strategy) = self.running_strategy() {
            info!("Network interfaces changed, resetting group '{}'", self.tag);
            strategy.interface_updated();
        }
    }

    fn into_outbound(self: Arc<Self>) -> Arc<dyn Outbound> {
        self
    }
}

impl std::fmt::Debug for LoadBalanceGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadBalanceGroup")
            .field("tag", &self.tag)
            .field("outbounds", &self.member_tags)
            .field("providers", &self.provider_tags)
            .field("state", &self.state.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
