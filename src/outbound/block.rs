//! Block outbound implementation
//!
//! This module provides the `BlockOutbound` type which refuses every
//! connection and packet session. Used for ad-blocking, access control,
//! and as a deterministic failing member in groups.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::traits::Outbound;
use crate::adapter::{BoxPacketConn, BoxStream, Destination, Network};
use crate::config::OutboundConfig;
use crate::connection::OutboundStats;
use crate::context::RequestContext;
use crate::error::OutboundError;

/// Block outbound - refuses all connections
pub struct BlockOutbound {
    /// Tag for this outbound
    tag: String,
    /// Connection statistics (for counting blocked connections)
    stats: Arc<OutboundStats>,
    /// Whether the outbound is enabled
    enabled: AtomicBool,
}

impl BlockOutbound {
    /// Create a new block outbound
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            stats: Arc::new(OutboundStats::new()),
            enabled: AtomicBool::new(true),
        }
    }

    /// Create a block outbound from configuration
    pub fn from_config(config: &OutboundConfig) -> Self {
        let outbound = Self::new(&config.tag);
        outbound.enabled.store(config.enabled, Ordering::Relaxed);
        outbound
    }

    /// Check if this outbound is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Get blocked connection statistics
    pub fn stats(&self) -> Arc<OutboundStats> {
        Arc::clone(&self.stats)
    }
}

#[async_trait]
impl Outbound for BlockOutbound {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn outbound_type(&self) -> &str {
        "block"
    }

    fn networks(&self) -> Vec<Network> {
        // Routing may send either network here; both are refused
        Network::ALL.to_vec()
    }

    async fn dial(
        &self,
        _ctx: &RequestContext,
        network: Network,
        destination: &Destination,
    ) -> Result<BoxStream, OutboundError> {
        self.stats.record_connection();

        debug!("Blocking {} connection to {} via {}", network, destination, self.tag);

        Err(OutboundError::unavailable(
            &self.tag,
            format!("connection to {destination} blocked"),
        ))
    }

    async fn listen_packet(
        &self,
        _ctx: &RequestContext,
        destination: &Destination,
    ) -> Result<BoxPacketConn, OutboundError> {
        self.stats.record_connection();

        debug!("Blocking UDP session to {} via {}", destination, self.tag);

        Err(OutboundError::unavailable(
            &self.tag,
            format!("packets to {destination} blocked"),
        ))
    }
}

impl std::fmt::Debug for BlockOutbound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockOutbound")
            .field("tag", &self.tag)
            .field("enabled", &self.is_enabled())
            .field("blocked_count", &self.stats.connections())
            .finish()
    }
}
