//! Outbound Manager
//!
//! This module provides the registry of configured outbounds, keyed by tag.
//! Groups resolve their member tags against it when they start.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};

use super::traits::Outbound;
use super::{BlockOutbound, DirectOutbound};
use crate::config::{OutboundConfig, OutboundType};

/// Registry of all configured outbounds
pub struct OutboundManager {
    /// Map of outbound tag to outbound implementation
    outbounds: DashMap<String, Arc<dyn Outbound>>,
}

impl OutboundManager {
    /// Create a new outbound manager
    #[must_use]
    pub fn new() -> Self {
        Self {
            outbounds: DashMap::new(),
        }
    }

    /// Add an outbound to the manager, replacing any outbound with the same tag
    pub fn add(&self, outbound: Arc<dyn Outbound>) {
        let tag = outbound.tag().to_string();
        info!(
            "Adding outbound: {} (type: {})",
            tag,
            outbound.outbound_type()
        );
        self.outbounds.insert(tag, outbound);
    }

    /// Get an outbound by tag
    #[must_use]
    pub fn get(&self, tag: &str) -> Option<Arc<dyn Outbound>> {
        self.outbounds.get(tag).map(|r| Arc::clone(r.value()))
    }

    /// Remove an outbound by tag
    pub fn remove(&self, tag: &str) -> Option<Arc<dyn Outbound>> {
        info!("Removing outbound: {}", tag);
        self.outbounds.remove(tag).map(|(_, v)| v)
    }

    /// Check if an outbound exists
    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.outbounds.contains_key(tag)
    }

    /// Get all outbound tags
    #[must_use]
    pub fn tags(&self) -> Vec<String> {
        self.outbounds.iter().map(|r| r.key().clone()).collect()
    }

    /// Get the number of registered outbounds
    #[must_use]
    pub fn len(&self) -> usize {
        self.outbounds.len()
    }

    /// Check if no outbounds are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outbounds.is_empty()
    }

    /// Get all outbounds
    pub fn all(&self) -> Vec<Arc<dyn Outbound>> {
        self.outbounds.iter().map(|r| Arc::clone(r.value())).collect()
    }

    /// Log current status of all outbounds
    pub fn log_status(&self) {
        for entry in &self.outbounds {
            let outbound = entry.value();
            debug!(
                "Outbound {}: type={} networks={:?}",
                outbound.tag(),
                outbound.outbound_type(),
                outbound.networks()
            );
        }
    }
}

impl Default for OutboundManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for OutboundManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundManager")
            .field("count", &self.len())
            .field("tags", &self.tags())
            .finish()
    }
}

/// Builder for creating an `OutboundManager` from configuration
pub struct OutboundManagerBuilder {
    manager: OutboundManager,
}

impl OutboundManagerBuilder {
    /// Create a new builder
    #[must_use]
    pub fn new() -> Self {
        Self {
            manager: OutboundManager::new(),
        }
    }

    /// Add an outbound from configuration
    pub fn add_from_config(&mut self, config: &OutboundConfig) -> &mut Self {
        let outbound: Arc<dyn Outbound> = match config.outbound_type {
            OutboundType::Direct => Arc::new(DirectOutbound::new(config.clone())),
            OutboundType::Block => Arc::new(BlockOutbound::from_config(config)),
        };

        self.manager.add(outbound);
        self
    }

    /// Add multiple outbounds from configuration
    pub fn add_all_from_config(&mut self, configs: &[OutboundConfig]) -> &mut Self {
        for config in configs {
            self.add_from_config(config);
        }
        self
    }

    /// Build the manager
    #[must_use]
    pub fn build(self) -> OutboundManager {
        self.manager
    }
}

impl Default for OutboundManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
