//! Provider Manager
//!
//! Registry of named providers that groups reference by tag.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use super::traits::Provider;

/// Registry of named providers
pub struct ProviderManager {
    providers: DashMap<String, Arc<dyn Provider>>,
}

impl ProviderManager {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            providers: DashMap::new(),
        }
    }

    /// Register a provider under its own tag, replacing any previous one
    pub fn add(&self, provider: Arc<dyn Provider>) {
        let tag = provider.tag().to_string();
        info!(
            "Adding provider: {} (type: {})",
            tag,
            provider.provider_type()
        );
        self.providers.insert(tag, provider);
    }

    /// Register a provider under `tag`, for providers without a tag of their own
    pub fn add_with_tag(&self, tag: impl Into<String>, provider: Arc<dyn Provider>) {
        let tag = tag.into();
        info!(
            "Adding provider: {} (type: {})",
            tag,
            provider.provider_type()
        );
        self.providers.insert(tag, provider);
    }

    /// Get a provider by tag
    #[must_use]
    pub fn get(&self, tag: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(tag).map(|r| Arc::clone(r.value()))
    }

    /// Remove a provider by tag
    pub fn remove(&self, tag: &str) -> Option<Arc<dyn Provider>> {
        self.providers.remove(tag).map(|(_, v)| v)
    }

    /// Get all provider tags
    #[must_use]
    pub fn tags(&self) -> Vec<String> {
        self.providers.iter().map(|r| r.key().clone()).collect()
    }

    /// Number of registered providers
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Check if no providers are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for ProviderManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProviderManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderManager")
            .field("tags", &self.tags())
            .finish()
    }
}
