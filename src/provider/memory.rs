//! In-memory static provider
//!
//! Wraps a fixed list of outbounds. Groups that list member outbounds
//! directly get one of these in front of any named providers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;

use super::traits::{Provider, PROVIDER_COMPATIBLE};
use crate::error::ProviderError;
use crate::outbound::Outbound;

/// Static provider over a fixed outbound list
///
/// The tag index is built once at construction; a later outbound with the
/// same tag replaces an earlier one in the index, while `outbounds` keeps
/// the list exactly as given.
pub struct MemoryProvider {
    outbounds: Vec<Arc<dyn Outbound>>,
    by_tag: HashMap<String, Arc<dyn Outbound>>,
}

impl MemoryProvider {
    /// Create a provider over `outbounds`
    #[must_use]
    pub fn new(outbounds: Vec<Arc<dyn Outbound>>) -> Self {
        let by_tag = outbounds
            .iter()
            .map(|o| (o.tag().to_string(), Arc::clone(o)))
            .collect();
        Self { outbounds, by_tag }
    }

    /// Number of outbounds
    #[must_use]
    pub fn len(&self) -> usize {
        self.outbounds.len()
    }

    /// Check if the provider is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outbounds.is_empty()
    }
}

#[async_trait]
impl Provider for MemoryProvider {
    fn outbounds(&self) -> Vec<Arc<dyn Outbound>> {
        self.outbounds.clone()
    }

    fn outbound(&self, tag: &str) -> Option<Arc<dyn Outbound>> {
        self.by_tag.get(tag).cloned()
    }

    fn provider_type(&self) -> &str {
        PROVIDER_COMPATIBLE
    }

    fn tag(&self) -> &str {
        ""
    }

    async fn update(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Always the current time: a static list is never stale.
    fn updated_at(&self) -> SystemTime {
        SystemTime::now()
    }

    async fn wait(&self) {}
}

impl std::fmt::Debug for MemoryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tags: Vec<&str> = self.outbounds.iter().map(|o| o.tag()).collect();
        f.debug_struct("MemoryProvider").field("outbounds", &tags).finish()
    }
}
