//! Provider trait definitions

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::outbound::Outbound;

/// Type name of static providers built from explicit member lists
pub const PROVIDER_COMPATIBLE: &str = "compatible";

/// Source of candidate outbounds for a group
#[async_trait]
pub trait Provider: Send + Sync {
    /// All outbounds, in provider order
    fn outbounds(&self) -> Vec<Arc<dyn Outbound>>;

    /// Look up an outbound by tag
    fn outbound(&self, tag: &str) -> Option<Arc<dyn Outbound>>;

    /// Provider type name
    fn provider_type(&self) -> &str;

    /// Provider tag, empty for anonymous providers
    fn tag(&self) -> &str;

    /// Refresh the outbound set.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Update` if the refresh fails.
    async fn update(&self) -> Result<(), ProviderError>;

    /// When the outbound set was last known to be fresh
    fn updated_at(&self) -> SystemTime;

    /// Resolves once the provider is ready to serve its outbounds
    async fn wait(&self);
}
