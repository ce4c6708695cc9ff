//! Type-keyed group construction

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use super::{GroupDeps, LoadBalanceGroup, OutboundGroup, TYPE_LOAD_BALANCE};
use crate::config::GroupConfig;
use crate::error::GroupError;

/// Constructor registered for a group type
pub type GroupConstructor =
    Box<dyn Fn(&GroupConfig, GroupDeps) -> Arc<dyn OutboundGroup> + Send + Sync>;

/// Registry of group constructors keyed by type name
pub struct GroupRegistry {
    constructors: HashMap<String, GroupConstructor>,
}

impl GroupRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Create a registry with all built-in group types
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        register_load_balance(&mut registry);
        registry
    }

    /// Register a constructor, replacing any previous one for `group_type`
    pub fn register<F>(&mut self, group_type: impl Into<String>, constructor: F)
    where
        F: Fn(&GroupConfig, GroupDeps) -> Arc<dyn OutboundGroup> + Send + Sync + 'static,
    {
        self.constructors
            .insert(group_type.into(), Box::new(constructor));
    }

    /// Check if a type is registered
    #[must_use]
    pub fn contains(&self, group_type: &str) -> bool {
        self.constructors.contains_key(group_type)
    }

    /// Registered type names
    #[must_use]
    pub fn types(&self) -> Vec<String> {
        self.constructors.keys().cloned().collect()
    }

    /// Build a group from its configuration
    ///
    /// # Errors
    ///
    /// Returns `GroupError::UnknownType` if no constructor is registered.
    pub fn create(
        &self,
        config: &GroupConfig,
        deps: GroupDeps,
    ) -> Result<Arc<dyn OutboundGroup>, GroupError> {
        let constructor = self
            .constructors
            .get(&config.group_type)
            .ok_or_else(|| GroupError::UnknownType(config.group_type.clone()))?;
        Ok(constructor(config, deps))
    }

    /// Build every configured group and register it as an outbound.
    ///
    /// Groups are registered in order, so a group may use any group
    /// declared before it as a member.
    ///
    /// Each registered group keeps `deps.outbounds` alive through its own
    /// `GroupDeps`, and the manager keeps the group alive in turn, so the
    /// groups and the manager are only released together with the process.
    ///
    /// # Errors
    ///
    /// Returns `GroupError::UnknownType` for the first unregistered type.
    pub fn create_all(
        &self,
        configs: &[GroupConfig],
        deps: &GroupDeps,
    ) -> Result<Vec<Arc<dyn OutboundGroup>>, GroupError> {
        let mut groups = Vec::with_capacity(configs.len());
        for config in configs {
            let group = self.create(config, deps.clone())?;
            info!("Adding group: {} (type: {})", config.tag, config.group_type);
            deps.outbounds.add(Arc::clone(&group).into_outbound());
            groups.push(group);
        }
        Ok(groups)
    }
}

impl Default for GroupRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for GroupRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupRegistry")
            .field("types", &self.types())
            .finish()
    }
}

/// Register `LoadBalanceGroup` under `TYPE_LOAD_BALANCE`
pub fn register_load_balance(registry: &mut GroupRegistry) {
    registry.register(TYPE_LOAD_BALANCE, |config, deps| {
        Arc::new(LoadBalanceGroup::new(config, deps)) as Arc<dyn OutboundGroup>
    });
}
