//! Configuration types for rust-balancer
//!
//! This module defines all configuration structures used by the balancer.
//! Configuration is loaded from JSON files and validated at startup.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::balancer::LbAlgorithm;
use crate::error::ConfigError;
use crate::group::TYPE_LOAD_BALANCE;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,

    /// Outbound configurations
    #[serde(default)]
    pub outbounds: Vec<OutboundConfig>,

    /// Outbound group configurations
    #[serde(default)]
    pub groups: Vec<GroupConfig>,

    /// Connection limits
    #[serde(default)]
    pub connection: ConnectionConfig,
}

impl Config {
    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut tags: HashSet<&str> = HashSet::new();
        for outbound in &self.outbounds {
            outbound.validate()?;
            if !tags.insert(&outbound.tag) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate outbound tag: {}",
                    outbound.tag
                )));
            }
        }

        for group in &self.groups {
            validate_tag(&group.tag, "Group")?;
            if !tags.insert(&group.tag) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate outbound tag: {}",
                    group.tag
                )));
            }
        }

        for group in &self.groups {
            group.validate(&tags)?;
        }

        self.connection.validate()?;

        Ok(())
    }

    /// Create a minimal default configuration
    #[must_use]
    pub fn default_config() -> Self {
        Self {
            log: LogConfig::default(),
            outbounds: vec![OutboundConfig::direct("direct"), OutboundConfig::block("block")],
            groups: vec![GroupConfig::load_balance(
                "balance",
                vec!["direct".into(), "block".into()],
            )],
            connection: ConnectionConfig::default(),
        }
    }
}

fn validate_tag(tag: &str, kind: &str) -> Result<(), ConfigError> {
    if tag.is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "{kind} tag cannot be empty"
        )));
    }

    // Tag must be alphanumeric with hyphens/underscores
    if !tag
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::ValidationError(format!(
            "{kind} tag '{tag}' contains invalid characters (only alphanumeric, -, _ allowed)"
        )));
    }

    Ok(())
}

/// Outbound configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutboundConfig {
    /// Unique tag for this outbound
    pub tag: String,

    /// Outbound type
    #[serde(rename = "type")]
    pub outbound_type: OutboundType,

    /// Bind to specific interface (SO_BINDTODEVICE)
    #[serde(default)]
    pub bind_interface: Option<String>,

    /// Set routing mark (SO_MARK)
    #[serde(default)]
    pub routing_mark: Option<u32>,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Enable this outbound
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl OutboundConfig {
    /// Create a direct outbound configuration
    pub fn direct(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            outbound_type: OutboundType::Direct,
            bind_interface: None,
            routing_mark: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            enabled: true,
        }
    }

    /// Create a block outbound configuration
    pub fn block(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            outbound_type: OutboundType::Block,
            bind_interface: None,
            routing_mark: None,
            connect_timeout_secs: 0,
            enabled: true,
        }
    }

    /// Validate outbound configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` for an invalid tag or interface.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_tag(&self.tag, "Outbound")?;

        // Interface name length limit (IFNAMSIZ = 16 on Linux)
        if let Some(ref iface) = self.bind_interface {
            if iface.len() > 15 {
                return Err(ConfigError::ValidationError(format!(
                    "Interface name '{iface}' too long (max 15 chars)"
                )));
            }
        }

        if self.outbound_type == OutboundType::Direct && self.connect_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(format!(
                "Outbound '{}': connect_timeout_secs must be greater than 0",
                self.tag
            )));
        }

        Ok(())
    }

    /// Get connect timeout as Duration
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Outbound types supported by rust-balancer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboundType {
    /// Direct connection to destination
    Direct,

    /// Block/drop connection
    Block,
}

impl std::fmt::Display for OutboundType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Block => write!(f, "block"),
        }
    }
}

/// Outbound group configuration
///
/// Group-common options (members and providers) plus the options of the
/// selection strategy.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GroupConfig {
    /// Unique tag for this group
    pub tag: String,

    /// Group type, selects the registered constructor
    #[serde(rename = "type", default = "default_group_type")]
    pub group_type: String,

    /// Member outbound tags, wrapped into a static provider
    #[serde(default)]
    pub outbounds: Vec<String>,

    /// Provider tags looked up in the provider manager
    #[serde(default)]
    pub providers: Vec<String>,

    /// Strategy options
    #[serde(default)]
    pub strategy: StrategyConfig,
}

impl GroupConfig {
    /// Create a load-balance group over `outbounds`
    pub fn load_balance(tag: impl Into<String>, outbounds: Vec<String>) -> Self {
        Self {
            tag: tag.into(),
            group_type: default_group_type(),
            outbounds,
            providers: Vec::new(),
            strategy: StrategyConfig::default(),
        }
    }

    /// Validate group configuration against the set of known outbound tags
    ///
    /// Provider tags are resolved when the group starts.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` for unknown or self references.
    pub fn validate(&self, known_tags: &HashSet<&str>) -> Result<(), ConfigError> {
        for member in &self.outbounds {
            if member == &self.tag {
                return Err(ConfigError::ValidationError(format!(
                    "Group '{}' cannot contain itself",
                    self.tag
                )));
            }
            if !known_tags.contains(member.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "Group '{}' references unknown outbound '{member}'",
                    self.tag
                )));
            }
        }

        for tag in self.strategy.weights.keys() {
            if !self.outbounds.contains(tag) && self.providers.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "Group '{}' has a weight for non-member '{tag}'",
                    self.tag
                )));
            }
        }

        self.strategy
            .validate()
            .map_err(|e| ConfigError::ValidationError(format!("Group '{}': {e}", self.tag)))
    }
}

/// Selection strategy options
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyConfig {
    /// Selection algorithm among healthy candidates
    #[serde(default)]
    pub algorithm: LbAlgorithm,

    /// Consecutive failures before a member is deprioritized
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,

    /// How long a deprioritized member stays out of rotation, in seconds
    #[serde(default = "default_failure_cooldown_secs")]
    pub failure_cooldown_secs: u64,

    /// Interval of the background recovery sweep, in seconds
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,

    /// Per-member weights for the weighted algorithm (default 1)
    #[serde(default)]
    pub weights: HashMap<String, u32>,
}

impl StrategyConfig {
    /// Validate strategy options
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_failures == 0 {
            return Err("max_failures must be greater than 0".into());
        }
        if self.check_interval_secs == 0 {
            return Err("check_interval_secs must be greater than 0".into());
        }
        if let Some((tag, _)) = self.weights.iter().find(|(_, w)| **w == 0) {
            return Err(format!("weight for '{tag}' must be positive"));
        }
        Ok(())
    }

    /// Get the failure cooldown as Duration
    #[must_use]
    pub const fn failure_cooldown(&self) -> Duration {
        Duration::from_secs(self.failure_cooldown_secs)
    }

    /// Get the recovery sweep interval as Duration
    #[must_use]
    pub const fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    /// Weight of a member, 1 when not configured
    #[must_use]
    pub fn weight(&self, tag: &str) -> u32 {
        self.weights.get(tag).copied().unwrap_or(1)
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            algorithm: LbAlgorithm::default(),
            max_failures: default_max_failures(),
            failure_cooldown_secs: default_failure_cooldown_secs(),
            check_interval_secs: default_check_interval_secs(),
            weights: HashMap::new(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Include target (module path)
    #[serde(default = "default_true")]
    pub target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            target: true,
        }
    }
}

/// Connection limits for the relay connection manager
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectionConfig {
    /// Maximum concurrent relayed connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Upstream connect timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Datagram buffer size
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Idle timeout of relayed packet sessions in seconds
    #[serde(default = "default_udp_timeout_secs")]
    pub udp_timeout_secs: u64,
}

impl ConnectionConfig {
    /// Validate connection limits
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` for zero limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "max_connections must be greater than 0".into(),
            ));
        }
        if self.buffer_size == 0 {
            return Err(ConfigError::ValidationError(
                "buffer_size must be greater than 0".into(),
            ));
        }
        if self.udp_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "udp_timeout_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Get connect timeout as Duration
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Get packet session idle timeout as Duration
    #[must_use]
    pub const fn udp_timeout(&self) -> Duration {
        Duration::from_secs(self.udp_timeout_secs)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout_secs(),
            buffer_size: default_buffer_size(),
            udp_timeout_secs: default_udp_timeout_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_group_type() -> String {
    TYPE_LOAD_BALANCE.to_string()
}

fn default_max_failures() -> u32 {
    3
}

fn default_failure_cooldown_secs() -> u64 {
    30
}

fn default_check_interval_secs() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

fn default_max_connections() -> usize {
    65536
}

fn default_buffer_size() -> usize {
    64 * 1024
}

fn default_udp_timeout_secs() -> u64 {
    300
}
