//! Error types for rust-balancer
//!
//! This module defines the error hierarchy for the load-balancing outbound
//! group. Errors are categorized by subsystem and include recovery hints.

use std::io;

use thiserror::Error;

use crate::adapter::{Destination, Network};

/// Top-level error type for rust-balancer
#[derive(Debug, Error)]
pub enum BalancerError {
    /// Configuration errors (file parsing, validation)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Outbound dial/listen errors
    #[error("Outbound error: {0}")]
    Outbound(#[from] OutboundError),

    /// Provider resolution errors
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Selection strategy errors
    #[error("Strategy error: {0}")]
    Strategy(#[from] StrategyError),

    /// Group lifecycle errors
    #[error("Group error: {0}")]
    Group(#[from] GroupError),

    /// Connection handling errors
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// I/O errors not covered by other categories
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl BalancerError {
    /// Check if this error is recoverable (can retry operation)
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Config(_) => false,
            Self::Outbound(e) => e.is_recoverable(),
            Self::Provider(e) => e.is_recoverable(),
            Self::Strategy(e) => e.is_recoverable(),
            Self::Group(e) => e.is_recoverable(),
            Self::Connection(e) => e.is_recoverable(),
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::TimedOut
                    | io::ErrorKind::Interrupted
                    | io::ErrorKind::WouldBlock
                    | io::ErrorKind::ConnectionReset
            ),
        }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File not found or inaccessible
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Validation error (invalid values, missing required fields)
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    /// Environment variable error
    #[error("Environment variable error: {name}: {reason}")]
    EnvError { name: String, reason: String },

    /// I/O error while reading config
    #[error("I/O error reading configuration: {0}")]
    IoError(#[from] io::Error),
}

impl ConfigError {
    /// Config errors are generally not recoverable without user intervention
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        false
    }
}

/// Outbound dial and listen errors
#[derive(Debug, Error)]
pub enum OutboundError {
    /// Connection failed
    #[error("Failed to connect to {addr}: {reason}")]
    ConnectionFailed { addr: Destination, reason: String },

    /// Connection timeout
    #[error("Connection to {addr} timed out after {timeout_secs}s")]
    Timeout { addr: Destination, timeout_secs: u64 },

    /// Outbound not found
    #[error("Outbound not found: {tag}")]
    NotFound { tag: String },

    /// Outbound is disabled or otherwise refusing traffic
    #[error("Outbound {tag} is unavailable: {reason}")]
    Unavailable { tag: String, reason: String },

    /// The outbound does not carry the requested network
    #[error("Outbound {tag} does not support network {network}")]
    UnsupportedNetwork { tag: String, network: Network },

    /// The selection strategy had no candidate to offer
    #[error("no outbound available")]
    NoOutboundAvailable,

    /// The request context was cancelled while the attempt was in flight
    #[error("Request cancelled")]
    Cancelled,

    /// Failed to set socket option (SO_BINDTODEVICE, SO_MARK)
    #[error("Failed to set outbound socket option {option}: {reason}")]
    SocketOption { option: String, reason: String },

    /// I/O error during connection
    #[error("Outbound I/O error: {0}")]
    IoError(#[from] io::Error),
}

impl OutboundError {
    /// Check if this error is recoverable
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } => true,
            Self::Timeout { .. } => true,
            Self::NotFound { .. } => false,
            Self::Unavailable { .. } => true,
            Self::UnsupportedNetwork { .. } => false,
            Self::NoOutboundAvailable => false,
            Self::Cancelled => false,
            Self::SocketOption { .. } => false,
            Self::IoError(e) => matches!(
                e.kind(),
                io::ErrorKind::TimedOut
                    | io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::ConnectionReset
            ),
        }
    }

    /// Create a connection failed error
    pub fn connection_failed(addr: Destination, reason: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            addr,
            reason: reason.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(tag: impl Into<String>) -> Self {
        Self::NotFound { tag: tag.into() }
    }

    /// Create an unavailable error
    pub fn unavailable(tag: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            tag: tag.into(),
            reason: reason.into(),
        }
    }

    /// Create an unsupported network error
    pub fn unsupported_network(tag: impl Into<String>, network: Network) -> Self {
        Self::UnsupportedNetwork {
            tag: tag.into(),
            network,
        }
    }
}

/// Provider resolution errors
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Provider tag is not registered
    #[error("Provider not found: {tag}")]
    NotFound { tag: String },

    /// Member outbound tag is not registered
    #[error("Outbound not found: {tag}")]
    OutboundNotFound { tag: String },

    /// Provider refresh failed
    #[error("Failed to update provider {tag}: {reason}")]
    Update { tag: String, reason: String },
}

impl ProviderError {
    /// Check if this error is recoverable
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Update { .. })
    }

    /// Create a provider not found error
    pub fn not_found(tag: impl Into<String>) -> Self {
        Self::NotFound { tag: tag.into() }
    }

    /// Create an outbound not found error
    pub fn outbound_not_found(tag: impl Into<String>) -> Self {
        Self::OutboundNotFound { tag: tag.into() }
    }
}

/// Selection strategy errors
#[derive(Debug, Error)]
pub enum StrategyError {
    /// Strategy options are unusable
    #[error("Invalid strategy options: {0}")]
    InvalidOptions(String),

    /// Strategy failed to start its background work
    #[error("Failed to start strategy: {0}")]
    Start(String),

    /// Strategy was already closed
    #[error("Strategy already closed")]
    AlreadyClosed,
}

impl StrategyError {
    /// Strategy errors need a configuration change or a fresh instance
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        false
    }

    /// Create an invalid options error
    pub fn invalid_options(msg: impl Into<String>) -> Self {
        Self::InvalidOptions(msg.into())
    }
}

/// Group lifecycle errors
#[derive(Debug, Error)]
pub enum GroupError {
    /// Member resolution failed during start
    #[error("Failed to resolve providers: {0}")]
    ProviderResolution(#[from] ProviderError),

    /// Strategy construction or start failed
    #[error(transparent)]
    Strategy(#[from] StrategyError),

    /// `start` was called more than once
    #[error("Group {tag} already started")]
    AlreadyStarted { tag: String },

    /// A previous `start` failed; the group is permanently unusable
    #[error("Group {tag} failed to start earlier")]
    Failed { tag: String },

    /// The group was closed
    #[error("Group {tag} is closed")]
    Closed { tag: String },

    /// No constructor registered for the group type
    #[error("Unknown group type: {0}")]
    UnknownType(String),
}

impl GroupError {
    /// Group lifecycle errors are not retried
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        false
    }
}

/// Connection handling errors
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Connection pool exhausted
    #[error("Connection limit reached ({current}/{max})")]
    LimitReached { current: usize, max: usize },

    /// Upstream dial failed
    #[error("Failed to open upstream via {tag}: {source}")]
    Dial {
        tag: String,
        #[source]
        source: OutboundError,
    },

    /// Copy error during bidirectional transfer
    #[error("Data transfer error: {0}")]
    TransferError(String),

    /// Shutdown in progress
    #[error("Connection manager is shutting down")]
    ShuttingDown,

    /// I/O error
    #[error("Connection I/O error: {0}")]
    IoError(#[from] io::Error),
}

impl ConnectionError {
    /// Check if this error is recoverable
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::LimitReached { .. } => true,
            Self::Dial { source, .. } => source.is_recoverable(),
            Self::TransferError(_) => false,
            Self::ShuttingDown => false,
            Self::IoError(e) => matches!(
                e.kind(),
                io::ErrorKind::TimedOut
                    | io::ErrorKind::Interrupted
                    | io::ErrorKind::ConnectionReset
            ),
        }
    }

    /// Create a limit reached error
    pub const fn limit_reached(current: usize, max: usize) -> Self {
        Self::LimitReached { current, max }
    }

    /// Create a dial error
    pub fn dial(tag: impl Into<String>, source: OutboundError) -> Self {
        Self::Dial {
            tag: tag.into(),
            source,
        }
    }

    /// Create a transfer error
    pub fn transfer(msg: impl Into<String>) -> Self {
        Self::TransferError(msg.into())
    }
}

/// Type alias for Result with `BalancerError`
pub type Result<T> = std::result::Result<T, BalancerError>;
