//! Configuration module for rust-balancer
//!
//! This module provides configuration types and loading utilities.
//!
//! # Example
//!
//! ```no_run
//! use rust_balancer::config::load_config;
//!
//! let config = load_config("/etc/rust-balancer/config.json").unwrap();
//! println!("Groups: {}", config.groups.len());
//! ```

mod loader;
mod types;

pub use loader::{
    apply_overrides, create_default_config, load_config, load_config_str, load_config_with_env,
};
pub use types::{
    Config, ConnectionConfig, GroupConfig, LogConfig, OutboundConfig, OutboundType,
    StrategyConfig,
};
