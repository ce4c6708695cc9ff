//! Configuration loading
//!
//! Configurations are JSON documents. `load_config_with_env` additionally
//! applies `RUST_BALANCER_*` environment overrides before validating:
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `RUST_BALANCER_LOG_LEVEL` | `log.level` |
//! | `RUST_BALANCER_MAX_CONNECTIONS` | `connection.max_connections` |
//! | `RUST_BALANCER_STRATEGY_<OPTION>` | strategy option of every group |
//! | `RUST_BALANCER_GROUP_<TAG>_<OPTION>` | strategy option of one group |
//!
//! `<OPTION>` is one of `ALGORITHM`, `MAX_FAILURES`, `FAILURE_COOLDOWN_SECS`
//! or `CHECK_INTERVAL_SECS`. `<TAG>` is the group tag upper-cased with every
//! other character replaced by `_`. Group overrides win over global ones.

use std::fmt::Display;
use std::io;
use std::path::Path;
use std::str::FromStr;

use tracing::{debug, info};

use super::types::{Config, StrategyConfig};
use crate::error::ConfigError;

const ENV_PREFIX: &str = "RUST_BALANCER_";

/// Load and validate a configuration file
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if `path` does not exist, and
/// `ParseError` / `ValidationError` for unusable contents.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let config = read_config(path)?;
    config.validate()?;
    log_loaded(&config, path);
    Ok(config)
}

/// Parse and validate a configuration held in memory
///
/// # Errors
///
/// Returns `ConfigError` if parsing or validation fails.
pub fn load_config_str(json: &str) -> Result<Config, ConfigError> {
    let config = parse_config(json, "<inline>")?;
    config.validate()?;
    Ok(config)
}

/// Load a configuration file, apply environment overrides, then validate
///
/// # Errors
///
/// Returns `ConfigError::EnvError` for an override that does not parse, and
/// any error of `load_config`.
pub fn load_config_with_env(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let mut config = read_config(path)?;

    let applied = apply_overrides(&mut config, |name| std::env::var(name).ok())?;
    if applied > 0 {
        debug!("Applied {} environment overrides", applied);
    }

    config.validate()?;
    log_loaded(&config, path);
    Ok(config)
}

/// Apply `RUST_BALANCER_*` overrides looked up through `lookup`.
///
/// Returns the number of overridden values. The result is not validated.
///
/// # Errors
///
/// Returns `ConfigError::EnvError` naming the first variable whose value
/// does not parse.
pub fn apply_overrides<F>(config: &mut Config, lookup: F) -> Result<usize, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut applied = 0;

    let name = format!("{ENV_PREFIX}LOG_LEVEL");
    if let Some(level) = lookup(&name) {
        config.log.level = level;
        applied += 1;
    }

    let name = format!("{ENV_PREFIX}MAX_CONNECTIONS");
    if let Some(value) = lookup(&name) {
        config.connection.max_connections = parse_var(&name, &value)?;
        applied += 1;
    }

    let global = format!("{ENV_PREFIX}STRATEGY_");
    for group in &mut config.groups {
        applied += override_strategy(&mut group.strategy, &global, &lookup)?;

        let scoped = format!("{ENV_PREFIX}GROUP_{}_", env_tag(&group.tag));
        let count = override_strategy(&mut group.strategy, &scoped, &lookup)?;
        if count > 0 {
            debug!("Strategy of group '{}' overridden from environment", group.tag);
        }
        applied += count;
    }

    Ok(applied)
}

/// Write the default configuration to `path`
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be written.
pub fn create_default_config(path: impl AsRef<Path>) -> Result<(), ConfigError> {
    let path = path.as_ref();
    let mut json = serde_json::to_string_pretty(&Config::default_config())
        .map_err(|e| ConfigError::ParseError(format!("Failed to serialize config: {e}")))?;
    json.push('\n');

    std::fs::write(path, json)?;
    info!("Default configuration written to {:?}", path);
    Ok(())
}

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    debug!("Loading configuration from {:?}", path);

    let contents = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ConfigError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => ConfigError::IoError(e),
    })?;

    parse_config(&contents, &path.display().to_string())
}

fn parse_config(json: &str, origin: &str) -> Result<Config, ConfigError> {
    serde_json::from_str(json).map_err(|e| ConfigError::ParseError(format!("{origin}: {e}")))
}

fn log_loaded(config: &Config, path: &Path) {
    let groups: Vec<&str> = config.groups.iter().map(|g| g.tag.as_str()).collect();
    info!(
        "Configuration loaded from {:?}: {} outbounds, groups [{}]",
        path,
        config.outbounds.len(),
        groups.join(", ")
    );
}

fn override_strategy<F>(
    strategy: &mut StrategyConfig,
    prefix: &str,
    lookup: &F,
) -> Result<usize, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut applied = 0;

    let name = format!("{prefix}ALGORITHM");
    if let Some(value) = lookup(&name) {
        strategy.algorithm = parse_var(&name, &value)?;
        applied += 1;
    }

    let name = format!("{prefix}MAX_FAILURES");
    if let Some(value) = lookup(&name) {
        strategy.max_failures = parse_var(&name, &value)?;
        applied += 1;
    }

    let name = format!("{prefix}FAILURE_COOLDOWN_SECS");
    if let Some(value) = lookup(&name) {
        strategy.failure_cooldown_secs = parse_var(&name, &value)?;
        applied += 1;
    }

    let name = format!("{prefix}CHECK_INTERVAL_SECS");
    if let Some(value) = lookup(&name) {
        strategy.check_interval_secs = parse_var(&name, &value)?;
        applied += 1;
    }

    Ok(applied)
}

fn parse_var<T>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    value.trim().parse().map_err(|e| ConfigError::EnvError {
        name: name.to_string(),
        reason: format!("invalid value '{value}': {e}"),
    })
}

/// `us-east-1` becomes `US_EAST_1`
fn env_tag(tag: &str) -> String {
    tag.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
