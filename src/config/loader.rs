//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use crate::config::schema::BalancerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid LB_PORT {0:?}: must be a port number")]
    InvalidPort(String),

    #[error("invalid LB_RATE {0:?}: must be a number")]
    InvalidRate(String),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load a TOML file, apply `LB_*` environment overrides and validate.
pub fn load_config(path: &Path) -> Result<BalancerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config = load_from_str(&content)?;
    finish(config, |key| std::env::var(key).ok())
}

/// Load from `path` when given, otherwise from defaults and the environment.
pub fn load(path: Option<&Path>) -> Result<BalancerConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => from_env(),
    }
}

/// Build a configuration from defaults plus `LB_*` environment variables only.
pub fn from_env() -> Result<BalancerConfig, ConfigError> {
    finish(BalancerConfig::default(), |key| std::env::var(key).ok())
}

/// Parse TOML without validating. Missing keys take their defaults.
pub fn load_from_str(content: &str) -> Result<BalancerConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Overlay `LB_PORT`, `LB_ALGORITHM`, `LB_BACKENDS` and `LB_RATE` onto `config`.
///
/// Unset or empty variables leave the current value untouched. `LB_BACKENDS`
/// is a comma-separated list; blank entries are dropped.
pub fn apply_env_overrides<F>(config: &mut BalancerConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(port) = var("LB_PORT") {
        config.port = port
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidPort(port.clone()))?;
    }

    if let Some(algorithm) = var("LB_ALGORITHM") {
        config.algorithm = algorithm.trim().to_string();
    }

    if let Some(backends) = var("LB_BACKENDS") {
        config.backends = backends
            .split(',')
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(String::from)
            .collect();
    }

    if let Some(rate) = var("LB_RATE") {
        config.rate = rate
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidRate(rate.clone()))?;
    }

    Ok(())
}

fn finish<F>(mut config: BalancerConfig, lookup: F) -> Result<BalancerConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    apply_env_overrides(&mut config, lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}
