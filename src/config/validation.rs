//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (rate > 0, intervals > 0, ports valid)
//! - Reject unknown algorithm names and malformed backend addresses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BalancerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use crate::config::schema::BalancerConfig;
use crate::load_balancer::Algorithm;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("at least one backend must be configured")]
    NoBackends,

    #[error("backend address {0:?} is not a valid host:port")]
    InvalidBackendAddress(String),

    #[error("backend {0} is listed more than once")]
    DuplicateBackend(String),

    #[error("invalid algorithm {0:?}: must be roundrobin, leastconn, or hashing")]
    UnknownAlgorithm(String),

    #[error("rate must be a positive number of megabytes per second, got {0}")]
    InvalidRate(f64),

    #[error("port must be non-zero")]
    ZeroPort,

    #[error("health_check.{0} must be greater than zero")]
    ZeroHealthCheckSetting(&'static str),

    #[error("relay.buffer_size must be greater than zero")]
    ZeroBufferSize,
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &BalancerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.port == 0 {
        errors.push(ValidationError::ZeroPort);
    }

    let name = config.algorithm.trim();
    if !name.is_empty() && Algorithm::from_name(name).is_none() {
        errors.push(ValidationError::UnknownAlgorithm(config.algorithm.clone()));
    }

    if config.backends.is_empty() {
        errors.push(ValidationError::NoBackends);
    }

    let mut seen = HashSet::new();
    for address in &config.backends {
        if !is_host_port(address) {
            errors.push(ValidationError::InvalidBackendAddress(address.clone()));
        } else if !seen.insert(address.as_str()) {
            errors.push(ValidationError::DuplicateBackend(address.clone()));
        }
    }

    if !config.rate.is_finite() || config.rate <= 0.0 {
        errors.push(ValidationError::InvalidRate(config.rate));
    }

    if config.health_check.interval_secs == 0 {
        errors.push(ValidationError::ZeroHealthCheckSetting("interval_secs"));
    }
    if config.health_check.timeout_secs == 0 {
        errors.push(ValidationError::ZeroHealthCheckSetting("timeout_secs"));
    }

    if config.relay.buffer_size == 0 {
        errors.push(ValidationError::ZeroBufferSize);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// `host:port` with a non-empty host and a non-zero numeric port.
/// Bracketed IPv6 hosts (`[::1]:80`) are accepted.
fn is_host_port(address: &str) -> bool {
    let Some((host, port)) = address.rsplit_once(':') else {
        return false;
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');
    !host.is_empty()
        && !host.contains(char::is_whitespace)
        && matches!(port.parse::<u16>(), Ok(p) if p != 0)
}
