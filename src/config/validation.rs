//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (`requires` names configured services)
//! - Validate value ranges (intervals, timeouts, thresholds)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::availability::ServiceName;
use crate::config::schema::ControlPlaneConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("health.timeout_secs ({timeout}) must not exceed health.interval_secs ({interval})")]
    TimeoutExceedsInterval { timeout: u64, interval: u64 },

    #[error("service '{0}' is configured more than once")]
    DuplicateService(ServiceName),

    #[error("service '{0}' has an empty address")]
    EmptyAddress(ServiceName),

    #[error("service '{service}' requires '{dependency}', which is not configured")]
    UnknownDependency { service: ServiceName, dependency: ServiceName },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ControlPlaneConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "server.bind_address",
            value: config.server.bind_address.clone(),
        });
    }
    if config.admin.enabled && config.admin.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "admin.bind_address",
            value: config.admin.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    let health = &config.health;
    for (field, value) in [
        ("health.interval_secs", health.interval_secs),
        ("health.timeout_secs", health.timeout_secs),
        ("health.failure_threshold", u64::from(health.failure_threshold)),
        ("health.recovery_threshold", u64::from(health.recovery_threshold)),
    ] {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }
    if health.timeout_secs > health.interval_secs {
        errors.push(ValidationError::TimeoutExceedsInterval {
            timeout: health.timeout_secs,
            interval: health.interval_secs,
        });
    }

    let mut seen = HashSet::new();
    for service in &config.services {
        if !seen.insert(service.name) {
            errors.push(ValidationError::DuplicateService(service.name));
        }
        if service.address.trim().is_empty() {
            errors.push(ValidationError::EmptyAddress(service.name));
        }
    }
    for service in &config.services {
        for dependency in &service.requires {
            if !seen.contains(dependency) {
                errors.push(ValidationError::UnknownDependency {
                    service: service.name,
                    dependency: *dependency,
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
