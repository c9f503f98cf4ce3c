//! Configuration validation.
//!
//! # Design Decisions
//! - Serde handles syntax; this module checks semantics
//! - Returns all validation errors, not just the first
//! - Pure function: GatewayConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no upstream servers configured")]
    NoServers,

    #[error("server #{index} has an empty host")]
    EmptyHost { index: usize },

    #[error("server #{index} ({host}) has port 0")]
    InvalidPort { index: usize, host: String },

    #[error("server {host}:{port} is listed more than once")]
    DuplicateServer { host: String, port: u16 },

    #[error("pool.primary index {index} is out of range for {count} servers")]
    PrimaryOutOfRange { index: usize, count: usize },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("health.low_water_mark ({low_water}) exceeds pool.max_connections_per_server ({max})")]
    LowWaterAboveCapacity { low_water: usize, max: usize },

    #[error("{field} is not a valid socket address: {value}")]
    InvalidAddress { field: &'static str, value: String },
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.servers.is_empty() {
        errors.push(ValidationError::NoServers);
    }

    let mut seen = HashSet::new();
    for (index, server) in config.servers.iter().enumerate() {
        if server.host.trim().is_empty() {
            errors.push(ValidationError::EmptyHost { index });
        }
        if server.port == 0 {
            errors.push(ValidationError::InvalidPort {
                index,
                host: server.host.clone(),
            });
        }
        if !seen.insert((server.host.as_str(), server.port)) {
            errors.push(ValidationError::DuplicateServer {
                host: server.host.clone(),
                port: server.port,
            });
        }
    }

    if !config.servers.is_empty() && config.pool.primary >= config.servers.len() {
        errors.push(ValidationError::PrimaryOutOfRange {
            index: config.pool.primary,
            count: config.servers.len(),
        });
    }

    let positive: [(&'static str, u64); 6] = [
        ("pool.max_connections_per_server", config.pool.max_connections_per_server as u64),
        ("pool.retry_times", u64::from(config.pool.retry_times)),
        ("health.unhealthy_threshold", u64::from(config.health.unhealthy_threshold)),
        ("health.check_interval_secs", config.health.check_interval_secs),
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.probe_secs", config.timeouts.probe_secs),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    if config.health.low_water_mark > config.pool.max_connections_per_server {
        errors.push(ValidationError::LowWaterAboveCapacity {
            low_water: config.health.low_water_mark,
            max: config.pool.max_connections_per_server,
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

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
