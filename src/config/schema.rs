//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::pool::server::ServerDescriptor;

/// Root configuration for the market-data gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Upstream servers, in failover priority order.
    pub servers: Vec<ServerConfig>,

    /// Connection pool sizing and retry settings.
    pub pool: PoolConfig,

    /// Health bookkeeping and background maintenance.
    pub health: HealthCheckConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Client façade behavior.
    pub client: ClientConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

impl GatewayConfig {
    /// Registered servers as descriptors, in configuration order.
    pub fn server_descriptors(&self) -> Vec<ServerDescriptor> {
        self.servers.iter().map(ServerConfig::descriptor).collect()
    }

    /// The configured primary server, if the index is in range.
    pub fn primary_server(&self) -> Option<ServerDescriptor> {
        self.servers.get(self.pool.primary).map(ServerConfig::descriptor)
    }
}

/// One upstream server entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Display name for logs and status output.
    #[serde(default)]
    pub name: Option<String>,

    /// Hostname or IP address.
    pub host: String,

    /// TCP port.
    pub port: u16,
}

impl ServerConfig {
    pub fn descriptor(&self) -> ServerDescriptor {
        ServerDescriptor {
            host: self.host.clone(),
            port: self.port,
            name: self.name.clone(),
        }
    }
}

/// Connection pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Index into `servers` of the initial primary.
    pub primary: usize,

    /// Idle connections kept per server.
    pub max_connections_per_server: usize,

    /// Connection attempts per server before moving to the next one.
    pub retry_times: u32,

    /// Fixed delay between attempts on the same server, in milliseconds.
    pub retry_backoff_ms: u64,

    /// Connections opened to the primary before serving traffic.
    pub warmup_connections: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            primary: 0,
            max_connections_per_server: 5,
            retry_times: 3,
            retry_backoff_ms: 500,
            warmup_connections: 2,
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Run the background maintainer.
    pub enabled: bool,

    /// Number of consecutive failures before marking unhealthy.
    pub unhealthy_threshold: u32,

    /// Cool-down before an unhealthy server is retried, in seconds.
    pub recovery_secs: u64,

    /// Maintainer pass interval in seconds.
    pub check_interval_secs: u64,

    /// Pause after a failed maintainer pass, in seconds.
    pub error_backoff_secs: u64,

    /// Healthy servers with fewer idle connections get one more per pass.
    pub low_water_mark: usize,
}

impl HealthCheckConfig {
    pub fn recovery_time(&self) -> Duration {
        Duration::from_secs(self.recovery_secs)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            unhealthy_threshold: 3,
            recovery_secs: 300,
            check_interval_secs: 60,
            error_backoff_secs: 10,
            low_water_mark: 2,
        }
    }
}

/// Timeout configuration for upstream calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment (including handshake) timeout in seconds.
    pub connect_secs: u64,

    /// Liveness probe timeout in seconds.
    pub probe_secs: u64,

    /// Per-operation deadline in seconds; 0 disables it.
    pub operation_secs: u64,
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn probe(&self) -> Duration {
        Duration::from_secs(self.probe_secs)
    }

    pub fn operation(&self) -> Option<Duration> {
        (self.operation_secs > 0).then(|| Duration::from_secs(self.operation_secs))
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 3,
            probe_secs: 2,
            operation_secs: 30,
        }
    }
}

/// Client façade configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Try a throwaway connection to the primary when the pool gives up.
    pub degraded_fallback: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            degraded_fallback: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:6999".to_string(),
            request_timeout_secs: 30,
        }
    }
}
