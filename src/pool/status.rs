//! Snapshot types reported by the pool.

use serde::{Deserialize, Serialize};

use crate::health::registry::HealthState;
use crate::pool::server::ServerDescriptor;

/// Identity of one server in reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSummary {
    pub name: String,
    pub host: String,
    pub port: u16,
}

impl From<&ServerDescriptor> for ServerSummary {
    fn from(server: &ServerDescriptor) -> Self {
        Self {
            name: server.display_name(),
            host: server.host.clone(),
            port: server.port,
        }
    }
}

/// Per-server row of [`PoolStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub health_status: HealthState,
    pub fail_count: u32,
    pub idle_pool_size: usize,
    pub is_current: bool,
}

/// Point-in-time view of the whole pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatus {
    pub current_server: Option<ServerSummary>,
    pub max_connections_per_server: usize,
    pub retry_times: u32,
    pub servers: Vec<ServerStatus>,
}

/// Why a server test failed, or `Ok`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestOutcome {
    Ok,
    ConnectFailed,
    Timeout,
    HandshakeFailed,
}

/// Result of a one-off connectivity test against a server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerTestReport {
    pub server: ServerSummary,
    pub success: bool,
    pub latency_ms: u64,
    pub reason: TestOutcome,
    pub error: Option<String>,
}
