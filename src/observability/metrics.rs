//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_connections_opened_total` (counter): sessions opened, by server
//! - `gateway_connect_failures_total` (counter): failed connect attempts, by server
//! - `gateway_probe_failures_total` (counter): stale idle sessions discarded, by server
//! - `gateway_acquire_total` (counter): acquisitions by outcome (reused/created/exhausted)
//! - `gateway_operations_total` (counter): façade operations by outcome
//! - `gateway_operation_duration_seconds` (histogram): façade operation latency
//! - `gateway_idle_connections` (gauge): idle pool size, by server
//! - `gateway_server_health` (gauge): 1=healthy, 0=unknown, -1=unhealthy
//! - `gateway_maintainer_passes_total` (counter): maintainer passes by outcome (ok/panicked)

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use tokio::time::Instant;

use crate::health::registry::HealthState;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_connection_opened(server: &str) {
    metrics::counter!("gateway_connections_opened_total", "server" => server.to_owned()).increment(1);
}

pub fn record_connect_failure(server: &str) {
    metrics::counter!("gateway_connect_failures_total", "server" => server.to_owned()).increment(1);
}

pub fn record_probe_failure(server: &str) {
    metrics::counter!("gateway_probe_failures_total", "server" => server.to_owned()).increment(1);
}

pub fn record_acquire(outcome: &'static str) {
    metrics::counter!("gateway_acquire_total", "outcome" => outcome).increment(1);
}

pub fn record_operation(outcome: &'static str, started: Instant) {
    metrics::counter!("gateway_operations_total", "outcome" => outcome).increment(1);
    metrics::histogram!("gateway_operation_duration_seconds")
        .record(started.elapsed().as_secs_f64());
}

pub fn record_idle_connections(server: &str, idle: usize) {
    metrics::gauge!("gateway_idle_connections", "server" => server.to_owned()).set(idle as f64);
}

pub fn record_server_health(server: &str, state: HealthState) {
    let value = match state {
        HealthState::Healthy => 1.0,
        HealthState::Unknown => 0.0,
        HealthState::Unhealthy => -1.0,
    };
    metrics::gauge!("gateway_server_health", "server" => server.to_owned()).set(value);
}

pub fn record_maintainer_pass(outcome: &'static str) {
    metrics::counter!("gateway_maintainer_passes_total", "outcome" => outcome).increment(1);
}
