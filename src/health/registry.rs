//! Per-server health bookkeeping.
//!
//! # State Transitions
//! ```text
//! Unknown   → Healthy:   any successful connect, probe or recovery attempt
//! Healthy   → Unhealthy: consecutive_failures >= unhealthy_threshold
//! Unhealthy → Healthy:   cool-down elapsed AND next attempt succeeds
//! ```
//!
//! The registry holds no locks of its own; the pool manager mutates it under
//! its metadata mutex. Timestamps use tokio's clock so a paused test runtime
//! can fast-forward through cool-downs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::pool::server::ServerKey;

/// Health state of one upstream server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Unknown,
    Healthy,
    Unhealthy,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Unknown => "unknown",
            HealthState::Healthy => "healthy",
            HealthState::Unhealthy => "unhealthy",
        }
    }
}

/// Thresholds driving the state machine.
#[derive(Debug, Clone, Copy)]
pub struct HealthPolicy {
    /// Consecutive failures before a server is marked unhealthy.
    pub unhealthy_threshold: u32,
    /// Cool-down after the last failure before an unhealthy server is retried.
    pub recovery_time: Duration,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            unhealthy_threshold: 3,
            recovery_time: Duration::from_secs(300),
        }
    }
}

/// Health record for one server.
#[derive(Debug, Clone)]
pub struct ServerHealth {
    pub state: HealthState,
    pub consecutive_failures: u32,
    pub last_failure_at: Option<Instant>,
    pub last_success_at: Option<Instant>,
}

impl Default for ServerHealth {
    fn default() -> Self {
        Self {
            state: HealthState::Unknown,
            consecutive_failures: 0,
            last_failure_at: None,
            last_success_at: None,
        }
    }
}

impl ServerHealth {
    fn mark_success(&mut self, now: Instant) {
        self.state = HealthState::Healthy;
        self.consecutive_failures = 0;
        self.last_success_at = Some(now);
    }

    /// Returns true if this failure moved the server into `Unhealthy`.
    fn mark_failure(&mut self, threshold: u32, now: Instant) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure_at = Some(now);

        if self.consecutive_failures >= threshold && self.state != HealthState::Unhealthy {
            self.state = HealthState::Unhealthy;
            return true;
        }
        false
    }

    /// True once the cool-down since the last failure has elapsed.
    fn cool_down_elapsed(&self, recovery_time: Duration, now: Instant) -> bool {
        match self.last_failure_at {
            Some(at) => now.saturating_duration_since(at) >= recovery_time,
            None => true,
        }
    }

    /// Unhealthy servers are unavailable until their cool-down elapses.
    pub fn is_available(&self, recovery_time: Duration, now: Instant) -> bool {
        self.state != HealthState::Unhealthy || self.cool_down_elapsed(recovery_time, now)
    }
}

/// Health records for every registered server.
#[derive(Debug)]
pub struct HealthRegistry {
    policy: HealthPolicy,
    servers: HashMap<ServerKey, ServerHealth>,
}

impl HealthRegistry {
    pub fn new(policy: HealthPolicy) -> Self {
        Self {
            policy,
            servers: HashMap::new(),
        }
    }

    pub fn policy(&self) -> HealthPolicy {
        self.policy
    }

    /// Start tracking `key` in the `Unknown` state. No-op if already tracked.
    pub fn register(&mut self, key: ServerKey) {
        self.servers.entry(key).or_default();
    }

    pub fn record_success(&mut self, key: &ServerKey) {
        let now = Instant::now();
        let health = self.servers.entry(key.clone()).or_default();
        if health.state == HealthState::Unhealthy {
            tracing::info!(server = %key, "Server recovered");
        }
        health.mark_success(now);
    }

    pub fn record_failure(&mut self, key: &ServerKey) {
        let now = Instant::now();
        let threshold = self.policy.unhealthy_threshold;
        let health = self.servers.entry(key.clone()).or_default();
        if health.mark_failure(threshold, now) {
            tracing::warn!(
                server = %key,
                consecutive_failures = health.consecutive_failures,
                "Server marked unhealthy"
            );
        }
    }

    /// False only while the server is unhealthy and inside its cool-down.
    /// Unregistered servers are available.
    pub fn is_available(&self, key: &ServerKey) -> bool {
        self.servers
            .get(key)
            .map_or(true, |h| h.is_available(self.policy.recovery_time, Instant::now()))
    }

    /// True for an unhealthy server whose cool-down has elapsed.
    pub fn recovery_due(&self, key: &ServerKey) -> bool {
        self.servers.get(key).is_some_and(|h| {
            h.state == HealthState::Unhealthy
                && h.cool_down_elapsed(self.policy.recovery_time, Instant::now())
        })
    }

    pub fn state(&self, key: &ServerKey) -> HealthState {
        self.servers
            .get(key)
            .map_or(HealthState::Unknown, |h| h.state)
    }

    pub fn get(&self, key: &ServerKey) -> Option<&ServerHealth> {
        self.servers.get(key)
    }
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new(HealthPolicy::default())
    }
}
