//! Failover candidate ordering.
//!
//! A priority list, not a load-balancing policy:
//! 1. the pinned primary, if available
//! 2. every other server in registration order, if available
//! 3. if nothing is available, every registered server in registration
//!    order (forced retry); the pinned primary gets no precedence here

use crate::health::registry::HealthRegistry;
use crate::pool::server::ServerDescriptor;

/// Servers to try for the next acquisition, best first.
///
/// Only empty when no servers are registered.
pub fn candidates(
    servers: &[ServerDescriptor],
    primary: usize,
    health: &HealthRegistry,
) -> Vec<ServerDescriptor> {
    let mut ordered = Vec::with_capacity(servers.len());

    if let Some(server) = servers.get(primary) {
        if health.is_available(&server.key()) {
            ordered.push(server.clone());
        }
    }

    for (index, server) in servers.iter().enumerate() {
        if index != primary && health.is_available(&server.key()) {
            ordered.push(server.clone());
        }
    }

    if ordered.is_empty() && !servers.is_empty() {
        tracing::warn!(
            server_count = servers.len(),
            "All servers cooling down, forcing retry of every server"
        );
        ordered.extend_from_slice(servers);
    }

    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::registry::{HealthPolicy, HealthState};
    use std::time::Duration;

    fn servers() -> Vec<ServerDescriptor> {
        vec![
            ServerDescriptor::new("10.0.0.1", 7709),
            ServerDescriptor::new("10.0.0.2", 7709),
            ServerDescriptor::new("10.0.0.3", 7709),
        ]
    }

    fn registry() -> HealthRegistry {
        HealthRegistry::new(HealthPolicy {
            unhealthy_threshold: 1,
            recovery_time: Duration::from_secs(300),
        })
    }

    #[test]
    fn primary_first_then_registration_order() {
        let servers = servers();
        let order = candidates(&servers, 1, &registry());
        assert_eq!(order, vec![servers[1].clone(), servers[0].clone(), servers[2].clone()]);
    }

    #[test]
    fn unavailable_servers_are_skipped() {
        let servers = servers();
        let mut health = registry();
        health.record_failure(&servers[0].key());

        let order = candidates(&servers, 0, &health);
        assert_eq!(order, vec![servers[1].clone(), servers[2].clone()]);
    }

    #[test]
    fn healthy_server_always_candidate() {
        let servers = servers();
        let mut health = registry();
        health.record_failure(&servers[0].key());
        health.record_failure(&servers[2].key());
        health.record_success(&servers[1].key());
        assert_eq!(health.state(&servers[1].key()), HealthState::Healthy);

        for primary in 0..servers.len() {
            assert!(candidates(&servers, primary, &health).contains(&servers[1]));
        }
    }

    #[test]
    fn all_unavailable_forces_full_list_in_registration_order() {
        let servers = servers();
        let mut health = registry();
        for server in &servers {
            health.record_failure(&server.key());
        }

        let order = candidates(&servers, 2, &health);
        assert_eq!(order, servers);
    }

    #[test]
    fn no_servers_no_candidates() {
        assert!(candidates(&[], 0, &registry()).is_empty());
    }
}
