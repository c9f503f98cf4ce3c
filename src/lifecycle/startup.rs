//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the pool from validated configuration
//! - Warm the primary before any caller gets a client
//! - Start the background maintainer
//!
//! # Design Decisions
//! - A failed warm-up is logged, not fatal; callers fall back to on-demand connects
//! - Stopping waits for the maintainer, then closes every idle connection

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;

use crate::client::Client;
use crate::config::GatewayConfig;
use crate::health::Maintainer;
use crate::lifecycle::Shutdown;
use crate::pool::PoolManager;
use crate::upstream::Connector;

const MAINTAINER_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// A started pool with its client façade and background maintainer.
pub struct Gateway<C: Connector> {
    pool: PoolManager<C>,
    client: Client<C>,
    maintainer: Option<JoinHandle<()>>,
}

impl<C: Connector> Gateway<C> {
    pub async fn start(connector: C, config: &GatewayConfig, shutdown: &Shutdown) -> Self {
        let pool = PoolManager::from_config(connector, config);

        let maintainer = Maintainer::new(pool.clone(), &config.health);
        maintainer.warm_up().await;

        let maintainer = if config.health.enabled {
            Some(maintainer.spawn(shutdown.subscribe()))
        } else {
            tracing::info!("Pool maintainer disabled");
            None
        };

        let client = Client::from_config(pool.clone(), config);
        tracing::info!(
            current_server = ?pool.current_server().map(|s| s.to_string()),
            "Gateway started"
        );

        Self {
            pool,
            client,
            maintainer,
        }
    }

    pub fn pool(&self) -> &PoolManager<C> {
        &self.pool
    }

    pub fn client(&self) -> &Client<C> {
        &self.client
    }

    /// Wait for the maintainer to exit and close all idle connections.
    /// Expects the shutdown signal to have been triggered.
    pub async fn stop(self) {
        if let Some(handle) = self.maintainer {
            match time::timeout(MAINTAINER_STOP_TIMEOUT, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "Pool maintainer task failed"),
                Err(_) => tracing::warn!("Pool maintainer did not stop in time"),
            }
        }
        self.pool.close_all().await;
    }
}
