//! Background pool maintenance.
//!
//! # Responsibilities
//! - Warm the primary's pool before traffic is accepted
//! - Retry unhealthy servers once their cool-down has elapsed
//! - Keep healthy servers' idle pools above a low-water mark
//!
//! # Design Decisions
//! - Started explicitly and stopped through the shutdown broadcast
//! - A panicking pass is logged and followed by a back-off, never fatal

use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::health::registry::HealthState;
use crate::observability::metrics;
use crate::pool::{PoolManager, ServerDescriptor};
use crate::upstream::Connector;

pub struct Maintainer<C: Connector> {
    pool: PoolManager<C>,
    interval: Duration,
    error_backoff: Duration,
    low_water_mark: usize,
}

impl<C: Connector> Maintainer<C> {
    pub fn new(pool: PoolManager<C>, config: &HealthCheckConfig) -> Self {
        Self {
            pool,
            interval: config.check_interval(),
            error_backoff: config.error_backoff(),
            low_water_mark: config.low_water_mark,
        }
    }

    /// Fill the primary's pool up to the configured warm-up size.
    /// Returns how many connections were added.
    pub async fn warm_up(&self) -> usize {
        let Some(server) = self.pool.current_server() else {
            return 0;
        };
        let settings = self.pool.settings();
        let target = settings
            .warmup_connections
            .min(settings.max_connections_per_server);
        let missing = target.saturating_sub(self.pool.idle_count(&server.key()));

        let mut warmed = 0;
        for _ in 0..missing {
            if !self.replenish(&server, "warm-up").await {
                break;
            }
            warmed += 1;
        }
        tracing::info!(server = %server, warmed, "Pool warm-up finished");
        warmed
    }

    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            low_water_mark = self.low_water_mark,
            "Pool maintainer starting"
        );

        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match AssertUnwindSafe(self.run_pass()).catch_unwind().await {
                        Ok(()) => metrics::record_maintainer_pass("ok"),
                        Err(panic) => {
                            metrics::record_maintainer_pass("panicked");
                            tracing::error!(
                                error = %panic_message(panic.as_ref()),
                                backoff_secs = self.error_backoff.as_secs(),
                                "Maintainer pass panicked"
                            );
                            tokio::select! {
                                _ = time::sleep(self.error_backoff) => {}
                                _ = shutdown.recv() => break,
                            }
                        }
                    }
                }
                _ = shutdown.recv() => break,
            }
        }

        tracing::info!("Pool maintainer received shutdown signal, exiting loop");
    }

    /// One maintenance sweep over every registered server.
    pub async fn run_pass(&self) {
        for server in self.pool.servers() {
            let key = server.key();
            if self.pool.recovery_due(&key) {
                tracing::info!(server = %server, "Cool-down elapsed, attempting recovery");
                self.replenish(&server, "recovery").await;
            } else if self.pool.health_state(&key) == HealthState::Healthy
                && self.pool.idle_count(&key) < self.low_water_mark
            {
                self.replenish(&server, "top-up").await;
            }
        }
    }

    /// Open one connection and park it idle. Records the outcome.
    async fn replenish(&self, server: &ServerDescriptor, reason: &'static str) -> bool {
        match self.pool.open(server).await {
            Ok(conn) => {
                self.pool.record_success(server);
                self.pool.release(conn).await;
                tracing::debug!(server = %server, reason, "Added idle connection");
                true
            }
            Err(e) => {
                self.pool.record_failure(server);
                tracing::warn!(server = %server, reason, error = %e, "Maintenance connect failed");
                false
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl<C: Connector> PoolManager<C> {
    /// Spawn the background maintainer for this pool.
    pub fn start_maintainer(
        &self,
        config: &HealthCheckConfig,
        shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        Maintainer::new(self.clone(), config).spawn(shutdown)
    }
}
