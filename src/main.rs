//! Market-data gateway (v1)
//!
//! Keeps warm, health-checked connections to a set of redundant upstream
//! market-data servers and exposes an authenticated admin API.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────┐
//!                      │                MARKET GATEWAY                 │
//!                      │                                               │
//!     Caller           │  ┌────────┐    ┌──────────────┐    ┌───────┐  │
//!     ─────────────────┼─▶│ client │───▶│ pool manager │───▶│ idle  │  │
//!                      │  │ façade │    │  + failover  │    │ pools │  │
//!                      │  └────────┘    └──────┬───────┘    └───┬───┘  │
//!                      │                       │                │      │
//!                      │                       ▼                ▼      │
//!                      │               ┌──────────────┐   ┌─────────┐  │    Upstream
//!                      │               │    health    │   │upstream │◀─┼──▶ servers
//!                      │               │   registry   │   │  (tcp)  │  │
//!                      │               └──────▲───────┘   └─────────┘  │
//!                      │                      │                        │
//!                      │               ┌──────┴───────┐                │
//!                      │               │  maintainer  │                │
//!                      │               └──────────────┘                │
//!                      │                                               │
//!                      │  config + watcher · admin API · observability │
//!                      └──────────────────────────────────────────────┘
//! ```

use arc_swap::ArcSwap;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use market_gateway::admin::{self, AdminState};
use market_gateway::config::{load_config, watcher::ConfigWatcher};
use market_gateway::lifecycle::{Gateway, Shutdown};
use market_gateway::observability::{logging, metrics};
use market_gateway::upstream::tcp::TcpConnector;

#[derive(Parser)]
#[command(name = "market-gateway")]
#[command(about = "Health-aware connection pool for market-data servers", long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "gateway.toml")]
    config: PathBuf,

    /// Override the configured log level
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args.config)?;

    let level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.observability.log_level);
    logging::init_logging(level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        servers = config.servers.len(),
        "market-gateway starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let connector = TcpConnector::new(config.timeouts.probe());
    let gateway = Gateway::start(connector, &config, &shutdown).await;

    let admin_config = Arc::new(ArcSwap::from_pointee(config.admin.clone()));

    // Hot reload: server list, primary and admin settings.
    let (watcher, mut updates) = ConfigWatcher::new(&args.config);
    let _watcher = match watcher.run() {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            tracing::error!(error = %e, "Config watcher failed to start, hot reload disabled");
            None
        }
    };
    let reload_task = {
        let pool = gateway.pool().clone();
        let admin_config = Arc::clone(&admin_config);
        let mut shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    update = updates.recv() => {
                        let Some(new_config) = update else { break };
                        let servers_changed = pool
                            .apply_server_list(
                                new_config.server_descriptors(),
                                new_config.primary_server(),
                            )
                            .await;
                        admin_config.store(Arc::new(new_config.admin.clone()));
                        tracing::info!(servers_changed, "Configuration reloaded");
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        })
    };

    let admin_task = if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let state = AdminState {
            pool: gateway.pool().clone(),
            config: Arc::clone(&admin_config),
        };
        Some(tokio::spawn(admin::serve(listener, state, shutdown.subscribe())))
    } else {
        tracing::info!("Admin API disabled");
        None
    };

    shutdown.trigger_on_signal().await;

    if let Some(task) = admin_task {
        match task.await {
            Ok(Err(e)) => tracing::error!(error = %e, "Admin API failed"),
            Err(e) => tracing::error!(error = %e, "Admin API task panicked"),
            Ok(Ok(())) => {}
        }
    }
    let _ = reload_task.await;
    gateway.stop().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
