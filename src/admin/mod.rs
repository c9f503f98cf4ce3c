//! Operational admin API.
//!
//! # Routes
//! - `GET /admin/status`: overall gateway status
//! - `GET /admin/pool`: per-server pool and health snapshot
//! - `POST /admin/servers`: register a server
//! - `POST /admin/servers/primary`: pin a server as primary
//! - `POST /admin/servers/test`: one-off connectivity test
//! - `POST /admin/pool/reset`: drain one pool or all of them
//!
//! Every route requires `Authorization: Bearer <api_key>`.

pub mod auth;
pub mod handlers;

use arc_swap::ArcSwap;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::config::AdminConfig;
use crate::pool::PoolManager;
use crate::upstream::Connector;

/// State shared by the admin handlers.
pub struct AdminState<C: Connector> {
    pub pool: PoolManager<C>,
    pub config: Arc<ArcSwap<AdminConfig>>,
}

impl<C: Connector> Clone for AdminState<C> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

#[allow(deprecated)]
pub fn setup_admin_router<C: Connector>(state: AdminState<C>) -> Router {
    let timeout = Duration::from_secs(state.config.load().request_timeout_secs);
    let auth = middleware::from_fn_with_state(Arc::clone(&state.config), admin_auth_middleware);

    Router::new()
        .route("/admin/status", get(get_status::<C>))
        .route("/admin/pool", get(get_pool::<C>))
        .route("/admin/pool/reset", post(reset_pool::<C>))
        .route("/admin/servers", post(add_server::<C>))
        .route("/admin/servers/primary", post(set_primary::<C>))
        .route("/admin/servers/test", post(test_server::<C>))
        .layer(auth)
        .with_state(state)
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
}

/// Serve the admin API until the shutdown signal fires.
pub async fn serve<C: Connector>(
    listener: TcpListener,
    state: AdminState<C>,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin API listening");

    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    tracing::info!("Admin API stopped");
    Ok(())
}
