use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::admin::AdminState;
use crate::health::HealthState;
use crate::pool::{PoolStatus, ServerDescriptor, ServerKey, ServerSummary, ServerTestReport};
use crate::upstream::Connector;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("invalid server: {0}")]
    InvalidServer(&'static str),

    #[error("server {0} is not registered")]
    UnknownServer(ServerKey),
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = match self {
            AdminError::InvalidServer(_) => StatusCode::BAD_REQUEST,
            AdminError::UnknownServer(_) => StatusCode::NOT_FOUND,
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
    pub current_server: Option<ServerSummary>,
    pub servers: usize,
    pub healthy_servers: usize,
}

/// Server given in a request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerRequest {
    #[serde(default)]
    pub name: Option<String>,
    pub host: String,
    pub port: u16,
}

impl ServerRequest {
    fn descriptor(self) -> Result<ServerDescriptor, AdminError> {
        if self.host.trim().is_empty() {
            return Err(AdminError::InvalidServer("host must not be empty"));
        }
        if self.port == 0 {
            return Err(AdminError::InvalidServer("port must be non-zero"));
        }
        let server = ServerDescriptor::new(self.host, self.port);
        Ok(match self.name {
            Some(name) => server.with_name(name),
            None => server,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServerChange {
    pub added: bool,
    pub server: ServerSummary,
    pub current_server: Option<ServerSummary>,
}

/// `{}` resets every pool.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ResetRequest {
    #[serde(default)]
    pub server: Option<ServerKey>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResetResult {
    pub closed: usize,
}

pub async fn get_status<C: Connector>(State(state): State<AdminState<C>>) -> Json<SystemStatus> {
    let pool = state.pool.status();
    let healthy_servers = pool
        .servers
        .iter()
        .filter(|s| s.health_status != HealthState::Unhealthy)
        .count();

    let status = if pool.servers.is_empty() || healthy_servers == 0 {
        "degraded"
    } else {
        "operational"
    };

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: status.to_string(),
        current_server: pool.current_server,
        servers: pool.servers.len(),
        healthy_servers,
    })
}

pub async fn get_pool<C: Connector>(State(state): State<AdminState<C>>) -> Json<PoolStatus> {
    Json(state.pool.status())
}

pub async fn add_server<C: Connector>(
    State(state): State<AdminState<C>>,
    Json(request): Json<ServerRequest>,
) -> Result<Json<ServerChange>, AdminError> {
    let server = request.descriptor()?;
    let added = state.pool.add_server(server.clone());
    Ok(Json(ServerChange {
        added,
        server: ServerSummary::from(&server),
        current_server: state.pool.current_server().as_ref().map(ServerSummary::from),
    }))
}

pub async fn set_primary<C: Connector>(
    State(state): State<AdminState<C>>,
    Json(request): Json<ServerRequest>,
) -> Result<Json<ServerChange>, AdminError> {
    let server = request.descriptor()?;
    let added = state.pool.set_primary(server.clone());
    Ok(Json(ServerChange {
        added,
        server: ServerSummary::from(&server),
        current_server: state.pool.current_server().as_ref().map(ServerSummary::from),
    }))
}

pub async fn reset_pool<C: Connector>(
    State(state): State<AdminState<C>>,
    Json(request): Json<ResetRequest>,
) -> Result<Json<ResetResult>, AdminError> {
    let closed = match request.server {
        Some(key) => {
            if !state.pool.servers().iter().any(|s| s.matches(&key)) {
                return Err(AdminError::UnknownServer(key));
            }
            state.pool.reset_pool(&key).await
        }
        None => state.pool.reset_all().await,
    };
    Ok(Json(ResetResult { closed }))
}

pub async fn test_server<C: Connector>(
    State(state): State<AdminState<C>>,
    Json(request): Json<ServerRequest>,
) -> Result<Json<ServerTestReport>, AdminError> {
    let server = request.descriptor()?;
    Ok(Json(state.pool.test_server(&server).await))
}
