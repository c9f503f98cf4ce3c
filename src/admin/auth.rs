//! Bearer API key guard for the admin routes.

use arc_swap::ArcSwap;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::config::AdminConfig;

/// Reads the key on every request so a config reload takes effect immediately.
pub async fn admin_auth_middleware(
    State(config): State<Arc<ArcSwap<AdminConfig>>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let config = config.load();

    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match token {
        Some(token) if !config.api_key.is_empty() && token == config.api_key => {
            Ok(next.run(request).await)
        }
        _ => {
            tracing::warn!(path = %request.uri().path(), "Rejected admin request");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
