//! Deadline enforcement around upstream calls.

use std::future::Future;
use std::time::Duration;
use tokio::time;

use crate::pool::server::ServerDescriptor;
use crate::upstream::{Connector, ProtocolError};

/// Open a session, failing with [`ProtocolError::Timeout`] after `timeout`.
pub async fn connect_with_timeout<C: Connector>(
    connector: &C,
    server: &ServerDescriptor,
    timeout: Duration,
) -> Result<C::Conn, ProtocolError> {
    match time::timeout(timeout, connector.connect(server, timeout)).await {
        Ok(result) => result,
        Err(_) => Err(ProtocolError::Timeout(timeout)),
    }
}

/// Marker error for an elapsed operation deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elapsed(pub Duration);

/// Run `fut` under an optional deadline.
pub async fn with_deadline<F: Future>(
    deadline: Option<Duration>,
    fut: F,
) -> Result<F::Output, Elapsed> {
    match deadline {
        Some(limit) => time::timeout(limit, fut).await.map_err(|_| Elapsed(limit)),
        None => Ok(fut.await),
    }
}
