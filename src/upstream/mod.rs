//! Upstream protocol seam.
//!
//! # Data Flow
//! ```text
//! PoolManager needs a session
//!     → Connector::connect(server, timeout)   (handshake included)
//!     → Connection stored idle in a per-server pool
//!     → Connection::probe() before reuse
//!     → Connection::execute(request) inside the client façade
//!     → Connection::disconnect() when discarded
//! ```
//!
//! # Design Decisions
//! - The wire protocol is opaque to the pool: only connect/probe/execute/disconnect
//! - Request and response types are associated types of the connection
//! - `tcp.rs` ships a length-prefixed framed transport for real deployments

pub mod tcp;

#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::pool::server::ServerDescriptor;

/// Errors raised by an upstream session.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("handshake with {0} failed")]
    Handshake(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("connection closed")]
    Closed,
}

/// One authenticated session to one upstream server.
#[async_trait]
pub trait Connection: Send + 'static {
    type Request: Send + 'static;
    type Response: Send + 'static;

    /// Cheap, side-effect-free liveness query.
    async fn probe(&mut self) -> bool;

    /// Run one protocol request.
    async fn execute(&mut self, request: Self::Request) -> Result<Self::Response, ProtocolError>;

    /// Close the session. Must be safe to call more than once.
    async fn disconnect(&mut self);
}

/// Factory for upstream sessions.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Conn: Connection;

    /// Open and handshake a new session with `server`.
    ///
    /// Implementations should honor `timeout`; the pool additionally wraps
    /// the call in a hard deadline of the same length.
    async fn connect(
        &self,
        server: &ServerDescriptor,
        timeout: Duration,
    ) -> Result<Self::Conn, ProtocolError>;
}
