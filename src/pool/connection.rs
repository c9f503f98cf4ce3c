//! Checked-out upstream sessions.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::time::Instant;

use crate::pool::server::ServerDescriptor;

/// Relaxed ordering is enough: ids only need to be unique.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a pooled connection, used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// An upstream session plus the server it belongs to.
///
/// Held exclusively by whoever checked it out; idle connections are owned by
/// their server's [`IdlePool`](crate::pool::idle::IdlePool). Dereferences to
/// the underlying session.
#[derive(Debug)]
pub struct PooledConnection<T> {
    conn: T,
    server: ServerDescriptor,
    id: ConnectionId,
    generation: u64,
    created_at: Instant,
}

impl<T> PooledConnection<T> {
    /// `generation` is the pool generation observed before the session was
    /// opened; a reset in between makes the connection stale.
    pub(crate) fn new(conn: T, server: ServerDescriptor, generation: u64) -> Self {
        Self {
            conn,
            server,
            id: ConnectionId::new(),
            generation,
            created_at: Instant::now(),
        }
    }

    pub fn server(&self) -> &ServerDescriptor {
        &self.server
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn into_inner(self) -> T {
        self.conn
    }
}

impl<T> Deref for PooledConnection<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.conn
    }
}

impl<T> DerefMut for PooledConnection<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.conn
    }
}
