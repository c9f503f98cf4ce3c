//! Bounded idle-connection queue for one server.
//!
//! # Design Decisions
//! - Never blocks: `try_take` and `try_put` return immediately
//! - Never performs network I/O; rejected or drained connections are handed
//!   back to the caller, who disconnects them
//! - FIFO reuse so idle sessions rotate instead of aging at the back
//! - A generation counter, bumped on `drain`, rejects connections that were
//!   checked out before a reset

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::pool::connection::PooledConnection;

/// Idle connections for one server, at most `capacity` of them.
#[derive(Debug)]
pub struct IdlePool<T> {
    capacity: usize,
    idle: Mutex<VecDeque<PooledConnection<T>>>,
    generation: AtomicU64,
}

impl<T> IdlePool<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            idle: Mutex::new(VecDeque::with_capacity(capacity)),
            generation: AtomicU64::new(0),
        }
    }

    /// Take an idle connection, if any.
    pub fn try_take(&self) -> Option<PooledConnection<T>> {
        self.idle.lock().pop_front()
    }

    /// Store `conn` for reuse.
    ///
    /// Gives the connection back when the pool is full or the connection
    /// predates the last reset; the caller must disconnect it.
    pub fn try_put(&self, conn: PooledConnection<T>) -> Result<(), PooledConnection<T>> {
        if conn.generation() != self.generation() {
            return Err(conn);
        }
        let mut idle = self.idle.lock();
        if idle.len() >= self.capacity {
            return Err(conn);
        }
        idle.push_back(conn);
        Ok(())
    }

    /// Remove every idle connection and invalidate checked-out ones.
    pub fn drain(&self) -> Vec<PooledConnection<T>> {
        let mut idle = self.idle.lock();
        self.generation.fetch_add(1, Ordering::AcqRel);
        idle.drain(..).collect()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.idle.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.idle.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::server::ServerDescriptor;

    fn conn(pool: &IdlePool<u32>, n: u32) -> PooledConnection<u32> {
        PooledConnection::new(n, ServerDescriptor::new("10.0.0.1", 7709), pool.generation())
    }

    #[test]
    fn put_respects_capacity() {
        let pool = IdlePool::new(2);
        assert!(pool.try_put(conn(&pool, 1)).is_ok());
        assert!(pool.try_put(conn(&pool, 2)).is_ok());

        let rejected = pool.try_put(conn(&pool, 3)).unwrap_err();
        assert_eq!(*rejected, 3);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn take_is_fifo_and_non_blocking() {
        let pool = IdlePool::new(3);
        assert!(pool.try_take().is_none());

        pool.try_put(conn(&pool, 1)).unwrap();
        pool.try_put(conn(&pool, 2)).unwrap();

        assert_eq!(*pool.try_take().unwrap(), 1);
        assert_eq!(*pool.try_take().unwrap(), 2);
        assert!(pool.is_empty());
    }

    #[test]
    fn drain_invalidates_checked_out_connections() {
        let pool = IdlePool::new(3);
        pool.try_put(conn(&pool, 1)).unwrap();
        let checked_out = conn(&pool, 2);

        let drained = pool.drain();
        assert_eq!(drained.len(), 1);
        assert!(pool.is_empty());

        assert!(pool.try_put(checked_out).is_err());
        assert!(pool.try_put(conn(&pool, 3)).is_ok());
    }
}
