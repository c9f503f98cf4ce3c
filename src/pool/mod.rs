//! Upstream connection pool subsystem.
//!
//! # Data Flow
//! ```text
//! Acquire (manager.rs):
//!     failover.rs (candidate order: primary, available servers, or all)
//!     → idle.rs (pop idle connection, probe it)
//!     → else connect with retries and timeout
//!     → record health, pin server that produced a fresh connection
//!
//! Release (manager.rs):
//!     idle.rs (push back if room and not reset since checkout)
//!     → else disconnect
//! ```
//!
//! # Design Decisions
//! - Health, primary and server list share one lock; idle queues lock separately
//! - Pools are bounded only on the idle side; checkouts are not capped
//! - A reset bumps the pool generation so in-flight connections are dropped on release

pub mod connection;
pub mod failover;
pub mod idle;
pub mod manager;
pub mod server;
pub mod status;

pub use connection::{ConnectionId, PooledConnection};
pub use manager::{PoolError, PoolManager, PoolSettings, Pooled};
pub use server::{ServerDescriptor, ServerKey};
pub use status::{PoolStatus, ServerStatus, ServerSummary, ServerTestReport, TestOutcome};
