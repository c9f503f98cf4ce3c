//! Health-aware connection pool for redundant market-data servers.
//!
//! A [`PoolManager`] keeps idle sessions per upstream server, fails over
//! in priority order when a server stops answering, and pins whichever
//! server last produced a fresh connection. [`Client`] wraps one operation
//! in acquire/execute/release, and the [`health::Maintainer`] keeps pools
//! warm and retries unhealthy servers in the background.

pub mod admin;
pub mod client;
pub mod config;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod pool;
pub mod resilience;
pub mod upstream;

pub use client::{Client, ClientError};
pub use config::schema::GatewayConfig;
pub use lifecycle::{Gateway, Shutdown};
pub use pool::{PoolError, PoolManager, ServerDescriptor};
pub use upstream::{Connection, Connector, ProtocolError};
