//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → PoolManager / Maintainer / admin API built from it
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → new server list applied to the pool
//!     → atomic swap of the admin config
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Pool sizing and health thresholds are fixed at startup; reloads only
//!   change the server list, the primary and admin settings

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, ClientConfig, GatewayConfig, HealthCheckConfig, ObservabilityConfig, PoolConfig,
    ServerConfig, TimeoutConfig,
};
