//! Server health subsystem.
//!
//! # Data Flow
//! ```text
//! Health registry (registry.rs):
//!     Connection attempt outcome (pool or maintainer)
//!     → success resets the failure count, marks Healthy
//!     → failure increments it, marks Unhealthy at the threshold
//!
//! Maintainer (maintainer.rs):
//!     Periodic timer
//!     → Retry unhealthy servers past their cool-down
//!     → Top up healthy pools below the low-water mark
//! ```
//!
//! # Design Decisions
//! - Passive only: health follows real connection attempts, no separate probe traffic
//! - Unhealthy servers are skipped until the cool-down elapses, not forever
//! - Health state is per-server, not per-connection

pub mod maintainer;
pub mod registry;

pub use maintainer::Maintainer;
pub use registry::{HealthPolicy, HealthRegistry, HealthState, ServerHealth};
