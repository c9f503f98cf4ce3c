//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Pool → Warm-up → Maintainer → Client
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Broadcast → Maintainer exits → Close idle connections
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: the primary is warmed before traffic is accepted
//! - Ordered shutdown: stop background work first, then close connections
//! - Shutdown has timeout: a stuck maintainer is abandoned after a deadline

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::Gateway;
