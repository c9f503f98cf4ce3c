//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Connection attempt against one server:
//!     → timeouts.rs (hard connect deadline around the connector)
//!     → On failure: backoff.rs (fixed delay, bounded attempts)
//!     → Attempts exhausted: health registry records one failure
//!
//! Operation on a checked-out connection:
//!     → timeouts.rs (optional operation deadline)
//!     → On timeout: the connection is discarded, never pooled
//! ```
//!
//! # Design Decisions
//! - Every connect has a deadline, even if the connector ignores its timeout
//! - Retry sleeps are bounded by `attempts * backoff`
//! - Timeout errors are distinct from protocol errors

pub mod backoff;
pub mod timeouts;
