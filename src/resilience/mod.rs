//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Endpoint fault observed
//!     → health::state (count + transition)
//!     → backoff.rs (length of the next suspension)
//! ```
//!
//! # Design Decisions
//! - Suspension is refusal to dispatch, never a blocking wait
//! - Backoff is deterministic (no jitter) so windows are exact

pub mod backoff;
