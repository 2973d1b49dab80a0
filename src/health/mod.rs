//! Endpoint health subsystem.
//!
//! # Data Flow
//! ```text
//! Failed attempt
//!     → fault.rs (classify transport markers)
//!     → state.rs (count, suspend or escalate)
//!
//! Next dispatch
//!     → state.rs ready_to_send (lazy reactivation)
//! ```
//!
//! # Design Decisions
//! - Health state is per-endpoint and process-local
//! - Passive only: no probes, state changes only on observed outcomes

pub mod fault;
pub mod state;

pub use fault::{classify, FaultKind, FaultMarkers};
pub use state::{EndpointContext, EndpointState, HealthSnapshot, Readiness, RetryLimits, SuspendPolicy, Transition};
