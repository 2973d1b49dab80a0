//! Dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! RequestContext (inbound method, bindings, payload)
//!     → dispatcher.rs (one logical send through a root endpoint)
//!         → EndpointRegistry::send (select leaf, resolve address)
//!         → Transport::attempt (markers + error detail on failure)
//!         → EndpointRegistry::on_fault / on_success
//!     → Ok(leaf) or DispatchError
//! ```
//!
//! # Design Decisions
//! - A failed leaf is excluded for the rest of the logical send, so a
//!   dispatch always terminates after at most one attempt per leaf
//! - Health state lives in the registry; the request only carries markers

pub mod dispatcher;
pub mod request;

use thiserror::Error;

use crate::health::FaultKind;

pub use dispatcher::Dispatcher;
pub use request::{ErrorDetail, RequestContext, TransportResponse};

/// Why a logical send did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The root endpoint was not ready; no transport attempt was made.
    #[error("endpoint '{endpoint}' is not ready to send")]
    EndpointUnavailable { endpoint: String },

    /// Sends must start at a root; children are reached through their parent.
    #[error("endpoint '{endpoint}' is a child of '{parent}' and cannot be sent to directly")]
    NotRoot { endpoint: String, parent: String },

    /// Escalation reached the root and exceeded its retry limit.
    #[error("retry limit exceeded for endpoint '{endpoint}'")]
    RetryLimitExceeded { endpoint: String },

    /// Attempts were made and no candidate is left.
    #[error("endpoint '{endpoint}' failed with {}{}", .kind.as_str(), suffix(.message))]
    Faulted {
        endpoint: String,
        kind: FaultKind,
        message: Option<String>,
    },
}

fn suffix(message: &Option<String>) -> String {
    message.as_deref().map(|m| format!(": {m}")).unwrap_or_default()
}

impl DispatchError {
    /// Short label used in metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            DispatchError::EndpointUnavailable { .. } => "unavailable",
            DispatchError::NotRoot { .. } => "not_root",
            DispatchError::RetryLimitExceeded { .. } => "retry_limit_exceeded",
            DispatchError::Faulted { .. } => "faulted",
        }
    }
}
