//! Outbound transport seam.
//!
//! The dispatcher only sees [`Transport`]; the reqwest-backed adapter lives in
//! `http.rs` and tests plug in scripted transports.

pub mod http;

use async_trait::async_trait;

use crate::dispatch::RequestContext;
use crate::endpoint::PreparedSend;

pub use self::http::HttpTransport;

/// Error code recorded when an attempt times out.
pub const TIMEOUT_ERROR_CODE: i32 = 101504;
/// Error code recorded when the connection could not be established.
pub const CONNECTION_FAILED_CODE: i32 = 101503;
/// Error code recorded for any other sending failure.
pub const SENDING_FAULT_CODE: i32 = 101500;

/// Result of one transport attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    /// Markers and error detail on the request describe what went wrong.
    Failure,
}

impl AttemptOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, AttemptOutcome::Success)
    }
}

/// Performs a single attempt against a prepared leaf.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` to `prepared.address`. On failure set the fault markers
    /// and error detail on `request` before returning.
    async fn attempt(&self, request: &mut RequestContext, prepared: &PreparedSend) -> AttemptOutcome;
}
