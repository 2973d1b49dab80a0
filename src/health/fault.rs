//! Fault classification.
//!
//! # Design Decisions
//! - Classification is a pure function of the markers left by the transport
//! - Priority: timeout, then suspend-triggering connection fault, then generic
//! - History is never consulted

use serde::Serialize;

/// Markers a transport leaves on a request after a failed attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultMarkers {
    /// The attempt timed out.
    pub timeout: bool,
    /// The connection could not be established or was dropped.
    pub connection: bool,
}

impl FaultMarkers {
    pub fn is_clear(&self) -> bool {
        !self.timeout && !self.connection
    }
}

/// Kind of a classified fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    Timeout,
    Connection,
    Generic,
}

impl FaultKind {
    /// Label used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            FaultKind::Timeout => "timeout",
            FaultKind::Connection => "connection",
            FaultKind::Generic => "generic",
        }
    }
}

/// Classify a failed attempt from its markers.
pub fn classify(markers: &FaultMarkers) -> FaultKind {
    if markers.timeout {
        FaultKind::Timeout
    } else if markers.connection {
        FaultKind::Connection
    } else {
        FaultKind::Generic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_wins_over_connection() {
        let markers = FaultMarkers { timeout: true, connection: true };
        assert_eq!(classify(&markers), FaultKind::Timeout);
    }

    #[test]
    fn test_connection_fault() {
        let markers = FaultMarkers { timeout: false, connection: true };
        assert_eq!(classify(&markers), FaultKind::Connection);
    }

    #[test]
    fn test_no_markers_is_generic() {
        let markers = FaultMarkers::default();
        assert!(markers.is_clear());
        assert_eq!(classify(&markers), FaultKind::Generic);
    }
}
