//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define mediation metrics (dispatches, faults, escalations, state)
//! - Expose Prometheus-compatible metrics endpoint
//! - Track per-endpoint metrics
//!
//! # Metrics
//! - `mediator_dispatch_total` (counter): dispatches by root endpoint, outcome
//! - `mediator_dispatch_duration_seconds` (histogram): end-to-end latency
//! - `mediator_endpoint_faults_total` (counter): faults by endpoint, kind
//! - `mediator_endpoint_escalations_total` (counter): retry limits exceeded
//! - `mediator_endpoint_state` (gauge): 0=active, 1=timeout, 2=suspended
//!
//! # Design Decisions
//! - Low-overhead metric updates through the `metrics` facade
//! - Labels for endpoint, fault kind, outcome

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::health::{EndpointState, FaultKind};

/// Install the Prometheus recorder with an HTTP scrape listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record the state an endpoint is now in.
pub fn record_endpoint_state(endpoint: &str, state: EndpointState) {
    let value = match state {
        EndpointState::Active => 0.0,
        EndpointState::Timeout => 1.0,
        EndpointState::Suspended => 2.0,
    };
    gauge!("mediator_endpoint_state", "endpoint" => endpoint.to_string()).set(value);
}

/// Record one classified fault.
pub fn record_fault(endpoint: &str, kind: FaultKind) {
    counter!(
        "mediator_endpoint_faults_total",
        "endpoint" => endpoint.to_string(),
        "kind" => kind.as_str()
    )
    .increment(1);
}

/// Record a retry limit being exceeded.
pub fn record_escalation(endpoint: &str) {
    counter!("mediator_endpoint_escalations_total", "endpoint" => endpoint.to_string()).increment(1);
}

/// Record a completed dispatch through `endpoint`.
pub fn record_dispatch(endpoint: &str, outcome: &'static str, start: Instant) {
    let duration = start.elapsed().as_secs_f64();
    counter!(
        "mediator_dispatch_total",
        "endpoint" => endpoint.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("mediator_dispatch_duration_seconds", "endpoint" => endpoint.to_string()).record(duration);
}
