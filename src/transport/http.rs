//! HTTP transport over reqwest.
//!
//! # Responsibilities
//! - Forward payload and headers to the resolved address
//! - Translate reqwest errors into fault markers and error codes
//! - Treat gateway-class upstream statuses as failed attempts
//! - Store the upstream response on the request context

use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;

use crate::config::TransportConfig;
use crate::dispatch::{RequestContext, TransportResponse};
use crate::endpoint::PreparedSend;
use crate::transport::{
    AttemptOutcome, Transport, CONNECTION_FAILED_CODE, SENDING_FAULT_CODE, TIMEOUT_ERROR_CODE,
};

/// Headers never forwarded upstream.
const HOP_BY_HOP: &[&str] = &["host", "connection", "content-length", "transfer-encoding", "keep-alive", "upgrade"];

/// reqwest-backed [`Transport`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .no_proxy()
            .build()?;
        Ok(Self { client })
    }
}

/// Upstream statuses that count as a failed attempt.
pub fn is_failure_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}

#[async_trait]
impl Transport for HttpTransport {
    async fn attempt(&self, request: &mut RequestContext, prepared: &PreparedSend) -> AttemptOutcome {
        let mut builder = self
            .client
            .request(prepared.method.clone(), &prepared.address)
            .version(prepared.http_version.into());
        for (name, value) in request.headers() {
            if !HOP_BY_HOP.contains(&name.to_ascii_lowercase().as_str()) {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        if !request.payload().is_empty() {
            builder = builder.body(request.payload().to_vec());
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                if e.is_timeout() {
                    request.mark_timeout();
                    request.set_error(TIMEOUT_ERROR_CODE, e.to_string());
                } else if e.is_connect() {
                    request.mark_connection_fault();
                    request.set_error(CONNECTION_FAILED_CODE, e.to_string());
                } else {
                    request.set_error(SENDING_FAULT_CODE, e.to_string());
                }
                tracing::warn!(
                    message_id = %request.message_id(),
                    address = %prepared.address,
                    error = %e,
                    "Upstream request failed"
                );
                return AttemptOutcome::Failure;
            }
        };

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = match response.bytes().await {
            Ok(bytes) => bytes.to_vec(),
            Err(e) => {
                if e.is_timeout() {
                    request.mark_timeout();
                    request.set_error(TIMEOUT_ERROR_CODE, e.to_string());
                } else {
                    request.set_error(SENDING_FAULT_CODE, e.to_string());
                }
                tracing::warn!(address = %prepared.address, error = %e, "Failed to read upstream body");
                return AttemptOutcome::Failure;
            }
        };

        request.set_response(TransportResponse {
            status: status.as_u16(),
            headers,
            body,
        });

        if is_failure_status(status) {
            request.set_error(SENDING_FAULT_CODE, format!("upstream returned {status}"));
            tracing::warn!(address = %prepared.address, status = %status, "Upstream returned gateway error");
            return AttemptOutcome::Failure;
        }

        tracing::debug!(address = %prepared.address, status = %status, "Upstream responded");
        AttemptOutcome::Success
    }
}
