//! In-flight request state.
//!
//! # Responsibilities
//! - Property bag holding path/query bindings and pipeline properties
//! - Target address, effective method and HTTP version for the attempt
//! - Fault markers and error detail left by the transport
//! - Endpoints excluded for the rest of the current logical send

use std::collections::{HashMap, HashSet};

use axum::http::Method;
use serde_json::Value;
use uuid::Uuid;

use crate::endpoint::{EndpointId, HttpVersion};
use crate::health::FaultMarkers;

/// Property carrying the resolved address.
pub const DYNAMIC_URL_VALUE: &str = "DYNAMIC_URL_VALUE";
/// Property carrying a configured HTTP method override.
pub const HTTP_METHOD: &str = "HTTP_METHOD";
/// Property carrying the server push sequence reference.
pub const SERVER_PUSH_SEQUENCE: &str = "SERVER_PUSH_SEQUENCE";

/// Error detail recorded by the transport on a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetail {
    pub code: i32,
    pub message: String,
}

/// Response captured by the transport on a completed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// The message being dispatched.
#[derive(Debug, Clone)]
pub struct RequestContext {
    message_id: Uuid,
    inbound_method: Method,
    properties: HashMap<String, Value>,
    headers: Vec<(String, String)>,
    payload: Vec<u8>,

    to: Option<String>,
    method: Option<Method>,
    http_version: HttpVersion,

    markers: FaultMarkers,
    error: Option<ErrorDetail>,
    response: Option<TransportResponse>,
    excluded: HashSet<EndpointId>,
}

impl RequestContext {
    pub fn new(inbound_method: Method) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            inbound_method,
            properties: HashMap::new(),
            headers: Vec::new(),
            payload: Vec::new(),
            to: None,
            method: None,
            http_version: HttpVersion::default(),
            markers: FaultMarkers::default(),
            error: None,
            response: None,
            excluded: HashSet::new(),
        }
    }

    pub fn message_id(&self) -> Uuid {
        self.message_id
    }

    pub fn inbound_method(&self) -> &Method {
        &self.inbound_method
    }

    // --- Properties ---

    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn remove_property(&mut self, name: &str) -> Option<Value> {
        self.properties.remove(name)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    // --- Payload ---

    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn set_payload(&mut self, payload: impl Into<Vec<u8>>) {
        self.payload = payload.into();
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    // --- Outbound target ---

    pub fn set_to(&mut self, address: impl Into<String>) {
        self.to = Some(address.into());
    }

    pub fn to(&self) -> Option<&str> {
        self.to.as_deref()
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = Some(method);
    }

    /// Outbound method: the one chosen during pre-send, else the inbound one.
    pub fn method(&self) -> &Method {
        self.method.as_ref().unwrap_or(&self.inbound_method)
    }

    pub fn set_http_version(&mut self, version: HttpVersion) {
        self.http_version = version;
    }

    pub fn http_version(&self) -> HttpVersion {
        self.http_version
    }

    // --- Attempt outcome ---

    /// Clear markers and response before a new attempt.
    pub fn begin_attempt(&mut self) {
        self.markers = FaultMarkers::default();
        self.response = None;
    }

    pub fn mark_timeout(&mut self) {
        self.markers.timeout = true;
    }

    pub fn mark_connection_fault(&mut self) {
        self.markers.connection = true;
    }

    pub fn markers(&self) -> &FaultMarkers {
        &self.markers
    }

    pub fn set_error(&mut self, code: i32, message: impl Into<String>) {
        self.error = Some(ErrorDetail {
            code,
            message: message.into(),
        });
    }

    pub fn error(&self) -> Option<&ErrorDetail> {
        self.error.as_ref()
    }

    pub fn clear_error(&mut self) -> Option<ErrorDetail> {
        self.error.take()
    }

    pub fn set_response(&mut self, response: TransportResponse) {
        self.response = Some(response);
    }

    pub fn response(&self) -> Option<&TransportResponse> {
        self.response.as_ref()
    }

    pub fn take_response(&mut self) -> Option<TransportResponse> {
        self.response.take()
    }

    // --- Per-send exclusions ---

    pub fn exclude(&mut self, endpoint: EndpointId) {
        self.excluded.insert(endpoint);
    }

    pub fn is_excluded(&self, endpoint: EndpointId) -> bool {
        self.excluded.contains(&endpoint)
    }

    /// Forget exclusions so the context can start a new logical send.
    pub fn reset_exclusions(&mut self) {
        self.excluded.clear();
    }
}
