//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the mediator.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the mediator.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MediatorConfig {
    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin/mediation HTTP surface.
    pub admin: AdminConfig,

    /// Outbound transport settings.
    pub transport: TransportConfig,

    /// Endpoint definitions. Composites reference children by name.
    pub endpoints: Vec<EndpointConfig>,
}

/// Endpoint variant.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKindConfig {
    #[default]
    Http,
    Failover,
    Loadbalance,
}

/// Child selection algorithm for load-balance endpoints.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalanceAlgorithm {
    #[default]
    RoundRobin,
    Random,
}

/// One endpoint definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// Unique endpoint identifier.
    pub name: String,

    /// Endpoint variant (default: http).
    #[serde(default)]
    pub kind: EndpointKindConfig,

    /// URI template (HTTP endpoints only). A `legacy-encoding:` prefix turns
    /// on legacy resolution.
    #[serde(default)]
    pub uri_template: Option<String>,

    /// HTTP method override. Absent means the inbound method is used.
    #[serde(default)]
    pub method: Option<String>,

    /// Decode bindings before substitution and rebuild the address.
    #[serde(default)]
    pub legacy_encoding: bool,

    /// HTTP protocol version ("1.0", "1.1", "2").
    #[serde(default = "default_http_version")]
    pub http_version: String,

    /// Sequence invoked for HTTP/2 server pushes.
    #[serde(default)]
    pub server_push_sequence: Option<String>,

    /// Child endpoint names, in selection order (composites only).
    #[serde(default)]
    pub children: Vec<String>,

    /// Load-balance algorithm.
    #[serde(default)]
    pub algorithm: LoadBalanceAlgorithm,

    /// Retry and suspension settings.
    #[serde(default)]
    pub retry: EndpointRetryConfig,

    /// Static properties; `uri.var.*` and `query.param.*` act as binding defaults.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

fn default_http_version() -> String {
    "1.1".to_string()
}

impl EndpointConfig {
    /// HTTP endpoint with default settings.
    pub fn http(name: impl Into<String>, uri_template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EndpointKindConfig::Http,
            uri_template: Some(uri_template.into()),
            method: None,
            legacy_encoding: false,
            http_version: default_http_version(),
            server_push_sequence: None,
            children: Vec::new(),
            algorithm: LoadBalanceAlgorithm::default(),
            retry: EndpointRetryConfig::default(),
            properties: BTreeMap::new(),
        }
    }

    /// Composite endpoint over `children`.
    pub fn composite(name: impl Into<String>, kind: EndpointKindConfig, children: &[&str]) -> Self {
        Self {
            kind,
            uri_template: None,
            children: children.iter().map(|c| c.to_string()).collect(),
            ..Self::http(name, "")
        }
    }
}

/// Retry and suspension configuration for one endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EndpointRetryConfig {
    /// Faults tolerated before escalation.
    pub max_fault_retries: u32,

    /// Timeouts tolerated before escalation.
    pub max_timeout_retries: u32,

    /// First suspension in milliseconds.
    pub initial_suspend_ms: u64,

    /// Cap for the doubling suspension in milliseconds.
    pub max_suspend_ms: u64,

    /// Cool-down after a timeout in milliseconds.
    pub timeout_cooldown_ms: u64,
}

impl Default for EndpointRetryConfig {
    fn default() -> Self {
        Self {
            max_fault_retries: 3,
            max_timeout_retries: 3,
            initial_suspend_ms: 1_000,
            max_suspend_ms: 60_000,
            timeout_cooldown_ms: 1_000,
        }
    }
}

/// Outbound transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Total request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            request_timeout_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin/mediation server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Bind address for the mediation and admin routes.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8280".to_string(),
        }
    }
}
