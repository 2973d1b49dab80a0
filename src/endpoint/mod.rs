//! Endpoint tree.
//!
//! # Data Flow
//! ```text
//! MediatorConfig
//!     → definition.rs (immutable per-endpoint settings)
//!     → registry.rs (arena of endpoints, parent links by id)
//!
//! Dispatch
//!     → registry.select_leaf (failover order / load-balance rotation)
//!     → Endpoint::prepare (resolve address, method, push sequence)
//!     → registry.on_fault / on_success (health transitions, escalation)
//! ```
//!
//! # Design Decisions
//! - One `Endpoint` type with a tagged `EndpointKind`; health handling is shared
//! - Children are owned ids in the arena; parents are plain ids (non-owning)
//! - The tree is read-only after load; only `EndpointContext` mutates

pub mod definition;
pub mod registry;

use std::collections::BTreeMap;

use axum::http::Method;
use serde::Serialize;
use serde_json::json;

use crate::dispatch::request::{DYNAMIC_URL_VALUE, HTTP_METHOD, SERVER_PUSH_SEQUENCE};
use crate::dispatch::RequestContext;
use crate::health::{EndpointContext, HealthSnapshot};
use crate::load_balancer::LoadBalancer;
use crate::uri;

pub use definition::{EndpointDefinition, HttpVersion};
pub use registry::{EndpointRegistry, FaultResolution};

/// Index of an endpoint in its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EndpointId(pub(crate) usize);

impl EndpointId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Variant-specific part of an endpoint.
#[derive(Debug)]
pub enum EndpointKind {
    /// A single remote target.
    Http,
    /// Children tried in insertion order.
    Failover { children: Vec<EndpointId> },
    /// Children tried from a rotating start.
    Loadbalance {
        children: Vec<EndpointId>,
        balancer: Box<dyn LoadBalancer>,
    },
}

impl EndpointKind {
    pub fn children(&self) -> &[EndpointId] {
        match self {
            EndpointKind::Http => &[],
            EndpointKind::Failover { children } | EndpointKind::Loadbalance { children, .. } => children,
        }
    }

    pub fn is_composite(&self) -> bool {
        !matches!(self, EndpointKind::Http)
    }

    pub fn type_label(&self) -> &'static str {
        match self {
            EndpointKind::Http => "HTTP Endpoint",
            EndpointKind::Failover { .. } => "Failover Endpoint",
            EndpointKind::Loadbalance { .. } => "Loadbalance Endpoint",
        }
    }
}

/// What the transport needs for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedSend {
    pub endpoint: EndpointId,
    pub address: String,
    pub method: Method,
    pub http_version: HttpVersion,
}

/// A configured endpoint.
#[derive(Debug)]
pub struct Endpoint {
    id: EndpointId,
    name: String,
    kind: EndpointKind,
    definition: EndpointDefinition,
    context: EndpointContext,
    parent: Option<EndpointId>,
    properties: BTreeMap<String, String>,
}

impl Endpoint {
    pub(crate) fn new(
        id: EndpointId,
        name: String,
        kind: EndpointKind,
        definition: EndpointDefinition,
        properties: BTreeMap<String, String>,
    ) -> Self {
        let context = EndpointContext::new(name.clone());
        Self {
            id,
            name,
            kind,
            definition,
            context,
            parent: None,
            properties,
        }
    }

    pub fn id(&self) -> EndpointId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &EndpointKind {
        &self.kind
    }

    pub fn definition(&self) -> &EndpointDefinition {
        &self.definition
    }

    pub fn context(&self) -> &EndpointContext {
        &self.context
    }

    pub fn parent(&self) -> Option<EndpointId> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: EndpointId) {
        self.parent = Some(parent);
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn health_snapshot(&self) -> HealthSnapshot {
        self.context.snapshot()
    }

    /// Concrete address for `request`, or `None` for composites.
    pub fn resolve_address(&self, request: &RequestContext) -> Option<String> {
        let template = self.definition.uri_template.as_ref()?;
        Some(uri::resolve(&self.name, template, &self.properties, request))
    }

    /// Pre-send steps of an HTTP endpoint: resolve the address, pick the
    /// method and attach the push sequence reference.
    pub fn prepare(&self, request: &mut RequestContext) -> Option<PreparedSend> {
        let address = self.resolve_address(request)?;
        request.set_to(address.clone());
        request.set_property(DYNAMIC_URL_VALUE, address.clone());

        let method = match &self.definition.method {
            Some(method) => {
                request.set_property(HTTP_METHOD, method.as_str());
                method.clone()
            }
            None => request.inbound_method().clone(),
        };
        request.set_method(method.clone());

        if let Some(sequence) = &self.definition.server_push_sequence {
            request.set_property(SERVER_PUSH_SEQUENCE, sequence.clone());
        }

        request.set_http_version(self.definition.http_version);

        Some(PreparedSend {
            endpoint: self.id,
            address,
            method,
            http_version: self.definition.http_version,
        })
    }

    /// JSON description used by the admin API.
    pub fn describe(&self, children: Vec<&str>) -> serde_json::Value {
        json!({
            "name": self.name,
            "type": self.kind.type_label(),
            "method": self.definition.method.as_ref().map(Method::as_str),
            "uriTemplate": self.definition.uri_template.as_ref().map(|t| t.raw()),
            "legacyEncoding": self.definition.legacy_encoding,
            "httpVersion": self.definition.http_version.as_str(),
            "children": children,
            "health": self.health_snapshot(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EndpointConfig;

    fn http_endpoint(config: EndpointConfig) -> Endpoint {
        let definition = EndpointDefinition::from_config(&config).unwrap();
        Endpoint::new(EndpointId(0), config.name.clone(), EndpointKind::Http, definition, config.properties)
    }

    #[test]
    fn test_prepare_inherits_inbound_method() {
        let ep = http_endpoint(EndpointConfig::http("orders", "http://h/orders/{uri.var.id}"));
        let mut req = RequestContext::new(Method::DELETE);
        req.set_property("uri.var.id", "9");

        let prepared = ep.prepare(&mut req).unwrap();

        assert_eq!(prepared.address, "http://h/orders/9");
        assert_eq!(prepared.method, Method::DELETE);
        assert_eq!(req.to(), Some("http://h/orders/9"));
        assert_eq!(req.property(DYNAMIC_URL_VALUE), Some(&json!("http://h/orders/9")));
        assert!(req.property(HTTP_METHOD).is_none());
        assert!(req.property(SERVER_PUSH_SEQUENCE).is_none());
    }

    #[test]
    fn test_prepare_applies_overrides() {
        let mut config = EndpointConfig::http("push", "http://h/stream");
        config.method = Some("POST".into());
        config.http_version = "2".into();
        config.server_push_sequence = Some("pushSeq".into());
        let ep = http_endpoint(config);
        let mut req = RequestContext::new(Method::GET);

        let prepared = ep.prepare(&mut req).unwrap();

        assert_eq!(prepared.method, Method::POST);
        assert_eq!(req.method(), &Method::POST);
        assert_eq!(req.property(HTTP_METHOD), Some(&json!("POST")));
        assert_eq!(req.property(SERVER_PUSH_SEQUENCE), Some(&json!("pushSeq")));
        assert_eq!(req.http_version(), HttpVersion::Http2);
    }

    #[test]
    fn test_describe() {
        let ep = http_endpoint(EndpointConfig::http("orders", "http://h/{uri.var.id}"));
        let desc = ep.describe(vec![]);
        assert_eq!(desc["type"], "HTTP Endpoint");
        assert_eq!(desc["uriTemplate"], "http://h/{uri.var.id}");
        assert_eq!(desc["health"]["state"], "ACTIVE");
        assert!(desc["method"].is_null());
    }
}
