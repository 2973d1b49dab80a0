//! Endpoint registry: the configured tree and the operations that walk it.
//!
//! # Responsibilities
//! - Build the arena once from validated configuration
//! - `send`: pre-send steps plus the leaf readiness check
//! - `on_fault`: classify, clear stale error, transition, escalate upwards
//! - `on_success`: reset the leaf and its ancestors
//! - Child selection for failover and load-balance composites

use std::collections::HashMap;
use std::time::Instant;

use crate::config::validation::validate_config;
use crate::config::{ConfigError, EndpointKindConfig, MediatorConfig};
use crate::dispatch::{DispatchError, RequestContext};
use crate::endpoint::{Endpoint, EndpointDefinition, EndpointId, EndpointKind, PreparedSend};
use crate::health::{classify, FaultKind, HealthSnapshot, Readiness, RetryLimits};
use crate::load_balancer;
use crate::observability::metrics;

/// Outcome of fault handling for one failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultResolution {
    /// The failure was absorbed; a composite ancestor may pick another child.
    Handled { endpoint: EndpointId, kind: FaultKind },
    /// Escalation reached the root and exceeded its budget.
    Exhausted { endpoint: EndpointId, kind: FaultKind },
}

/// All configured endpoints.
#[derive(Debug)]
pub struct EndpointRegistry {
    endpoints: Vec<Endpoint>,
    by_name: HashMap<String, EndpointId>,
}

impl EndpointRegistry {
    /// Validate `config` and build the endpoint tree.
    pub fn from_config(config: &MediatorConfig) -> Result<Self, ConfigError> {
        validate_config(config).map_err(ConfigError::Validation)?;

        let by_name: HashMap<String, EndpointId> = config
            .endpoints
            .iter()
            .enumerate()
            .map(|(i, ep)| (ep.name.clone(), EndpointId(i)))
            .collect();

        let mut endpoints = Vec::with_capacity(config.endpoints.len());
        for (i, ep) in config.endpoints.iter().enumerate() {
            let definition = EndpointDefinition::from_config(ep).map_err(ConfigError::Validation)?;
            // Validation guarantees every child name resolves.
            let children: Vec<EndpointId> = ep.children.iter().filter_map(|c| by_name.get(c).copied()).collect();
            let kind = match ep.kind {
                EndpointKindConfig::Http => EndpointKind::Http,
                EndpointKindConfig::Failover => EndpointKind::Failover { children },
                EndpointKindConfig::Loadbalance => EndpointKind::Loadbalance {
                    children,
                    balancer: load_balancer::build(ep.algorithm),
                },
            };
            endpoints.push(Endpoint::new(
                EndpointId(i),
                ep.name.clone(),
                kind,
                definition,
                ep.properties.clone(),
            ));
        }

        let links: Vec<(EndpointId, EndpointId)> = endpoints
            .iter()
            .flat_map(|parent| parent.kind().children().iter().map(move |child| (*child, parent.id())))
            .collect();
        for (child, parent) in links {
            endpoints[child.0].set_parent(parent);
        }

        let registry = Self { endpoints, by_name };
        for root in registry.roots() {
            tracing::info!(
                endpoint = %registry.get(root).name(),
                kind = registry.get(root).kind().type_label(),
                size = registry.lineage_size(root),
                "Endpoint tree loaded"
            );
        }
        Ok(registry)
    }

    pub fn get(&self, id: EndpointId) -> &Endpoint {
        &self.endpoints[id.0]
    }

    pub fn lookup(&self, name: &str) -> Option<EndpointId> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.iter()
    }

    pub fn is_root(&self, id: EndpointId) -> bool {
        self.get(id).parent().is_none()
    }

    /// Endpoints without a parent, in configuration order.
    pub fn roots(&self) -> Vec<EndpointId> {
        self.endpoints
            .iter()
            .filter(|ep| ep.parent().is_none())
            .map(Endpoint::id)
            .collect()
    }

    fn lineage_size(&self, id: EndpointId) -> usize {
        1 + self
            .get(id)
            .kind()
            .children()
            .iter()
            .map(|c| self.lineage_size(*c))
            .sum::<usize>()
    }

    /// True when the immediate parent is a composite.
    pub fn is_recursive(&self, id: EndpointId) -> bool {
        self.get(id)
            .parent()
            .is_some_and(|parent| self.get(parent).kind().is_composite())
    }

    /// Limits a fault on `id` is checked against: the parent's shared budget
    /// for children of composites, the endpoint's own otherwise.
    fn retry_limits(&self, id: EndpointId) -> RetryLimits {
        let endpoint = self.get(id);
        match endpoint.parent() {
            Some(parent) if self.is_recursive(id) => self.get(parent).definition().retry_limits(),
            _ => endpoint.definition().retry_limits(),
        }
    }

    pub fn ready_to_send(&self, id: EndpointId) -> bool {
        self.ready_to_send_at(id, Instant::now())
    }

    /// Leaf readiness comes from its health state; a composite is ready when
    /// any child is.
    pub fn ready_to_send_at(&self, id: EndpointId, now: Instant) -> bool {
        let endpoint = self.get(id);
        match endpoint.kind() {
            EndpointKind::Http => {
                let readiness = endpoint.context().check_ready_at(now);
                if readiness == Readiness::Reactivated {
                    metrics::record_endpoint_state(endpoint.name(), endpoint.health_snapshot().state);
                }
                readiness.is_ready()
            }
            kind => kind.children().iter().any(|c| self.ready_to_send_at(*c, now)),
        }
    }

    pub fn health_snapshot(&self, id: EndpointId) -> HealthSnapshot {
        self.get(id).health_snapshot()
    }

    /// JSON description of `id`.
    pub fn describe(&self, id: EndpointId) -> serde_json::Value {
        let endpoint = self.get(id);
        let children = endpoint.kind().children().iter().map(|c| self.get(*c).name()).collect();
        endpoint.describe(children)
    }

    /// Pick the leaf a send through `id` should use, or `None` when no
    /// candidate is left for this request. A root leaf is always returned so
    /// `send` can report it unavailable.
    pub fn select_leaf(&self, id: EndpointId, request: &RequestContext) -> Option<EndpointId> {
        if request.is_excluded(id) {
            return None;
        }
        let endpoint = self.get(id);
        match endpoint.kind() {
            EndpointKind::Http => {
                if endpoint.parent().is_none() || self.ready_to_send(id) {
                    Some(id)
                } else {
                    None
                }
            }
            EndpointKind::Failover { children } => children.iter().find_map(|c| self.select_leaf(*c, request)),
            EndpointKind::Loadbalance { children, balancer } => {
                if children.is_empty() {
                    return None;
                }
                let start = balancer.start_index(children.len());
                (0..children.len()).find_map(|offset| {
                    let child = children[(start + offset) % children.len()];
                    self.select_leaf(child, request)
                })
            }
        }
    }

    /// Prepare one attempt through `id`.
    ///
    /// Composites delegate to the selected leaf. A leaf that is not ready, or
    /// already failed during this send, fails with `EndpointUnavailable`
    /// before any transport call.
    pub fn send(&self, id: EndpointId, request: &mut RequestContext) -> Result<PreparedSend, DispatchError> {
        let endpoint = self.get(id);
        let unavailable = || DispatchError::EndpointUnavailable {
            endpoint: endpoint.name().to_string(),
        };

        match endpoint.kind() {
            EndpointKind::Http => {
                let prepared = endpoint.prepare(request).ok_or_else(unavailable)?;
                if request.is_excluded(id) || !self.ready_to_send(id) {
                    tracing::warn!(
                        endpoint = %endpoint.name(),
                        state = endpoint.health_snapshot().state.as_str(),
                        "Endpoint not ready to send"
                    );
                    return Err(unavailable());
                }
                Ok(prepared)
            }
            _ => {
                let leaf = self.select_leaf(id, request).ok_or_else(|| {
                    tracing::warn!(endpoint = %endpoint.name(), "No ready child endpoint");
                    unavailable()
                })?;
                let leaf_endpoint = self.get(leaf);
                leaf_endpoint.prepare(request).ok_or_else(unavailable)
            }
        }
    }

    /// Handle a failed attempt on `id`.
    ///
    /// Classifies the transport markers, clears the stale error marker, then
    /// applies the health transition. Exceeding the limit excludes `id` for
    /// the rest of this send and escalates to the parent.
    pub fn on_fault(&self, id: EndpointId, request: &mut RequestContext) -> FaultResolution {
        let endpoint = self.get(id);
        let kind = classify(request.markers());
        request.clear_error();

        let limits = self.retry_limits(id);
        let exceeded = match endpoint.kind() {
            EndpointKind::Http => {
                let definition = endpoint.definition();
                let transition = endpoint.context().on_fault(kind, limits, &definition.suspend_policy());
                metrics::record_endpoint_state(endpoint.name(), endpoint.health_snapshot().state);
                transition.is_escalation()
            }
            _ => endpoint.context().count_child_failure(kind, limits),
        };
        metrics::record_fault(endpoint.name(), kind);

        if !exceeded {
            return FaultResolution::Handled { endpoint: id, kind };
        }

        request.exclude(id);
        metrics::record_escalation(endpoint.name());
        match endpoint.parent() {
            Some(parent) => {
                tracing::warn!(
                    endpoint = %endpoint.name(),
                    parent = %self.get(parent).name(),
                    kind = kind.as_str(),
                    "Escalating failure to parent endpoint"
                );
                self.on_fault(parent, request)
            }
            None => {
                tracing::warn!(endpoint = %endpoint.name(), kind = kind.as_str(), "Retry limit exceeded at root endpoint");
                FaultResolution::Exhausted { endpoint: id, kind }
            }
        }
    }

    /// Reset `id` and every ancestor.
    pub fn on_success(&self, id: EndpointId) {
        let mut current = Some(id);
        while let Some(id) = current {
            let endpoint = self.get(id);
            endpoint.context().on_success();
            metrics::record_endpoint_state(endpoint.name(), endpoint.health_snapshot().state);
            current = endpoint.parent();
        }
    }
}
