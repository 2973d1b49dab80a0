//! Logical send driver.
//!
//! # Responsibilities
//! - Loop select → prepare → attempt until success or no candidate is left
//! - Feed every outcome back into the registry's health handling
//! - Map the end of the loop to a `DispatchError`

use std::sync::Arc;
use std::time::Instant;

use crate::dispatch::{DispatchError, RequestContext};
use crate::endpoint::{EndpointId, EndpointRegistry, FaultResolution};
use crate::health::FaultKind;
use crate::observability::metrics;
use crate::transport::{AttemptOutcome, Transport};

/// Drives logical sends through a shared registry.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<EndpointRegistry>,
    transport: Arc<dyn Transport>,
}

impl Dispatcher {
    pub fn new(registry: Arc<EndpointRegistry>, transport: Arc<dyn Transport>) -> Self {
        Self { registry, transport }
    }

    pub fn registry(&self) -> &Arc<EndpointRegistry> {
        &self.registry
    }

    /// Send `request` through `root`, returning the leaf that succeeded.
    ///
    /// `root` must have no parent.
    pub async fn dispatch(&self, root: EndpointId, request: &mut RequestContext) -> Result<EndpointId, DispatchError> {
        let start = Instant::now();
        let root_endpoint = self.registry.get(root);
        let root_name = root_endpoint.name().to_string();
        if let Some(parent) = root_endpoint.parent() {
            let err = DispatchError::NotRoot {
                endpoint: root_name,
                parent: self.registry.get(parent).name().to_string(),
            };
            tracing::warn!(message_id = %request.message_id(), error = %err, "Dispatch rejected");
            return Err(err);
        }
        request.reset_exclusions();

        let mut last_fault: Option<(FaultKind, Option<String>)> = None;
        let mut attempts = 0u32;

        let result = loop {
            let prepared = match self.registry.send(root, request) {
                Ok(prepared) => prepared,
                Err(err) => {
                    break Err(match last_fault.take() {
                        Some((kind, message)) => DispatchError::Faulted {
                            endpoint: root_name.clone(),
                            kind,
                            message,
                        },
                        None => err,
                    });
                }
            };

            attempts += 1;
            request.begin_attempt();
            let leaf_name = self.registry.get(prepared.endpoint).name();
            tracing::debug!(
                message_id = %request.message_id(),
                root = %root_name,
                endpoint = %leaf_name,
                address = %prepared.address,
                method = %prepared.method,
                attempt = attempts,
                "Sending to endpoint"
            );

            match self.transport.attempt(request, &prepared).await {
                AttemptOutcome::Success => {
                    self.registry.on_success(prepared.endpoint);
                    break Ok(prepared.endpoint);
                }
                AttemptOutcome::Failure => {
                    let message = request.error().map(|e| e.message.clone());
                    match self.registry.on_fault(prepared.endpoint, request) {
                        FaultResolution::Handled { kind, .. } => {
                            request.exclude(prepared.endpoint);
                            last_fault = Some((kind, message));
                        }
                        FaultResolution::Exhausted { endpoint, .. } => {
                            break Err(DispatchError::RetryLimitExceeded {
                                endpoint: self.registry.get(endpoint).name().to_string(),
                            });
                        }
                    }
                }
            }
        };

        match &result {
            Ok(leaf) => {
                metrics::record_dispatch(&root_name, "success", start);
                tracing::debug!(
                    message_id = %request.message_id(),
                    root = %root_name,
                    endpoint = %self.registry.get(*leaf).name(),
                    attempts,
                    "Dispatch succeeded"
                );
            }
            Err(err) => {
                metrics::record_dispatch(&root_name, err.label(), start);
                tracing::warn!(
                    message_id = %request.message_id(),
                    root = %root_name,
                    attempts,
                    error = %err,
                    "Dispatch failed"
                );
            }
        }
        result
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").field("endpoints", &self.registry.len()).finish()
    }
}
