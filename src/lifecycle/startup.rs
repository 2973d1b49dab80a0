//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the endpoint tree from validated configuration
//! - Build the outbound transport
//! - Hand both to a `Dispatcher`
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently

use std::sync::Arc;

use thiserror::Error;

use crate::config::{ConfigError, MediatorConfig};
use crate::dispatch::Dispatcher;
use crate::endpoint::EndpointRegistry;
use crate::transport::HttpTransport;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build HTTP transport: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Build the registry and reqwest transport described by `config`.
pub fn build_dispatcher(config: &MediatorConfig) -> Result<Dispatcher, StartupError> {
    let registry = Arc::new(EndpointRegistry::from_config(config)?);
    let transport = Arc::new(HttpTransport::new(&config.transport)?);
    tracing::info!(
        endpoints = registry.len(),
        roots = registry.roots().len(),
        connect_timeout_secs = config.transport.connect_timeout_secs,
        request_timeout_secs = config.transport.request_timeout_secs,
        "Mediator initialized"
    );
    Ok(Dispatcher::new(registry, transport))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EndpointConfig, EndpointKindConfig};

    #[test]
    fn test_build_dispatcher() {
        let config = MediatorConfig {
            endpoints: vec![
                EndpointConfig::composite("group", EndpointKindConfig::Failover, &["a"]),
                EndpointConfig::http("a", "http://a/"),
            ],
            ..Default::default()
        };
        let dispatcher = build_dispatcher(&config).unwrap();
        assert_eq!(dispatcher.registry().len(), 2);
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let config = MediatorConfig {
            endpoints: vec![EndpointConfig::composite("group", EndpointKindConfig::Failover, &[])],
            ..Default::default()
        };
        assert!(matches!(build_dispatcher(&config), Err(StartupError::Config(_))));
    }
}
