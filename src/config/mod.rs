//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → MediatorConfig (validated, immutable)
//!     → EndpointRegistry::from_config (tree built once)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the endpoint tree never changes shape
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Any validation error is fatal at load time, never at dispatch time

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, EndpointConfig, EndpointKindConfig, EndpointRetryConfig, LoadBalanceAlgorithm, MediatorConfig,
    ObservabilityConfig, TransportConfig,
};
