//! Endpoint mediation engine.
//!
//! # Architecture Overview
//!
//! ```text
//!     Inbound request
//!     ───────────────▶ http::mediate ──▶ dispatch::Dispatcher
//!                                              │
//!                                              ▼
//!                                  endpoint::EndpointRegistry
//!                                   ├─ failover / loadbalance  (select leaf)
//!                                   ├─ uri::resolve            (concrete address)
//!                                   └─ health::EndpointContext (ready? on_fault / on_success)
//!                                              │
//!                                              ▼
//!                                  transport::Transport ──────────────▶ Upstream
//!
//!     Cross-cutting: config, observability, lifecycle, resilience::backoff
//! ```

// Core subsystems
pub mod config;
pub mod dispatch;
pub mod endpoint;
pub mod transport;
pub mod uri;

// Traffic management
pub mod health;
pub mod load_balancer;

// Outer surfaces
pub mod admin;
pub mod http;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::MediatorConfig;
pub use dispatch::{DispatchError, Dispatcher, RequestContext};
pub use endpoint::{EndpointId, EndpointRegistry};
pub use http::MediatorServer;
pub use lifecycle::Shutdown;
