//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, tracing layer, graceful shutdown)
//!     → mediate.rs (inbound request → RequestContext)
//!     → Dispatcher (endpoint tree, transport, health)
//!     → mediate.rs (upstream response or error status)
//!     → Send to client
//!
//! /admin/* → admin module (endpoint descriptions, status)
//! ```

pub mod mediate;
pub mod server;

pub use server::{AppState, MediatorServer};
