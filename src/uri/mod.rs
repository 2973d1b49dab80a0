//! Address resolution subsystem.
//!
//! # Data Flow
//! ```text
//! Configuration load
//!     → template.rs (parse raw template once, immutable)
//!
//! Per request
//!     → resolver.rs (harvest bindings, expand, re-parse or validate)
//!     → concrete address string, or the raw template on failure
//! ```

pub mod resolver;
pub mod template;

pub use resolver::{resolve, ExpansionError, ResolutionMode, QUERY_PARAM_PREFIX, URI_VARIABLE_PREFIX};
pub use template::{Bindings, TemplateError, UriTemplate};
