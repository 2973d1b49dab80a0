//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (composites reference existing endpoints)
//! - Reject shapes the tree cannot hold (shared children, cycles)
//! - Validate per-endpoint fields through `EndpointDefinition::from_config`
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: MediatorConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashMap;

use thiserror::Error;

use crate::config::schema::{EndpointKindConfig, MediatorConfig};
use crate::endpoint::EndpointDefinition;
use crate::uri::TemplateError;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("endpoint at index {0} has an empty name")]
    EmptyName(usize),

    #[error("duplicate endpoint name '{0}'")]
    DuplicateName(String),

    #[error("endpoint '{endpoint}' references unknown child '{child}'")]
    UnknownChild { endpoint: String, child: String },

    #[error("endpoint '{child}' is a child of both '{first}' and '{second}'")]
    MultipleParents { child: String, first: String, second: String },

    #[error("endpoint '{0}' is part of a cycle")]
    Cycle(String),

    #[error("HTTP endpoint '{0}' has no uri_template")]
    MissingTemplate(String),

    #[error("HTTP endpoint '{0}' must not declare children")]
    UnexpectedChildren(String),

    #[error("composite endpoint '{0}' has no children")]
    NoChildren(String),

    #[error("composite endpoint '{0}' must not declare a uri_template")]
    UnexpectedTemplate(String),

    #[error("endpoint '{endpoint}' has an invalid uri_template: {source}")]
    Template { endpoint: String, source: TemplateError },

    #[error("endpoint '{endpoint}' has an invalid HTTP method '{method}'")]
    InvalidMethod { endpoint: String, method: String },

    #[error("endpoint '{endpoint}' has an unsupported HTTP version '{version}'")]
    InvalidHttpVersion { endpoint: String, version: String },

    #[error("endpoint '{0}' has max_suspend_ms lower than initial_suspend_ms")]
    SuspendRange(String),
}

/// Validate the whole configuration.
pub fn validate_config(config: &MediatorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for (i, ep) in config.endpoints.iter().enumerate() {
        if ep.name.trim().is_empty() {
            errors.push(ValidationError::EmptyName(i));
            continue;
        }
        if index.insert(ep.name.as_str(), i).is_some() {
            errors.push(ValidationError::DuplicateName(ep.name.clone()));
        }
    }

    let mut parent_of: HashMap<&str, &str> = HashMap::new();
    for ep in &config.endpoints {
        if let Err(field_errors) = EndpointDefinition::from_config(ep) {
            errors.extend(field_errors);
        }

        match ep.kind {
            EndpointKindConfig::Http if !ep.children.is_empty() => {
                errors.push(ValidationError::UnexpectedChildren(ep.name.clone()));
            }
            EndpointKindConfig::Failover | EndpointKindConfig::Loadbalance if ep.children.is_empty() => {
                errors.push(ValidationError::NoChildren(ep.name.clone()));
            }
            _ => {}
        }

        for child in &ep.children {
            if !index.contains_key(child.as_str()) {
                errors.push(ValidationError::UnknownChild {
                    endpoint: ep.name.clone(),
                    child: child.clone(),
                });
                continue;
            }
            if let Some(first) = parent_of.insert(child.as_str(), ep.name.as_str()) {
                errors.push(ValidationError::MultipleParents {
                    child: child.clone(),
                    first: first.to_string(),
                    second: ep.name.clone(),
                });
            }
        }
    }

    // With at most one parent each, a cycle shows up as a parent walk that
    // never reaches a root.
    for ep in &config.endpoints {
        let mut current = ep.name.as_str();
        let mut steps = 0;
        while let Some(parent) = parent_of.get(current) {
            current = *parent;
            steps += 1;
            if steps > config.endpoints.len() {
                errors.push(ValidationError::Cycle(ep.name.clone()));
                break;
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
