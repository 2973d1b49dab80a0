//! Immutable endpoint definition.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use axum::http::{Method, Version};
use serde::Serialize;

use crate::config::validation::ValidationError;
use crate::config::{EndpointConfig, EndpointKindConfig};
use crate::health::{RetryLimits, SuspendPolicy};
use crate::uri::UriTemplate;

/// Template prefix that selects legacy resolution.
pub const LEGACY_PREFIX: &str = "legacy-encoding:";

/// HTTP protocol version used towards the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum HttpVersion {
    #[serde(rename = "1.0")]
    Http10,
    #[default]
    #[serde(rename = "1.1")]
    Http11,
    #[serde(rename = "2")]
    Http2,
}

impl HttpVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpVersion::Http10 => "1.0",
            HttpVersion::Http11 => "1.1",
            HttpVersion::Http2 => "2",
        }
    }
}

impl fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP/{}", self.as_str())
    }
}

impl FromStr for HttpVersion {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix("HTTP/").unwrap_or(s);
        match s {
            "1.0" => Ok(HttpVersion::Http10),
            "1.1" => Ok(HttpVersion::Http11),
            "2" | "2.0" => Ok(HttpVersion::Http2),
            _ => Err(()),
        }
    }
}

impl From<HttpVersion> for Version {
    fn from(v: HttpVersion) -> Self {
        match v {
            HttpVersion::Http10 => Version::HTTP_10,
            HttpVersion::Http11 => Version::HTTP_11,
            HttpVersion::Http2 => Version::HTTP_2,
        }
    }
}

/// Configuration-time settings of one endpoint. Never changes after load.
#[derive(Debug, Clone)]
pub struct EndpointDefinition {
    pub max_fault_retries: u32,
    pub max_timeout_retries: u32,
    pub initial_suspend: Duration,
    pub max_suspend: Duration,
    pub timeout_cooldown: Duration,
    /// Method override; `None` inherits the inbound method.
    pub method: Option<Method>,
    pub uri_template: Option<UriTemplate>,
    pub legacy_encoding: bool,
    pub http_version: HttpVersion,
    pub server_push_sequence: Option<String>,
}

impl EndpointDefinition {
    /// Build a definition, reporting every field-level problem.
    pub fn from_config(config: &EndpointConfig) -> Result<Self, Vec<ValidationError>> {
        let mut errors = Vec::new();
        let name = &config.name;

        let method = match config.method.as_deref() {
            None => None,
            Some(raw) => match Method::from_bytes(raw.trim().to_ascii_uppercase().as_bytes()) {
                Ok(m) => Some(m),
                Err(_) => {
                    errors.push(ValidationError::InvalidMethod {
                        endpoint: name.clone(),
                        method: raw.to_string(),
                    });
                    None
                }
            },
        };

        let http_version = config.http_version.parse().unwrap_or_else(|_| {
            errors.push(ValidationError::InvalidHttpVersion {
                endpoint: name.clone(),
                version: config.http_version.clone(),
            });
            HttpVersion::default()
        });

        let mut legacy_encoding = config.legacy_encoding;
        let uri_template = match (config.kind, config.uri_template.as_deref()) {
            (EndpointKindConfig::Http, None) => {
                errors.push(ValidationError::MissingTemplate(name.clone()));
                None
            }
            (EndpointKindConfig::Http, Some(raw)) => {
                let raw = match raw.strip_prefix(LEGACY_PREFIX) {
                    Some(stripped) => {
                        legacy_encoding = true;
                        stripped
                    }
                    None => raw,
                };
                if raw.trim().is_empty() {
                    errors.push(ValidationError::MissingTemplate(name.clone()));
                    None
                } else {
                    match UriTemplate::parse(raw, legacy_encoding) {
                        Ok(t) => Some(t),
                        Err(source) => {
                            errors.push(ValidationError::Template {
                                endpoint: name.clone(),
                                source,
                            });
                            None
                        }
                    }
                }
            }
            (_, Some(_)) => {
                errors.push(ValidationError::UnexpectedTemplate(name.clone()));
                None
            }
            (_, None) => None,
        };

        let retry = &config.retry;
        if retry.max_suspend_ms < retry.initial_suspend_ms {
            errors.push(ValidationError::SuspendRange(name.clone()));
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Self {
            max_fault_retries: retry.max_fault_retries,
            max_timeout_retries: retry.max_timeout_retries,
            initial_suspend: Duration::from_millis(retry.initial_suspend_ms),
            max_suspend: Duration::from_millis(retry.max_suspend_ms),
            timeout_cooldown: Duration::from_millis(retry.timeout_cooldown_ms),
            method,
            uri_template,
            legacy_encoding,
            http_version,
            server_push_sequence: config.server_push_sequence.clone(),
        })
    }

    pub fn retry_limits(&self) -> RetryLimits {
        RetryLimits {
            max_fault_retries: self.max_fault_retries,
            max_timeout_retries: self.max_timeout_retries,
        }
    }

    pub fn suspend_policy(&self) -> SuspendPolicy {
        SuspendPolicy {
            initial: self.initial_suspend,
            max: self.max_suspend,
            timeout_cooldown: self.timeout_cooldown,
        }
    }
}
