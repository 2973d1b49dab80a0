//! Per-request address resolution.
//!
//! # Responsibilities
//! - Harvest `uri.var.*` / `query.param.*` bindings from endpoint defaults
//!   and the request property bag (request values win)
//! - Expand the endpoint's template in legacy or compliant mode
//! - Fall back to the raw template on any failure
//!
//! # Design Decisions
//! - All working state lives in a call-local `Expansion`; the blueprint is
//!   borrowed immutably, so concurrent resolutions never serialize
//! - Failure paths are distinguished in logs only

use std::collections::BTreeMap;

use percent_encoding::percent_decode_str;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::dispatch::RequestContext;
use crate::uri::template::{is_pct_triplet, Bindings, UriTemplate};

/// Prefix of path variable bindings.
pub const URI_VARIABLE_PREFIX: &str = "uri.var.";
/// Prefix of query parameter bindings.
pub const QUERY_PARAM_PREFIX: &str = "query.param.";

/// Why an expansion fell back to the raw template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpansionError {
    #[error("malformed escape at byte {index} in '{input}'")]
    MalformedEscape { input: String, index: usize },

    #[error("decoded value of '{input}' is not valid UTF-8")]
    InvalidUtf8 { input: String },

    #[error("invalid URL '{address}': {reason}")]
    MalformedUrl { address: String, reason: url::ParseError },

    #[error("illegal character at index {index} in '{address}'")]
    InvalidSyntax { address: String, index: usize },
}

/// Which expansion algorithm a template uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionMode {
    /// Decode values, expand, then re-parse and rebuild the address.
    Legacy,
    /// Substitute values as-is (RFC 6570).
    Compliant,
}

impl ResolutionMode {
    pub fn of(template: &UriTemplate) -> Self {
        if template.is_legacy() {
            ResolutionMode::Legacy
        } else {
            ResolutionMode::Compliant
        }
    }

    fn decodes_values(self) -> bool {
        self == ResolutionMode::Legacy
    }
}

fn is_binding_name(name: &str) -> bool {
    name.starts_with(URI_VARIABLE_PREFIX) || name.starts_with(QUERY_PARAM_PREFIX)
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Merge endpoint defaults and request properties. Request values override
/// same-named defaults.
pub fn collect_bindings(defaults: &BTreeMap<String, String>, request: &RequestContext) -> Vec<(String, String)> {
    let mut merged: BTreeMap<&str, String> = defaults
        .iter()
        .filter(|(name, _)| is_binding_name(name))
        .map(|(name, value)| (name.as_str(), value.clone()))
        .collect();

    for (name, value) in request.properties() {
        if !is_binding_name(name) {
            continue;
        }
        if let Some(value) = value_to_string(value) {
            merged.insert(name, value);
        }
    }

    merged
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

/// Form-style decoding: `+` becomes a space, `%XX` escapes are decoded.
fn form_decode(input: &str) -> Result<String, ExpansionError> {
    let bytes = input.as_bytes();
    if let Some(index) = bytes
        .iter()
        .enumerate()
        .position(|(i, &b)| b == b'%' && !is_pct_triplet(bytes, i))
    {
        return Err(ExpansionError::MalformedEscape {
            input: input.to_string(),
            index,
        });
    }

    let spaced = input.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| ExpansionError::InvalidUtf8 {
            input: input.to_string(),
        })
}

/// Check that every character may appear in a URI reference.
fn validate_uri(address: &str) -> Result<(), ExpansionError> {
    const ALLOWED: &[u8] = b"-._~:/?#[]@!$&'()*+,;=";
    let bytes = address.as_bytes();
    for (index, c) in address.char_indices() {
        let ok = if c.is_ascii() {
            let b = c as u8;
            b.is_ascii_alphanumeric() || ALLOWED.contains(&b) || (b == b'%' && is_pct_triplet(bytes, index))
        } else {
            !c.is_control() && !c.is_whitespace()
        };
        if !ok {
            return Err(ExpansionError::InvalidSyntax {
                address: address.to_string(),
                index,
            });
        }
    }
    Ok(())
}

/// One resolution of one template. Dropped when the call returns.
struct Expansion<'a> {
    template: &'a UriTemplate,
    mode: ResolutionMode,
    bindings: Bindings,
}

impl<'a> Expansion<'a> {
    fn new(template: &'a UriTemplate, harvested: Vec<(String, String)>) -> Result<Self, ExpansionError> {
        let mode = ResolutionMode::of(template);
        let mut bindings = Bindings::with_capacity(harvested.len());
        for (name, value) in harvested {
            let value = if mode.decodes_values() { form_decode(&value)? } else { value };
            bindings.insert(name, value);
        }
        Ok(Self { template, mode, bindings })
    }

    fn run(self) -> Result<String, ExpansionError> {
        if self.bindings.is_empty() {
            return Ok(self.template.raw().to_string());
        }

        match self.mode {
            ResolutionMode::Legacy => {
                let expanded = self.template.expand(&self.bindings, false);
                // Decoding first keeps escapes like %20 from becoming %2520
                // when the address is rebuilt.
                let decoded = form_decode(&expanded)?;
                let url = Url::parse(&decoded).map_err(|reason| ExpansionError::MalformedUrl {
                    address: decoded.clone(),
                    reason,
                })?;
                Ok(url.into())
            }
            ResolutionMode::Compliant => {
                let reserved_lead = self.template.leads_with_simple_expression();
                let expanded = self.template.expand(&self.bindings, reserved_lead);
                validate_uri(&expanded)?;
                Ok(expanded)
            }
        }
    }
}

/// Compute the concrete address for `request`. Never fails: any expansion
/// error yields the raw template.
pub fn resolve(
    endpoint: &str,
    template: &UriTemplate,
    defaults: &BTreeMap<String, String>,
    request: &RequestContext,
) -> String {
    let harvested = collect_bindings(defaults, request);
    match Expansion::new(template, harvested).and_then(Expansion::run) {
        Ok(address) => {
            tracing::debug!(endpoint = %endpoint, address = %address, "Expanded URL");
            address
        }
        Err(e) => {
            match &e {
                ExpansionError::MalformedEscape { .. } | ExpansionError::InvalidUtf8 { .. } => {
                    tracing::debug!(endpoint = %endpoint, error = %e, "Could not decode URI template binding");
                }
                ExpansionError::MalformedUrl { .. } => {
                    tracing::debug!(endpoint = %endpoint, error = %e, "Invalid URL for HTTP endpoint");
                }
                ExpansionError::InvalidSyntax { .. } => {
                    tracing::debug!(endpoint = %endpoint, error = %e, "Invalid URL syntax for HTTP endpoint");
                }
            }
            template.raw().to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    fn request(props: &[(&str, &str)]) -> RequestContext {
        let mut req = RequestContext::new(Method::GET);
        for (k, v) in props {
            req.set_property(*k, *v);
        }
        req
    }

    fn defaults(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn legacy(raw: &str) -> UriTemplate {
        UriTemplate::parse(raw, true).unwrap()
    }

    fn compliant(raw: &str) -> UriTemplate {
        UriTemplate::parse(raw, false).unwrap()
    }

    #[test]
    fn test_legacy_space_is_encoded_once() {
        let t = legacy("http://host/{uri.var.p}");
        let none = BTreeMap::new();

        assert_eq!(resolve("ep", &t, &none, &request(&[("uri.var.p", "a b")])), "http://host/a%20b");
        assert_eq!(resolve("ep", &t, &none, &request(&[("uri.var.p", "a%20b")])), "http://host/a%20b");
    }

    #[test]
    fn test_legacy_plus_decodes_to_space() {
        let t = legacy("http://host/search{?query.param.q}");
        let addr = resolve("ep", &t, &BTreeMap::new(), &request(&[("query.param.q", "x+y")]));
        assert_eq!(addr, "http://host/search?query.param.q=x%20y");
    }

    #[test]
    fn test_legacy_rebuild_normalizes_bare_host() {
        let t = legacy("http://{uri.var.host}");
        let addr = resolve("ep", &t, &BTreeMap::new(), &request(&[("uri.var.host", "h")]));
        assert_eq!(addr, "http://h/");

        // Compliant mode leaves the address as expanded.
        let t = compliant("http://{uri.var.host}");
        let addr = resolve("ep", &t, &BTreeMap::new(), &request(&[("uri.var.host", "h")]));
        assert_eq!(addr, "http://h");
    }

    #[test]
    fn test_legacy_relative_template_falls_back() {
        let t = legacy("/orders/{uri.var.id}");
        let addr = resolve("ep", &t, &BTreeMap::new(), &request(&[("uri.var.id", "7")]));
        assert_eq!(addr, "/orders/{uri.var.id}");
    }

    #[test]
    fn test_legacy_malformed_escape_falls_back() {
        let t = legacy("http://host/{uri.var.p}");
        let addr = resolve("ep", &t, &BTreeMap::new(), &request(&[("uri.var.p", "100%")]));
        assert_eq!(addr, "http://host/{uri.var.p}");
    }

    #[test]
    fn test_compliant_whole_template_variable() {
        let t = compliant("{uri.var.full}");
        let addr = resolve("ep", &t, &BTreeMap::new(), &request(&[("uri.var.full", "http://other/x?y=1")]));
        assert_eq!(addr, "http://other/x?y=1");
    }

    #[test]
    fn test_compliant_keeps_values_encoded_in_path() {
        let t = compliant("http://host/items/{uri.var.id}{?query.param.q}");
        let addr = resolve(
            "ep",
            &t,
            &BTreeMap::new(),
            &request(&[("uri.var.id", "a/b c"), ("query.param.q", "%20")]),
        );
        assert_eq!(addr, "http://host/items/a%2Fb%20c?query.param.q=%2520");
    }

    #[test]
    fn test_compliant_illegal_literal_falls_back() {
        let t = compliant("http://host/a b/{uri.var.id}");
        let addr = resolve("ep", &t, &BTreeMap::new(), &request(&[("uri.var.id", "1")]));
        assert_eq!(addr, "http://host/a b/{uri.var.id}");
    }

    #[test]
    fn test_no_bindings_returns_template() {
        let t = compliant("{uri.var.full}");
        assert_eq!(resolve("ep", &t, &BTreeMap::new(), &request(&[("other", "x")])), "{uri.var.full}");
    }

    #[test]
    fn test_request_binding_overrides_default() {
        let t = compliant("http://host/{uri.var.id}");
        let defaults = defaults(&[("uri.var.id", "default"), ("unrelated", "x")]);

        assert_eq!(resolve("ep", &t, &defaults, &request(&[])), "http://host/default");
        assert_eq!(resolve("ep", &t, &defaults, &request(&[("uri.var.id", "42")])), "http://host/42");

        let lt = legacy("http://host/{uri.var.id}");
        assert_eq!(resolve("ep", &lt, &defaults, &request(&[("uri.var.id", "42")])), "http://host/42");
    }

    #[test]
    fn test_non_string_and_null_properties() {
        let t = compliant("http://host/{uri.var.n}/{uri.var.gone}");
        let mut req = RequestContext::new(Method::GET);
        req.set_property("uri.var.n", 5);
        req.set_property("uri.var.gone", Value::Null);

        assert_eq!(resolve("ep", &t, &BTreeMap::new(), &req), "http://host/5/");
    }

    #[test]
    fn test_resolution_is_repeatable() {
        let t = legacy("http://host/{uri.var.p}");
        let before = t.clone();
        let req = request(&[("uri.var.p", "a b")]);

        let first = resolve("ep", &t, &BTreeMap::new(), &req);
        let second = resolve("ep", &t, &BTreeMap::new(), &req);

        assert_eq!(first, second);
        assert_eq!(t, before);
    }
}
