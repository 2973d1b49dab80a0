//! Mediation handler: inbound HTTP request to logical send and back.
//!
//! # Responsibilities
//! - Bind query parameters as `query.param.<name>`
//! - Bind `x-uri-var-<name>` headers and the trailing path as `uri.var.*`
//! - Dispatch to the named root endpoint
//! - Map the upstream response or dispatch error to the client response

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::dispatch::{DispatchError, RequestContext};
use crate::http::server::AppState;
use crate::uri::{QUERY_PARAM_PREFIX, URI_VARIABLE_PREFIX};

/// Header prefix carrying explicit path variable bindings.
pub const URI_VAR_HEADER_PREFIX: &str = "x-uri-var-";
/// Response header naming the leaf that served the request.
pub const ENDPOINT_HEADER: &str = "x-mediator-endpoint";
/// Response header carrying the message id.
pub const MESSAGE_ID_HEADER: &str = "x-message-id";

const SKIPPED_HEADERS: &[&str] = &["host", "connection", "content-length", "transfer-encoding", "keep-alive", "upgrade"];

/// Build the request context for an inbound call.
pub fn build_request(
    method: Method,
    rest: Option<&str>,
    query: &[(String, String)],
    headers: &HeaderMap,
    body: Bytes,
) -> RequestContext {
    let mut request = RequestContext::new(method);

    if let Some(rest) = rest {
        request.set_property(format!("{URI_VARIABLE_PREFIX}path"), rest);
    }
    for (name, value) in query {
        request.set_property(format!("{QUERY_PARAM_PREFIX}{name}"), value.as_str());
    }
    for (name, value) in headers {
        let Ok(value) = value.to_str() else { continue };
        match name.as_str().strip_prefix(URI_VAR_HEADER_PREFIX) {
            Some(var) if !var.is_empty() => request.set_property(format!("{URI_VARIABLE_PREFIX}{var}"), value),
            Some(_) => {}
            None if SKIPPED_HEADERS.contains(&name.as_str()) => {}
            None => request.add_header(name.as_str(), value),
        }
    }
    request.set_payload(body.to_vec());
    request
}

pub async fn mediate_handler(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    Query(query): Query<Vec<(String, String)>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(name) = params.get("endpoint") else {
        return (StatusCode::NOT_FOUND, "No endpoint named").into_response();
    };
    let registry = state.dispatcher.registry();
    let root = match registry.lookup(name) {
        Some(id) if registry.get(id).parent().is_none() => id,
        _ => {
            tracing::warn!(endpoint = %name, "No root endpoint with this name");
            return (StatusCode::NOT_FOUND, "Unknown endpoint").into_response();
        }
    };

    let mut request = build_request(method, params.get("rest").map(String::as_str), &query, &headers, body);
    let message_id = request.message_id().to_string();

    match state.dispatcher.dispatch(root, &mut request).await {
        Ok(leaf) => {
            let leaf_name = registry.get(leaf).name().to_string();
            let mut response = match request.take_response() {
                Some(upstream) => {
                    let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::OK);
                    let mut response = (status, upstream.body).into_response();
                    for (name, value) in upstream.headers {
                        if SKIPPED_HEADERS.contains(&name.as_str()) {
                            continue;
                        }
                        if let (Ok(name), Ok(value)) = (HeaderName::try_from(name), HeaderValue::try_from(value)) {
                            response.headers_mut().append(name, value);
                        }
                    }
                    response
                }
                None => StatusCode::OK.into_response(),
            };
            insert_header(&mut response, ENDPOINT_HEADER, &leaf_name);
            insert_header(&mut response, MESSAGE_ID_HEADER, &message_id);
            response
        }
        Err(err) => {
            let status = status_for(&err);
            let mut response = (
                status,
                Json(json!({
                    "error": err.label(),
                    "message": err.to_string(),
                    "messageId": message_id,
                })),
            )
                .into_response();
            insert_header(&mut response, MESSAGE_ID_HEADER, &message_id);
            response
        }
    }
}

fn insert_header(response: &mut Response, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        response.headers_mut().insert(name, value);
    }
}

/// Client status for a failed dispatch.
pub fn status_for(err: &DispatchError) -> StatusCode {
    match err {
        DispatchError::EndpointUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        DispatchError::NotRoot { .. } => StatusCode::NOT_FOUND,
        DispatchError::RetryLimitExceeded { .. } | DispatchError::Faulted { .. } => StatusCode::BAD_GATEWAY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::FaultKind;
    use serde_json::Value;

    #[test]
    fn test_build_request_bindings() {
        let mut headers = HeaderMap::new();
        headers.insert("x-uri-var-id", HeaderValue::from_static("42"));
        headers.insert("x-uri-var-", HeaderValue::from_static("ignored"));
        headers.insert("host", HeaderValue::from_static("mediator"));
        headers.insert("accept", HeaderValue::from_static("application/json"));
        let query = vec![("q".to_string(), "a b".to_string())];

        let req = build_request(Method::PUT, Some("v1/items"), &query, &headers, Bytes::from_static(b"{}"));

        assert_eq!(req.inbound_method(), &Method::PUT);
        assert_eq!(req.property("uri.var.id"), Some(&Value::from("42")));
        assert_eq!(req.property("uri.var.path"), Some(&Value::from("v1/items")));
        assert_eq!(req.property("query.param.q"), Some(&Value::from("a b")));
        assert_eq!(req.headers(), &[("accept".to_string(), "application/json".to_string())]);
        assert_eq!(req.payload(), b"{}");
    }

    #[test]
    fn test_status_mapping() {
        let unavailable = DispatchError::EndpointUnavailable { endpoint: "a".into() };
        let exhausted = DispatchError::RetryLimitExceeded { endpoint: "a".into() };
        let faulted = DispatchError::Faulted {
            endpoint: "a".into(),
            kind: FaultKind::Connection,
            message: None,
        };
        assert_eq!(status_for(&unavailable), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_for(&exhausted), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(&faulted), StatusCode::BAD_GATEWAY);
        let child = DispatchError::NotRoot {
            endpoint: "a".into(),
            parent: "group".into(),
        };
        assert_eq!(status_for(&child), StatusCode::NOT_FOUND);
    }
}
