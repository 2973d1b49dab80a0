use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::http::server::AppState;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub endpoints: usize,
    pub ready_roots: usize,
    pub total_roots: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let registry = state.dispatcher.registry();
    let roots = registry.roots();
    let ready_roots = roots.iter().filter(|id| registry.ready_to_send(**id)).count();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if ready_roots == roots.len() { "operational" } else { "degraded" },
        endpoints: registry.len(),
        ready_roots,
        total_roots: roots.len(),
    })
}

/// Every endpoint in configuration order, with its health.
pub async fn get_endpoints(State(state): State<AppState>) -> Json<Vec<serde_json::Value>> {
    let registry = state.dispatcher.registry();
    Json(registry.iter().map(|ep| registry.describe(ep.id())).collect())
}

pub async fn get_endpoint(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let registry = state.dispatcher.registry();
    let id = registry.lookup(&name).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(registry.describe(id)))
}
