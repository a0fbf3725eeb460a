//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status ("ok" while the listener is serving)
    pub status: String,
    /// Module name ("revin-ingest")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Git revision the binary was built from
    pub build: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Whether a classifier credential is configured
    pub enrichment_enabled: bool,
    /// Last failed run, if any (for diagnostics)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let last_error = state.last_error.read().await.clone();
    let enrichment_enabled = state.pipeline.enrichment_enabled();

    Json(HealthResponse {
        status: "ok".to_string(),
        module: crate::config::MODULE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        build: env!("REVIN_GIT_HASH").to_string(),
        uptime_seconds,
        enrichment_enabled,
        last_error,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
