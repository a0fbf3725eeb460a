//! revin-ingest library interface
//!
//! Review-feedback ingestion and enrichment: an uploaded CSV or spreadsheet is
//! decoded, mapped onto canonical fields, labelled by an external classifier
//! under a bounded-concurrency scheduler, aggregated, and streamed back to the
//! caller as NDJSON progress/result events.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod workflow;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use revin_common::config::TomlConfig;
use services::{Classifier, EnrichmentScheduler, FileDecoder, HttpClassifier, SchemaResolver};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use workflow::{BatchCoordinator, Pipeline};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Validated service configuration
    pub config: Arc<TomlConfig>,
    /// Shared by every run, so the classifier concurrency ceiling is global
    pub pipeline: Arc<Pipeline>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last failed run, for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    /// State with an explicit classifier (`None` disables enrichment)
    pub fn new(
        config: TomlConfig,
        classifier: Option<Arc<dyn Classifier>>,
    ) -> revin_common::Result<Self> {
        let decoder = FileDecoder::new(&config.decoder.encodings)?;
        let scheduler = classifier
            .map(|c| Arc::new(EnrichmentScheduler::from_config(c, &config.scheduler)));
        let coordinator = BatchCoordinator::new(scheduler, &config.pipeline);
        let pipeline = Pipeline::new(decoder, SchemaResolver::new(), coordinator);

        Ok(Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        })
    }

    /// State wired to the HTTP classifier when a credential is configured
    pub fn from_config(config: TomlConfig) -> revin_common::Result<Self> {
        let classifier: Option<Arc<dyn Classifier>> = match config.classifier.api_token.as_deref()
        {
            Some(token) if config::is_valid_key(token) => Some(Arc::new(HttpClassifier::new(
                &config.classifier,
                token.trim().to_string(),
            )?)),
            _ => None,
        };
        Self::new(config, classifier)
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.server.max_upload_bytes;

    Router::new()
        .merge(api::analyze_routes())
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
