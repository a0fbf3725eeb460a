//! revin-ingest - Review feedback ingestion service
//!
//! **Module Identity:**
//! - Name: revin-ingest
//! - Default port: 5740
//!
//! Accepts review exports over HTTP and streams back labelled, aggregated
//! results as NDJSON.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter};

use revin_ingest::AppState;

/// Command-line arguments
#[derive(Debug, Parser)]
#[command(name = "revin-ingest", version, about = "Review feedback ingestion service")]
struct Args {
    /// Path to a TOML config file (overrides REVIN_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides [server] bind_address
    #[arg(long)]
    bind: Option<String>,

    /// Listen port, overrides [server] port and REVIN_PORT
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins; otherwise start at info and switch to the configured level once loaded
    let rust_log = EnvFilter::try_from_default_env().ok();
    let from_env = rust_log.is_some();
    let (filter, filter_handle) =
        reload::Layer::new(rust_log.unwrap_or_else(|| EnvFilter::new("info")));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    let mut config = revin_ingest::config::load_service_config(args.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    if !from_env {
        match EnvFilter::try_new(&config.logging.level) {
            Ok(level) => filter_handle
                .reload(level)
                .context("Failed to apply configured log level")?,
            Err(e) => warn!(level = %config.logging.level, error = %e, "Invalid log level, keeping info"),
        }
    }

    info!("Starting revin-ingest (review ingestion) service");
    info!(
        version = env!("CARGO_PKG_VERSION"),
        git = env!("REVIN_GIT_HASH"),
        built = env!("REVIN_BUILD_TIMESTAMP"),
        profile = env!("REVIN_BUILD_PROFILE"),
        "Build"
    );
    info!(
        concurrency = config.scheduler.concurrency,
        max_retries = config.scheduler.max_retries,
        batch_size = config.pipeline.batch_size,
        batch_delay_ms = config.pipeline.batch_delay_ms,
        encodings = ?config.decoder.encodings,
        "Pipeline settings"
    );

    let state = AppState::from_config(config.clone()).context("Failed to build service state")?;
    if !state.pipeline.enrichment_enabled() {
        warn!("Classification disabled: results will carry fallback labels");
    }

    let app = revin_ingest::build_router(state);

    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
