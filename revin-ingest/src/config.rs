//! Configuration resolution for revin-ingest
//!
//! Values come from the TOML file (see `revin_common::config`), then
//! environment overrides are applied on top:
//!
//! | Variable                 | Overrides                   |
//! |--------------------------|-----------------------------|
//! | `REVIN_CLASSIFIER_TOKEN` | `classifier.api_token`      |
//! | `REVIN_SENTIMENT_URL`    | `classifier.sentiment_url`  |
//! | `REVIN_CATEGORY_URL`     | `classifier.category_url`   |
//! | `REVIN_PORT`             | `server.port`               |
//!
//! The result is validated once at startup; a run never sees an invalid
//! configuration.

use revin_common::config::{ConfigPathResolver, TomlConfig};
use revin_common::{Error, Result};
use std::path::Path;
use tracing::{info, warn};

pub const MODULE_NAME: &str = "revin-ingest";

pub const TOKEN_ENV_VAR: &str = "REVIN_CLASSIFIER_TOKEN";
pub const SENTIMENT_URL_ENV_VAR: &str = "REVIN_SENTIMENT_URL";
pub const CATEGORY_URL_ENV_VAR: &str = "REVIN_CATEGORY_URL";
pub const PORT_ENV_VAR: &str = "REVIN_PORT";

/// Resolve, load, override and validate the service configuration
pub fn load_service_config(cli_config: Option<&Path>) -> Result<TomlConfig> {
    let path = ConfigPathResolver::new(MODULE_NAME).resolve(cli_config);
    let mut config = revin_common::config::load_or_default(path.as_deref())?;
    apply_env_overrides(&mut config)?;
    validate(&config)?;
    Ok(config)
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Resolve the classifier credential
///
/// **Priority:** ENV → TOML. `None` disables enrichment for every run.
pub fn resolve_api_token(toml_config: &TomlConfig) -> Option<String> {
    let env_key = std::env::var(TOKEN_ENV_VAR)
        .ok()
        .filter(|k| is_valid_key(k));
    let toml_key = toml_config
        .classifier
        .api_token
        .as_ref()
        .filter(|k| is_valid_key(k));

    if env_key.is_some() && toml_key.is_some() {
        warn!(
            "Classifier token found in environment and TOML. Using environment ({}).",
            TOKEN_ENV_VAR
        );
    }

    if let Some(key) = env_key {
        info!("Classifier token loaded from environment variable");
        return Some(key.trim().to_string());
    }
    if let Some(key) = toml_key {
        info!("Classifier token loaded from TOML config");
        return Some(key.trim().to_string());
    }

    warn!(
        "No classifier token configured (set {} or classifier.api_token); \
         reviews will not be classified",
        TOKEN_ENV_VAR
    );
    None
}

/// Apply environment overrides in place
pub fn apply_env_overrides(config: &mut TomlConfig) -> Result<()> {
    config.classifier.api_token = resolve_api_token(config);

    if let Some(url) = env_value(SENTIMENT_URL_ENV_VAR) {
        info!(url = %url, "Sentiment endpoint overridden from environment");
        config.classifier.sentiment_url = url;
    }
    if let Some(url) = env_value(CATEGORY_URL_ENV_VAR) {
        info!(url = %url, "Category endpoint overridden from environment");
        config.classifier.category_url = url;
    }
    if let Some(port) = env_value(PORT_ENV_VAR) {
        config.server.port = port.parse().map_err(|_| {
            Error::Config(format!("{} is not a valid port: {}", PORT_ENV_VAR, port))
        })?;
    }
    Ok(())
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Reject settings no run could work with
pub fn validate(config: &TomlConfig) -> Result<()> {
    if config.scheduler.concurrency == 0 {
        return Err(Error::Config("scheduler.concurrency must be at least 1".to_string()));
    }
    if config.scheduler.retry_base_ms > config.scheduler.retry_cap_ms {
        return Err(Error::Config(format!(
            "scheduler.retry_base_ms ({}) exceeds scheduler.retry_cap_ms ({})",
            config.scheduler.retry_base_ms, config.scheduler.retry_cap_ms
        )));
    }
    if config.pipeline.batch_size == 0 {
        return Err(Error::Config("pipeline.batch_size must be at least 1".to_string()));
    }
    if config.classifier.requests_per_second == 0 {
        return Err(Error::Config(
            "classifier.requests_per_second must be at least 1".to_string(),
        ));
    }
    if config.classifier.max_input_chars == 0 {
        return Err(Error::Config(
            "classifier.max_input_chars must be at least 1".to_string(),
        ));
    }
    if config.server.max_upload_bytes == 0 {
        return Err(Error::Config("server.max_upload_bytes must be at least 1".to_string()));
    }
    // Unknown or empty encoding lists
    crate::services::FileDecoder::new(&config.decoder.encodings)?;
    Ok(())
}
