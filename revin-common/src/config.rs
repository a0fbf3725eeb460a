//! Bootstrap configuration loading
//!
//! Configuration file resolution follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`REVIN_CONFIG`)
//! 3. Per-user config file (`~/.config/revin/<module>.toml`)
//! 4. Built-in defaults (no file at all)
//!
//! A missing or unreadable file never prevents startup: the loader logs a
//! warning and falls back to defaults. A file that exists but does not parse
//! is a hard error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "REVIN_CONFIG";

/// Bootstrap configuration loaded from TOML
///
/// Every section is optional; omitted sections take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub classifier: ClassifierConfig,
    pub scheduler: SchedulerConfig,
    pub pipeline: PipelineSettings,
    pub decoder: DecoderConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Upper bound for an uploaded file (request body), bytes
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 5740,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// External classification endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub sentiment_url: String,
    pub category_url: String,
    /// Bearer credential; `None` or blank disables enrichment
    pub api_token: Option<String>,
    pub request_timeout_secs: u64,
    /// Client-side token bucket shared by both endpoints
    pub requests_per_second: u32,
    /// Content is truncated to this many characters before scoring
    pub max_input_chars: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            sentiment_url: "https://api-inference.huggingface.co/models/lxyuan/distilbert-base-multilingual-cased-sentiments-student".to_string(),
            category_url: "https://api-inference.huggingface.co/models/cardiffnlp/tweet-topic-21-multi".to_string(),
            api_token: None,
            request_timeout_secs: 30,
            requests_per_second: 10,
            max_input_chars: 512,
        }
    }
}

/// Enrichment concurrency and retry policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum classification calls in flight at once
    pub concurrency: usize,
    pub retry_base_ms: u64,
    pub retry_cap_ms: u64,
    pub max_retries: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            retry_base_ms: 2_000,
            retry_cap_ms: 30_000,
            max_retries: 3,
        }
    }
}

/// Batch pacing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub batch_size: usize,
    pub batch_delay_ms: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            batch_size: 5,
            batch_delay_ms: 1_000,
        }
    }
}

/// Delimited-text decoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Candidate text encodings, tried in order (WHATWG labels)
    pub encodings: Vec<String>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            encodings: vec![
                "utf-8".to_string(),
                "big5".to_string(),
                "gb18030".to_string(),
            ],
        }
    }
}

/// Resolves which config file (if any) a module should read
pub struct ConfigPathResolver {
    module_name: String,
}

impl ConfigPathResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
        }
    }

    /// Resolve the config file path
    ///
    /// Returns `None` when nothing was named explicitly and no per-user
    /// file exists; callers then run on built-in defaults.
    pub fn resolve(&self, cli_arg: Option<&Path>) -> Option<PathBuf> {
        // Priority 1: Command-line argument
        if let Some(path) = cli_arg {
            return Some(path.to_path_buf());
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        // Priority 3: Per-user config directory
        let user_config = self.default_config_path()?;
        if user_config.exists() {
            Some(user_config)
        } else {
            None
        }
    }

    /// `~/.config/revin/<module>.toml` (platform equivalent elsewhere)
    pub fn default_config_path(&self) -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("revin").join(format!("{}.toml", self.module_name)))
    }
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load config from an optional path, degrading to defaults when the file is absent
pub fn load_or_default(path: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = path else {
        info!("No config file found, using built-in defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        warn!(
            "Config file {} does not exist, using built-in defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let config = load_toml_config(path)?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_yields_defaults() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(config, TomlConfig::default());
        assert_eq!(config.scheduler.concurrency, 2);
        assert_eq!(config.pipeline.batch_size, 5);
        assert_eq!(config.pipeline.batch_delay_ms, 1_000);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            [scheduler]
            concurrency = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.scheduler.concurrency, 4);
        assert_eq!(config.scheduler.max_retries, 3);
        assert_eq!(config.scheduler.retry_base_ms, 2_000);
        assert_eq!(config.server.port, 5740);
    }

    #[test]
    fn test_cli_argument_wins() {
        let resolver = ConfigPathResolver::new("revin-ingest");
        let resolved = resolver.resolve(Some(Path::new("/tmp/explicit.toml")));
        assert_eq!(resolved, Some(PathBuf::from("/tmp/explicit.toml")));
    }
}
