//! Configuration loading.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at `<config dir>/sentence-embeddings/config.toml`.

use config::{Config, Environment, File};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::variant::ModelVariant;

const APP_NAME: &str = "sentence-embeddings";

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Largest supported number of displayed decimal places.
pub const MAX_DECIMAL_PLACES: u32 = 6;

/// Application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Model variant to load
    #[serde(default)]
    pub model: ModelVariant,

    /// Directory holding downloaded model files
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    /// Padded/truncated token count per sentence
    #[serde(default = "default_max_sequence_length")]
    pub max_sequence_length: usize,

    /// L2-normalize sentence embeddings
    #[serde(default = "default_normalize")]
    pub normalize: bool,

    /// Number of matches reported per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Decimal places when printing scores as percentages
    #[serde(default = "default_decimal_places")]
    pub decimal_places: u32,

    /// Attempts per model file download
    #[serde(default = "default_download_retries")]
    pub download_retries: u32,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_cache_dir() -> String {
    ProjectDirs::from("", "", APP_NAME)
        .map(|p| p.cache_dir().join("models"))
        .unwrap_or_else(|| PathBuf::from(".cache").join(APP_NAME).join("models"))
        .to_string_lossy()
        .to_string()
}

fn default_max_sequence_length() -> usize {
    256
}

fn default_normalize() -> bool {
    true
}

fn default_top_k() -> usize {
    1
}

fn default_decimal_places() -> u32 {
    2
}

fn default_download_retries() -> u32 {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: ModelVariant::default(),
            cache_dir: default_cache_dir(),
            max_sequence_length: default_max_sequence_length(),
            normalize: default_normalize(),
            top_k: default_top_k(),
            decimal_places: default_decimal_places(),
            download_retries: default_download_retries(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Default config file
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (`EMBED_*`, e.g. `EMBED_MAX_SEQUENCE_LENGTH`)
    ///
    /// Values are not validated here. CLI flags may still change the model
    /// or sequence length, so callers apply them and then call
    /// [`Settings::validate`].
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, ConfigError> {
        let config_dir = ProjectDirs::from("", "", APP_NAME)
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("model", ModelVariant::default().id())
            .map_err(|e| ConfigError::Load(e.to_string()))?
            .set_default("cache_dir", default_cache_dir())
            .map_err(|e| ConfigError::Load(e.to_string()))?
            .set_default("max_sequence_length", default_max_sequence_length() as i64)
            .map_err(|e| ConfigError::Load(e.to_string()))?
            .set_default("normalize", default_normalize())
            .map_err(|e| ConfigError::Load(e.to_string()))?
            .set_default("top_k", default_top_k() as i64)
            .map_err(|e| ConfigError::Load(e.to_string()))?
            .set_default("decimal_places", default_decimal_places() as i64)
            .map_err(|e| ConfigError::Load(e.to_string()))?
            .set_default("download_retries", default_download_retries() as i64)
            .map_err(|e| ConfigError::Load(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| ConfigError::Load(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Single underscore after the prefix, double between nested keys, so
        // EMBED_MAX_SEQUENCE_LENGTH maps to `max_sequence_length`.
        builder = builder.add_source(
            Environment::with_prefix("EMBED")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| ConfigError::Load(e.to_string()))
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let max = self.model.spec().max_sequence_length;
        if self.max_sequence_length == 0 || self.max_sequence_length > max {
            return Err(ConfigError::Invalid {
                field: "max_sequence_length",
                reason: format!(
                    "must be 1-{} for {}, got {}",
                    max, self.model, self.max_sequence_length
                ),
            });
        }
        if self.top_k == 0 {
            return Err(ConfigError::Invalid {
                field: "top_k",
                reason: "must be > 0".to_string(),
            });
        }
        if self.decimal_places > MAX_DECIMAL_PLACES {
            return Err(ConfigError::Invalid {
                field: "decimal_places",
                reason: format!("must be 0-{}, got {}", MAX_DECIMAL_PLACES, self.decimal_places),
            });
        }
        if self.download_retries == 0 {
            return Err(ConfigError::Invalid {
                field: "download_retries",
                reason: "must be > 0".to_string(),
            });
        }
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::Invalid {
                field: "log_level",
                reason: format!("expected one of {:?}, got {}", LOG_LEVELS, self.log_level),
            });
        }
        Ok(())
    }

    /// Expand `~` in cache_dir to the home directory.
    pub fn expanded_cache_dir(&self) -> PathBuf {
        if let Some(rest) = self.cache_dir.strip_prefix("~/") {
            if let Some(dirs) = BaseDirs::new() {
                return dirs.home_dir().join(rest);
            }
        }
        PathBuf::from(&self.cache_dir)
    }
}
