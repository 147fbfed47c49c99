//! Model file caching.
//!
//! Downloads model files from HuggingFace Hub into a per-repository cache
//! directory, retrying failed transfers with exponential backoff.

use std::path::PathBuf;
use std::time::Duration;

use backoff::{backoff::Backoff, ExponentialBackoff};
use embed_types::{ModelVariant, Settings};
use tracing::{debug, error, info, warn};

use crate::error::EmbeddingError;

/// Required model files
pub const MODEL_FILES: &[&str] = &["config.json", "tokenizer.json", "model.safetensors"];

/// Default number of attempts per file
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Model cache configuration
#[derive(Debug, Clone)]
pub struct ModelCache {
    /// Cache directory path
    pub cache_dir: PathBuf,
    /// Model repository ID
    pub repo_id: String,
    /// Attempts per file before giving up
    pub max_retries: u32,
}

impl Default for ModelCache {
    fn default() -> Self {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("sentence-embeddings")
            .join("models");

        Self {
            cache_dir,
            repo_id: ModelVariant::default().spec().repo_id.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl ModelCache {
    pub fn new(cache_dir: impl Into<PathBuf>, repo_id: impl Into<String>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            repo_id: repo_id.into(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Cache for a variant's repository under the given directory.
    pub fn for_variant(cache_dir: impl Into<PathBuf>, variant: ModelVariant) -> Self {
        Self::new(cache_dir, variant.spec().repo_id)
    }

    /// Cache for the configured variant and directory.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::for_variant(settings.expanded_cache_dir(), settings.model)
            .with_max_retries(settings.download_retries)
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Get the model directory path
    pub fn model_dir(&self) -> PathBuf {
        self.cache_dir.join(self.repo_id.replace('/', "_"))
    }

    /// Check if all model files are cached
    pub fn is_cached(&self) -> bool {
        let model_dir = self.model_dir();
        MODEL_FILES.iter().all(|f| model_dir.join(f).exists())
    }

    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.model_dir().join(filename)
    }
}

/// Paths to model files
#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

/// Get or download model files.
///
/// Returns paths to config.json, tokenizer.json, and model.safetensors.
pub fn get_or_download_model(cache: &ModelCache) -> Result<ModelPaths, EmbeddingError> {
    let model_dir = cache.model_dir();

    if cache.is_cached() {
        debug!(path = ?model_dir, "Using cached model");
    } else {
        info!(repo = %cache.repo_id, "Downloading model files...");
        download_model_files(cache)?;
    }

    Ok(ModelPaths {
        config: model_dir.join("config.json"),
        tokenizer: model_dir.join("tokenizer.json"),
        weights: model_dir.join("model.safetensors"),
    })
}

fn download_model_files(cache: &ModelCache) -> Result<(), EmbeddingError> {
    use hf_hub::api::sync::Api;

    let api = Api::new().map_err(|e| EmbeddingError::Download(e.to_string()))?;
    let repo = api.model(cache.repo_id.clone());

    std::fs::create_dir_all(cache.model_dir())?;

    for filename in MODEL_FILES {
        let dest_path = cache.file_path(filename);
        if dest_path.exists() {
            debug!(file = filename, "Already cached");
            continue;
        }

        info!(file = filename, "Downloading...");
        let source_path = retry_with_backoff(cache.max_retries, default_backoff(), || {
            repo.get(filename)
                .map_err(|e| EmbeddingError::Download(format!("{}: {}", filename, e)))
        })?;

        std::fs::copy(&source_path, &dest_path)?;
        debug!(file = filename, "Downloaded to {:?}", dest_path);
    }

    Ok(())
}

fn default_backoff() -> ExponentialBackoff {
    ExponentialBackoff {
        max_elapsed_time: Some(Duration::from_secs(120)),
        ..Default::default()
    }
}

/// Run `op` until it succeeds, `max_attempts` is reached, or the backoff
/// schedule is exhausted. Sleeps the current thread between attempts.
pub(crate) fn retry_with_backoff<T, F>(
    max_attempts: u32,
    mut backoff: ExponentialBackoff,
    mut op: F,
) -> Result<T, EmbeddingError>
where
    F: FnMut() -> Result<T, EmbeddingError>,
{
    let mut attempts = 0;

    loop {
        attempts += 1;
        debug!(attempt = attempts, "Fetching model file");

        match op() {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempts >= max_attempts {
                    error!(error = %e, "Max retries exceeded");
                    return Err(e);
                }

                match backoff.next_backoff() {
                    Some(duration) => {
                        warn!(
                            error = %e,
                            retry_in_ms = duration.as_millis(),
                            "Download failed, retrying"
                        );
                        std::thread::sleep(duration);
                    }
                    None => {
                        error!(error = %e, "Backoff exhausted");
                        return Err(e);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fast_backoff() -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(2),
            max_elapsed_time: Some(Duration::from_secs(5)),
            ..Default::default()
        }
    }

    #[test]
    fn test_cache_default() {
        let cache = ModelCache::default();
        assert!(cache.cache_dir.to_string_lossy().contains("sentence-embeddings"));
        assert_eq!(cache.repo_id, "sentence-transformers/all-MiniLM-L6-v2");
        assert_eq!(cache.max_retries, DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn test_is_cached_empty() {
        let temp = TempDir::new().unwrap();
        let cache = ModelCache::new(temp.path(), "test/model");
        assert!(!cache.is_cached());
    }

    #[test]
    fn test_is_cached_with_files() {
        let temp = TempDir::new().unwrap();
        let cache = ModelCache::for_variant(temp.path(), ModelVariant::BgeSmallEnV15);
        std::fs::create_dir_all(cache.model_dir()).unwrap();
        for file in MODEL_FILES {
            std::fs::write(cache.file_path(file), b"{}").unwrap();
        }
        assert!(cache.is_cached());
        assert!(cache.model_dir().ends_with("BAAI_bge-small-en-v1.5"));

        let paths = get_or_download_model(&cache).unwrap();
        assert!(paths.weights.ends_with("model.safetensors"));
    }

    #[test]
    fn test_from_settings() {
        let mut settings = Settings::default();
        settings.cache_dir = "/tmp/embed-models".to_string();
        settings.model = ModelVariant::AllMiniLmL12V2;
        settings.download_retries = 5;

        let cache = ModelCache::from_settings(&settings);
        assert_eq!(cache.cache_dir, PathBuf::from("/tmp/embed-models"));
        assert_eq!(cache.repo_id, "sentence-transformers/all-MiniLM-L12-v2");
        assert_eq!(cache.max_retries, 5);
    }

    #[test]
    fn test_retry_succeeds_after_failures() {
        let mut calls = 0;
        let result = retry_with_backoff(3, fast_backoff(), || {
            calls += 1;
            if calls < 3 {
                Err(EmbeddingError::Download("flaky".to_string()))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_retry_gives_up_at_max_attempts() {
        let mut calls = 0;
        let result: Result<(), _> = retry_with_backoff(2, fast_backoff(), || {
            calls += 1;
            Err(EmbeddingError::Download("offline".to_string()))
        });
        assert!(matches!(result, Err(EmbeddingError::Download(_))));
        assert_eq!(calls, 2);
    }
}
