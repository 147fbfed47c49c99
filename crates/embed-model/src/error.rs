//! Embedding error types.

use embed_core::{CoreError, TensorShape};
use thiserror::Error;

/// Errors that can occur during embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Shape, configuration or argument error from the numeric core
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Candle model error
    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),

    /// Tokenizer error
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// Model file not found or unreadable
    #[error("Model file not found: {0}")]
    ModelNotFound(String),

    /// Download error
    #[error("Failed to download model: {0}")]
    Download(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Engine declares tensor names other than the variant expects
    #[error("Engine contract error: expected {kind} {expected:?}, engine declares {actual:?}")]
    EngineContract {
        kind: &'static str,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    /// Cache points at a different repository than the variant loads from
    #[error("Model cache for {model} points at {actual}, expected {expected}")]
    CacheMismatch {
        model: &'static str,
        expected: &'static str,
        actual: String,
    },

    /// Model config hidden size differs from the variant's embedding width
    #[error("Model config has hidden size {actual}, {model} expects {expected}")]
    HiddenSize {
        model: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Engine run did not produce a required output
    #[error("Engine output missing: {0}")]
    MissingOutput(String),

    /// Engine output has an unexpected shape
    #[error("Engine output {name} has shape {actual}, expected {expected}")]
    OutputShape {
        name: String,
        expected: TensorShape,
        actual: TensorShape,
    },

    /// Inference session lock poisoned by a panicking caller
    #[error("Inference session unavailable: {0}")]
    Session(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
