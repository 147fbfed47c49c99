//! Core error types.

use thiserror::Error;

/// Errors raised by shape bookkeeping and the numeric reductions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Batch or sequence configuration the model cannot accept
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Buffer length does not match its declared shape
    #[error("Shape mismatch for {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    /// Vectors of unequal length
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Argument outside the accepted range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl CoreError {
    pub(crate) fn shape(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }
}
