//! Error types for settings and model variants.

use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration sources could not be read or merged
    #[error("Configuration error: {0}")]
    Load(String),

    /// A setting holds a value outside its accepted range
    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    /// Model name that matches no known variant
    #[error("Unknown model variant: {0}")]
    UnknownVariant(String),
}
