//! # embed-types
//!
//! Shared types for the sentence embeddings workspace.
//!
//! - Settings: layered configuration (defaults, file, environment)
//! - Model variants: the closed set of supported models and the tensor
//!   name contract each one's graph exposes
//!
//! ## Usage
//!
//! ```rust
//! use embed_types::{ModelVariant, Settings};
//!
//! let settings = Settings::default();
//! assert_eq!(settings.model, ModelVariant::AllMiniLmL6V2);
//! ```

pub mod config;
pub mod error;
pub mod variant;

pub use config::{Settings, MAX_DECIMAL_PLACES};
pub use error::ConfigError;
pub use variant::{
    InputKind, ModelSpec, ModelVariant, OutputKind, SentencePooling, ATTENTION_MASK, INPUT_IDS,
    LAST_HIDDEN_STATE, SENTENCE_EMBEDDING, TOKEN_EMBEDDINGS, TOKEN_TYPE_IDS,
};
