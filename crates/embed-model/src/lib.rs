//! # embed-model
//!
//! Sentence embedding models for the workspace, running locally via Candle.
//!
//! ## Features
//! - Named-tensor inference engine boundary with an eager name check
//! - BERT encoders via Candle (CPU, no Python, no API)
//! - HuggingFace tokenizers padded/truncated to a fixed sequence length
//! - Model file caching with retried downloads
//! - [`SentenceEmbedder`] façade: tokenize, infer, pool, normalize

pub mod cache;
pub mod candle;
pub mod embedder;
pub mod engine;
pub mod error;
pub mod model;
pub mod tokenizer;

pub use crate::candle::CandleBertEngine;
pub use cache::{get_or_download_model, ModelCache, ModelPaths, DEFAULT_MAX_RETRIES, MODEL_FILES};
pub use embedder::{EmbeddingOutput, SentenceEmbedder};
pub use engine::{check_contract, InferenceEngine, ModelInputs, NamedOutputs, OutputTensor};
pub use error::EmbeddingError;
pub use model::{Embedding, EmbeddingModel, ModelInfo};
pub use tokenizer::{HfTokenizer, TextTokenizer};
