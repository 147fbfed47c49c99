//! Embedding model trait and types.
//!
//! Defines the interface for generating sentence vectors from text.

use embed_core::{cosine_similarity, dot_product, l2_norm};
use embed_types::ModelVariant;
use serde::{Deserialize, Serialize};

use crate::error::EmbeddingError;

/// A single sentence vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    /// Wrap a vector as-is.
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Scale to unit length. Zero vectors are returned unchanged.
    pub fn normalized(values: Vec<f32>) -> Self {
        let norm = l2_norm(&values);
        if norm > 0.0 {
            Self {
                values: values.iter().map(|x| x / norm).collect(),
            }
        } else {
            Self { values }
        }
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    pub fn norm(&self) -> f32 {
        l2_norm(&self.values)
    }

    /// Cosine similarity in [-1, 1] (1 = identical direction).
    pub fn cosine_similarity(&self, other: &Embedding) -> Result<f32, EmbeddingError> {
        Ok(cosine_similarity(&self.values, &other.values)?)
    }

    pub fn dot_product(&self, other: &Embedding) -> Result<f32, EmbeddingError> {
        Ok(dot_product(&self.values, &other.values)?)
    }
}

/// Model information
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub variant: ModelVariant,
    /// Model name (e.g., "all-MiniLM-L6-v2")
    pub name: String,
    /// Embedding dimension
    pub dimension: usize,
    /// Maximum sequence length in tokens
    pub max_sequence_length: usize,
}

impl From<ModelVariant> for ModelInfo {
    fn from(variant: ModelVariant) -> Self {
        let spec = variant.spec();
        Self {
            variant,
            name: spec.name.to_string(),
            dimension: spec.hidden_dim,
            max_sequence_length: spec.max_sequence_length,
        }
    }
}

/// Trait for embedding models.
///
/// Implementations must be thread-safe (Send + Sync) for concurrent use.
pub trait EmbeddingModel: Send + Sync {
    fn info(&self) -> &ModelInfo;

    /// Generate embedding for a single text.
    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::MissingOutput("sentence embedding".to_string()))
    }

    /// Generate embeddings for multiple texts (batch).
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError>;

    /// Generate embeddings for multiple owned strings.
    fn embed_texts(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        let refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
        self.embed_batch(&refs)
    }
}
