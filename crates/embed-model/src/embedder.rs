//! Sentence embedding façade.
//!
//! [`SentenceEmbedder`] owns a tokenizer and one long-lived inference
//! session for a single [`ModelVariant`]. Each call validates the batch
//! shape, tokenizes, runs the engine once and reduces the output to one
//! vector per sentence.

use std::sync::Mutex;

use embed_core::{l2_normalize, pool, BatchShapes, CoreError, EmbeddingMatrix, TensorShape};
use embed_types::{ModelSpec, ModelVariant, SentencePooling, Settings, SENTENCE_EMBEDDING};
use serde::Serialize;
use tracing::{debug, info};

use crate::cache::{get_or_download_model, ModelCache};
use crate::candle::CandleBertEngine;
use crate::engine::{check_contract, InferenceEngine, ModelInputs, OutputTensor};
use crate::error::EmbeddingError;
use crate::model::{Embedding, EmbeddingModel, ModelInfo};
use crate::tokenizer::{HfTokenizer, TextTokenizer};

/// Flat sentence embeddings with their `[batch, hidden]` dimensions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingOutput {
    pub embeddings: Vec<f32>,
    pub dimensions: [usize; 2],
}

impl EmbeddingOutput {
    pub fn batch_size(&self) -> usize {
        self.dimensions[0]
    }

    pub fn hidden_dim(&self) -> usize {
        self.dimensions[1]
    }

    /// Embedding of sentence `index`.
    pub fn row(&self, index: usize) -> Option<&[f32]> {
        let hidden = self.hidden_dim();
        (index < self.batch_size()).then(|| &self.embeddings[index * hidden..(index + 1) * hidden])
    }

    pub fn to_matrix(&self) -> Result<EmbeddingMatrix, CoreError> {
        EmbeddingMatrix::new(self.embeddings.clone(), self.dimensions[0], self.dimensions[1])
    }
}

impl From<EmbeddingMatrix> for EmbeddingOutput {
    fn from(matrix: EmbeddingMatrix) -> Self {
        Self {
            dimensions: matrix.dimensions(),
            embeddings: matrix.into_vec(),
        }
    }
}

/// Sentence embedding model: tokenizer plus a serialized inference session.
pub struct SentenceEmbedder {
    spec: ModelSpec,
    info: ModelInfo,
    tokenizer: Box<dyn TextTokenizer>,
    session: Mutex<Box<dyn InferenceEngine>>,
    max_sequence_length: usize,
    normalize: bool,
}

impl SentenceEmbedder {
    /// Build an embedder from parts, checking the engine's tensor names
    /// against the variant before accepting it.
    pub fn new(
        variant: ModelVariant,
        tokenizer: Box<dyn TextTokenizer>,
        engine: Box<dyn InferenceEngine>,
    ) -> Result<Self, EmbeddingError> {
        let spec = variant.spec();
        check_contract(engine.as_ref(), &spec)?;

        Ok(Self {
            spec,
            info: ModelInfo::from(variant),
            tokenizer,
            session: Mutex::new(engine),
            max_sequence_length: spec.max_sequence_length,
            normalize: true,
        })
    }

    /// Sequence length and normalization used by [`EmbeddingModel`] calls.
    pub fn with_options(mut self, max_sequence_length: usize, normalize: bool) -> Self {
        self.max_sequence_length = max_sequence_length;
        self.normalize = normalize;
        self
    }

    /// Load a variant from the cache, downloading its files if needed.
    ///
    /// The cache must point at the variant's own repository.
    pub fn load(variant: ModelVariant, cache: &ModelCache) -> Result<Self, EmbeddingError> {
        let spec = variant.spec();
        if cache.repo_id != spec.repo_id {
            return Err(EmbeddingError::CacheMismatch {
                model: spec.name,
                expected: spec.repo_id,
                actual: cache.repo_id.clone(),
            });
        }
        info!(model = spec.name, repo = spec.repo_id, "Loading sentence embedder...");

        let paths = get_or_download_model(cache)?;
        let tokenizer = HfTokenizer::from_file(&paths.tokenizer)?;
        let engine = CandleBertEngine::load(&paths.config, &paths.weights, &spec)?;

        let embedder = Self::new(variant, Box::new(tokenizer), Box::new(engine))?;
        info!(
            model = spec.name,
            dim = spec.hidden_dim,
            max_seq = spec.max_sequence_length,
            "Sentence embedder ready"
        );
        Ok(embedder)
    }

    /// Load the configured variant with the configured defaults.
    pub fn load_from_settings(settings: &Settings) -> Result<Self, EmbeddingError> {
        let cache = ModelCache::from_settings(settings);
        Ok(Self::load(settings.model, &cache)?
            .with_options(settings.max_sequence_length, settings.normalize))
    }

    /// [`SentenceEmbedder::load`] on the blocking thread pool.
    pub async fn load_async(
        variant: ModelVariant,
        cache: ModelCache,
    ) -> Result<Self, EmbeddingError> {
        tokio::task::spawn_blocking(move || Self::load(variant, &cache))
            .await
            .map_err(|e| EmbeddingError::Session(format!("load task failed: {}", e)))?
    }

    /// Load the default variant with the default cache.
    pub fn with_defaults() -> Result<Self, EmbeddingError> {
        Self::load(ModelVariant::default(), &ModelCache::default())
    }

    pub fn variant(&self) -> ModelVariant {
        self.info.variant
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    /// Embed `sentences`, padding or truncating each to
    /// `max_sequence_length` tokens.
    ///
    /// The sequence length is checked against the model maximum before any
    /// tokenization or inference happens.
    pub fn generate_embeddings(
        &self,
        sentences: &[&str],
        max_sequence_length: usize,
        normalize: bool,
    ) -> Result<EmbeddingOutput, EmbeddingError> {
        let shapes = BatchShapes::build(
            sentences.len(),
            max_sequence_length,
            self.spec.hidden_dim,
            self.spec.max_sequence_length,
        )?;

        let batch = self.tokenizer.encode_batch(
            sentences,
            max_sequence_length,
            self.spec.inputs.uses_token_type_ids(),
        )?;
        if batch.shape() != &shapes.input {
            return Err(CoreError::ShapeMismatch {
                what: format!("tokenized batch {} against {}", batch.shape(), shapes.input),
                expected: shapes.input.num_elements(),
                actual: batch.shape().num_elements(),
            }
            .into());
        }

        let inputs = ModelInputs::from_batch(batch, self.spec.inputs);
        let mut outputs = {
            let session = self
                .session
                .lock()
                .map_err(|e| EmbeddingError::Session(e.to_string()))?;
            session.run(&inputs)?
        };

        let pooled = match self.spec.pooling {
            SentencePooling::InGraph => {
                let sentence = outputs.take(SENTENCE_EMBEDDING)?;
                expect_shape(SENTENCE_EMBEDDING, &sentence, &shapes.sentence_output)?;
                EmbeddingMatrix::new(sentence.data, shapes.batch_size(), shapes.hidden_dim())?
            }
            SentencePooling::Reduce(strategy) => {
                let name = self.spec.outputs.token_output();
                let tokens = outputs.take(name)?;
                expect_shape(name, &tokens, &shapes.token_output)?;
                pool(
                    strategy,
                    &tokens.data,
                    &tokens.shape,
                    inputs.attention_mask(),
                    inputs.shape(),
                )?
            }
        };

        let embeddings = if normalize {
            l2_normalize(&pooled)?
        } else {
            pooled
        };

        debug!(
            model = self.spec.name,
            count = embeddings.rows(),
            dim = embeddings.cols(),
            normalize,
            "Batch complete"
        );
        Ok(EmbeddingOutput::from(embeddings))
    }
}

fn expect_shape(
    name: &str,
    tensor: &OutputTensor,
    expected: &TensorShape,
) -> Result<(), EmbeddingError> {
    if &tensor.shape != expected {
        return Err(EmbeddingError::OutputShape {
            name: name.to_string(),
            expected: expected.clone(),
            actual: tensor.shape.clone(),
        });
    }
    Ok(())
}

impl EmbeddingModel for SentenceEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let output = self.generate_embeddings(texts, self.max_sequence_length, self.normalize)?;
        Ok(output
            .embeddings
            .chunks(output.hidden_dim())
            .map(|row| Embedding::new(row.to_vec()))
            .collect())
    }
}
