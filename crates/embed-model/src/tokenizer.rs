//! Sentence tokenization into fixed-width batches.
//!
//! Every sentence is padded or truncated to exactly `max_sequence_length`
//! tokens so the batch matches the `[batch, seq]` input shape.

use std::path::Path;

use embed_core::TokenBatch;
use tokenizers::Tokenizer;
use tracing::debug;

use crate::error::EmbeddingError;

/// Turns sentences into a padded token batch.
pub trait TextTokenizer: Send + Sync {
    /// Encode `sentences` into `[sentences.len(), max_sequence_length]` buffers.
    ///
    /// Token type ids are produced only when `with_token_type_ids` is set.
    fn encode_batch(
        &self,
        sentences: &[&str],
        max_sequence_length: usize,
        with_token_type_ids: bool,
    ) -> Result<TokenBatch, EmbeddingError>;
}

/// HuggingFace `tokenizer.json` tokenizer.
pub struct HfTokenizer {
    tokenizer: Tokenizer,
    pad_id: i64,
}

impl HfTokenizer {
    /// Load a tokenizer from a `tokenizer.json` file.
    ///
    /// Padding and truncation configured in the file are disabled; the batch
    /// width is always the caller's `max_sequence_length`.
    pub fn from_file(path: &Path) -> Result<Self, EmbeddingError> {
        let mut tokenizer =
            Tokenizer::from_file(path).map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;

        let pad_id = tokenizer
            .get_padding()
            .map(|p| i64::from(p.pad_id))
            .unwrap_or(0);

        tokenizer.with_padding(None);
        tokenizer
            .with_truncation(None)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;

        debug!(path = ?path, pad_id, "Tokenizer loaded");
        Ok(Self { tokenizer, pad_id })
    }

    pub fn pad_id(&self) -> i64 {
        self.pad_id
    }
}

impl TextTokenizer for HfTokenizer {
    fn encode_batch(
        &self,
        sentences: &[&str],
        max_sequence_length: usize,
        with_token_type_ids: bool,
    ) -> Result<TokenBatch, EmbeddingError> {
        let encodings = self
            .tokenizer
            .encode_batch(sentences.to_vec(), true)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;

        let total = sentences.len() * max_sequence_length;
        let mut input_ids = Vec::with_capacity(total);
        let mut attention_mask = Vec::with_capacity(total);
        let mut token_type_ids = Vec::with_capacity(if with_token_type_ids { total } else { 0 });

        for encoding in &encodings {
            let ids = fit_to_width(encoding.get_ids(), max_sequence_length);
            let mask = fit_to_width(encoding.get_attention_mask(), max_sequence_length);
            let type_ids = fit_to_width(encoding.get_type_ids(), max_sequence_length);

            if encoding.get_ids().len() > max_sequence_length {
                debug!(
                    tokens = encoding.get_ids().len(),
                    max_seq = max_sequence_length,
                    "Truncating sentence"
                );
            }

            push_padded(&mut input_ids, &ids, max_sequence_length, self.pad_id);
            push_padded(&mut attention_mask, &mask, max_sequence_length, 0);
            if with_token_type_ids {
                push_padded(&mut token_type_ids, &type_ids, max_sequence_length, 0);
            }
        }

        let token_type_ids = with_token_type_ids.then_some(token_type_ids);
        Ok(TokenBatch::new(
            input_ids,
            attention_mask,
            token_type_ids,
            sentences.len(),
            max_sequence_length,
        )?)
    }
}

/// Truncate to `width` values, keeping the final (closing special) token.
fn fit_to_width(values: &[u32], width: usize) -> Vec<i64> {
    if values.len() <= width {
        return values.iter().map(|&v| i64::from(v)).collect();
    }
    if width < 2 {
        return values.iter().take(width).map(|&v| i64::from(v)).collect();
    }
    values[..width - 1]
        .iter()
        .chain(values.last())
        .map(|&v| i64::from(v))
        .collect()
}

fn push_padded(out: &mut Vec<i64>, values: &[i64], width: usize, pad: i64) {
    out.extend_from_slice(values);
    out.extend(std::iter::repeat(pad).take(width - values.len()));
}
