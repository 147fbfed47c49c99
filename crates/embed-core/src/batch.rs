//! Tokenized batch buffers.

use crate::error::CoreError;
use crate::shape::TensorShape;

/// Token ids, attention mask and optional token type ids for one batch.
///
/// Every buffer is `batch_size * sequence_length` long and laid out
/// sentence-major. The batch is consumed by a single inference call.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenBatch {
    input_ids: Vec<i64>,
    attention_mask: Vec<i64>,
    token_type_ids: Option<Vec<i64>>,
    shape: TensorShape,
}

impl TokenBatch {
    /// Create a batch, checking every buffer against `[batch_size, sequence_length]`.
    pub fn new(
        input_ids: Vec<i64>,
        attention_mask: Vec<i64>,
        token_type_ids: Option<Vec<i64>>,
        batch_size: usize,
        sequence_length: usize,
    ) -> Result<Self, CoreError> {
        let shape = TensorShape::from([batch_size, sequence_length]);
        shape.check_buffer("input_ids", input_ids.len())?;
        shape.check_buffer("attention_mask", attention_mask.len())?;
        if let Some(type_ids) = &token_type_ids {
            shape.check_buffer("token_type_ids", type_ids.len())?;
        }

        Ok(Self {
            input_ids,
            attention_mask,
            token_type_ids,
            shape,
        })
    }

    pub fn input_ids(&self) -> &[i64] {
        &self.input_ids
    }

    pub fn attention_mask(&self) -> &[i64] {
        &self.attention_mask
    }

    pub fn token_type_ids(&self) -> Option<&[i64]> {
        self.token_type_ids.as_deref()
    }

    /// `[batch_size, sequence_length]`
    pub fn shape(&self) -> &TensorShape {
        &self.shape
    }

    pub fn batch_size(&self) -> usize {
        self.shape.dims()[0]
    }

    pub fn sequence_length(&self) -> usize {
        self.shape.dims()[1]
    }

    /// Number of unmasked tokens in each sentence.
    pub fn token_counts(&self) -> Vec<usize> {
        let seq = self.sequence_length();
        if seq == 0 {
            return vec![0; self.batch_size()];
        }
        self.attention_mask
            .chunks(seq)
            .map(|row| row.iter().filter(|&&m| m != 0).count())
            .collect()
    }

    /// Drop token type ids (for models whose inputs do not include them).
    pub fn without_token_type_ids(mut self) -> Self {
        self.token_type_ids = None;
        self
    }

    /// Take ownership of the buffers.
    pub fn into_parts(self) -> (Vec<i64>, Vec<i64>, Option<Vec<i64>>, TensorShape) {
        (
            self.input_ids,
            self.attention_mask,
            self.token_type_ids,
            self.shape,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_batch() {
        let batch = TokenBatch::new(
            vec![101, 7, 102, 0, 101, 8, 9, 102],
            vec![1, 1, 1, 0, 1, 1, 1, 1],
            Some(vec![0; 8]),
            2,
            4,
        )
        .unwrap();
        assert_eq!(batch.batch_size(), 2);
        assert_eq!(batch.sequence_length(), 4);
        assert_eq!(batch.token_counts(), vec![3, 4]);
        assert!(batch.token_type_ids().is_some());
        assert!(batch.without_token_type_ids().token_type_ids().is_none());
    }

    #[test]
    fn test_mismatched_mask_length() {
        let err = TokenBatch::new(vec![1, 2, 3, 4], vec![1, 1, 1], None, 1, 4).unwrap_err();
        assert!(matches!(err, CoreError::ShapeMismatch { expected: 4, actual: 3, .. }));
    }

    #[test]
    fn test_mismatched_type_ids_length() {
        let err = TokenBatch::new(vec![1, 2], vec![1, 1], Some(vec![0]), 1, 2).unwrap_err();
        assert!(err.to_string().contains("token_type_ids"));
    }
}
