//! Token-to-sentence pooling.
//!
//! Reduces a `[batch, sequence, hidden]` token embedding tensor to a
//! `[batch, hidden]` sentence embedding matrix.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::CoreError;
use crate::matrix::EmbeddingMatrix;
use crate::ops;
use crate::shape::TensorShape;

/// Lower bound for the per-sentence token count divisor.
pub const MASK_SUM_MIN: f32 = 1e-9;

/// How token embeddings are reduced to one vector per sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolingStrategy {
    /// Attention-masked mean over all positions
    Mean,
    /// Hidden state of the first position (the `[CLS]` token)
    Cls,
}

/// Masked mean pooling.
///
/// `token_embeddings` is `[batch, sequence, hidden]` and `attention_mask` is
/// `[batch, sequence]`; both shapes are given explicitly. Positions with a
/// zero mask contribute nothing. The token count of each sentence is
/// clamped to [`MASK_SUM_MIN`], so a fully masked sentence pools to zeros
/// rather than NaN.
pub fn mean_pooling(
    token_embeddings: &[f32],
    embeddings_shape: &TensorShape,
    attention_mask: &[i64],
    mask_shape: &TensorShape,
) -> Result<EmbeddingMatrix, CoreError> {
    let dims = embeddings_shape.expect_rank("token embeddings", 3)?;
    let (batch, seq, hidden) = (dims[0], dims[1], dims[2]);
    embeddings_shape.check_buffer("token embeddings", token_embeddings.len())?;

    let mask_dims = mask_shape.expect_rank("attention mask", 2)?;
    mask_shape.check_buffer("attention mask", attention_mask.len())?;
    if mask_dims != [batch, seq] {
        return Err(CoreError::shape(
            format!("attention mask {} against token embeddings {}", mask_shape, embeddings_shape),
            batch * seq,
            mask_shape.num_elements(),
        ));
    }

    // [batch, seq] -> [batch, seq, hidden], as float
    let mask: Vec<f32> = attention_mask.iter().map(|&m| m as f32).collect();
    let (expanded, expanded_shape) = ops::expand_last(&mask, mask_shape, hidden);

    let masked: Vec<f32> = token_embeddings
        .iter()
        .zip(&expanded)
        .map(|(e, m)| e * m)
        .collect();

    let (sum_embeddings, pooled_shape) = ops::sum_axis(&masked, &expanded_shape, 1)?;
    let (mut sum_mask, _) = ops::sum_axis(&expanded, &expanded_shape, 1)?;
    ops::clamp_min(&mut sum_mask, MASK_SUM_MIN);

    let pooled: Vec<f32> = sum_embeddings
        .iter()
        .zip(&sum_mask)
        .map(|(s, m)| s / m)
        .collect();

    trace!(batch, hidden, shape = %pooled_shape, "Mean pooled token embeddings");
    EmbeddingMatrix::new(pooled, batch, hidden)
}

/// First-position pooling: row `b` of the result is `token_embeddings[b, 0, :]`.
pub fn cls_pooling(
    token_embeddings: &[f32],
    embeddings_shape: &TensorShape,
) -> Result<EmbeddingMatrix, CoreError> {
    let dims = embeddings_shape.expect_rank("token embeddings", 3)?;
    let (batch, seq, hidden) = (dims[0], dims[1], dims[2]);
    embeddings_shape.check_buffer("token embeddings", token_embeddings.len())?;
    if seq == 0 {
        return Err(CoreError::InvalidArgument(
            "cannot take the first token of an empty sequence".to_string(),
        ));
    }

    let mut pooled = Vec::with_capacity(batch * hidden);
    for b in 0..batch {
        let start = b * seq * hidden;
        pooled.extend_from_slice(&token_embeddings[start..start + hidden]);
    }
    EmbeddingMatrix::new(pooled, batch, hidden)
}

/// Apply a [`PoolingStrategy`].
pub fn pool(
    strategy: PoolingStrategy,
    token_embeddings: &[f32],
    embeddings_shape: &TensorShape,
    attention_mask: &[i64],
    mask_shape: &TensorShape,
) -> Result<EmbeddingMatrix, CoreError> {
    match strategy {
        PoolingStrategy::Mean => {
            mean_pooling(token_embeddings, embeddings_shape, attention_mask, mask_shape)
        }
        PoolingStrategy::Cls => cls_pooling(token_embeddings, embeddings_shape),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn random_tensor(rng: &mut StdRng, len: usize) -> Vec<f32> {
        (0..len).map(|_| rng.random_range(-2.0f32..2.0)).collect()
    }

    #[test]
    fn test_mean_pooling_ignores_padding() {
        // batch 1, seq 3, hidden 2; last position is padding
        let emb = vec![1.0, 2.0, 3.0, 4.0, 100.0, 100.0];
        let mask = vec![1, 1, 0];
        let pooled = mean_pooling(
            &emb,
            &TensorShape::from([1, 3, 2]),
            &mask,
            &TensorShape::from([1, 3]),
        )
        .unwrap();
        assert_eq!(pooled.dimensions(), [1, 2]);
        assert_eq!(pooled.as_slice(), &[2.0, 3.0]);
    }

    #[test]
    fn test_all_ones_mask_is_arithmetic_mean() {
        let mut rng = StdRng::seed_from_u64(11);
        let (batch, seq, hidden) = (3, 5, 4);
        let emb = random_tensor(&mut rng, batch * seq * hidden);
        let mask = vec![1i64; batch * seq];
        let pooled = mean_pooling(
            &emb,
            &TensorShape::from([batch, seq, hidden]),
            &mask,
            &TensorShape::from([batch, seq]),
        )
        .unwrap();

        for b in 0..batch {
            for h in 0..hidden {
                let mean: f32 = (0..seq)
                    .map(|s| emb[(b * seq + s) * hidden + h])
                    .sum::<f32>()
                    / seq as f32;
                let got = pooled.row(b).unwrap()[h];
                assert!((got - mean).abs() < 1e-5, "b={} h={}: {} vs {}", b, h, got, mean);
            }
        }
    }

    #[test]
    fn test_masked_positions_do_not_affect_result() {
        let mut rng = StdRng::seed_from_u64(42);
        let (batch, seq, hidden) = (4, 6, 3);
        let shape = TensorShape::from([batch, seq, hidden]);
        let mask_shape = TensorShape::from([batch, seq]);

        for _ in 0..20 {
            let emb = random_tensor(&mut rng, batch * seq * hidden);
            let mask: Vec<i64> = (0..batch * seq).map(|_| rng.random_range(0..2)).collect();

            let mut perturbed = emb.clone();
            for (pos, &m) in mask.iter().enumerate() {
                if m == 0 {
                    for h in 0..hidden {
                        perturbed[pos * hidden + h] = rng.random_range(-50.0f32..50.0);
                    }
                }
            }

            let a = mean_pooling(&emb, &shape, &mask, &mask_shape).unwrap();
            let b = mean_pooling(&perturbed, &shape, &mask, &mask_shape).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_fully_masked_row_is_finite() {
        let emb = vec![0.5, -0.25, 3.0, 1.0];
        let mask = vec![0, 0];
        let pooled = mean_pooling(
            &emb,
            &TensorShape::from([1, 2, 2]),
            &mask,
            &TensorShape::from([1, 2]),
        )
        .unwrap();
        for v in pooled.as_slice() {
            assert!(v.is_finite());
            assert!(v.abs() < 1e-6);
        }
    }

    #[test]
    fn test_mask_shape_mismatch() {
        let err = mean_pooling(
            &[0.0; 12],
            &TensorShape::from([2, 3, 2]),
            &[1; 4],
            &TensorShape::from([2, 2]),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_embedding_buffer_mismatch() {
        let err = mean_pooling(
            &[0.0; 11],
            &TensorShape::from([2, 3, 2]),
            &[1; 6],
            &TensorShape::from([2, 3]),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::ShapeMismatch { expected: 12, actual: 11, .. }));
    }

    #[test]
    fn test_cls_pooling_takes_first_token() {
        // batch 2, seq 2, hidden 2
        let emb = vec![1.0, 2.0, 9.0, 9.0, 3.0, 4.0, 9.0, 9.0];
        let pooled = cls_pooling(&emb, &TensorShape::from([2, 2, 2])).unwrap();
        assert_eq!(pooled.to_rows(), vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    }

    #[test]
    fn test_pool_dispatch() {
        let emb = vec![1.0, 3.0];
        let shape = TensorShape::from([1, 2, 1]);
        let mask_shape = TensorShape::from([1, 2]);
        let mean = pool(PoolingStrategy::Mean, &emb, &shape, &[1, 1], &mask_shape).unwrap();
        let cls = pool(PoolingStrategy::Cls, &emb, &shape, &[1, 1], &mask_shape).unwrap();
        assert_eq!(mean.as_slice(), &[2.0]);
        assert_eq!(cls.as_slice(), &[1.0]);
    }
}
