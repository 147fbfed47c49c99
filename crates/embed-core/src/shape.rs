//! Tensor shapes and the batch shape contract.
//!
//! Tensors in this crate are flat row-major buffers; a [`TensorShape`]
//! travels alongside each buffer because the buffers do not describe their
//! own rank.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::CoreError;

/// Ordered per-axis extents of a row-major tensor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TensorShape(Vec<usize>);

impl TensorShape {
    /// Create a shape from its per-axis extents.
    pub fn new(dims: impl Into<Vec<usize>>) -> Self {
        Self(dims.into())
    }

    /// Per-axis extents.
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Number of axes.
    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Extent of one axis, if the axis exists.
    pub fn dim(&self, axis: usize) -> Option<usize> {
        self.0.get(axis).copied()
    }

    /// Total element count (product of all extents).
    pub fn num_elements(&self) -> usize {
        self.0.iter().product()
    }

    /// Extents as `i64`, the form inference runtimes expect.
    pub fn to_i64(&self) -> Vec<i64> {
        self.0.iter().map(|&d| d as i64).collect()
    }

    /// Verify that a flat buffer holds exactly as many elements as this shape.
    pub fn check_buffer(&self, what: &str, len: usize) -> Result<(), CoreError> {
        let expected = self.num_elements();
        if expected != len {
            return Err(CoreError::shape(format!("{} {}", what, self), expected, len));
        }
        Ok(())
    }

    /// Verify the rank, returning the extents on success.
    pub fn expect_rank(&self, what: &str, rank: usize) -> Result<&[usize], CoreError> {
        if self.rank() != rank {
            return Err(CoreError::shape(
                format!("rank of {} {}", what, self),
                rank,
                self.rank(),
            ));
        }
        Ok(&self.0)
    }

    /// Split the shape around `axis` into (outer, axis extent, inner) counts.
    pub(crate) fn split_at_axis(&self, axis: usize) -> Option<(usize, usize, usize)> {
        let extent = self.dim(axis)?;
        let outer = self.0[..axis].iter().product();
        let inner = self.0[axis + 1..].iter().product();
        Some((outer, extent, inner))
    }
}

impl<const N: usize> From<[usize; N]> for TensorShape {
    fn from(dims: [usize; N]) -> Self {
        Self(dims.to_vec())
    }
}

impl From<Vec<usize>> for TensorShape {
    fn from(dims: Vec<usize>) -> Self {
        Self(dims)
    }
}

impl fmt::Display for TensorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}

/// The three shapes of one inference call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchShapes {
    /// `[batch, sequence]` for input ids, attention mask and token type ids
    pub input: TensorShape,
    /// `[batch, sequence, hidden]` for token-level output
    pub token_output: TensorShape,
    /// `[batch, hidden]` for sentence-level output
    pub sentence_output: TensorShape,
}

impl BatchShapes {
    /// Build the shapes for a batch, validating against the model limits.
    ///
    /// Fails with [`CoreError::Configuration`] for an empty batch, a zero
    /// hidden or sequence extent, or a sequence length beyond
    /// `model_max_sequence_length`.
    pub fn build(
        batch_size: usize,
        max_sequence_length: usize,
        hidden_dim: usize,
        model_max_sequence_length: usize,
    ) -> Result<Self, CoreError> {
        if batch_size == 0 {
            return Err(CoreError::Configuration(
                "batch size must be greater than zero".to_string(),
            ));
        }
        if max_sequence_length == 0 {
            return Err(CoreError::Configuration(
                "max sequence length must be greater than zero".to_string(),
            ));
        }
        if max_sequence_length > model_max_sequence_length {
            return Err(CoreError::Configuration(format!(
                "max sequence length {} is greater than the maximum supported sequence length {}",
                max_sequence_length, model_max_sequence_length
            )));
        }
        if hidden_dim == 0 {
            return Err(CoreError::Configuration(
                "hidden dimension must be greater than zero".to_string(),
            ));
        }

        trace!(
            batch = batch_size,
            seq = max_sequence_length,
            hidden = hidden_dim,
            "Built batch shapes"
        );

        Ok(Self {
            input: TensorShape::from([batch_size, max_sequence_length]),
            token_output: TensorShape::from([batch_size, max_sequence_length, hidden_dim]),
            sentence_output: TensorShape::from([batch_size, hidden_dim]),
        })
    }

    pub fn batch_size(&self) -> usize {
        self.input.dims()[0]
    }

    pub fn sequence_length(&self) -> usize {
        self.input.dims()[1]
    }

    pub fn hidden_dim(&self) -> usize {
        self.sentence_output.dims()[1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_shapes() {
        let shapes = BatchShapes::build(2, 128, 384, 256).unwrap();
        assert_eq!(shapes.input.dims(), &[2, 128]);
        assert_eq!(shapes.token_output.dims(), &[2, 128, 384]);
        assert_eq!(shapes.sentence_output.dims(), &[2, 384]);
        assert_eq!(shapes.batch_size(), 2);
        assert_eq!(shapes.sequence_length(), 128);
        assert_eq!(shapes.hidden_dim(), 384);
    }

    #[test]
    fn test_sequence_at_model_maximum_is_accepted() {
        assert!(BatchShapes::build(1, 256, 384, 256).is_ok());
    }

    #[test]
    fn test_sequence_beyond_model_maximum() {
        let err = BatchShapes::build(1, 257, 384, 256).unwrap_err();
        assert!(matches!(err, CoreError::Configuration(_)));
        assert!(err.to_string().contains("257"));
    }

    #[test]
    fn test_empty_batch() {
        let err = BatchShapes::build(0, 16, 384, 256).unwrap_err();
        assert!(matches!(err, CoreError::Configuration(_)));
    }

    #[test]
    fn test_zero_sequence_and_hidden() {
        assert!(BatchShapes::build(1, 0, 384, 256).is_err());
        assert!(BatchShapes::build(1, 16, 0, 256).is_err());
    }

    #[test]
    fn test_check_buffer() {
        let shape = TensorShape::from([2, 3]);
        assert!(shape.check_buffer("mask", 6).is_ok());
        let err = shape.check_buffer("mask", 5).unwrap_err();
        assert_eq!(
            err,
            CoreError::ShapeMismatch {
                what: "mask [2, 3]".to_string(),
                expected: 6,
                actual: 5
            }
        );
    }

    #[test]
    fn test_display_and_i64() {
        let shape = TensorShape::from([1, 7, 384]);
        assert_eq!(shape.to_string(), "[1, 7, 384]");
        assert_eq!(shape.to_i64(), vec![1i64, 7, 384]);
        assert_eq!(shape.num_elements(), 2688);
    }

    #[test]
    fn test_split_at_axis() {
        let shape = TensorShape::from([2, 3, 4]);
        assert_eq!(shape.split_at_axis(0), Some((1, 2, 12)));
        assert_eq!(shape.split_at_axis(1), Some((2, 3, 4)));
        assert_eq!(shape.split_at_axis(2), Some((6, 4, 1)));
        assert_eq!(shape.split_at_axis(3), None);
    }
}
