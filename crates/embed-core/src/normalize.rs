//! Row normalization for embedding matrices.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::matrix::EmbeddingMatrix;
use crate::ops;

/// Default norm clamp.
pub const DEFAULT_EPS: f32 = 1e-12;

/// Parameters for [`normalize`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizeOptions {
    /// Norm order (2 = Euclidean)
    pub p: f32,
    /// Axis to normalize along; `None` means the last axis
    pub axis: Option<usize>,
    /// Minimum norm; smaller norms are clamped up to this value
    pub eps: f32,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            p: 2.0,
            axis: None,
            eps: DEFAULT_EPS,
        }
    }
}

impl NormalizeOptions {
    pub fn with_p(mut self, p: f32) -> Self {
        self.p = p;
        self
    }

    pub fn with_axis(mut self, axis: usize) -> Self {
        self.axis = Some(axis);
        self
    }

    pub fn with_eps(mut self, eps: f32) -> Self {
        self.eps = eps;
        self
    }
}

/// Divide each slice along the chosen axis by its p-norm, clamped to `eps`.
///
/// Slices whose norm is below `eps` are divided by `eps` and stay near zero.
pub fn normalize(
    matrix: &EmbeddingMatrix,
    options: NormalizeOptions,
) -> Result<EmbeddingMatrix, CoreError> {
    if options.eps.is_nan() || options.eps < 0.0 {
        return Err(CoreError::InvalidArgument(format!(
            "eps must be non-negative, got {}",
            options.eps
        )));
    }

    let shape = matrix.shape();
    let axis = options.axis.unwrap_or(shape.rank() - 1);
    let (mut norms, _) = ops::norm_axis(matrix.as_slice(), &shape, axis, options.p)?;
    ops::clamp_min(&mut norms, options.eps);
    let data = ops::broadcast_div_axis(matrix.as_slice(), &shape, axis, &norms)?;
    EmbeddingMatrix::new(data, matrix.rows(), matrix.cols())
}

/// L2-normalize every row with the default epsilon.
pub fn l2_normalize(matrix: &EmbeddingMatrix) -> Result<EmbeddingMatrix, CoreError> {
    normalize(matrix, NormalizeOptions::default())
}

/// Euclidean norm of a vector.
pub fn l2_norm(values: &[f32]) -> f32 {
    values.iter().map(|x| x * x).sum::<f32>().sqrt()
}
