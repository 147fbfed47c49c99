//! Embedding buffers with explicit dimensions.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::shape::TensorShape;

/// Per-token embeddings, semantically `[batch, sequence, hidden]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenEmbeddings {
    data: Vec<f32>,
    shape: TensorShape,
}

impl TokenEmbeddings {
    pub fn new(
        data: Vec<f32>,
        batch_size: usize,
        sequence_length: usize,
        hidden_dim: usize,
    ) -> Result<Self, CoreError> {
        Self::from_shape(data, TensorShape::from([batch_size, sequence_length, hidden_dim]))
    }

    /// Wrap a buffer whose shape came from the inference engine.
    pub fn from_shape(data: Vec<f32>, shape: TensorShape) -> Result<Self, CoreError> {
        shape.expect_rank("token embeddings", 3)?;
        shape.check_buffer("token embeddings", data.len())?;
        Ok(Self { data, shape })
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn shape(&self) -> &TensorShape {
        &self.shape
    }

    pub fn batch_size(&self) -> usize {
        self.shape.dims()[0]
    }

    pub fn sequence_length(&self) -> usize {
        self.shape.dims()[1]
    }

    pub fn hidden_dim(&self) -> usize {
        self.shape.dims()[2]
    }
}

/// One embedding per row, semantically `[rows, cols]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEmbeddingMatrix")]
pub struct EmbeddingMatrix {
    data: Vec<f32>,
    rows: usize,
    cols: usize,
}

#[derive(Deserialize)]
struct RawEmbeddingMatrix {
    data: Vec<f32>,
    rows: usize,
    cols: usize,
}

impl TryFrom<RawEmbeddingMatrix> for EmbeddingMatrix {
    type Error = CoreError;

    fn try_from(raw: RawEmbeddingMatrix) -> Result<Self, Self::Error> {
        Self::new(raw.data, raw.rows, raw.cols)
    }
}

impl EmbeddingMatrix {
    pub fn new(data: Vec<f32>, rows: usize, cols: usize) -> Result<Self, CoreError> {
        TensorShape::from([rows, cols]).check_buffer("embedding matrix", data.len())?;
        Ok(Self { data, rows, cols })
    }

    /// Build a matrix from equal-width rows.
    pub fn from_rows<R: AsRef<[f32]>>(rows: &[R]) -> Result<Self, CoreError> {
        let cols = rows.first().map(|r| r.as_ref().len()).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            let row = row.as_ref();
            if row.len() != cols {
                return Err(CoreError::DimensionMismatch {
                    expected: cols,
                    actual: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            data,
            rows: rows.len(),
            cols,
        })
    }

    /// A single-row matrix.
    pub fn from_vector(values: Vec<f32>) -> Self {
        let cols = values.len();
        Self {
            data: values,
            rows: 1,
            cols,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `[rows, cols]`
    pub fn dimensions(&self) -> [usize; 2] {
        [self.rows, self.cols]
    }

    pub fn shape(&self) -> TensorShape {
        TensorShape::from(self.dimensions())
    }

    pub fn row(&self, index: usize) -> Option<&[f32]> {
        if index >= self.rows {
            return None;
        }
        Some(&self.data[index * self.cols..(index + 1) * self.cols])
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> {
        // chunks() panics on zero width
        let width = self.cols.max(1);
        self.data.chunks(width).take(self.rows)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    pub fn to_rows(&self) -> Vec<Vec<f32>> {
        self.iter_rows().map(|r| r.to_vec()).collect()
    }
}
