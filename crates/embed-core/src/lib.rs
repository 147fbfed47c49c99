//! # embed-core
//!
//! Numeric core for sentence embeddings.
//!
//! Everything here is a pure function over owned, flat, row-major buffers
//! with explicit shapes. Nothing holds state, so every operation is safe to
//! call concurrently with independent inputs.
//!
//! ## Features
//! - Batch shape contract: `[batch, seq]` inputs, `[batch, seq, hidden]` and
//!   `[batch, hidden]` outputs, checked against the model's maximum sequence length
//! - Masked mean pooling and first-token pooling
//! - p-norm row normalization with epsilon clamping
//! - Top-k cosine similarity ranking and dot products
//! - Truncating percentage formatting for display

pub mod batch;
pub mod error;
pub mod format;
pub mod matrix;
pub mod normalize;
pub mod ops;
pub mod pooling;
pub mod shape;
pub mod similarity;

pub use batch::TokenBatch;
pub use error::CoreError;
pub use format::{format_vector, to_percentage_truncated};
pub use matrix::{EmbeddingMatrix, TokenEmbeddings};
pub use normalize::{l2_norm, l2_normalize, normalize, NormalizeOptions, DEFAULT_EPS};
pub use pooling::{cls_pooling, mean_pooling, pool, PoolingStrategy, MASK_SUM_MIN};
pub use shape::{BatchShapes, TensorShape};
pub use similarity::{
    cosine_similarity, dot_product, top_k_by_cosine_similarity, ScoredMatch, SimilarityResult,
};
