//! Similarity ranking over embedding matrices.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::CoreError;
use crate::matrix::EmbeddingMatrix;
use crate::normalize::l2_normalize;
use crate::ops;

/// A corpus row and its score against one query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredMatch {
    /// Similarity score
    pub score: f32,
    /// Row index into the corpus
    pub index: usize,
}

/// Matches for one query, best first. Equal scores keep corpus order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SimilarityResult {
    matches: Vec<ScoredMatch>,
}

impl SimilarityResult {
    pub fn matches(&self) -> &[ScoredMatch] {
        &self.matches
    }

    pub fn values(&self) -> Vec<f32> {
        self.matches.iter().map(|m| m.score).collect()
    }

    pub fn indices(&self) -> Vec<usize> {
        self.matches.iter().map(|m| m.index).collect()
    }

    pub fn best(&self) -> Option<&ScoredMatch> {
        self.matches.first()
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScoredMatch> {
        self.matches.iter()
    }
}

impl IntoIterator for SimilarityResult {
    type Item = ScoredMatch;
    type IntoIter = std::vec::IntoIter<ScoredMatch>;

    fn into_iter(self) -> Self::IntoIter {
        self.matches.into_iter()
    }
}

/// Rank `corpus` rows against every `query` row by cosine similarity.
///
/// Both matrices are L2-normalized per row, the `[queries, corpus]` score
/// matrix is `query · corpusᵀ`, and the `limit` best corpus rows are kept
/// for each query. Returns one [`SimilarityResult`] per query row.
///
/// `limit` larger than the corpus is rejected rather than clamped.
pub fn top_k_by_cosine_similarity(
    corpus: &EmbeddingMatrix,
    query: &EmbeddingMatrix,
    limit: usize,
) -> Result<Vec<SimilarityResult>, CoreError> {
    if corpus.cols() != query.cols() {
        return Err(CoreError::shape(
            format!(
                "hidden dimension of query {} against corpus {}",
                query.shape(),
                corpus.shape()
            ),
            corpus.cols(),
            query.cols(),
        ));
    }
    if limit > corpus.rows() {
        return Err(CoreError::InvalidArgument(format!(
            "limit {} exceeds corpus size {}",
            limit,
            corpus.rows()
        )));
    }

    let corpus_norm = l2_normalize(corpus)?;
    let query_norm = l2_normalize(query)?;
    let scores = ops::matmul_transposed(
        query_norm.as_slice(),
        query.rows(),
        corpus_norm.as_slice(),
        corpus.rows(),
        corpus.cols(),
    );

    let results: Vec<SimilarityResult> = (0..query.rows())
        .map(|q| {
            let row = &scores[q * corpus.rows()..q * corpus.rows() + corpus.rows()];
            SimilarityResult {
                matches: ops::top_k(row, limit)
                    .into_iter()
                    .map(|(score, index)| ScoredMatch { score, index })
                    .collect(),
            }
        })
        .collect();

    trace!(
        queries = query.rows(),
        corpus = corpus.rows(),
        limit,
        "Ranked by cosine similarity"
    );
    Ok(results)
}

/// Cosine similarity between two vectors of equal length.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, CoreError> {
    let corpus = EmbeddingMatrix::from_vector(a.to_vec());
    let query = EmbeddingMatrix::from_vector(b.to_vec());
    let result = top_k_by_cosine_similarity(&corpus, &query, 1)?;
    Ok(result
        .first()
        .and_then(SimilarityResult::best)
        .map(|m| m.score)
        .unwrap_or(0.0))
}

/// Sum of elementwise products.
pub fn dot_product(a: &[f32], b: &[f32]) -> Result<f32, CoreError> {
    if a.len() != b.len() {
        return Err(CoreError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(a.iter().zip(b).map(|(x, y)| x * y).sum())
}
