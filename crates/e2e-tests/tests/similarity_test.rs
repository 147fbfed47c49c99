//! End-to-end similarity tests: ranking, dot products and score display.

use pretty_assertions::assert_eq;
use rand::{rngs::StdRng, Rng, SeedableRng};

use e2e_tests::TestHarness;
use embed_core::{
    dot_product, to_percentage_truncated, top_k_by_cosine_similarity, CoreError, EmbeddingMatrix,
};
use embed_types::ModelVariant;

/// Corpus `[1,0]`, `[0,1]`, `[0.707,0.707]` against query `[1,0]` with a
/// limit of two ranks index 0 first and the diagonal second.
#[test]
fn test_unit_vector_ranking() {
    let corpus = EmbeddingMatrix::from_rows(&[[1.0f32, 0.0], [0.0, 1.0], [0.707, 0.707]]).unwrap();
    let query = EmbeddingMatrix::from_rows(&[[1.0f32, 0.0]]).unwrap();

    let results = top_k_by_cosine_similarity(&corpus, &query, 2).unwrap();
    assert_eq!(results.len(), 1);

    let result = &results[0];
    assert_eq!(result.indices(), vec![0, 2]);
    let scores = result.values();
    assert!((scores[0] - 1.0).abs() < 1e-6);
    assert!((scores[1] - 0.70710677).abs() < 1e-4);
}

#[test]
fn test_limit_larger_than_corpus() {
    let corpus = EmbeddingMatrix::from_rows(&[[1.0f32, 0.0], [0.0, 1.0]]).unwrap();
    let query = EmbeddingMatrix::from_rows(&[[1.0f32, 0.0]]).unwrap();

    let err = top_k_by_cosine_similarity(&corpus, &query, 3).unwrap_err();
    assert!(matches!(err, CoreError::InvalidArgument(_)));
}

#[test]
fn test_hidden_dimension_mismatch() {
    let corpus = EmbeddingMatrix::from_rows(&[[1.0f32, 0.0, 0.0]]).unwrap();
    let query = EmbeddingMatrix::from_rows(&[[1.0f32, 0.0]]).unwrap();

    let err = top_k_by_cosine_similarity(&corpus, &query, 1).unwrap_err();
    assert!(matches!(err, CoreError::ShapeMismatch { .. }));
}

#[test]
fn test_dot_product_symmetric_and_checked() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..20 {
        let a: Vec<f32> = (0..64).map(|_| rng.random_range(-1.0f32..1.0)).collect();
        let b: Vec<f32> = (0..64).map(|_| rng.random_range(-1.0f32..1.0)).collect();
        assert_eq!(dot_product(&a, &b).unwrap(), dot_product(&b, &a).unwrap());
    }

    let err = dot_product(&[1.0, 2.0], &[1.0]).unwrap_err();
    assert_eq!(err, CoreError::DimensionMismatch { expected: 2, actual: 1 });
}

/// Embedded corpus ranks an exact duplicate of the query first, with
/// results sorted descending and in-range indices.
#[test]
fn test_rank_embedded_corpus() {
    let harness = TestHarness::for_variant(ModelVariant::AllMiniLmL12V2);
    let corpus = [
        "A man is eating food.",
        "A man is riding a horse.",
        "A monkey is playing drums.",
        "Two men pushed carts through the woods.",
        "A man is eating a piece of bread.",
    ];
    let query = "A man is riding a horse.";

    let corpus_out = harness.embedder.generate_embeddings(&corpus, 32, true).unwrap();
    let query_out = harness.embedder.generate_embeddings(&[query], 32, true).unwrap();

    let results = top_k_by_cosine_similarity(
        &corpus_out.to_matrix().unwrap(),
        &query_out.to_matrix().unwrap(),
        3,
    )
    .unwrap();

    let result = &results[0];
    assert_eq!(result.len(), 3);
    assert_eq!(result.best().map(|m| m.index), Some(1));
    assert!((result.values()[0] - 1.0).abs() < 1e-4);

    let scores = result.values();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    assert!(result.indices().iter().all(|&i| i < corpus.len()));
}

/// Multiple queries against one corpus give one result per query.
#[test]
fn test_multiple_queries() {
    let harness = TestHarness::for_variant(ModelVariant::BgeSmallEnV15);
    let corpus = ["first sentence", "second sentence", "third sentence"];

    let corpus_out = harness.embedder.generate_embeddings(&corpus, 16, true).unwrap();
    let query_out = harness
        .embedder
        .generate_embeddings(&["third sentence", "first sentence"], 16, true)
        .unwrap();

    let results = top_k_by_cosine_similarity(
        &corpus_out.to_matrix().unwrap(),
        &query_out.to_matrix().unwrap(),
        3,
    )
    .unwrap();
    assert_eq!(results.len(), 2);
    for result in &results {
        assert_eq!(result.len(), 3);
    }
}

#[test]
fn test_score_display_truncates() {
    assert_eq!(to_percentage_truncated(0.98765, 2), "98.76%");
    assert_eq!(to_percentage_truncated(1.0, 2), "100%");
    assert_eq!(to_percentage_truncated(0.5, 3), "50%");
}
