//! Error path tests: engine contract checks, malformed engine output and
//! invalid configuration.
//!
//! Every failure must come back as a typed error naming what went wrong.
//! No test should cause a panic inside the library.

use pretty_assertions::assert_eq;

use e2e_tests::{embedder_with_engine, MockEngine, OutputFault, TestHarness};
use embed_model::{EmbeddingError, ModelCache, SentenceEmbedder};
use embed_types::{ConfigError, InputKind, ModelVariant, OutputKind, Settings};

// ===== Engine contract =====

/// An engine producing `last_hidden_state` cannot back a variant that
/// expects in-graph pooled outputs.
#[test]
fn test_contract_output_mismatch() {
    let engine = MockEngine::new(InputKind::Basic, OutputKind::LastHiddenState, 384);
    let result = embedder_with_engine(ModelVariant::AllMiniLmL6V2, engine);

    match result {
        Err(EmbeddingError::EngineContract {
            kind,
            expected,
            actual,
        }) => {
            assert_eq!(kind, "outputs");
            assert_eq!(expected, vec!["sentence_embedding", "token_embeddings"]);
            assert_eq!(actual, vec!["last_hidden_state"]);
        }
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("contract mismatch accepted"),
    }
}

/// An engine without `token_type_ids` cannot back an extended-input variant.
#[test]
fn test_contract_input_mismatch() {
    let engine = MockEngine::new(InputKind::Basic, OutputKind::LastHiddenState, 384);
    let result = embedder_with_engine(ModelVariant::BgeSmallEnV15, engine);

    let Err(err) = result else {
        panic!("contract mismatch accepted");
    };
    assert!(matches!(err, EmbeddingError::EngineContract { kind: "inputs", .. }));
    assert!(err.to_string().contains("token_type_ids"));
}

/// The contract check runs at construction, before any inference.
#[test]
fn test_contract_checked_before_inference() {
    let engine = MockEngine::new(InputKind::Extended, OutputKind::TokenAndSentence, 384);
    let log = engine.log();
    assert!(embedder_with_engine(ModelVariant::AllMiniLmL12V2, engine).is_err());
    assert_eq!(log.runs(), 0);
}

/// A cache built for one variant cannot load another variant's contract.
#[test]
fn test_load_with_cache_for_other_variant() {
    let harness = TestHarness::new();
    let cache = ModelCache::for_variant(&harness.scratch_dir, ModelVariant::AllMiniLmL6V2);

    let result = SentenceEmbedder::load(ModelVariant::BgeSmallEnV15, &cache);
    assert!(matches!(result, Err(EmbeddingError::CacheMismatch { .. })));
}

// ===== Engine output =====

#[test]
fn test_missing_engine_output() {
    let engine =
        MockEngine::for_variant(ModelVariant::AllMiniLmL12V2).with_fault(OutputFault::Omit);
    let embedder = embedder_with_engine(ModelVariant::AllMiniLmL12V2, engine).unwrap();

    let err = embedder.generate_embeddings(&["hello"], 8, true).unwrap_err();
    match err {
        EmbeddingError::MissingOutput(name) => assert_eq!(name, "last_hidden_state"),
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_missing_in_graph_output() {
    let engine = MockEngine::for_variant(ModelVariant::AllMiniLmL6V2).with_fault(OutputFault::Omit);
    let embedder = embedder_with_engine(ModelVariant::AllMiniLmL6V2, engine).unwrap();

    let err = embedder.generate_embeddings(&["hello"], 8, true).unwrap_err();
    assert!(matches!(err, EmbeddingError::MissingOutput(ref name) if name == "sentence_embedding"));
}

/// Output with the wrong hidden dimension is rejected before pooling.
#[test]
fn test_wrong_output_shape() {
    for variant in ModelVariant::ALL {
        let engine = MockEngine::for_variant(variant).with_fault(OutputFault::WrongHidden);
        let embedder = embedder_with_engine(variant, engine).unwrap();

        let err = embedder.generate_embeddings(&["hello", "world"], 8, true).unwrap_err();
        match err {
            EmbeddingError::OutputShape {
                expected, actual, ..
            } => {
                assert_eq!(expected.dims().last(), Some(&384), "{}", variant);
                assert_eq!(actual.dims().last(), Some(&385), "{}", variant);
            }
            other => panic!("{}: unexpected error: {}", variant, other),
        }
    }
}

// ===== Configuration =====

#[test]
fn test_config_file_selects_variant() {
    let harness = TestHarness::new();
    let path = harness.write_config(
        "model = \"bge-small-en-v1.5\"\nmax_sequence_length = 384\ntop_k = 3\nnormalize = false\n",
    );

    let settings = Settings::load(Some(&path.to_string_lossy())).unwrap();
    assert_eq!(settings.model, ModelVariant::BgeSmallEnV15);
    assert_eq!(settings.max_sequence_length, 384);
    assert_eq!(settings.top_k, 3);
    assert!(!settings.normalize);
}

#[test]
fn test_config_rejects_unknown_variant() {
    let harness = TestHarness::new();
    let path = harness.write_config("model = \"gpt-2\"\n");

    let err = Settings::load(Some(&path.to_string_lossy())).unwrap_err();
    assert!(matches!(err, ConfigError::Load(_)));
}

#[test]
fn test_config_rejects_sequence_beyond_variant_maximum() {
    let harness = TestHarness::new();
    let path = harness.write_config("model = \"all-minilm-l12-v2\"\nmax_sequence_length = 300\n");

    let settings = Settings::load(Some(&path.to_string_lossy())).unwrap();
    let err = settings.validate().unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Invalid {
            field: "max_sequence_length",
            ..
        }
    ));
}
