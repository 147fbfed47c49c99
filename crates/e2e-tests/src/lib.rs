//! End-to-end test infrastructure for sentence embeddings.
//!
//! Provides a deterministic tokenizer and inference engine so the full
//! façade pipeline (shape check -> tokenize -> infer -> pool -> normalize)
//! runs without downloading a model.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rand::{rngs::StdRng, Rng, SeedableRng};

use embed_core::{mean_pooling, TensorShape, TokenBatch};
use embed_model::{
    EmbeddingError, InferenceEngine, ModelInputs, NamedOutputs, OutputTensor, SentenceEmbedder,
    TextTokenizer,
};
use embed_types::{InputKind, ModelVariant, OutputKind, SENTENCE_EMBEDDING};

/// `[CLS]` id used by the hash tokenizer
pub const CLS_ID: i64 = 101;
/// `[SEP]` id used by the hash tokenizer
pub const SEP_ID: i64 = 102;
/// Padding id
pub const PAD_ID: i64 = 0;

const WORD_ID_BASE: u64 = 1000;
const WORD_ID_RANGE: u64 = 20_000;

/// Deterministic word-level tokenizer.
///
/// Each lowercase word maps to a stable id via FNV-1a; rows are
/// `[CLS] words.. [SEP]`, truncated keeping `[SEP]` and padded with zeros.
#[derive(Debug, Default, Clone)]
pub struct HashTokenizer {
    calls: Arc<AtomicUsize>,
}

impl HashTokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `encode_batch` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn word_id(word: &str) -> i64 {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in word.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        (WORD_ID_BASE + hash % WORD_ID_RANGE) as i64
    }

    /// Unpadded ids for one sentence.
    pub fn tokenize(sentence: &str) -> Vec<i64> {
        let mut ids = vec![CLS_ID];
        ids.extend(
            sentence
                .split_whitespace()
                .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
                .filter(|w| !w.is_empty())
                .map(|w| Self::word_id(&w)),
        );
        ids.push(SEP_ID);
        ids
    }
}

impl TextTokenizer for HashTokenizer {
    fn encode_batch(
        &self,
        sentences: &[&str],
        max_sequence_length: usize,
        with_token_type_ids: bool,
    ) -> Result<TokenBatch, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut input_ids = Vec::with_capacity(sentences.len() * max_sequence_length);
        let mut attention_mask = Vec::with_capacity(sentences.len() * max_sequence_length);
        for sentence in sentences {
            let mut ids = Self::tokenize(sentence);
            if ids.len() > max_sequence_length {
                ids.truncate(max_sequence_length.saturating_sub(1));
                if max_sequence_length > 1 {
                    ids.push(SEP_ID);
                }
            }
            let real = ids.len();
            ids.resize(max_sequence_length, PAD_ID);
            input_ids.extend(ids);
            attention_mask.extend((0..max_sequence_length).map(|i| i64::from(i < real)));
        }

        let token_type_ids = with_token_type_ids.then(|| vec![0; input_ids.len()]);
        Ok(TokenBatch::new(
            input_ids,
            attention_mask,
            token_type_ids,
            sentences.len(),
            max_sequence_length,
        )?)
    }
}

/// What a [`MockEngine`] observed across its runs.
#[derive(Debug, Default)]
pub struct EngineLog {
    pub runs: AtomicUsize,
    pub last_input_kind: Mutex<Option<InputKind>>,
    pub last_token_type_ids: Mutex<Option<Vec<i64>>>,
}

impl EngineLog {
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

/// How a [`MockEngine`] shapes its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFault {
    None,
    /// Emit no tensors at all
    Omit,
    /// Emit a hidden dimension one larger than declared
    WrongHidden,
}

/// Deterministic stand-in for a transformer graph.
///
/// The hidden state of a token depends only on its id: a vector drawn from
/// a generator seeded with that id. Declared names follow the given input
/// and output kinds.
pub struct MockEngine {
    inputs: InputKind,
    outputs: OutputKind,
    hidden_dim: usize,
    fault: OutputFault,
    log: Arc<EngineLog>,
}

impl MockEngine {
    pub fn new(inputs: InputKind, outputs: OutputKind, hidden_dim: usize) -> Self {
        Self {
            inputs,
            outputs,
            hidden_dim,
            fault: OutputFault::None,
            log: Arc::new(EngineLog::default()),
        }
    }

    /// Engine honoring a variant's contract.
    pub fn for_variant(variant: ModelVariant) -> Self {
        let spec = variant.spec();
        Self::new(spec.inputs, spec.outputs, spec.hidden_dim)
    }

    pub fn with_fault(mut self, fault: OutputFault) -> Self {
        self.fault = fault;
        self
    }

    pub fn log(&self) -> Arc<EngineLog> {
        self.log.clone()
    }

    /// Hidden state for a single token id.
    pub fn token_vector(id: i64, hidden_dim: usize) -> Vec<f32> {
        let mut rng = StdRng::seed_from_u64(id as u64);
        (0..hidden_dim).map(|_| rng.random_range(-1.0f32..1.0)).collect()
    }
}

impl InferenceEngine for MockEngine {
    fn input_names(&self) -> Vec<String> {
        self.inputs.input_names().iter().map(|s| s.to_string()).collect()
    }

    fn output_names(&self) -> Vec<String> {
        self.outputs.output_names().iter().map(|s| s.to_string()).collect()
    }

    fn run(&self, inputs: &ModelInputs) -> Result<NamedOutputs, EmbeddingError> {
        self.log.runs.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut kind) = self.log.last_input_kind.lock() {
            *kind = Some(inputs.kind());
        }
        if let Ok(mut type_ids) = self.log.last_token_type_ids.lock() {
            *type_ids = inputs.token_type_ids().map(<[i64]>::to_vec);
        }

        let mut outputs = NamedOutputs::new();
        if self.fault == OutputFault::Omit {
            return Ok(outputs);
        }

        let hidden = match self.fault {
            OutputFault::WrongHidden => self.hidden_dim + 1,
            _ => self.hidden_dim,
        };
        let dims = inputs.shape().dims();
        let (batch, seq) = (dims[0], dims[1]);

        let data: Vec<f32> = inputs
            .input_ids()
            .iter()
            .flat_map(|&id| Self::token_vector(id, hidden))
            .collect();
        let token_shape = TensorShape::from([batch, seq, hidden]);

        if self.outputs == OutputKind::TokenAndSentence {
            let pooled = mean_pooling(
                &data,
                &token_shape,
                inputs.attention_mask(),
                inputs.shape(),
            )?;
            outputs.insert(
                SENTENCE_EMBEDDING,
                OutputTensor::new(pooled.into_vec(), TensorShape::from([batch, hidden]))?,
            );
        }
        outputs.insert(
            self.outputs.token_output(),
            OutputTensor::new(data, token_shape)?,
        );
        Ok(outputs)
    }
}

/// Shared test harness: a mock-backed embedder plus a scratch directory.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    pub embedder: SentenceEmbedder,
    pub tokenizer: HashTokenizer,
    pub engine_log: Arc<EngineLog>,
    pub scratch_dir: PathBuf,
}

impl TestHarness {
    /// Harness for the default variant.
    pub fn new() -> Self {
        Self::for_variant(ModelVariant::default())
    }

    pub fn for_variant(variant: ModelVariant) -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let scratch_dir = temp_dir.path().to_path_buf();

        let tokenizer = HashTokenizer::new();
        let engine = MockEngine::for_variant(variant);
        let engine_log = engine.log();
        let embedder =
            SentenceEmbedder::new(variant, Box::new(tokenizer.clone()), Box::new(engine))
                .expect("Mock engine should satisfy the variant contract");

        Self {
            _temp_dir: temp_dir,
            embedder,
            tokenizer,
            engine_log,
            scratch_dir,
        }
    }

    /// Write a config file into the scratch directory and return its path.
    pub fn write_config(&self, contents: &str) -> PathBuf {
        let path = self.scratch_dir.join("embed.toml");
        std::fs::write(&path, contents).expect("Failed to write config file");
        path
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Build an embedder from an arbitrary engine.
pub fn embedder_with_engine(
    variant: ModelVariant,
    engine: MockEngine,
) -> Result<SentenceEmbedder, EmbeddingError> {
    SentenceEmbedder::new(variant, Box::new(HashTokenizer::new()), Box::new(engine))
}
