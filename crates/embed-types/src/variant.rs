//! Model variants and their inference contracts.
//!
//! Each variant fixes the tensor names its graph consumes and produces, and
//! where sentence pooling happens. The contract is resolved once, when a
//! model is built, from this closed set.

use std::fmt;
use std::str::FromStr;

use embed_core::PoolingStrategy;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const INPUT_IDS: &str = "input_ids";
pub const ATTENTION_MASK: &str = "attention_mask";
pub const TOKEN_TYPE_IDS: &str = "token_type_ids";

pub const LAST_HIDDEN_STATE: &str = "last_hidden_state";
pub const TOKEN_EMBEDDINGS: &str = "token_embeddings";
pub const SENTENCE_EMBEDDING: &str = "sentence_embedding";

/// Input tensors a graph consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    /// `input_ids`, `attention_mask`
    Basic,
    /// `input_ids`, `attention_mask`, `token_type_ids`
    Extended,
}

impl InputKind {
    pub fn input_names(&self) -> &'static [&'static str] {
        match self {
            Self::Basic => &[INPUT_IDS, ATTENTION_MASK],
            Self::Extended => &[INPUT_IDS, ATTENTION_MASK, TOKEN_TYPE_IDS],
        }
    }

    pub fn uses_token_type_ids(&self) -> bool {
        matches!(self, Self::Extended)
    }
}

/// Output tensors a graph produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// `last_hidden_state` `[batch, seq, hidden]`
    LastHiddenState,
    /// `token_embeddings` `[batch, seq, hidden]` and `sentence_embedding` `[batch, hidden]`
    TokenAndSentence,
}

impl OutputKind {
    pub fn output_names(&self) -> &'static [&'static str] {
        match self {
            Self::LastHiddenState => &[LAST_HIDDEN_STATE],
            Self::TokenAndSentence => &[TOKEN_EMBEDDINGS, SENTENCE_EMBEDDING],
        }
    }

    /// Name of the token-level output.
    pub fn token_output(&self) -> &'static str {
        match self {
            Self::LastHiddenState => LAST_HIDDEN_STATE,
            Self::TokenAndSentence => TOKEN_EMBEDDINGS,
        }
    }
}

/// Where the per-sentence vector comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentencePooling {
    /// The graph already emits `sentence_embedding`
    InGraph,
    /// Reduce the token-level output after inference
    Reduce(PoolingStrategy),
}

/// Static description of a model variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpec {
    /// Short name (e.g., "all-MiniLM-L6-v2")
    pub name: &'static str,
    /// HuggingFace repository id
    pub repo_id: &'static str,
    /// Embedding dimension
    pub hidden_dim: usize,
    /// Maximum sequence length in tokens
    pub max_sequence_length: usize,
    pub inputs: InputKind,
    pub outputs: OutputKind,
    pub pooling: SentencePooling,
}

/// Supported sentence embedding models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModelVariant {
    /// sentence-transformers/all-MiniLM-L6-v2 with in-graph pooling
    #[default]
    #[serde(rename = "all-minilm-l6-v2")]
    AllMiniLmL6V2,
    /// sentence-transformers/all-MiniLM-L12-v2, mean pooled after inference
    #[serde(rename = "all-minilm-l12-v2")]
    AllMiniLmL12V2,
    /// BAAI/bge-small-en-v1.5, CLS pooled, consumes token type ids
    #[serde(rename = "bge-small-en-v1.5")]
    BgeSmallEnV15,
}

impl ModelVariant {
    pub const ALL: [ModelVariant; 3] = [
        ModelVariant::AllMiniLmL6V2,
        ModelVariant::AllMiniLmL12V2,
        ModelVariant::BgeSmallEnV15,
    ];

    /// Identifier used in config files, env vars and CLI flags.
    pub fn id(&self) -> &'static str {
        match self {
            Self::AllMiniLmL6V2 => "all-minilm-l6-v2",
            Self::AllMiniLmL12V2 => "all-minilm-l12-v2",
            Self::BgeSmallEnV15 => "bge-small-en-v1.5",
        }
    }

    pub fn spec(&self) -> ModelSpec {
        match self {
            Self::AllMiniLmL6V2 => ModelSpec {
                name: "all-MiniLM-L6-v2",
                repo_id: "sentence-transformers/all-MiniLM-L6-v2",
                hidden_dim: 384,
                max_sequence_length: 256,
                inputs: InputKind::Basic,
                outputs: OutputKind::TokenAndSentence,
                pooling: SentencePooling::InGraph,
            },
            Self::AllMiniLmL12V2 => ModelSpec {
                name: "all-MiniLM-L12-v2",
                repo_id: "sentence-transformers/all-MiniLM-L12-v2",
                hidden_dim: 384,
                max_sequence_length: 256,
                inputs: InputKind::Basic,
                outputs: OutputKind::LastHiddenState,
                pooling: SentencePooling::Reduce(PoolingStrategy::Mean),
            },
            Self::BgeSmallEnV15 => ModelSpec {
                name: "bge-small-en-v1.5",
                repo_id: "BAAI/bge-small-en-v1.5",
                hidden_dim: 384,
                max_sequence_length: 512,
                inputs: InputKind::Extended,
                outputs: OutputKind::LastHiddenState,
                pooling: SentencePooling::Reduce(PoolingStrategy::Cls),
            },
        }
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ModelVariant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.id() == wanted || v.spec().name.to_ascii_lowercase() == wanted)
            .ok_or_else(|| ConfigError::UnknownVariant(s.to_string()))
    }
}
