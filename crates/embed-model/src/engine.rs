//! Inference engine boundary.
//!
//! An engine maps named integer input tensors to named float output tensors.
//! Which names it consumes and produces is declared up front and checked
//! against the model variant before the first run.

use std::collections::HashMap;

use embed_core::{TensorShape, TokenBatch};
use embed_types::{InputKind, ModelSpec, ATTENTION_MASK, INPUT_IDS, TOKEN_TYPE_IDS};
use tracing::debug;

use crate::error::EmbeddingError;

/// Inputs for one engine run, shaped `[batch, sequence]`.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelInputs {
    /// `input_ids` and `attention_mask`
    Basic {
        input_ids: Vec<i64>,
        attention_mask: Vec<i64>,
        shape: TensorShape,
    },
    /// `input_ids`, `attention_mask` and `token_type_ids`
    Extended {
        input_ids: Vec<i64>,
        attention_mask: Vec<i64>,
        token_type_ids: Vec<i64>,
        shape: TensorShape,
    },
}

impl ModelInputs {
    /// Arrange a tokenized batch for a graph with the given input kind.
    ///
    /// Extended inputs without tokenizer-provided type ids get all-zero
    /// type ids (a single segment).
    pub fn from_batch(batch: TokenBatch, kind: InputKind) -> Self {
        let (input_ids, attention_mask, token_type_ids, shape) = batch.into_parts();
        match kind {
            InputKind::Basic => Self::Basic {
                input_ids,
                attention_mask,
                shape,
            },
            InputKind::Extended => {
                let token_type_ids = token_type_ids.unwrap_or_else(|| vec![0; input_ids.len()]);
                Self::Extended {
                    input_ids,
                    attention_mask,
                    token_type_ids,
                    shape,
                }
            }
        }
    }

    pub fn kind(&self) -> InputKind {
        match self {
            Self::Basic { .. } => InputKind::Basic,
            Self::Extended { .. } => InputKind::Extended,
        }
    }

    pub fn shape(&self) -> &TensorShape {
        match self {
            Self::Basic { shape, .. } | Self::Extended { shape, .. } => shape,
        }
    }

    pub fn input_ids(&self) -> &[i64] {
        match self {
            Self::Basic { input_ids, .. } | Self::Extended { input_ids, .. } => input_ids,
        }
    }

    pub fn attention_mask(&self) -> &[i64] {
        match self {
            Self::Basic { attention_mask, .. } | Self::Extended { attention_mask, .. } => {
                attention_mask
            }
        }
    }

    pub fn token_type_ids(&self) -> Option<&[i64]> {
        match self {
            Self::Basic { .. } => None,
            Self::Extended { token_type_ids, .. } => Some(token_type_ids),
        }
    }

    /// Every input tensor keyed by its graph name.
    pub fn named(&self) -> Vec<(&'static str, &[i64])> {
        let mut named = vec![
            (INPUT_IDS, self.input_ids()),
            (ATTENTION_MASK, self.attention_mask()),
        ];
        if let Some(type_ids) = self.token_type_ids() {
            named.push((TOKEN_TYPE_IDS, type_ids));
        }
        named
    }
}

/// A float output buffer with its shape.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTensor {
    pub data: Vec<f32>,
    pub shape: TensorShape,
}

impl OutputTensor {
    pub fn new(data: Vec<f32>, shape: TensorShape) -> Result<Self, EmbeddingError> {
        shape.check_buffer("engine output", data.len())?;
        Ok(Self { data, shape })
    }
}

/// Output tensors of one run, keyed by name.
#[derive(Debug, Default)]
pub struct NamedOutputs {
    tensors: HashMap<String, OutputTensor>,
}

impl NamedOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, tensor: OutputTensor) {
        self.tensors.insert(name.into(), tensor);
    }

    pub fn get(&self, name: &str) -> Option<&OutputTensor> {
        self.tensors.get(name)
    }

    /// Remove and return an output, failing if the run did not produce it.
    pub fn take(&mut self, name: &str) -> Result<OutputTensor, EmbeddingError> {
        self.tensors
            .remove(name)
            .ok_or_else(|| EmbeddingError::MissingOutput(name.to_string()))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tensors.keys().cloned().collect();
        names.sort();
        names
    }
}

/// An opaque forward pass over named tensors.
///
/// Implementations need not be thread-safe; callers serialize runs.
pub trait InferenceEngine: Send {
    /// Input names the graph consumes.
    fn input_names(&self) -> Vec<String>;

    /// Output names the graph produces.
    fn output_names(&self) -> Vec<String>;

    /// Run the graph once.
    fn run(&self, inputs: &ModelInputs) -> Result<NamedOutputs, EmbeddingError>;
}

fn sorted(names: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut v: Vec<String> = names.into_iter().collect();
    v.sort();
    v
}

/// Check that an engine's declared names match what a variant expects.
pub fn check_contract(
    engine: &dyn InferenceEngine,
    spec: &ModelSpec,
) -> Result<(), EmbeddingError> {
    let expected_inputs = sorted(spec.inputs.input_names().iter().map(|s| s.to_string()));
    let actual_inputs = sorted(engine.input_names());
    if expected_inputs != actual_inputs {
        return Err(EmbeddingError::EngineContract {
            kind: "inputs",
            expected: expected_inputs,
            actual: actual_inputs,
        });
    }

    let expected_outputs = sorted(spec.outputs.output_names().iter().map(|s| s.to_string()));
    let actual_outputs = sorted(engine.output_names());
    if expected_outputs != actual_outputs {
        return Err(EmbeddingError::EngineContract {
            kind: "outputs",
            expected: expected_outputs,
            actual: actual_outputs,
        });
    }

    debug!(model = spec.name, outputs = ?actual_outputs, "Engine contract verified");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use embed_types::ModelVariant;

    struct FixedNames {
        inputs: Vec<&'static str>,
        outputs: Vec<&'static str>,
    }

    impl InferenceEngine for FixedNames {
        fn input_names(&self) -> Vec<String> {
            self.inputs.iter().map(|s| s.to_string()).collect()
        }

        fn output_names(&self) -> Vec<String> {
            self.outputs.iter().map(|s| s.to_string()).collect()
        }

        fn run(&self, _inputs: &ModelInputs) -> Result<NamedOutputs, EmbeddingError> {
            Ok(NamedOutputs::new())
        }
    }

    fn batch(with_type_ids: bool) -> TokenBatch {
        let type_ids = with_type_ids.then(|| vec![0, 0, 1, 1]);
        TokenBatch::new(vec![101, 5, 6, 102], vec![1, 1, 1, 1], type_ids, 1, 4).unwrap()
    }

    #[test]
    fn test_basic_inputs_drop_type_ids() {
        let inputs = ModelInputs::from_batch(batch(true), InputKind::Basic);
        assert_eq!(inputs.kind(), InputKind::Basic);
        assert!(inputs.token_type_ids().is_none());
        let names: Vec<&str> = inputs.named().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["input_ids", "attention_mask"]);
    }

    #[test]
    fn test_extended_inputs_keep_type_ids() {
        let inputs = ModelInputs::from_batch(batch(true), InputKind::Extended);
        assert_eq!(inputs.token_type_ids(), Some(&[0, 0, 1, 1][..]));
        assert_eq!(inputs.named().len(), 3);
    }

    #[test]
    fn test_extended_inputs_default_type_ids() {
        let inputs = ModelInputs::from_batch(batch(false), InputKind::Extended);
        assert_eq!(inputs.token_type_ids(), Some(&[0, 0, 0, 0][..]));
        assert_eq!(inputs.shape().dims(), &[1, 4]);
    }

    #[test]
    fn test_contract_accepts_any_order() {
        let engine = FixedNames {
            inputs: vec!["attention_mask", "input_ids"],
            outputs: vec!["sentence_embedding", "token_embeddings"],
        };
        assert!(check_contract(&engine, &ModelVariant::AllMiniLmL6V2.spec()).is_ok());
    }

    #[test]
    fn test_contract_rejects_wrong_outputs() {
        let engine = FixedNames {
            inputs: vec!["input_ids", "attention_mask"],
            outputs: vec!["last_hidden_state"],
        };
        let err = check_contract(&engine, &ModelVariant::AllMiniLmL6V2.spec()).unwrap_err();
        assert!(matches!(err, EmbeddingError::EngineContract { kind: "outputs", .. }));
    }

    #[test]
    fn test_contract_rejects_missing_type_ids() {
        let engine = FixedNames {
            inputs: vec!["input_ids", "attention_mask"],
            outputs: vec!["last_hidden_state"],
        };
        let err = check_contract(&engine, &ModelVariant::BgeSmallEnV15.spec()).unwrap_err();
        assert!(matches!(err, EmbeddingError::EngineContract { kind: "inputs", .. }));
    }

    #[test]
    fn test_named_outputs_take() {
        let mut outputs = NamedOutputs::new();
        outputs.insert(
            "last_hidden_state",
            OutputTensor::new(vec![0.0; 6], TensorShape::from([1, 2, 3])).unwrap(),
        );
        assert_eq!(outputs.names(), vec!["last_hidden_state".to_string()]);
        assert!(outputs.take("last_hidden_state").is_ok());
        assert!(matches!(
            outputs.take("last_hidden_state"),
            Err(EmbeddingError::MissingOutput(_))
        ));
    }

    #[test]
    fn test_output_tensor_shape_checked() {
        assert!(OutputTensor::new(vec![0.0; 5], TensorShape::from([1, 2, 3])).is_err());
    }
}
