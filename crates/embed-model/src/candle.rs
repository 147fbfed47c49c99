//! Candle BERT inference engine.
//!
//! Runs a BERT encoder on CPU and exposes it through the named-tensor
//! engine interface. For graphs declared with token and sentence outputs the
//! masked mean is computed on the Candle side, so the sentence vector comes
//! out of the forward pass itself.

use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use embed_core::{TensorShape, MASK_SUM_MIN};
use embed_types::{InputKind, ModelSpec, OutputKind, SENTENCE_EMBEDDING};
use tracing::{debug, info};

use crate::engine::{InferenceEngine, ModelInputs, NamedOutputs, OutputTensor};
use crate::error::EmbeddingError;

/// BERT encoder behind the [`InferenceEngine`] interface.
pub struct CandleBertEngine {
    model: BertModel,
    device: Device,
    inputs: InputKind,
    outputs: OutputKind,
}

impl CandleBertEngine {
    /// Load a BERT model from `config.json` and `model.safetensors`.
    ///
    /// The config's hidden size must match `spec`, so weights for another
    /// variant fail here instead of on every run.
    pub fn load(
        config_path: &Path,
        weights_path: &Path,
        spec: &ModelSpec,
    ) -> Result<Self, EmbeddingError> {
        info!(weights = ?weights_path, "Loading encoder weights...");

        // CPU only
        let device = Device::Cpu;

        let config_str = std::fs::read_to_string(config_path)?;
        let config: BertConfig = serde_json::from_str(&config_str)
            .map_err(|e| EmbeddingError::ModelNotFound(format!("Invalid config: {}", e)))?;
        if config.hidden_size != spec.hidden_dim {
            return Err(EmbeddingError::HiddenSize {
                model: spec.name,
                expected: spec.hidden_dim,
                actual: config.hidden_size,
            });
        }

        let weights = [weights_path.to_path_buf()];
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&weights, DType::F32, &device)? };

        let model = BertModel::load(vb, &config)?;

        info!(inputs = ?spec.inputs, outputs = ?spec.outputs, "Encoder loaded");

        Ok(Self {
            model,
            device,
            inputs: spec.inputs,
            outputs: spec.outputs,
        })
    }

    fn tensor(&self, values: &[i64], shape: &TensorShape) -> Result<Tensor, EmbeddingError> {
        let dims = shape.expect_rank("input", 2)?;
        let values: Vec<u32> = values
            .iter()
            .map(|&v| {
                u32::try_from(v).map_err(|_| {
                    EmbeddingError::InvalidInput(format!("token id out of range: {}", v))
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(Tensor::from_vec(values, (dims[0], dims[1]), &self.device)?)
    }
}

/// Mean over unmasked tokens, `[batch, seq, hidden]` to `[batch, hidden]`.
fn mean_pooling(embeddings: &Tensor, attention_mask: &Tensor) -> Result<Tensor, EmbeddingError> {
    let mask = attention_mask
        .unsqueeze(2)?
        .broadcast_as(embeddings.shape())?;
    let mask_f32 = mask.to_dtype(DType::F32)?;

    let masked = embeddings.broadcast_mul(&mask_f32)?;
    let sum = masked.sum(1)?;

    let mask_sum = mask_f32.sum(1)?;
    let mask_sum = mask_sum.clamp(MASK_SUM_MIN as f64, f64::MAX)?;

    Ok(sum.broadcast_div(&mask_sum)?)
}

fn to_output(tensor: &Tensor) -> Result<OutputTensor, EmbeddingError> {
    let shape = TensorShape::new(tensor.dims().to_vec());
    let data: Vec<f32> = tensor.flatten_all()?.to_vec1()?;
    OutputTensor::new(data, shape)
}

impl InferenceEngine for CandleBertEngine {
    fn input_names(&self) -> Vec<String> {
        self.inputs
            .input_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn output_names(&self) -> Vec<String> {
        self.outputs
            .output_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn run(&self, inputs: &ModelInputs) -> Result<NamedOutputs, EmbeddingError> {
        let shape = inputs.shape();
        let input_ids = self.tensor(inputs.input_ids(), shape)?;
        let attention_mask = self.tensor(inputs.attention_mask(), shape)?;
        let token_type_ids = match inputs.token_type_ids() {
            Some(type_ids) => self.tensor(type_ids, shape)?,
            None => Tensor::zeros_like(&input_ids)?,
        };

        debug!(shape = %shape, "Forward pass");

        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

        let mut outputs = NamedOutputs::new();
        outputs.insert(self.outputs.token_output(), to_output(&hidden)?);
        if self.outputs == OutputKind::TokenAndSentence {
            let pooled = mean_pooling(&hidden, &attention_mask)?;
            outputs.insert(SENTENCE_EMBEDDING, to_output(&pooled)?);
        }

        Ok(outputs)
    }
}
