//! ONNX model backend: tokenization via the HuggingFace tokenizers runtime,
//! inference via tract.
//!
//! tract is an inference-only engine, so encoding carries no gradient
//! machinery and is deterministic by construction.

use std::path::Path;

use ndarray::Array2;
use tokenizers::Tokenizer;
use tract_onnx::prelude::*;
use tracing::info;

use crate::embedding::backend::{EmbeddingBackend, TokenBatch, TokenEmbeddingTensor};
use crate::error::{PipelineError, PipelineResult};
use crate::types::VectorDimension;

/// Type alias for the tract typed model
type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// BERT-family encoder loaded from an ONNX file plus its tokenizer.json.
///
/// Expects the conventional three model inputs (input ids, attention mask,
/// token type ids) and reads per-token vectors from the first output.
pub struct OnnxBackend {
    model: TractModel,
    tokenizer: Tokenizer,
    max_length: usize,
    dimension: VectorDimension,
}

impl OnnxBackend {
    /// Loads the model and tokenizer from disk.
    ///
    /// A missing or unreadable file is `ModelUnavailable`: fatal to the
    /// whole pipeline, since a missing model is not transient.
    pub fn from_files(
        model_path: impl AsRef<Path>,
        tokenizer_path: impl AsRef<Path>,
        max_length: usize,
        dimension: VectorDimension,
    ) -> PipelineResult<Self> {
        let model_path = model_path.as_ref();
        let tokenizer_path = tokenizer_path.as_ref();

        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .map_err(|e| load_error(model_path, &e))?
            .into_optimized()
            .map_err(|e| load_error(model_path, &e))?
            .into_runnable()
            .map_err(|e| load_error(model_path, &e))?;

        let tokenizer =
            Tokenizer::from_file(tokenizer_path).map_err(|e| PipelineError::ModelUnavailable {
                reason: format!(
                    "failed to load tokenizer '{}': {e}",
                    tokenizer_path.display()
                ),
            })?;

        info!(
            model = %model_path.display(),
            dimension = dimension.get(),
            "embedding model loaded"
        );
        Ok(Self {
            model,
            tokenizer,
            max_length,
            dimension,
        })
    }
}

fn load_error(path: &Path, e: &dyn std::fmt::Display) -> PipelineError {
    PipelineError::ModelUnavailable {
        reason: format!("failed to load model '{}': {e}", path.display()),
    }
}

fn to_tensor(matrix: &Array2<i64>) -> PipelineResult<Tensor> {
    let data: Vec<i64> = matrix.iter().copied().collect();
    Tensor::from_shape(&[matrix.nrows(), matrix.ncols()], &data).map_err(|e| {
        PipelineError::ModelUnavailable {
            reason: format!("failed to build input tensor: {e}"),
        }
    })
}

impl EmbeddingBackend for OnnxBackend {
    fn tokenize(&self, texts: &[String], pad: bool) -> PipelineResult<TokenBatch> {
        if texts.is_empty() {
            return Err(PipelineError::InvalidInput {
                reason: "text list is empty".to_string(),
            });
        }

        let mut rows = Vec::with_capacity(texts.len());
        for text in texts {
            let encoding = self.tokenizer.encode(text.as_str(), true).map_err(|e| {
                PipelineError::InvalidInput {
                    reason: format!("tokenizer rejected text: {e}"),
                }
            })?;

            let mut input_ids: Vec<i64> =
                encoding.get_ids().iter().map(|&id| i64::from(id)).collect();
            let mut attention_mask: Vec<i64> = encoding
                .get_attention_mask()
                .iter()
                .map(|&m| i64::from(m))
                .collect();
            let mut token_type_ids: Vec<i64> = encoding
                .get_type_ids()
                .iter()
                .map(|&id| i64::from(id))
                .collect();

            if input_ids.len() > self.max_length {
                input_ids.truncate(self.max_length);
                attention_mask.truncate(self.max_length);
                token_type_ids.truncate(self.max_length);
            }
            rows.push((input_ids, attention_mask, token_type_ids));
        }

        let max_len = rows.iter().map(|(ids, _, _)| ids.len()).max().unwrap_or(0);
        if !pad && rows.iter().any(|(ids, _, _)| ids.len() != max_len) {
            return Err(PipelineError::InvalidInput {
                reason: "unpadded batch has rows of different lengths".to_string(),
            });
        }

        let batch = rows.len();
        let mut ids = Vec::with_capacity(batch * max_len);
        let mut mask = Vec::with_capacity(batch * max_len);
        let mut type_ids = Vec::with_capacity(batch * max_len);
        for (row_ids, row_mask, row_type_ids) in rows {
            let pad_len = max_len - row_ids.len();
            ids.extend(row_ids);
            ids.extend(std::iter::repeat_n(0, pad_len));
            mask.extend(row_mask);
            mask.extend(std::iter::repeat_n(0, pad_len));
            type_ids.extend(row_type_ids);
            type_ids.extend(std::iter::repeat_n(0, pad_len));
        }

        let shape = (batch, max_len);
        let to_matrix = |data: Vec<i64>| {
            Array2::from_shape_vec(shape, data).map_err(|e| PipelineError::InvalidInput {
                reason: format!("ragged token batch: {e}"),
            })
        };
        TokenBatch::new(to_matrix(ids)?, to_matrix(mask)?, to_matrix(type_ids)?)
    }

    fn encode(&self, batch: &TokenBatch) -> PipelineResult<TokenEmbeddingTensor> {
        let input_ids = to_tensor(batch.input_ids())?;
        let attention_mask = to_tensor(batch.attention_mask())?;
        let token_type_ids = to_tensor(batch.token_type_ids())?;

        let outputs = self
            .model
            .run(tvec![
                input_ids.into(),
                attention_mask.into(),
                token_type_ids.into(),
            ])
            .map_err(|e| PipelineError::ModelUnavailable {
                reason: format!("inference failed: {e}"),
            })?;

        // First output holds all token embeddings: (batch, seq_len, hidden)
        let first = outputs
            .first()
            .ok_or_else(|| PipelineError::ModelUnavailable {
                reason: "model produced no outputs".to_string(),
            })?;
        let token_embeddings = first
            .to_array_view::<f32>()
            .map_err(|e| PipelineError::ModelUnavailable {
                reason: format!("unexpected model output type: {e}"),
            })?
            .to_owned()
            .into_dimensionality::<ndarray::Ix3>()
            .map_err(|e| PipelineError::ModelUnavailable {
                reason: format!("model output is not 3-dimensional: {e}"),
            })?;

        let (rows, seq_len, width) = token_embeddings.dim();
        if rows != batch.len() || seq_len != batch.seq_len() {
            return Err(PipelineError::ModelUnavailable {
                reason: format!(
                    "model output shape [{rows}, {seq_len}, {width}] does not match the input batch [{}, {}]",
                    batch.len(),
                    batch.seq_len()
                ),
            });
        }
        if width != self.dimension.get() {
            return Err(PipelineError::DimensionMismatch {
                expected: self.dimension.get(),
                actual: width,
            });
        }

        Ok(token_embeddings)
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }
}
