//! Capability contract for the opaque tokenize/encode model.
//!
//! The neural network is the one irreducible external dependency in the
//! pipeline, so it lives behind a small trait with a documented input/output
//! contract; any compliant model backend is substitutable.

use ndarray::{Array2, Array3};

use crate::error::{PipelineError, PipelineResult};
use crate::types::VectorDimension;

/// Per-token vectors for a batch of texts, shape `[N, L, D]`.
pub type TokenEmbeddingTensor = Array3<f32>;

/// Result of tokenizing N texts: parallel id and mask matrices of shape
/// `[N, L]`. The mask is 1 for real tokens and 0 for padding. L is the
/// longest row in this batch, not a fixed constant across calls.
#[derive(Debug, Clone)]
pub struct TokenBatch {
    input_ids: Array2<i64>,
    attention_mask: Array2<i64>,
    token_type_ids: Array2<i64>,
}

impl TokenBatch {
    /// Builds a batch, validating that all matrices share one shape and the
    /// mask holds only 0/1 values.
    pub fn new(
        input_ids: Array2<i64>,
        attention_mask: Array2<i64>,
        token_type_ids: Array2<i64>,
    ) -> PipelineResult<Self> {
        if input_ids.dim() != attention_mask.dim() || input_ids.dim() != token_type_ids.dim() {
            return Err(PipelineError::InvalidInput {
                reason: format!(
                    "token batch matrices disagree on shape: ids {:?}, mask {:?}, type ids {:?}",
                    input_ids.dim(),
                    attention_mask.dim(),
                    token_type_ids.dim()
                ),
            });
        }
        if attention_mask.iter().any(|&m| m != 0 && m != 1) {
            return Err(PipelineError::InvalidInput {
                reason: "attention mask must contain only 0 and 1".to_string(),
            });
        }
        Ok(Self {
            input_ids,
            attention_mask,
            token_type_ids,
        })
    }

    /// Number of texts in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.input_ids.nrows()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.input_ids.nrows() == 0
    }

    /// Padded sequence length L shared by every row of this batch.
    #[must_use]
    pub fn seq_len(&self) -> usize {
        self.input_ids.ncols()
    }

    #[must_use]
    pub fn input_ids(&self) -> &Array2<i64> {
        &self.input_ids
    }

    #[must_use]
    pub fn attention_mask(&self) -> &Array2<i64> {
        &self.attention_mask
    }

    #[must_use]
    pub fn token_type_ids(&self) -> &Array2<i64> {
        &self.token_type_ids
    }

    /// Number of real (non-padding) tokens in one row.
    #[must_use]
    pub fn real_token_count(&self, row: usize) -> i64 {
        self.attention_mask.row(row).sum()
    }
}

/// The opaque embedding capability: tokenize text into padded id/mask
/// batches, and encode batches into per-token vectors.
///
/// Implementations run in inference-only mode: encoding is side-effect-free
/// and deterministic, so the same text always produces the same vectors.
pub trait EmbeddingBackend: Send {
    /// Tokenizes a non-empty list of texts. With `pad` set, shorter rows
    /// are right-padded (mask 0) to the longest row's length; without it,
    /// every row must already share one length.
    fn tokenize(&self, texts: &[String], pad: bool) -> PipelineResult<TokenBatch>;

    /// Runs the model over a batch, returning per-token vectors `[N, L, D]`.
    fn encode(&self, batch: &TokenBatch) -> PipelineResult<TokenEmbeddingTensor>;

    /// Fixed output width D of this model.
    fn dimension(&self) -> VectorDimension;
}

/// Deterministic backend for tests: token ids are derived from words, and
/// each token's vector is a pure function of its id, independent of batch
/// composition. That independence is what makes single-versus-batch pooling
/// equivalence testable.
#[cfg(test)]
pub struct MockBackend {
    dimension: VectorDimension,
}

#[cfg(test)]
impl MockBackend {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: VectorDimension::new(dimension).expect("test dimension must be non-zero"),
        }
    }

    fn token_ids(text: &str) -> Vec<i64> {
        text.split_whitespace()
            .map(|word| {
                let mut hash: i64 = 7;
                for byte in word.bytes() {
                    hash = (hash.wrapping_mul(31).wrapping_add(i64::from(byte))) % 9973;
                }
                hash.abs() + 1
            })
            .collect()
    }

    /// Per-token vector as a pure function of the token id.
    pub fn token_vector(id: i64, dimension: usize) -> Vec<f32> {
        (0..dimension)
            .map(|d| ((id * 31 + d as i64 * 17) % 101) as f32 / 101.0)
            .collect()
    }
}

#[cfg(test)]
impl EmbeddingBackend for MockBackend {
    fn tokenize(&self, texts: &[String], pad: bool) -> PipelineResult<TokenBatch> {
        if texts.is_empty() {
            return Err(PipelineError::InvalidInput {
                reason: "text list is empty".to_string(),
            });
        }

        let rows: Vec<Vec<i64>> = texts.iter().map(|text| Self::token_ids(text)).collect();
        let max_len = rows.iter().map(Vec::len).max().unwrap_or(0).max(1);
        if !pad && rows.iter().any(|row| row.len() != max_len) {
            return Err(PipelineError::InvalidInput {
                reason: "unpadded batch has rows of different lengths".to_string(),
            });
        }

        let mut ids = Vec::with_capacity(texts.len() * max_len);
        let mut mask = Vec::with_capacity(texts.len() * max_len);
        for row in &rows {
            ids.extend_from_slice(row);
            ids.extend(std::iter::repeat_n(0, max_len - row.len()));
            mask.extend(std::iter::repeat_n(1, row.len()));
            mask.extend(std::iter::repeat_n(0, max_len - row.len()));
        }

        let shape = (texts.len(), max_len);
        let input_ids = Array2::from_shape_vec(shape, ids).expect("row-major test batch");
        let attention_mask = Array2::from_shape_vec(shape, mask).expect("row-major test batch");
        let token_type_ids = Array2::zeros(shape);
        TokenBatch::new(input_ids, attention_mask, token_type_ids)
    }

    fn encode(&self, batch: &TokenBatch) -> PipelineResult<TokenEmbeddingTensor> {
        let dimension = self.dimension.get();
        let mut tensor = Array3::zeros((batch.len(), batch.seq_len(), dimension));
        for (row, ids) in batch.input_ids().outer_iter().enumerate() {
            for (position, &id) in ids.iter().enumerate() {
                let vector = Self::token_vector(id, dimension);
                for (d, value) in vector.into_iter().enumerate() {
                    tensor[[row, position, d]] = value;
                }
            }
        }
        Ok(tensor)
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_batch_rejects_shape_disagreement() {
        let ids = Array2::zeros((2, 4));
        let mask = Array2::zeros((2, 3));
        let type_ids = Array2::zeros((2, 4));
        assert!(TokenBatch::new(ids, mask, type_ids).is_err());
    }

    #[test]
    fn token_batch_rejects_non_binary_mask() {
        let ids = Array2::zeros((1, 2));
        let mask = Array2::from_shape_vec((1, 2), vec![1, 2]).unwrap();
        let type_ids = Array2::zeros((1, 2));
        assert!(TokenBatch::new(ids, mask, type_ids).is_err());
    }

    #[test]
    fn mock_pads_shorter_rows_with_masked_zeros() {
        let backend = MockBackend::new(4);
        let batch = backend
            .tokenize(
                &["one two three".to_string(), "one".to_string()],
                true,
            )
            .unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.seq_len(), 3);
        assert_eq!(batch.real_token_count(0), 3);
        assert_eq!(batch.real_token_count(1), 1);
        assert_eq!(batch.attention_mask()[[1, 2]], 0);
    }

    #[test]
    fn mock_token_vectors_ignore_batch_neighbors() {
        let backend = MockBackend::new(4);
        let alone = backend.tokenize(&["red".to_string()], true).unwrap();
        let together = backend
            .tokenize(&["red".to_string(), "blue green yellow".to_string()], true)
            .unwrap();

        let alone_encoded = backend.encode(&alone).unwrap();
        let together_encoded = backend.encode(&together).unwrap();
        for d in 0..4 {
            assert_eq!(alone_encoded[[0, 0, d]], together_encoded[[0, 0, d]]);
        }
    }
}
