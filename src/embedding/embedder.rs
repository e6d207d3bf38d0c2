//! The shared embedder used by both ingestion and querying.
//!
//! One owned backend serves both paths, constructed once and reused, so
//! stored and query vectors are guaranteed identical preprocessing. The
//! backend sits behind a mutex: one encode in flight per underlying compute
//! resource.

use std::sync::Mutex;

use tracing::debug;

use crate::embedding::backend::EmbeddingBackend;
use crate::embedding::pooling::mean_pool;
use crate::error::{PipelineError, PipelineResult};
use crate::types::VectorDimension;

pub struct Embedder {
    backend: Mutex<Box<dyn EmbeddingBackend>>,
    dimension: VectorDimension,
}

impl std::fmt::Debug for Embedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embedder")
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

impl Embedder {
    #[must_use]
    pub fn new(backend: Box<dyn EmbeddingBackend>) -> Self {
        let dimension = backend.dimension();
        Self {
            backend: Mutex::new(backend),
            dimension,
        }
    }

    /// Fixed width of every vector this embedder produces.
    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    /// Embeds a batch of texts into pooled vectors, one per input, in input
    /// order.
    ///
    /// # Errors
    /// `InvalidInput` for an empty list or a text with no real tokens;
    /// `ModelUnavailable` if the backend cannot encode;
    /// `DimensionMismatch` if the backend's output width drifts from the
    /// width this embedder was constructed with.
    pub fn embed_batch(&self, texts: &[String]) -> PipelineResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Err(PipelineError::InvalidInput {
                reason: "text list is empty".to_string(),
            });
        }

        let backend = self
            .backend
            .lock()
            .map_err(|_| PipelineError::ModelUnavailable {
                reason: "embedding backend lock poisoned by a panicked thread".to_string(),
            })?;

        let batch = backend.tokenize(texts, true)?;
        debug!(texts = texts.len(), seq_len = batch.seq_len(), "tokenized");

        for row in 0..batch.len() {
            if batch.real_token_count(row) == 0 {
                return Err(PipelineError::InvalidInput {
                    reason: format!("text at position {row} produced no real tokens"),
                });
            }
        }

        let token_embeddings = backend.encode(&batch)?;
        drop(backend);
        debug!(rows = token_embeddings.dim().0, "encoded");

        let pooled = mean_pool(&token_embeddings, batch.attention_mask())?;
        debug!(
            vectors = pooled.nrows(),
            dimension = pooled.ncols(),
            "pooled"
        );

        let expected = self.dimension.get();
        if pooled.ncols() != expected {
            return Err(PipelineError::DimensionMismatch {
                expected,
                actual: pooled.ncols(),
            });
        }

        Ok(pooled.outer_iter().map(|row| row.to_vec()).collect())
    }

    /// Embeds a single query string through exactly the same tokenize,
    /// encode, and pooling path as batch ingestion.
    pub fn embed_one(&self, text: &str) -> PipelineResult<Vec<f32>> {
        let texts = [text.to_string()];
        let mut vectors = self.embed_batch(&texts)?;
        vectors.pop().ok_or_else(|| PipelineError::InvalidInput {
            reason: "embedding produced no vector".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::backend::MockBackend;

    fn embedder(dimension: usize) -> Embedder {
        Embedder::new(Box::new(MockBackend::new(dimension)))
    }

    #[test]
    fn produces_one_vector_per_text_with_fixed_width() {
        let embedder = embedder(8);
        let texts = vec![
            "does this work with xbox?".to_string(),
            "is this waterproof?".to_string(),
            "how long is the cable?".to_string(),
        ];

        let vectors = embedder.embed_batch(&texts).unwrap();
        assert_eq!(vectors.len(), 3);
        for vector in &vectors {
            assert_eq!(vector.len(), 8);
            assert!(vector.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn single_text_matches_its_in_batch_vector() {
        let embedder = embedder(8);
        let query = "does this work with xbox?".to_string();
        let batch = vec![
            query.clone(),
            "a much longer question that stretches the padded batch length out".to_string(),
        ];

        let alone = embedder.embed_one(&query).unwrap();
        let together = embedder.embed_batch(&batch).unwrap();

        for (a, b) in alone.iter().zip(together[0].iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn empty_text_list_is_invalid_input() {
        let embedder = embedder(8);
        let err = embedder.embed_batch(&[]).unwrap_err();
        assert_eq!(err.status_code(), "INVALID_INPUT");
    }

    #[test]
    fn zero_real_token_text_is_invalid_input() {
        let embedder = embedder(8);
        let err = embedder.embed_one("   ").unwrap_err();
        assert_eq!(err.status_code(), "INVALID_INPUT");
    }
}
