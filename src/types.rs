//! Core data-model types shared across the pipeline.
//!
//! Newtype wrappers enforce the two invariants everything else relies on:
//! every vector in an index shares one dimension, and similarity scores are
//! never NaN. Plain record structs carry the question/answer payload.

use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};

/// One question-answer pair from the corpus.
///
/// Immutable once created; the corpus reader preserves source order so
/// records stay aligned with the vectors produced for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRecord {
    question: String,
    answer: String,
}

impl TextRecord {
    /// Creates a record. Returns `None` if the question is empty, since a
    /// record with nothing to embed can never be retrieved.
    #[must_use]
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Option<Self> {
        let question = question.into();
        if question.trim().is_empty() {
            return None;
        }
        Some(Self {
            question,
            answer: answer.into(),
        })
    }

    #[must_use]
    pub fn question(&self) -> &str {
        &self.question
    }

    #[must_use]
    pub fn answer(&self) -> &str {
        &self.answer
    }
}

/// Fixed embedding width for the lifetime of an index.
///
/// Every stored and query vector must share this width; mismatches are a
/// configuration bug, not a runtime condition to recover from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorDimension(usize);

impl VectorDimension {
    /// Creates a dimension, rejecting zero.
    pub fn new(dim: usize) -> PipelineResult<Self> {
        if dim == 0 {
            return Err(PipelineError::Config {
                reason: "vector dimension cannot be zero".to_string(),
            });
        }
        Ok(Self(dim))
    }

    #[must_use]
    pub const fn get(&self) -> usize {
        self.0
    }

    /// Validates that a vector has this width.
    pub fn validate(&self, vector: &[f32]) -> PipelineResult<()> {
        if vector.len() != self.0 {
            return Err(PipelineError::DimensionMismatch {
                expected: self.0,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for VectorDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Similarity score as reported by the store; higher is more similar.
///
/// Cosine scores span [-1.0, 1.0]. The wrapper only rejects NaN, which is
/// what makes the total ordering below safe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score(f32);

impl Score {
    /// Creates a score. Returns `None` for NaN.
    #[must_use]
    pub fn new(value: f32) -> Option<Self> {
        if value.is_nan() { None } else { Some(Self(value)) }
    }

    #[must_use]
    pub fn get(&self) -> f32 {
        self.0
    }
}

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Record as persisted by the vector store.
///
/// Created once at ingestion and never mutated; re-ingestion appends new
/// records rather than updating in place. Field names match the store's
/// document schema, so this serializes directly into an upsert body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedRecord {
    pub question_vector: Vec<f32>,
    pub question: String,
    pub answer: String,
}

impl IndexedRecord {
    #[must_use]
    pub fn new(question_vector: Vec<f32>, record: &TextRecord) -> Self {
        Self {
            question_vector,
            question: record.question().to_string(),
            answer: record.answer().to_string(),
        }
    }
}

/// Opaque store-assigned identifier of an upserted record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordId(String);

impl RecordId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

/// One ranked search hit, highest-similarity first in a result list.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHit {
    pub score: Score,
    pub question: String,
    pub answer: String,
}
