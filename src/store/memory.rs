//! In-memory vector record store with brute-force cosine ranking.
//!
//! Serves two roles: a lightweight local backend for small corpora, and a
//! drop-in stand-in for the HTTP store in tests, since it honors the same
//! contract including dimension checks and append-only upserts.

use std::sync::{Mutex, MutexGuard};

use crate::error::{PipelineError, PipelineResult};
use crate::store::{Similarity, VectorRecordStore};
use crate::types::{IndexedRecord, QueryHit, RecordId, Score, VectorDimension};

pub struct MemoryStore {
    dimension: VectorDimension,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    created: bool,
    records: Vec<IndexedRecord>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(dimension: VectorDimension) -> Self {
        Self {
            dimension,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> PipelineResult<usize> {
        Ok(self.lock()?.records.len())
    }

    pub fn is_empty(&self) -> PipelineResult<bool> {
        Ok(self.lock()?.records.is_empty())
    }

    fn lock(&self) -> PipelineResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| PipelineError::StoreUnavailable {
                reason: "memory store lock poisoned by a panicked thread".to_string(),
            })
    }
}

impl VectorRecordStore for MemoryStore {
    fn create_index(
        &self,
        dimension: VectorDimension,
        similarity: Similarity,
    ) -> PipelineResult<()> {
        if dimension != self.dimension {
            return Err(PipelineError::DimensionMismatch {
                expected: self.dimension.get(),
                actual: dimension.get(),
            });
        }
        if similarity != Similarity::Cosine {
            return Err(PipelineError::Config {
                reason: "the in-memory store only ranks by cosine similarity".to_string(),
            });
        }

        let mut inner = self.lock()?;
        if inner.created {
            return Err(PipelineError::IndexAlreadyExists {
                index: "memory".to_string(),
            });
        }
        inner.created = true;
        Ok(())
    }

    fn upsert(&self, record: &IndexedRecord) -> PipelineResult<RecordId> {
        self.dimension.validate(&record.question_vector)?;
        let mut inner = self.lock()?;
        inner.records.push(record.clone());
        Ok(RecordId::new((inner.records.len() - 1).to_string()))
    }

    fn knn_query(&self, vector: &[f32], k: usize) -> PipelineResult<Vec<QueryHit>> {
        self.dimension.validate(vector)?;
        let inner = self.lock()?;

        let mut hits = Vec::with_capacity(inner.records.len());
        for record in &inner.records {
            let Some(score) = Score::new(cosine_similarity(vector, &record.question_vector))
            else {
                continue;
            };
            hits.push(QueryHit {
                score,
                question: record.question.clone(),
                answer: record.answer.clone(),
            });
        }

        // Stable sort: equal scores keep insertion order.
        hits.sort_by(|a, b| b.score.cmp(&a.score));
        hits.truncate(k);
        Ok(hits)
    }
}

/// Cosine similarity between two vectors; 0.0 when either has zero
/// magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}
