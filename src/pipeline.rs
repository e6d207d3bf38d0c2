//! Ingest and query orchestration.
//!
//! One pipeline owns one embedder and one store. Ingestion embeds the
//! corpus in batches and appends records; querying embeds a single string
//! through the same path and asks the store for nearest neighbors. Each
//! query runs tokenize, encode, pool, then search; a failure at any stage
//! propagates its originating error kind with no partial results.

use tracing::{debug, info};

use crate::embedding::Embedder;
use crate::error::{PipelineError, PipelineResult};
use crate::store::{Similarity, VectorRecordStore};
use crate::types::{IndexedRecord, QueryHit, TextRecord};

/// Default number of texts encoded per model call during ingestion.
const DEFAULT_BATCH_SIZE: usize = 32;

/// Summary of a completed ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub records_indexed: usize,
    pub batches: usize,
}

/// The retrieval pipeline: one embedder and one store, shared by the
/// ingestion and query paths so stored and query vectors always live in the
/// same metric space.
pub struct Pipeline<S> {
    embedder: Embedder,
    store: S,
    batch_size: usize,
    similarity: Similarity,
}

impl<S: VectorRecordStore> Pipeline<S> {
    #[must_use]
    pub fn new(embedder: Embedder, store: S) -> Self {
        Self {
            embedder,
            store,
            batch_size: DEFAULT_BATCH_SIZE,
            similarity: Similarity::Cosine,
        }
    }

    /// Sets how many texts are encoded per model call. Batch size is a
    /// throughput choice, not a correctness one: padding and masking are
    /// identical at every size. Zero is clamped to one.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[must_use]
    pub fn with_similarity(mut self, similarity: Similarity) -> Self {
        self.similarity = similarity;
        self
    }

    #[must_use]
    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates the store index for this pipeline's embedding dimension.
    ///
    /// An index that already exists is logged and tolerated; everything
    /// else propagates.
    pub fn ensure_index(&self) -> PipelineResult<()> {
        match self
            .store
            .create_index(self.embedder.dimension(), self.similarity)
        {
            Ok(()) => {
                info!(dimension = %self.embedder.dimension(), "index created");
                Ok(())
            }
            Err(err @ PipelineError::IndexAlreadyExists { .. }) => {
                info!("{err}; reusing the existing index");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Embeds and upserts every record, in source order, in batches.
    ///
    /// Stops at the first fatal error. Records already upserted remain in
    /// the store; partial ingestion state is acceptable and expected.
    pub fn ingest(&self, records: &[TextRecord]) -> PipelineResult<IngestReport> {
        let mut report = IngestReport {
            records_indexed: 0,
            batches: 0,
        };

        for chunk in records.chunks(self.batch_size) {
            let texts: Vec<String> = chunk
                .iter()
                .map(|record| record.question().to_string())
                .collect();
            let vectors = self.embedder.embed_batch(&texts)?;

            for (vector, record) in vectors.into_iter().zip(chunk) {
                let id = self.store.upsert(&IndexedRecord::new(vector, record))?;
                debug!(id = id.get(), question = record.question(), "record upserted");
                report.records_indexed += 1;
            }
            report.batches += 1;
            debug!(
                indexed = report.records_indexed,
                total = records.len(),
                "batch complete"
            );
        }

        info!(
            records = report.records_indexed,
            batches = report.batches,
            "ingestion complete"
        );
        Ok(report)
    }

    /// Embeds one query string and returns up to `k` ranked hits.
    pub fn query(&self, text: &str, k: usize) -> PipelineResult<Vec<QueryHit>> {
        if k == 0 {
            return Err(PipelineError::InvalidInput {
                reason: "k must be at least 1".to_string(),
            });
        }

        let vector = self.embedder.embed_one(text)?;
        let hits = self.store.knn_query(&vector, k)?;
        info!(hits = hits.len(), k, "query complete");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::MockBackend;
    use crate::store::MemoryStore;
    use crate::types::VectorDimension;

    fn pipeline(batch_size: usize) -> Pipeline<MemoryStore> {
        let embedder = Embedder::new(Box::new(MockBackend::new(8)));
        let store = MemoryStore::new(VectorDimension::new(8).unwrap());
        Pipeline::new(embedder, store).with_batch_size(batch_size)
    }

    fn records(questions: &[&str]) -> Vec<TextRecord> {
        questions
            .iter()
            .map(|q| TextRecord::new(*q, format!("answer to {q}")).unwrap())
            .collect()
    }

    #[test]
    fn ensure_index_tolerates_an_existing_index() {
        let pipeline = pipeline(4);
        pipeline.ensure_index().unwrap();
        pipeline.ensure_index().unwrap();
    }

    #[test]
    fn ingest_batches_and_counts_records() {
        let pipeline = pipeline(2);
        let records = records(&["one?", "two?", "three?", "four?", "five?"]);

        let report = pipeline.ingest(&records).unwrap();
        assert_eq!(report.records_indexed, 5);
        assert_eq!(report.batches, 3);
        assert_eq!(pipeline.store().len().unwrap(), 5);
    }

    #[test]
    fn ingest_of_no_records_is_a_no_op() {
        let pipeline = pipeline(4);
        let report = pipeline.ingest(&[]).unwrap();
        assert_eq!(report.records_indexed, 0);
        assert_eq!(report.batches, 0);
    }

    #[test]
    fn query_returns_the_matching_record_first() {
        let pipeline = pipeline(4);
        pipeline.ensure_index().unwrap();
        pipeline
            .ingest(&records(&["does this work with xbox?", "is this waterproof?"]))
            .unwrap();

        let hits = pipeline.query("does this work with xbox?", 10).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].question, "does this work with xbox?");
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn zero_k_is_invalid_input() {
        let pipeline = pipeline(4);
        let err = pipeline.query("anything?", 0).unwrap_err();
        assert_eq!(err.status_code(), "INVALID_INPUT");
    }
}
