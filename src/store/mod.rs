//! Vector record store: the minimal storage/query contract the pipeline
//! needs, plus the two backends that honor it.
//!
//! The store is an external collaborator. The pipeline only ever creates an
//! index, appends records, and asks for nearest neighbors; wire protocol,
//! authentication details, and index administration stay on the other side
//! of this trait.

mod memory;
mod opensearch;

pub use memory::MemoryStore;
pub use opensearch::OpenSearchStore;

use serde::{Deserialize, Serialize};

use crate::error::PipelineResult;
use crate::types::{IndexedRecord, QueryHit, RecordId, VectorDimension};

/// Similarity metric an index is configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Similarity {
    Cosine,
    Euclidean,
}

/// Basic-auth credentials, passed through to the store unchanged.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The pipeline's contract with the vector record store.
///
/// Ingestion is append-only: `upsert` never deduplicates and records are
/// never mutated after creation. Network and service failures surface as
/// `StoreUnavailable`; the pipeline performs no internal retries, so retry
/// policy belongs to the caller.
pub trait VectorRecordStore: Send + Sync {
    /// Creates the k-NN index. Not idempotent: an existing index yields
    /// `IndexAlreadyExists`, which callers may treat as informational.
    fn create_index(
        &self,
        dimension: VectorDimension,
        similarity: Similarity,
    ) -> PipelineResult<()>;

    /// Appends one record, returning the store-assigned id.
    fn upsert(&self, record: &IndexedRecord) -> PipelineResult<RecordId>;

    /// Returns up to `k` nearest records by the index's similarity metric,
    /// ranked descending by score. Fails with `DimensionMismatch` when the
    /// query vector's width disagrees with the index.
    fn knn_query(&self, vector: &[f32], k: usize) -> PipelineResult<Vec<QueryHit>>;
}
