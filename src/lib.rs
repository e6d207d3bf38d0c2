//! Semantic question-answer retrieval.
//!
//! Free-text questions become fixed-width vectors through a tokenize,
//! encode, mean-pool path; a k-NN-capable record store ranks stored
//! questions against a query vector by cosine similarity. Ingestion and
//! querying share one embedder so both sides of the comparison get
//! identical preprocessing.

pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod pipeline;
pub mod store;
pub mod types;

// Explicit exports for better API clarity
pub use config::Settings;
pub use corpus::CorpusReader;
pub use embedding::{
    Embedder, EmbeddingBackend, OnnxBackend, TokenBatch, TokenEmbeddingTensor, mean_pool,
};
pub use error::{PipelineError, PipelineResult};
pub use pipeline::{IngestReport, Pipeline};
pub use store::{Credentials, MemoryStore, OpenSearchStore, Similarity, VectorRecordStore};
pub use types::{IndexedRecord, QueryHit, RecordId, Score, TextRecord, VectorDimension};
