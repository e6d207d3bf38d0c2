//! Text embedding for question retrieval.
//!
//! This module owns the path from free text to fixed-width vectors: the
//! tokenize/encode capability contract, the ONNX model backend, and
//! mask-aware mean pooling. Ingestion and querying share one [`Embedder`]
//! so stored and query vectors always live in the same metric space.

mod backend;
mod embedder;
mod onnx;
mod pooling;

#[cfg(test)]
pub use backend::MockBackend;
pub use backend::{EmbeddingBackend, TokenBatch, TokenEmbeddingTensor};
pub use embedder::Embedder;
pub use onnx::OnnxBackend;
pub use pooling::mean_pool;
