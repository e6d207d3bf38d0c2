//! Error types for the retrieval pipeline.
//!
//! One taxonomy covers both the ingestion and query paths. Every variant
//! carries enough context to act on, and fatal/non-fatal classification is
//! explicit so callers never have to parse message strings.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for embedding and retrieval operations.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The embedding capability cannot tokenize or encode. Fatal: a missing
    /// or broken model is not transient, so there is no retry.
    #[error(
        "embedding model unavailable: {reason}\nSuggestion: check that the ONNX model and tokenizer files exist, are readable, and match each other"
    )]
    ModelUnavailable { reason: String },

    /// Empty text list, or a text that produced no real (non-padding)
    /// tokens. A query with no embeddable content cannot be searched.
    #[error(
        "invalid input: {reason}\nSuggestion: provide non-empty text that tokenizes to at least one real token"
    )]
    InvalidInput { reason: String },

    /// Stored and query vectors disagree on width. This is a configuration
    /// bug: the index was created with a different dimension, or the model
    /// was swapped mid-lifecycle.
    #[error(
        "vector dimension mismatch: expected {expected}, got {actual}\nSuggestion: recreate the index with the current model's dimension, or restore the model the index was built with"
    )]
    DimensionMismatch { expected: usize, actual: usize },

    /// Transport or service failure from the vector record store. Surfaced
    /// as-is; retry policy belongs to the caller.
    #[error(
        "vector store unavailable: {reason}\nSuggestion: verify the endpoint is reachable and the credentials are valid"
    )]
    StoreUnavailable { reason: String },

    /// The index already exists. Informational; ingestion may proceed
    /// against the existing index.
    #[error("index '{index}' already exists")]
    IndexAlreadyExists { index: String },

    /// Corpus file could not be opened or read.
    #[error("failed to read corpus '{path}': {source}")]
    CorpusRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A corpus line was not a valid record.
    #[error("malformed corpus record at line {line}: {reason}")]
    CorpusDecode { line: usize, reason: String },

    /// Configuration errors
    #[error("invalid configuration: {reason}")]
    Config { reason: String },
}

impl PipelineError {
    /// Whether this error must abort the current run.
    ///
    /// Only `IndexAlreadyExists` is informational; everything else stops
    /// the pipeline at the stage that raised it.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::IndexAlreadyExists { .. })
    }

    /// Stable status code for this error kind, for log fields and
    /// programmatic handling.
    #[must_use]
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::ModelUnavailable { .. } => "MODEL_UNAVAILABLE",
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            Self::StoreUnavailable { .. } => "STORE_UNAVAILABLE",
            Self::IndexAlreadyExists { .. } => "INDEX_ALREADY_EXISTS",
            Self::CorpusRead { .. } => "CORPUS_READ_ERROR",
            Self::CorpusDecode { .. } => "CORPUS_DECODE_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
        }
    }
}

/// Result type alias for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_already_exists_is_not_fatal() {
        let err = PipelineError::IndexAlreadyExists {
            index: "nlp_pqa".to_string(),
        };
        assert!(!err.is_fatal());
        assert_eq!(err.status_code(), "INDEX_ALREADY_EXISTS");
    }

    #[test]
    fn dimension_mismatch_reports_both_widths() {
        let err = PipelineError::DimensionMismatch {
            expected: 768,
            actual: 384,
        };
        assert!(err.is_fatal());
        let msg = err.to_string();
        assert!(msg.contains("768"));
        assert!(msg.contains("384"));
    }
}
