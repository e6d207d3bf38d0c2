//! Configuration module for the retrieval pipeline.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `PQA_` and use double
//! underscores to separate nested levels:
//! - `PQA_STORE__ENDPOINT=https://search.example.com:9200` sets `store.endpoint`
//! - `PQA_CORPUS__CUTOFF=500` sets `corpus.cutoff`
//! - `PQA_EMBEDDING__BATCH_SIZE=64` sets `embedding.batch_size`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{PipelineError, PipelineResult};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Corpus source settings
    #[serde(default)]
    pub corpus: CorpusConfig,

    /// Embedding model settings
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Vector record store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Query settings
    #[serde(default)]
    pub query: QueryConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CorpusConfig {
    /// Path to the line-delimited JSON corpus file
    #[serde(default = "default_corpus_path")]
    pub path: PathBuf,

    /// Maximum number of records to ingest; `None` reads the whole file
    #[serde(default = "default_cutoff")]
    pub cutoff: Option<usize>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    /// Path to the ONNX model file
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Path to the matching tokenizer.json
    #[serde(default = "default_tokenizer_path")]
    pub tokenizer_path: PathBuf,

    /// Output width of the model
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Token sequences longer than this are truncated
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Number of texts encoded per model call during ingestion
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StoreConfig {
    /// Store endpoint URL, without a trailing slash
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Name of the k-NN index
    #[serde(default = "default_index")]
    pub index: String,

    /// Basic-auth user name, passed through to the store unchanged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Basic-auth password, passed through to the store unchanged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Request timeout in seconds for every store call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct QueryConfig {
    /// Number of nearest neighbors requested from the store
    #[serde(default = "default_k")]
    pub k: usize,

    /// Number of results printed by the CLI
    #[serde(default = "default_print_limit")]
    pub print_limit: usize,
}

// Default value functions
fn default_corpus_path() -> PathBuf {
    PathBuf::from("amazon-pqa/amazon_pqa_headsets.json")
}
fn default_cutoff() -> Option<usize> {
    Some(1000)
}
fn default_model_path() -> PathBuf {
    PathBuf::from("models/model.onnx")
}
fn default_tokenizer_path() -> PathBuf {
    PathBuf::from("models/tokenizer.json")
}
fn default_dimension() -> usize {
    768
}
fn default_max_length() -> usize {
    256
}
fn default_batch_size() -> usize {
    32
}
fn default_endpoint() -> String {
    "https://localhost:9200".to_string()
}
fn default_index() -> String {
    "nlp_pqa".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_k() -> usize {
    30
}
fn default_print_limit() -> usize {
    3
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            corpus: CorpusConfig::default(),
            embedding: EmbeddingConfig::default(),
            store: StoreConfig::default(),
            query: QueryConfig::default(),
        }
    }
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            path: default_corpus_path(),
            cutoff: default_cutoff(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            tokenizer_path: default_tokenizer_path(),
            dimension: default_dimension(),
            max_length: default_max_length(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            index: default_index(),
            username: None,
            password: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            print_limit: default_print_limit(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources: defaults, then `pqa.toml` in the
    /// current directory if present, then `PQA_`-prefixed environment
    /// variables.
    pub fn load() -> PipelineResult<Self> {
        Self::load_from("pqa.toml")
    }

    /// Load configuration from a specific file, with env overrides on top.
    pub fn load_from(path: impl AsRef<std::path::Path>) -> PipelineResult<Self> {
        Self::from_figment(
            Figment::new()
                .merge(Serialized::defaults(Settings::default()))
                .merge(Toml::file(path.as_ref())),
        )
    }

    fn from_figment(figment: Figment) -> PipelineResult<Self> {
        let settings: Settings = figment
            // Double underscore becomes a nesting dot, single underscore
            // stays inside field names.
            .merge(Env::prefixed("PQA_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(|e| PipelineError::Config {
                reason: e.to_string(),
            })?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> PipelineResult<()> {
        if self.embedding.batch_size == 0 {
            return Err(PipelineError::Config {
                reason: "embedding.batch_size must be at least 1".to_string(),
            });
        }
        if self.embedding.dimension == 0 {
            return Err(PipelineError::Config {
                reason: "embedding.dimension cannot be zero".to_string(),
            });
        }
        if self.query.k == 0 {
            return Err(PipelineError::Config {
                reason: "query.k must be at least 1".to_string(),
            });
        }
        if self.store.endpoint.trim().is_empty() {
            return Err(PipelineError::Config {
                reason: "store.endpoint is required".to_string(),
            });
        }
        Ok(())
    }
}
