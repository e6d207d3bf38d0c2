//! OpenSearch-backed vector record store.
//!
//! Speaks the k-NN plugin's wire contract: a `knn_vector` mapping at index
//! creation, one document per record, and a `knn` query clause for
//! retrieval. The HTTP client is built once with its timeout and reused for
//! every call, so connection lifetime is owned by the store value itself.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};
use crate::store::{Credentials, Similarity, VectorRecordStore};
use crate::types::{IndexedRecord, QueryHit, RecordId, Score, VectorDimension};

#[derive(Debug)]
pub struct OpenSearchStore {
    client: Client,
    endpoint: String,
    index: String,
    credentials: Option<Credentials>,
    dimension: VectorDimension,
}

impl OpenSearchStore {
    /// Builds a store client for one index.
    ///
    /// `timeout` bounds every request this store makes, which is also how a
    /// query's wait on the store is aborted: the pipeline holds no mutable
    /// cross-call state, so a timed-out call leaves nothing to clean up.
    pub fn new(
        endpoint: &str,
        index: &str,
        credentials: Option<Credentials>,
        timeout: Duration,
        dimension: VectorDimension,
    ) -> PipelineResult<Self> {
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(PipelineError::Config {
                reason: format!("store endpoint must be an http(s) URL, got '{endpoint}'"),
            });
        }
        if index.trim().is_empty() {
            return Err(PipelineError::Config {
                reason: "store index name is required".to_string(),
            });
        }

        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            PipelineError::StoreUnavailable {
                reason: format!("failed to build HTTP client: {e}"),
            }
        })?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            index: index.to_string(),
            credentials,
            dimension,
        })
    }

    fn index_url(&self) -> String {
        format!("{}/{}", self.endpoint, self.index)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some(credentials) => {
                request.basic_auth(&credentials.username, Some(&credentials.password))
            }
            None => request,
        }
    }
}

fn transport(e: reqwest::Error) -> PipelineError {
    PipelineError::StoreUnavailable {
        reason: e.to_string(),
    }
}

fn service_error(operation: &str, status: StatusCode, body: &str) -> PipelineError {
    let snippet: String = body.chars().take(200).collect();
    PipelineError::StoreUnavailable {
        reason: format!("{operation} failed with {status}: {snippet}"),
    }
}

fn space_type(similarity: Similarity) -> &'static str {
    match similarity {
        Similarity::Cosine => "cosinesimil",
        Similarity::Euclidean => "l2",
    }
}

fn create_index_body(dimension: VectorDimension, similarity: Similarity) -> serde_json::Value {
    json!({
        "settings": {
            "index.knn": true,
            "index.knn.space_type": space_type(similarity),
        },
        "mappings": {
            "properties": {
                "question_vector": {
                    "type": "knn_vector",
                    "dimension": dimension.get(),
                    "store": true,
                },
                "question": {"type": "text", "store": true},
                "answer": {"type": "text", "store": true},
            }
        }
    })
}

fn knn_query_body(vector: &[f32], k: usize) -> serde_json::Value {
    json!({
        "size": k,
        "query": {
            "knn": {
                "question_vector": {
                    "vector": vector,
                    "k": k,
                }
            }
        }
    })
}

#[derive(Debug, Deserialize)]
struct UpsertResponse {
    #[serde(rename = "_id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: SearchHits,
}

#[derive(Debug, Deserialize)]
struct SearchHits {
    hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "_score")]
    score: f32,
    #[serde(rename = "_source")]
    source: HitSource,
}

#[derive(Debug, Deserialize)]
struct HitSource {
    question: String,
    answer: String,
}

impl VectorRecordStore for OpenSearchStore {
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

        let response = self
            .authorize(self.client.put(self.index_url()))
            .json(&create_index_body(dimension, similarity))
            .send()
            .map_err(transport)?;

        let status = response.status();
        if status.is_success() {
            debug!(index = %self.index, dimension = dimension.get(), "index created");
            return Ok(());
        }

        let body = response.text().unwrap_or_default();
        if status == StatusCode::BAD_REQUEST && body.contains("resource_already_exists_exception")
        {
            return Err(PipelineError::IndexAlreadyExists {
                index: self.index.clone(),
            });
        }
        Err(service_error("create index", status, &body))
    }

    fn upsert(&self, record: &IndexedRecord) -> PipelineResult<RecordId> {
        self.dimension.validate(&record.question_vector)?;

        let response = self
            .authorize(self.client.post(format!("{}/_doc", self.index_url())))
            .json(record)
            .send()
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(service_error("upsert", status, &body));
        }

        let body: UpsertResponse =
            response.json().map_err(|e| PipelineError::StoreUnavailable {
                reason: format!("unexpected upsert response: {e}"),
            })?;
        Ok(RecordId::new(body.id))
    }

    fn knn_query(&self, vector: &[f32], k: usize) -> PipelineResult<Vec<QueryHit>> {
        self.dimension.validate(vector)?;

        let response = self
            .authorize(self.client.post(format!("{}/_search", self.index_url())))
            .json(&knn_query_body(vector, k))
            .send()
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(service_error("knn query", status, &body));
        }

        let body: SearchResponse =
            response.json().map_err(|e| PipelineError::StoreUnavailable {
                reason: format!("unexpected search response: {e}"),
            })?;

        let mut hits = Vec::with_capacity(body.hits.hits.len().min(k));
        for hit in body.hits.hits.into_iter().take(k) {
            let score = Score::new(hit.score).ok_or_else(|| PipelineError::StoreUnavailable {
                reason: "store returned a NaN score".to_string(),
            })?;
            hits.push(QueryHit {
                score,
                question: hit.source.question,
                answer: hit.source.answer,
            });
        }
        debug!(hits = hits.len(), k, "knn query complete");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_endpoints() {
        let err = OpenSearchStore::new(
            "search.example.com:9200",
            "nlp_pqa",
            None,
            Duration::from_secs(5),
            VectorDimension::new(768).unwrap(),
        )
        .unwrap_err();
        assert_eq!(err.status_code(), "CONFIG_ERROR");
    }

    #[test]
    fn trailing_slash_is_stripped_from_the_endpoint() {
        let store = OpenSearchStore::new(
            "https://localhost:9200/",
            "nlp_pqa",
            None,
            Duration::from_secs(5),
            VectorDimension::new(768).unwrap(),
        )
        .unwrap();
        assert_eq!(store.index_url(), "https://localhost:9200/nlp_pqa");
    }

    #[test]
    fn create_index_body_maps_the_vector_field() {
        let body = create_index_body(VectorDimension::new(768).unwrap(), Similarity::Cosine);

        assert_eq!(body["settings"]["index.knn"], true);
        assert_eq!(body["settings"]["index.knn.space_type"], "cosinesimil");
        let vector_field = &body["mappings"]["properties"]["question_vector"];
        assert_eq!(vector_field["type"], "knn_vector");
        assert_eq!(vector_field["dimension"], 768);
    }

    #[test]
    fn euclidean_maps_to_the_l2_space_type() {
        assert_eq!(space_type(Similarity::Euclidean), "l2");
    }

    #[test]
    fn knn_query_body_carries_vector_and_k() {
        let body = knn_query_body(&[0.25, -0.5], 30);
        assert_eq!(body["size"], 30);
        assert_eq!(body["query"]["knn"]["question_vector"]["k"], 30);
        assert_eq!(
            body["query"]["knn"]["question_vector"]["vector"],
            serde_json::json!([0.25, -0.5])
        );
    }

    #[test]
    fn search_response_parses_scores_and_sources() {
        let raw = r#"{
            "took": 3,
            "hits": {
                "total": {"value": 2, "relation": "eq"},
                "hits": [
                    {"_id": "a1", "_score": 0.98, "_source": {
                        "question": "does this work with xbox?",
                        "answer": "yes with an adapter",
                        "question_vector": [0.1, 0.2]
                    }},
                    {"_id": "b2", "_score": 0.41, "_source": {
                        "question": "is this waterproof?",
                        "answer": "no",
                        "question_vector": [0.3, 0.4]
                    }}
                ]
            }
        }"#;

        let parsed: SearchResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.hits.hits.len(), 2);
        assert_eq!(parsed.hits.hits[0].score, 0.98);
        assert_eq!(parsed.hits.hits[0].source.answer, "yes with an adapter");
    }
}
