//! Shared types used by the Qdrant client and helpers.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors returned while interacting with Qdrant.
#[derive(Debug, Error)]
pub enum QdrantError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid Qdrant URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Qdrant responded with an unexpected status code.
    #[error("Unexpected Qdrant response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from Qdrant.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// One chunk embedding prepared for indexing.
#[derive(Debug, Clone)]
pub struct DensePoint {
    /// Deterministic chunk identifier, stored as a payload attribute.
    pub chunk_id: String,
    /// Logical collection (knowledge base) the chunk belongs to.
    pub collection_id: String,
    /// Identifier of the source document.
    pub document_id: String,
    /// Caller-supplied category label.
    pub category: String,
    /// Dense vector; `None` is tolerated and stored as an all-zero vector.
    pub vector: Option<Vec<f32>>,
}

/// Optional constraints applied to dense similarity searches.
#[derive(Debug, Default, Clone)]
pub struct DenseFilterArgs {
    /// Restrict hits to these logical collections.
    pub collection_ids: Vec<String>,
    /// Restrict hits to these categories.
    pub categories: Vec<String>,
}

/// Scored similarity hit returned by the dense store.
#[derive(Debug, Clone)]
pub struct DenseHit {
    /// Originating chunk identifier.
    pub chunk_id: String,
    /// Originating document identifier.
    pub document_id: String,
    /// Stored category, when present.
    pub category: Option<String>,
    /// Normalized cosine similarity score.
    pub score: f32,
}

#[derive(Deserialize)]
pub(crate) struct CollectionInfoResponse {
    pub(crate) result: CollectionInfo,
}

#[derive(Deserialize)]
pub(crate) struct CollectionInfo {
    pub(crate) config: CollectionConfig,
}

#[derive(Deserialize)]
pub(crate) struct CollectionConfig {
    pub(crate) params: CollectionParams,
}

#[derive(Deserialize)]
pub(crate) struct CollectionParams {
    pub(crate) vectors: VectorParams,
}

#[derive(Deserialize)]
pub(crate) struct VectorParams {
    pub(crate) size: u64,
}

#[derive(Deserialize)]
pub(crate) struct QueryResponse {
    pub(crate) result: QueryResponseResult,
}

#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum QueryResponseResult {
    Points(Vec<QueryPoint>),
    Object {
        #[serde(default)]
        points: Vec<QueryPoint>,
    },
}

#[derive(Deserialize)]
pub(crate) struct QueryPoint {
    pub(crate) score: f32,
    #[serde(default)]
    pub(crate) payload: Option<Map<String, Value>>,
}
