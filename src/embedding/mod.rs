//! Embedding client abstraction and the OpenAI-compatible HTTP adapter.
//!
//! The coordinator never sees a provider's raw response shape: the HTTP adapter
//! normalizes whatever comes back into [`EmbeddingResult`] values, one per input text,
//! in input order.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// HTTP layer failed before receiving a response.
    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Provider responded with an unexpected status code.
    #[error("unexpected embedding provider response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the provider.
        status: reqwest::StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Provider base URL could not be used to build a client.
    #[error("invalid embedding provider configuration: {0}")]
    InvalidConfig(String),
}

/// Caller-supplied description of the embedding provider to use for a batch.
#[derive(Debug, Clone)]
pub struct EmbeddingProviderConfig {
    /// Base URL of the provider (OpenAI-compatible `/embeddings` surface).
    pub base_url: String,
    /// Optional bearer token.
    pub api_key: Option<String>,
    /// Model identifier passed through to the provider.
    pub model: String,
    /// Number of texts submitted per request.
    pub batch_size: usize,
    /// Fallback dense dimension when the provider returns no vectors to measure.
    pub dense_dim_hint: Option<usize>,
}

/// Sparse vector component of an embedding, when the provider produces one.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseVector {
    /// Indices of the non-zero entries.
    pub indices: Vec<u32>,
    /// Values at those indices.
    pub values: Vec<f32>,
}

/// Normalized embedding for one input text.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingResult {
    /// Dense vector representation.
    pub dense: Vec<f32>,
    /// Optional sparse representation; no consumer in this crate requires it.
    pub sparse: Option<SparseVector>,
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce one normalized embedding per supplied text, preserving input order.
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<EmbeddingResult>, EmbeddingClientError>;
}

/// HTTP adapter for OpenAI-compatible embedding endpoints.
#[derive(Debug)]
pub struct HttpEmbeddingClient {
    client: Client,
    config: EmbeddingProviderConfig,
}

impl HttpEmbeddingClient {
    /// Build a client for the given provider configuration.
    pub fn new(config: EmbeddingProviderConfig) -> Result<Self, EmbeddingClientError> {
        if config.base_url.trim().is_empty() {
            return Err(EmbeddingClientError::InvalidConfig(
                "base_url must not be empty".to_string(),
            ));
        }
        let client = Client::builder().user_agent("tenderscout/0.2").build()?;
        Ok(Self { client, config })
    }

    async fn embed_batch(
        &self,
        batch: &[String],
    ) -> Result<Vec<EmbeddingResult>, EmbeddingClientError> {
        let endpoint = format!(
            "{}/embeddings",
            self.config.base_url.trim_end_matches('/')
        );
        let mut request = self.client.post(&endpoint).json(&json!({
            "model": self.config.model,
            "input": batch,
        }));
        if let Some(api_key) = self
            .config
            .api_key
            .as_ref()
            .filter(|value| !value.is_empty())
        {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = EmbeddingClientError::UnexpectedStatus { status, body };
            tracing::error!(model = %self.config.model, error = %error, "Embedding request failed");
            return Err(error);
        }

        let payload: EmbeddingResponse = response.json().await?;
        Ok(normalize_response(payload))
    }
}

#[async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    async fn embed(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<EmbeddingResult>, EmbeddingClientError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let batch_size = self.config.batch_size.max(1);
        let mut results = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size) {
            tracing::debug!(
                model = %self.config.model,
                batch = batch.len(),
                "Requesting embeddings"
            );
            results.extend(self.embed_batch(batch).await?);
        }
        Ok(results)
    }
}

/// Normalization step decoupling consumers from the provider's wire shape.
fn normalize_response(payload: EmbeddingResponse) -> Vec<EmbeddingResult> {
    let mut data = payload.data;
    data.sort_by_key(|item| item.index);
    data.into_iter()
        .map(|item| EmbeddingResult {
            dense: item.embedding,
            sparse: item.sparse_embedding.map(|sparse| SparseVector {
                indices: sparse.indices,
                values: sparse.values,
            }),
        })
        .collect()
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
    #[serde(default)]
    sparse_embedding: Option<SparseItem>,
}

#[derive(Deserialize)]
struct SparseItem {
    indices: Vec<u32>,
    values: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn provider_config(base_url: &str, batch_size: usize) -> EmbeddingProviderConfig {
        EmbeddingProviderConfig {
            base_url: base_url.to_string(),
            api_key: Some("secret".to_string()),
            model: "test-embed".to_string(),
            batch_size,
            dense_dim_hint: Some(4),
        }
    }

    #[tokio::test]
    async fn embeds_a_batch_and_normalizes_order() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/embeddings")
                    .header("authorization", "Bearer secret")
                    .json_body_partial(r#"{"model": "test-embed"}"#);
                then.status(200).json_body(serde_json::json!({
                    "object": "list",
                    "data": [
                        { "index": 1, "embedding": [0.3, 0.4] },
                        { "index": 0, "embedding": [0.1, 0.2] }
                    ]
                }));
            })
            .await;

        let client = HttpEmbeddingClient::new(provider_config(
            &format!("{}/v1", server.base_url()),
            32,
        ))
        .expect("client builds");

        let results = client
            .embed(vec!["first".to_string(), "second".to_string()])
            .await
            .expect("embedding succeeds");

        mock.assert();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].dense, vec![0.1, 0.2]);
        assert_eq!(results[1].dense, vec![0.3, 0.4]);
        assert!(results[0].sparse.is_none());
    }

    #[tokio::test]
    async fn splits_input_into_batches() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(200).json_body(serde_json::json!({
                    "data": [{ "index": 0, "embedding": [1.0] }]
                }));
            })
            .await;

        let client = HttpEmbeddingClient::new(provider_config(&server.base_url(), 1))
            .expect("client builds");
        let results = client
            .embed(vec!["a".to_string(), "b".to_string(), "c".to_string()])
            .await
            .expect("embedding succeeds");

        assert_eq!(mock.hits_async().await, 3);
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn provider_error_is_surfaced() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(500).body("backend exploded");
            })
            .await;

        let client = HttpEmbeddingClient::new(provider_config(&server.base_url(), 8))
            .expect("client builds");
        let error = client
            .embed(vec!["text".to_string()])
            .await
            .expect_err("embedding fails");
        assert!(matches!(
            error,
            EmbeddingClientError::UnexpectedStatus { .. }
        ));
    }

    #[test]
    fn normalization_carries_sparse_vectors() {
        let payload = EmbeddingResponse {
            data: vec![EmbeddingItem {
                index: 0,
                embedding: vec![0.5],
                sparse_embedding: Some(SparseItem {
                    indices: vec![3, 7],
                    values: vec![0.9, 0.1],
                }),
            }],
        };
        let normalized = normalize_response(payload);
        let sparse = normalized[0].sparse.as_ref().expect("sparse present");
        assert_eq!(sparse.indices, vec![3, 7]);
        assert_eq!(sparse.values, vec![0.9, 0.1]);
    }

    #[test]
    fn empty_base_url_is_rejected() {
        let error = HttpEmbeddingClient::new(provider_config("  ", 8)).unwrap_err();
        assert!(matches!(error, EmbeddingClientError::InvalidConfig(_)));
    }
}
