//! HTTP client wrapper for interacting with Qdrant.

use crate::config::get_config;
use crate::qdrant::{
    filters::{build_search_filter, chunk_ids_filter, collection_filter, document_filter},
    types::{
        CollectionInfoResponse, DenseFilterArgs, DenseHit, DensePoint, QdrantError, QueryResponse,
        QueryResponseResult,
    },
};
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

/// Lightweight HTTP client for the dense vector store.
///
/// The collection's vector dimension is a property of the collection itself: writes at a
/// different dimension destructively recreate the collection, which invalidates every
/// previously indexed vector for all consumers. Dimension changes are expected only during
/// a controlled embedding-provider migration.
pub struct QdrantStore {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
}

impl QdrantStore {
    /// Construct a client for an explicit endpoint.
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, QdrantError> {
        let client = Client::builder()
            .user_agent("tenderscout/0.2")
            .build()?;
        let base_url = normalize_base_url(base_url).map_err(QdrantError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            has_api_key = api_key.as_deref().map(|value| !value.is_empty()).unwrap_or(false),
            "Initialized Qdrant HTTP client"
        );
        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Construct a client using configuration derived from the environment.
    pub fn from_config() -> Result<Self, QdrantError> {
        let config = get_config();
        Self::new(&config.qdrant_url, config.qdrant_api_key.clone())
    }

    /// Make sure the collection exists with the requested vector dimension.
    ///
    /// A missing collection is created; an existing collection at a different dimension is
    /// dropped and recreated, discarding all previously indexed vectors.
    pub async fn ensure_collection(
        &self,
        collection_name: &str,
        vector_size: u64,
    ) -> Result<(), QdrantError> {
        match self.collection_dimension(collection_name).await? {
            Some(existing) if existing == vector_size => return Ok(()),
            Some(existing) => {
                tracing::warn!(
                    collection = collection_name,
                    existing_dimension = existing,
                    new_dimension = vector_size,
                    "Vector dimension changed; dropping and recreating collection"
                );
                self.drop_collection(collection_name).await?;
            }
            None => {
                tracing::debug!(
                    collection = collection_name,
                    vector_size,
                    "Creating collection"
                );
            }
        }

        self.create_collection(collection_name, vector_size).await?;
        self.ensure_payload_indexes(collection_name).await
    }

    /// Report the vector dimension of an existing collection, or `None` when missing.
    pub async fn collection_dimension(
        &self,
        collection_name: &str,
    ) -> Result<Option<u64>, QdrantError> {
        let response = self
            .request(Method::GET, &format!("collections/{collection_name}"))?
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let payload: CollectionInfoResponse = response.json().await?;
                Ok(Some(payload.result.config.params.vectors.size))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::error!(collection = collection_name, error = %error, "Collection lookup failed");
                Err(error)
            }
        }
    }

    /// Create or update a collection with the specified vector size.
    pub async fn create_collection(
        &self,
        collection_name: &str,
        vector_size: u64,
    ) -> Result<(), QdrantError> {
        let body = json!({
            "vectors": {
                "size": vector_size,
                "distance": "Cosine"
            }
        });

        let response = self
            .request(Method::PUT, &format!("collections/{collection_name}"))?
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = collection_name, "Collection ensured/created");
        })
        .await
    }

    /// Drop a collection and everything in it.
    pub async fn drop_collection(&self, collection_name: &str) -> Result<(), QdrantError> {
        let response = self
            .request(Method::DELETE, &format!("collections/{collection_name}"))?
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = collection_name, "Collection dropped");
        })
        .await
    }

    /// Upsert a document's chunk vectors: delete stale points for the same chunk ids, then
    /// insert the fresh ones.
    ///
    /// Idempotent but not atomic; a crash between delete and insert can transiently drop a
    /// chunk from the index, and re-ingestion repairs it.
    pub async fn upsert_chunks(
        &self,
        collection_name: &str,
        points: Vec<DensePoint>,
        vector_size: u64,
    ) -> Result<(), QdrantError> {
        if points.is_empty() {
            return Ok(());
        }

        let chunk_ids: Vec<String> = points.iter().map(|point| point.chunk_id.clone()).collect();
        self.delete_by_filter(collection_name, chunk_ids_filter(&chunk_ids))
            .await?;

        let serialized: Vec<_> = points
            .into_iter()
            .map(|point| {
                json!({
                    "id": Uuid::new_v4().to_string(),
                    "vector": fit_vector(point.vector, vector_size),
                    "payload": {
                        "chunk_id": point.chunk_id,
                        "collection_id": point.collection_id,
                        "document_id": point.document_id,
                        "category": point.category,
                    }
                })
            })
            .collect();

        let point_count = serialized.len();
        let response = self
            .request(
                Method::PUT,
                &format!("collections/{collection_name}/points"),
            )?
            .query(&[("wait", true)])
            .json(&json!({ "points": serialized }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(
                collection = collection_name,
                points = point_count,
                "Points indexed"
            );
        })
        .await
    }

    /// Delete every vector belonging to one source document.
    pub async fn delete_document(
        &self,
        collection_name: &str,
        document_id: &str,
    ) -> Result<(), QdrantError> {
        self.delete_by_filter(collection_name, document_filter(document_id))
            .await
    }

    /// Delete every vector belonging to one logical collection.
    pub async fn delete_collection_entries(
        &self,
        collection_name: &str,
        collection_id: &str,
    ) -> Result<(), QdrantError> {
        self.delete_by_filter(collection_name, collection_filter(collection_id))
            .await
    }

    /// Cosine top-K similarity search with optional collection/category constraints.
    ///
    /// A collection that does not exist yet yields an empty result set, not an error.
    pub async fn search(
        &self,
        collection_name: &str,
        vector: Vec<f32>,
        limit: usize,
        args: &DenseFilterArgs,
    ) -> Result<Vec<DenseHit>, QdrantError> {
        let mut body = serde_json::Map::new();
        body.insert("query".into(), json!(vector));
        body.insert("limit".into(), json!(limit));
        body.insert("with_payload".into(), json!(true));
        if let Some(filter) = build_search_filter(args) {
            body.insert("filter".into(), filter);
        }
        let body = Value::Object(body);

        let response = self
            .request(
                Method::POST,
                &format!("collections/{collection_name}/points/query"),
            )?
            .json(&body)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(
                collection = collection_name,
                "Search against missing collection"
            );
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(collection = collection_name, error = %error, "Qdrant search failed");
            return Err(error);
        }

        let payload: QueryResponse = response.json().await?;
        let points = match payload.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points } => points,
        };
        let hits = points
            .into_iter()
            .map(|point| {
                let payload = point.payload.unwrap_or_default();
                DenseHit {
                    chunk_id: payload_string(&payload, "chunk_id"),
                    document_id: payload_string(&payload, "document_id"),
                    category: payload
                        .get("category")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    score: point.score,
                }
            })
            .collect();
        Ok(hits)
    }

    /// Ensure keyword payload indexes exist for the filterable attributes.
    pub async fn ensure_payload_indexes(&self, collection_name: &str) -> Result<(), QdrantError> {
        let fields = ["chunk_id", "collection_id", "document_id", "category"];

        for field in fields {
            let body = json!({
                "field_name": field,
                "field_schema": "keyword",
            });

            let response = self
                .request(Method::PUT, &format!("collections/{collection_name}/index"))?
                .json(&body)
                .send()
                .await?;

            if response.status().is_success() {
                tracing::debug!(collection = collection_name, field, "Payload index ensured");
            } else if response.status() == StatusCode::CONFLICT {
                tracing::debug!(
                    collection = collection_name,
                    field,
                    "Payload index already exists"
                );
            } else {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::warn!(collection = collection_name, field, error = %error, "Failed to ensure payload index");
            }
        }

        Ok(())
    }

    async fn delete_by_filter(
        &self,
        collection_name: &str,
        filter: Value,
    ) -> Result<(), QdrantError> {
        let response = self
            .request(
                Method::POST,
                &format!("collections/{collection_name}/points/delete"),
            )?
            .query(&[("wait", true)])
            .json(&json!({ "filter": filter }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = collection_name, "Points deleted by filter");
        })
        .await
    }

    fn request(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder, QdrantError> {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        Ok(req)
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), QdrantError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Qdrant request failed");
            Err(error)
        }
    }
}

/// Fit a vector to the collection dimension: zero-pad short vectors, truncate long ones,
/// and substitute an all-zero vector when none was produced.
pub(crate) fn fit_vector(vector: Option<Vec<f32>>, vector_size: u64) -> Vec<f32> {
    let size = vector_size as usize;
    match vector {
        None => vec![0.0; size],
        Some(mut vector) => {
            if vector.len() != size {
                tracing::debug!(
                    actual = vector.len(),
                    expected = size,
                    "Fitting vector to collection dimension"
                );
            }
            vector.resize(size, 0.0);
            vector
        }
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

fn payload_string(payload: &serde_json::Map<String, Value>, key: &str) -> String {
    payload
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{
        Method::{DELETE, GET, POST, PUT},
        MockServer,
    };

    fn store_for(server: &MockServer) -> QdrantStore {
        QdrantStore {
            client: Client::builder()
                .user_agent("tenderscout-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
            api_key: None,
        }
    }

    fn point(chunk_id: &str, vector: Option<Vec<f32>>) -> DensePoint {
        DensePoint {
            chunk_id: chunk_id.to_string(),
            collection_id: "kb-1".to_string(),
            document_id: "d-1".to_string(),
            category: "web".to_string(),
            vector,
        }
    }

    #[test]
    fn fit_vector_pads_truncates_and_defaults() {
        assert_eq!(fit_vector(Some(vec![1.0, 2.0]), 4), vec![1.0, 2.0, 0.0, 0.0]);
        assert_eq!(fit_vector(Some(vec![1.0, 2.0, 3.0]), 2), vec![1.0, 2.0]);
        assert_eq!(fit_vector(None, 3), vec![0.0, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn search_emits_expected_request_and_maps_hits() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/tenders/points/query");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": [
                        {
                            "id": "7e6c",
                            "score": 0.87,
                            "payload": {
                                "chunk_id": "c-1",
                                "document_id": "d-1",
                                "category": "web"
                            }
                        }
                    ]
                }));
            })
            .await;

        let store = store_for(&server);
        let hits = store
            .search(
                "tenders",
                vec![0.1, 0.2],
                5,
                &DenseFilterArgs {
                    collection_ids: vec!["kb-1".into()],
                    categories: vec![],
                },
            )
            .await
            .expect("search request");

        mock.assert();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "c-1");
        assert_eq!(hits[0].document_id, "d-1");
        assert_eq!(hits[0].category.as_deref(), Some("web"));
        assert!((hits[0].score - 0.87).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn search_on_missing_collection_returns_empty() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/absent/points/query");
                then.status(404).body("not found");
            })
            .await;

        let store = store_for(&server);
        let hits = store
            .search("absent", vec![0.1], 5, &DenseFilterArgs::default())
            .await
            .expect("search tolerates missing collection");
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn upsert_deletes_stale_points_before_inserting() {
        let server = MockServer::start_async().await;
        let delete_mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/tenders/points/delete")
                    .json_body_partial(
                        r#"{"filter": {"must": [{"key": "chunk_id", "match": {"any": ["c-1"]}}]}}"#,
                    );
                then.status(200).json_body(json!({
                    "status": "ok", "time": 0.0, "result": { "status": "completed" }
                }));
            })
            .await;
        let put_mock = server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/tenders/points");
                then.status(200).json_body(json!({
                    "status": "ok", "time": 0.0, "result": { "status": "completed" }
                }));
            })
            .await;

        let store = store_for(&server);
        store
            .upsert_chunks("tenders", vec![point("c-1", Some(vec![0.5, 0.5]))], 2)
            .await
            .expect("upsert succeeds");

        delete_mock.assert();
        put_mock.assert();
    }

    #[tokio::test]
    async fn dimension_change_drops_and_recreates_the_collection() {
        let server = MockServer::start_async().await;
        let info_mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/tenders");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": {
                        "config": { "params": { "vectors": { "size": 384, "distance": "Cosine" } } }
                    }
                }));
            })
            .await;
        let drop_mock = server
            .mock_async(|when, then| {
                when.method(DELETE).path("/collections/tenders");
                then.status(200)
                    .json_body(json!({ "status": "ok", "time": 0.0, "result": true }));
            })
            .await;
        let create_mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/tenders")
                    .json_body_partial(r#"{"vectors": {"size": 768}}"#);
                then.status(200)
                    .json_body(json!({ "status": "ok", "time": 0.0, "result": true }));
            })
            .await;
        let index_mock = server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/tenders/index");
                then.status(200)
                    .json_body(json!({ "status": "ok", "time": 0.0, "result": {} }));
            })
            .await;

        let store = store_for(&server);
        store
            .ensure_collection("tenders", 768)
            .await
            .expect("ensure succeeds");

        info_mock.assert();
        drop_mock.assert();
        create_mock.assert();
        assert_eq!(index_mock.hits_async().await, 4);
    }

    #[tokio::test]
    async fn matching_dimension_leaves_collection_alone() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/tenders");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": {
                        "config": { "params": { "vectors": { "size": 768, "distance": "Cosine" } } }
                    }
                }));
            })
            .await;
        let drop_mock = server
            .mock_async(|when, then| {
                when.method(DELETE).path("/collections/tenders");
                then.status(200)
                    .json_body(json!({ "status": "ok", "time": 0.0, "result": true }));
            })
            .await;

        let store = store_for(&server);
        store
            .ensure_collection("tenders", 768)
            .await
            .expect("ensure succeeds");
        assert_eq!(drop_mock.hits_async().await, 0);
    }
}
