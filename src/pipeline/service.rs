//! Ingestion coordinator sequencing fetch, extract, chunk, embed, and dual-store writes.

use crate::{
    cache::DocumentCache,
    chunker::{Chunk, ChunkerConfig, chunk_document, compute_content_hash},
    config::get_config,
    embedding::{EmbeddingClient, HttpEmbeddingClient},
    extract::extract_document,
    fetcher::{Fetcher, FetcherConfig, FetchResult},
    lexical::{ChunkRecord, LexicalStore},
    metrics::{IngestMetrics, MetricsSnapshot},
    pipeline::{
        admission::{AdmissionDecision, AdmissionPolicy},
        types::{DocumentFailure, IngestReport, IngestRequest, PipelineError},
    },
    qdrant::{DensePoint, QdrantStore},
};

/// Number of chunk ids attached to a dense-store failure for operability.
const FAILURE_CONTEXT_CHUNKS: usize = 3;

/// Coordinates the full ingestion pipeline for batches of URLs.
///
/// The service owns long-lived handles to the fetcher, both stores, and the document
/// cache. Construct it once near process start; per-batch state (the embedding provider)
/// travels inside each [`IngestRequest`].
pub struct IngestionService {
    fetcher: Fetcher,
    cache: DocumentCache,
    lexical: LexicalStore,
    dense: QdrantStore,
    chunker: ChunkerConfig,
    dense_collection: String,
    admission: Box<dyn AdmissionPolicy>,
    metrics: IngestMetrics,
}

/// Internal classification of one document's journey through the pipeline.
enum DocumentOutcome {
    Ingested { chunk_count: usize },
    Unchanged,
    NoChunks,
}

impl IngestionService {
    /// Assemble a service from explicitly constructed parts.
    pub fn new(
        fetcher: Fetcher,
        cache: DocumentCache,
        lexical: LexicalStore,
        dense: QdrantStore,
        chunker: ChunkerConfig,
        dense_collection: String,
        admission: Box<dyn AdmissionPolicy>,
    ) -> Self {
        Self {
            fetcher,
            cache,
            lexical,
            dense,
            chunker,
            dense_collection,
            admission,
            metrics: IngestMetrics::new(),
        }
    }

    /// Build the service from the process-wide configuration.
    ///
    /// Intended for process start only; initialization failures abort the process.
    pub async fn from_config(
        fetcher_config: FetcherConfig,
        admission: Box<dyn AdmissionPolicy>,
    ) -> Self {
        let config = get_config();
        let fetcher = Fetcher::new(fetcher_config).expect("Failed to build fetcher");
        let cache = DocumentCache::open(&config.lexical_db_path)
            .await
            .expect("Failed to open document cache");
        let lexical = LexicalStore::open(&config.lexical_db_path)
            .await
            .expect("Failed to open lexical store");
        let dense = QdrantStore::from_config().expect("Failed to connect to Qdrant");
        let chunker = ChunkerConfig {
            chunk_size: config.chunk_size,
            overlap: config.chunk_overlap,
        };
        Self::new(
            fetcher,
            cache,
            lexical,
            dense,
            chunker,
            config.qdrant_collection_name.clone(),
            admission,
        )
    }

    /// Ingest one batch of URLs.
    ///
    /// Every input URL is accounted for in the returned report; per-document failures are
    /// isolated and the batch never halts early.
    pub async fn ingest(&self, request: IngestRequest) -> IngestReport {
        let mut report = IngestReport::default();
        tracing::info!(
            correlation_id = %request.correlation_id,
            urls = request.urls.len(),
            collection_id = %request.collection_id,
            "Starting ingest batch"
        );

        let embedder = match HttpEmbeddingClient::new(request.embedding.clone()) {
            Ok(embedder) => embedder,
            Err(error) => {
                // Nothing can be embedded; fail the whole batch document by document.
                let message = error.to_string();
                tracing::error!(
                    correlation_id = %request.correlation_id,
                    error = %message,
                    "Embedding provider configuration is unusable"
                );
                for url in &request.urls {
                    self.metrics.record_skipped();
                    report.failures.push(DocumentFailure {
                        url: url.clone(),
                        error: PipelineError::Embedding(
                            crate::embedding::EmbeddingClientError::InvalidConfig(message.clone()),
                        ),
                    });
                }
                return report;
            }
        };

        let results = self.fetcher.fetch(&request.urls).await;
        for result in results {
            let url = result.requested_url.clone();
            match self.ingest_document(result, &request, &embedder).await {
                Ok(DocumentOutcome::Ingested { chunk_count }) => {
                    self.metrics.record_ingested(chunk_count as u64);
                    report.ingested += 1;
                    report.chunks_written += chunk_count;
                    tracing::info!(
                        correlation_id = %request.correlation_id,
                        url = %url,
                        chunks = chunk_count,
                        "Document ingested"
                    );
                }
                Ok(DocumentOutcome::Unchanged) => {
                    self.metrics.record_skipped();
                    report.skipped += 1;
                    tracing::info!(
                        correlation_id = %request.correlation_id,
                        url = %url,
                        "Content unchanged; skipped"
                    );
                }
                Ok(DocumentOutcome::NoChunks) => {
                    self.metrics.record_skipped();
                    report.skipped += 1;
                    tracing::warn!(
                        correlation_id = %request.correlation_id,
                        url = %url,
                        "Document produced no chunks; skipped"
                    );
                }
                Err(error) => {
                    self.metrics.record_skipped();
                    tracing::warn!(
                        correlation_id = %request.correlation_id,
                        url = %url,
                        error = %error,
                        "Document failed"
                    );
                    report.failures.push(DocumentFailure { url, error });
                }
            }
        }

        tracing::info!(
            correlation_id = %request.correlation_id,
            ingested = report.ingested,
            skipped = report.skipped,
            failed = report.failures.len(),
            chunks = report.chunks_written,
            "Ingest batch finished"
        );
        report
    }

    async fn ingest_document(
        &self,
        result: FetchResult,
        request: &IngestRequest,
        embedder: &HttpEmbeddingClient,
    ) -> Result<DocumentOutcome, PipelineError> {
        let requested_url = result.requested_url;
        let html = match (result.error, result.html_body) {
            (Some(error), _) => return Err(error.into()),
            (None, Some(html)) => html,
            (None, None) => {
                return Err(PipelineError::Fetch(crate::fetcher::FetchError::NotHtml {
                    content_type: result.content_type,
                }));
            }
        };
        let final_url = result.final_url.unwrap_or_else(|| requested_url.clone());

        let document = extract_document(&final_url, &html, &requested_url)?;

        if document.is_below_viable_length() {
            tracing::warn!(url = %final_url, "Extracted text too short to index");
            return Ok(DocumentOutcome::NoChunks);
        }

        if let AdmissionDecision::Reject { reason } = self.admission.admit(&document) {
            return Err(PipelineError::NotAdmitted { reason });
        }

        if self
            .cache
            .should_skip(&final_url, &document.content_hash)
            .await?
        {
            return Ok(DocumentOutcome::Unchanged);
        }

        let chunks = chunk_document(&final_url, &document.title, &document.plain_text, self.chunker)?;
        if chunks.is_empty() {
            return Ok(DocumentOutcome::NoChunks);
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let embeddings = embedder.embed(texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(PipelineError::EmbeddingCountMismatch {
                expected: chunks.len(),
                received: embeddings.len(),
            });
        }

        let dimension = embeddings
            .iter()
            .map(|embedding| embedding.dense.len())
            .find(|len| *len > 0)
            .or(request.embedding.dense_dim_hint)
            .ok_or_else(|| PipelineError::UnknownDimension {
                url: final_url.clone(),
            })? as u64;

        let document_id = document_id_for(&final_url);
        let chunk_count = chunks.len();

        self.lexical
            .upsert_chunks(lexical_records(&chunks, request, &document_id))
            .await?;

        let points: Vec<DensePoint> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| DensePoint {
                chunk_id: chunk.chunk_id.clone(),
                collection_id: request.collection_id.clone(),
                document_id: document_id.clone(),
                category: request.category.clone(),
                vector: Some(embedding.dense),
            })
            .collect();
        let leading_chunk_ids: Vec<String> = chunks
            .iter()
            .take(FAILURE_CONTEXT_CHUNKS)
            .map(|chunk| chunk.chunk_id.clone())
            .collect();

        self.dense
            .ensure_collection(&self.dense_collection, dimension)
            .await
            .map_err(|source| self.dense_failure(&document_id, &leading_chunk_ids, source))?;
        self.dense
            .upsert_chunks(&self.dense_collection, points, dimension)
            .await
            .map_err(|source| self.dense_failure(&document_id, &leading_chunk_ids, source))?;

        self.cache.upsert(&final_url, &document.content_hash).await?;

        Ok(DocumentOutcome::Ingested { chunk_count })
    }

    /// Remove one document's chunks from both stores.
    pub async fn remove_document(&self, url: &str) -> Result<(), PipelineError> {
        let document_id = document_id_for(url);
        self.lexical.delete_document(&document_id).await?;
        self.dense
            .delete_document(&self.dense_collection, &document_id)
            .await
            .map_err(|source| self.dense_failure(&document_id, &[], source))?;
        tracing::info!(url, document_id = %document_id, "Document removed from both stores");
        Ok(())
    }

    /// Remove every chunk of one logical collection from both stores.
    pub async fn remove_collection_entries(
        &self,
        collection_id: &str,
    ) -> Result<(), PipelineError> {
        self.lexical.delete_collection_entries(collection_id).await?;
        self.dense
            .delete_collection_entries(&self.dense_collection, collection_id)
            .await
            .map_err(|source| self.dense_failure(collection_id, &[], source))?;
        tracing::info!(collection_id, "Collection entries removed from both stores");
        Ok(())
    }

    /// Snapshot of the ingest counters accumulated by this service.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn dense_failure(
        &self,
        document_id: &str,
        leading_chunk_ids: &[String],
        source: crate::qdrant::QdrantError,
    ) -> PipelineError {
        PipelineError::Dense {
            collection: self.dense_collection.clone(),
            document_id: document_id.to_string(),
            leading_chunk_ids: leading_chunk_ids.to_vec(),
            source,
        }
    }
}

fn lexical_records(
    chunks: &[Chunk],
    request: &IngestRequest,
    document_id: &str,
) -> Vec<ChunkRecord> {
    chunks
        .iter()
        .map(|chunk| ChunkRecord {
            chunk_id: chunk.chunk_id.clone(),
            collection_id: request.collection_id.clone(),
            document_id: document_id.to_string(),
            title: chunk.title.clone(),
            url: chunk.source_url.clone(),
            position: chunk.position,
            content: chunk.text.clone(),
            category: request.category.clone(),
        })
        .collect()
}

/// Stable document identifier derived from the final URL.
fn document_id_for(url: &str) -> String {
    compute_content_hash(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_id_is_stable_per_url() {
        let a = document_id_for("https://example.com/a");
        assert_eq!(a, document_id_for("https://example.com/a"));
        assert_ne!(a, document_id_for("https://example.com/b"));
    }
}
