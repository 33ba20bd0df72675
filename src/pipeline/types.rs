//! Request, report, and error types for the ingestion coordinator.

use thiserror::Error;

use crate::cache::CacheError;
use crate::chunker::ChunkingError;
use crate::embedding::{EmbeddingClientError, EmbeddingProviderConfig};
use crate::extract::ExtractError;
use crate::fetcher::FetchError;
use crate::lexical::LexicalStoreError;
use crate::qdrant::QdrantError;

/// One batch of URLs to ingest, with the metadata applied to every resulting chunk.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    /// Candidate page URLs.
    pub urls: Vec<String>,
    /// Logical collection (knowledge base) the documents belong to.
    pub collection_id: String,
    /// Category label stamped on every chunk.
    pub category: String,
    /// Embedding provider to use for this batch.
    pub embedding: EmbeddingProviderConfig,
    /// Caller-supplied identifier tying log lines of this batch together.
    pub correlation_id: String,
}

/// Aggregate outcome of one ingest batch.
///
/// The batch never halts early: every input URL is accounted for either as an
/// ingested document, a skip, or an entry in [`failures`](Self::failures).
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Documents fully written to both stores.
    pub ingested: usize,
    /// Documents intentionally skipped (unchanged content, nothing to chunk).
    pub skipped: usize,
    /// Total chunks written across all ingested documents.
    pub chunks_written: usize,
    /// Per-document failures; the rest of the batch committed independently.
    pub failures: Vec<DocumentFailure>,
}

/// A single document that could not be ingested.
#[derive(Debug)]
pub struct DocumentFailure {
    /// URL as requested by the caller.
    pub url: String,
    /// What went wrong for this document.
    pub error: PipelineError,
}

/// Per-document failures inside the ingestion pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The page could not be fetched as HTML.
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// Extraction produced no usable text.
    #[error(transparent)]
    Extract(#[from] ExtractError),
    /// The admission policy rejected the extracted document.
    #[error("document rejected by admission policy: {reason}")]
    NotAdmitted {
        /// Reason reported by the policy.
        reason: String,
    },
    /// Chunking configuration was unusable.
    #[error(transparent)]
    Chunking(#[from] ChunkingError),
    /// The embedding provider failed.
    #[error(transparent)]
    Embedding(#[from] EmbeddingClientError),
    /// The provider returned a different number of vectors than texts sent.
    ///
    /// Partial embedding results are never trusted; the whole document is dropped.
    #[error("embedding count mismatch: sent {expected} chunks, received {received} vectors")]
    EmbeddingCountMismatch {
        /// Chunk texts submitted.
        expected: usize,
        /// Vectors received back.
        received: usize,
    },
    /// No observed vector and no configured hint to size the dense collection with.
    #[error("unable to resolve a vector dimension for {url}")]
    UnknownDimension {
        /// Document whose embeddings carried no dimension.
        url: String,
    },
    /// Document cache read or write failed.
    #[error(transparent)]
    Cache(#[from] CacheError),
    /// Lexical store write failed.
    #[error(transparent)]
    Lexical(#[from] LexicalStoreError),
    /// Dense store write failed; context identifies the affected points.
    #[error(
        "dense store failure in collection {collection} for document {document_id} \
         (leading chunks {leading_chunk_ids:?}): {source}"
    )]
    Dense {
        /// Qdrant collection targeted by the write.
        collection: String,
        /// Document whose chunks were being written.
        document_id: String,
        /// First few chunk ids of the failing batch.
        leading_chunk_ids: Vec<String>,
        /// Underlying Qdrant error.
        #[source]
        source: QdrantError,
    },
}
