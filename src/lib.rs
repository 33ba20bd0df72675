#![deny(missing_docs)]

//! Core library for the Tenderscout web ingestion pipeline.

/// Document cache for idempotent change detection.
pub mod cache;
/// Deterministic character-window chunking.
pub mod chunker;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and HTTP adapter.
pub mod embedding;
/// HTML to plain-text extraction.
pub mod extract;
/// Polite, resilient page fetching.
pub mod fetcher;
/// SQLite-backed lexical chunk store with full-text search.
pub mod lexical;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion metrics helpers.
pub mod metrics;
/// Ingestion coordinator gluing the pipeline stages together.
pub mod pipeline;
/// Qdrant dense vector store integration.
pub mod qdrant;
