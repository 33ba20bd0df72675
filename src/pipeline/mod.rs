//! Ingestion coordinator: fetch, extract, admit, dedup, chunk, embed, dual-write, cache.

mod admission;
mod service;
mod types;

pub use admission::{AdmissionDecision, AdmissionPolicy, AllowAll, LatinRatioPolicy};
pub use service::IngestionService;
pub use types::{DocumentFailure, IngestReport, IngestRequest, PipelineError};
