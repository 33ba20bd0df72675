//! Qdrant integration: the dense half of the hybrid retrieval backend.

mod client;
mod filters;
mod types;

pub use client::QdrantStore;
pub use filters::build_search_filter;
pub use types::{DenseFilterArgs, DenseHit, DensePoint, QdrantError};
