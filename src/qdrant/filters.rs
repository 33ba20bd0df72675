//! Filter helpers for Qdrant deletes and search queries.

use serde_json::{Value, json};

use super::types::DenseFilterArgs;

/// Compose the standard Qdrant filter payload from optional search arguments.
pub fn build_search_filter(args: &DenseFilterArgs) -> Option<Value> {
    let mut must: Vec<Value> = Vec::new();

    let collection_ids = cleaned(&args.collection_ids);
    if !collection_ids.is_empty() {
        must.push(json!({
            "key": "collection_id",
            "match": { "any": collection_ids }
        }));
    }

    let categories = cleaned(&args.categories);
    if !categories.is_empty() {
        must.push(json!({
            "key": "category",
            "match": { "any": categories }
        }));
    }

    if must.is_empty() {
        None
    } else {
        Some(json!({ "must": must }))
    }
}

/// Exact-match filter selecting a set of chunk identifiers.
pub(crate) fn chunk_ids_filter(chunk_ids: &[String]) -> Value {
    json!({
        "must": [
            {
                "key": "chunk_id",
                "match": { "any": chunk_ids }
            }
        ]
    })
}

/// Exact-match filter selecting every chunk of one document.
pub(crate) fn document_filter(document_id: &str) -> Value {
    json!({
        "must": [
            {
                "key": "document_id",
                "match": { "value": document_id }
            }
        ]
    })
}

/// Exact-match filter selecting every chunk of one logical collection.
pub(crate) fn collection_filter(collection_id: &str) -> Value {
    json!({
        "must": [
            {
                "key": "collection_id",
                "match": { "value": collection_id }
            }
        ]
    })
}

fn cleaned(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(|value| value.to_string())
        .collect()
}
