//! Deterministic character-window chunking.
//!
//! Retrieval works on bounded, overlapping windows of a document's plain text. The walk is
//! strictly left-to-right and byte-for-byte reproducible: chunking the same (url, text) pair
//! twice yields the same ordered chunk identifiers, which is what makes store writes safe to
//! express as upserts instead of duplicate inserts.

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Number of leading characters of a chunk mixed into its identifier.
const CHUNK_ID_PREFIX_CHARS: usize = 64;

/// Errors produced while splitting text into windows.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Chunk size of zero can never make progress.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Overlap must leave room for the window to advance.
    #[error("overlap ({overlap}) must be smaller than chunk size ({chunk_size})")]
    InvalidOverlap {
        /// Configured overlap in characters.
        overlap: usize,
        /// Configured chunk size in characters.
        chunk_size: usize,
    },
}

/// Sizing parameters for the chunker, expressed in characters.
#[derive(Debug, Clone, Copy)]
pub struct ChunkerConfig {
    /// Target window size per chunk.
    pub chunk_size: usize,
    /// Characters shared between consecutive windows.
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 100,
        }
    }
}

/// A bounded window of document text, the atomic unit of retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Deterministic identifier derived from (url, position, text prefix).
    pub chunk_id: String,
    /// Final URL of the source document.
    pub source_url: String,
    /// Title carried over from extraction.
    pub title: String,
    /// Window text.
    pub text: String,
    /// Ordinal position of the chunk within the document.
    pub position: usize,
}

/// Split extracted text into overlapping windows with stable identities.
///
/// Empty or whitespace-only input yields an empty vector (with a diagnostic), not an error;
/// whitespace-only windows inside the text are dropped. The last chunk may be shorter than
/// the configured size.
pub fn chunk_document(
    url: &str,
    title: &str,
    text: &str,
    config: ChunkerConfig,
) -> Result<Vec<Chunk>, ChunkingError> {
    if config.chunk_size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if config.overlap >= config.chunk_size {
        return Err(ChunkingError::InvalidOverlap {
            overlap: config.overlap,
            chunk_size: config.chunk_size,
        });
    }
    if text.trim().is_empty() {
        tracing::debug!(url, "No text to chunk");
        return Ok(Vec::new());
    }

    // Byte offset of every character boundary, plus the end of the text.
    let mut boundaries: Vec<usize> = text.char_indices().map(|(offset, _)| offset).collect();
    boundaries.push(text.len());
    let total_chars = boundaries.len() - 1;

    let step = config.chunk_size - config.overlap;
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < total_chars {
        let end = (start + config.chunk_size).min(total_chars);
        let window = &text[boundaries[start]..boundaries[end]];
        if !window.trim().is_empty() {
            let position = chunks.len();
            chunks.push(Chunk {
                chunk_id: derive_chunk_id(url, position, window),
                source_url: url.to_string(),
                title: title.to_string(),
                text: window.to_string(),
                position,
            });
        }
        start += step;
    }

    Ok(chunks)
}

/// Derive the deterministic identifier for a chunk.
///
/// The identity covers the source URL, the chunk's ordinal position, and a fixed-length
/// prefix of its text, so re-ingesting unchanged content reproduces the same id set.
pub fn derive_chunk_id(url: &str, position: usize, text: &str) -> String {
    let prefix_end = text
        .char_indices()
        .nth(CHUNK_ID_PREFIX_CHARS)
        .map(|(offset, _)| offset)
        .unwrap_or(text.len());
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update([b'|']);
    hasher.update(position.to_string().as_bytes());
    hasher.update([b'|']);
    hasher.update(text[..prefix_end].as_bytes());
    hex::encode(hasher.finalize())
}

/// Compute the stable content hash of extracted plain text.
///
/// Used purely for change detection, not security.
pub fn compute_content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(chunk_size: usize, overlap: usize) -> ChunkerConfig {
        ChunkerConfig {
            chunk_size,
            overlap,
        }
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let chunks = chunk_document("https://example.com", "t", "   \n", config(500, 100))
            .expect("chunking succeeded");
        assert!(chunks.is_empty());
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let error = chunk_document("https://example.com", "t", "hello", config(0, 0)).unwrap_err();
        assert!(matches!(error, ChunkingError::InvalidChunkSize));
    }

    #[test]
    fn overlap_must_leave_progress() {
        let error =
            chunk_document("https://example.com", "t", "hello", config(10, 10)).unwrap_err();
        assert!(matches!(error, ChunkingError::InvalidOverlap { .. }));
    }

    #[test]
    fn article_of_2000_chars_produces_five_positions() {
        let text = "abcdefghij".repeat(200);
        let chunks = chunk_document("https://example.com/b", "Article", &text, config(500, 100))
            .expect("chunking succeeded");

        assert_eq!(chunks.len(), 5);
        let positions: Vec<usize> = chunks.iter().map(|chunk| chunk.position).collect();
        assert_eq!(positions, vec![0, 1, 2, 3, 4]);

        let ids: std::collections::BTreeSet<&str> = chunks
            .iter()
            .map(|chunk| chunk.chunk_id.as_str())
            .collect();
        assert_eq!(ids.len(), 5, "chunk ids must be distinct");
    }

    #[test]
    fn consecutive_chunks_share_the_overlap() {
        let text = "abcdefghij".repeat(200);
        let chunks = chunk_document("https://example.com/b", "Article", &text, config(500, 100))
            .expect("chunking succeeded");

        let first_tail = &chunks[0].text[400..];
        let second_head = &chunks[1].text[..100];
        assert_eq!(first_tail, second_head);
    }

    #[test]
    fn rechunking_reproduces_identical_ids() {
        let text = "The evaluation committee shall assess each bid on price and quality. "
            .repeat(20);
        let run = |()| {
            chunk_document("https://example.com/tender", "Tender", &text, config(300, 60))
                .expect("chunking succeeded")
                .into_iter()
                .map(|chunk| chunk.chunk_id)
                .collect::<Vec<_>>()
        };
        assert_eq!(run(()), run(()));
    }

    #[test]
    fn different_urls_produce_different_ids() {
        let a = derive_chunk_id("https://example.com/a", 0, "same text");
        let b = derive_chunk_id("https://example.com/b", 0, "same text");
        assert_ne!(a, b);
    }

    #[test]
    fn content_hash_is_stable() {
        let h1 = compute_content_hash("Hello world");
        let h2 = compute_content_hash("Hello world");
        assert_eq!(h1, h2);
        assert_ne!(h1, compute_content_hash("Hello world!"));
    }

    #[test]
    fn short_tail_is_kept() {
        let text = "x".repeat(520);
        let chunks = chunk_document("https://example.com", "t", &text, config(500, 100))
            .expect("chunking succeeded");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].text.len(), 120);
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let text = "åäö".repeat(300);
        let chunks = chunk_document("https://example.com", "t", &text, config(500, 100))
            .expect("chunking succeeded");
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 500);
        }
    }
}
