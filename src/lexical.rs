//! SQLite-backed lexical store: durable chunk rows plus an FTS5 mirror for keyword search.
//!
//! The `chunks` table is the source of truth, keyed by `chunk_id`; `chunks_fts` is an
//! external-content FTS5 mirror kept in sync by triggers so that upserts and deletes
//! never leave the index stale.

use std::path::Path;

use thiserror::Error;
use tokio_rusqlite::Connection;

use crate::cache::current_timestamp_rfc3339;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS chunks (
    chunk_id TEXT PRIMARY KEY,
    collection_id TEXT NOT NULL,
    document_id TEXT NOT NULL,
    title TEXT NOT NULL,
    url TEXT NOT NULL,
    position INTEGER NOT NULL,
    content TEXT NOT NULL,
    category TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id);
CREATE INDEX IF NOT EXISTS idx_chunks_collection ON chunks(collection_id);

CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
    content,
    content=chunks,
    content_rowid=rowid
);

CREATE TRIGGER IF NOT EXISTS chunks_ai AFTER INSERT ON chunks BEGIN
    INSERT INTO chunks_fts(rowid, content) VALUES (NEW.rowid, NEW.content);
END;

CREATE TRIGGER IF NOT EXISTS chunks_ad AFTER DELETE ON chunks BEGIN
    INSERT INTO chunks_fts(chunks_fts, rowid, content) VALUES ('delete', OLD.rowid, OLD.content);
END;

CREATE TRIGGER IF NOT EXISTS chunks_au AFTER UPDATE ON chunks BEGIN
    INSERT INTO chunks_fts(chunks_fts, rowid, content) VALUES ('delete', OLD.rowid, OLD.content);
    INSERT INTO chunks_fts(rowid, content) VALUES (NEW.rowid, NEW.content);
END;
";

/// Errors raised by the lexical store.
#[derive(Debug, Error)]
pub enum LexicalStoreError {
    /// Underlying SQLite operation failed.
    #[error("lexical store error: {0}")]
    Storage(#[from] tokio_rusqlite::Error),
}

/// Durable representation of one chunk row.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    /// Deterministic chunk identifier (primary key).
    pub chunk_id: String,
    /// Logical collection (knowledge base) the chunk belongs to.
    pub collection_id: String,
    /// Identifier of the source document.
    pub document_id: String,
    /// Title of the source page.
    pub title: String,
    /// Final URL of the source page.
    pub url: String,
    /// Ordinal position of the chunk within its document.
    pub position: usize,
    /// Chunk text.
    pub content: String,
    /// Caller-supplied category label.
    pub category: String,
}

/// A keyword-search hit from the FTS index.
#[derive(Debug, Clone)]
pub struct LexicalHit {
    /// Identifier of the matching chunk.
    pub chunk_id: String,
    /// Source document identifier.
    pub document_id: String,
    /// Title of the source page.
    pub title: String,
    /// Final URL of the source page.
    pub url: String,
    /// Matching chunk text.
    pub content: String,
    /// BM25 rank reported by FTS5; smaller is a better match.
    pub rank: f64,
}

/// SQLite-backed chunk table with full-text search.
pub struct LexicalStore {
    conn: Connection,
}

impl LexicalStore {
    /// Open (and migrate) the store at the given SQLite path.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, LexicalStoreError> {
        let conn = Connection::open(path).await?;
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)
                .map_err(tokio_rusqlite::Error::Rusqlite)
        })
        .await?;
        Ok(Self { conn })
    }

    /// Upsert a batch of chunk rows in one transaction; the latest content wins per chunk_id.
    pub async fn upsert_chunks(&self, records: Vec<ChunkRecord>) -> Result<(), LexicalStoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let created_at = current_timestamp_rfc3339();
        let count = records.len();
        self.conn
            .call(move |conn| {
                let tx = conn
                    .transaction()
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                for record in &records {
                    tx.execute(
                        "INSERT INTO chunks (chunk_id, collection_id, document_id, title, url,
                                             position, content, category, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                         ON CONFLICT(chunk_id) DO UPDATE SET
                             collection_id = excluded.collection_id,
                             document_id = excluded.document_id,
                             title = excluded.title,
                             url = excluded.url,
                             position = excluded.position,
                             content = excluded.content,
                             category = excluded.category,
                             created_at = excluded.created_at",
                        (
                            &record.chunk_id,
                            &record.collection_id,
                            &record.document_id,
                            &record.title,
                            &record.url,
                            record.position as i64,
                            &record.content,
                            &record.category,
                            &created_at,
                        ),
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                }
                tx.commit().map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(())
            })
            .await?;
        tracing::debug!(chunks = count, "Lexical rows upserted");
        Ok(())
    }

    /// Keyword search over chunk content, best BM25 matches first.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<LexicalHit>, LexicalStoreError> {
        let query = query.to_string();
        let hits = self
            .conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT c.chunk_id, c.document_id, c.title, c.url, c.content,
                                bm25(chunks_fts) AS rank
                         FROM chunks_fts
                         JOIN chunks c ON c.rowid = chunks_fts.rowid
                         WHERE chunks_fts MATCH ?1
                         ORDER BY rank
                         LIMIT ?2",
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let rows = stmt
                    .query_map((&query, limit as i64), |row| {
                        Ok(LexicalHit {
                            chunk_id: row.get(0)?,
                            document_id: row.get(1)?,
                            title: row.get(2)?,
                            url: row.get(3)?,
                            content: row.get(4)?,
                            rank: row.get(5)?,
                        })
                    })
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let mut hits = Vec::new();
                for row in rows {
                    hits.push(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
                }
                Ok(hits)
            })
            .await?;
        Ok(hits)
    }

    /// Delete all chunks belonging to one source document.
    pub async fn delete_document(&self, document_id: &str) -> Result<usize, LexicalStoreError> {
        let document_id = document_id.to_string();
        let deleted = self
            .conn
            .call(move |conn| {
                conn.execute("DELETE FROM chunks WHERE document_id = ?1", [&document_id])
                    .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await?;
        Ok(deleted)
    }

    /// Delete all chunks belonging to one logical collection.
    pub async fn delete_collection_entries(
        &self,
        collection_id: &str,
    ) -> Result<usize, LexicalStoreError> {
        let collection_id = collection_id.to_string();
        let deleted = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "DELETE FROM chunks WHERE collection_id = ?1",
                    [&collection_id],
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await?;
        Ok(deleted)
    }

    /// Number of chunk rows currently stored.
    pub async fn count(&self) -> Result<usize, LexicalStoreError> {
        let count: i64 = self
            .conn
            .call(|conn| {
                conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
                    .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await?;
        Ok(count as usize)
    }

    /// Fetch one chunk row by id, primarily for tests and diagnostics.
    pub async fn get_chunk(
        &self,
        chunk_id: &str,
    ) -> Result<Option<ChunkRecord>, LexicalStoreError> {
        let chunk_id = chunk_id.to_string();
        let record = self
            .conn
            .call(move |conn| {
                use tokio_rusqlite::OptionalExtension;
                conn.query_row(
                    "SELECT chunk_id, collection_id, document_id, title, url, position,
                            content, category
                     FROM chunks WHERE chunk_id = ?1",
                    [&chunk_id],
                    |row| {
                        Ok(ChunkRecord {
                            chunk_id: row.get(0)?,
                            collection_id: row.get(1)?,
                            document_id: row.get(2)?,
                            title: row.get(3)?,
                            url: row.get(4)?,
                            position: row.get::<_, i64>(5)? as usize,
                            content: row.get(6)?,
                            category: row.get(7)?,
                        })
                    },
                )
                .optional()
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await?;
        Ok(record)
    }
}
