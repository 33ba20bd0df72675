//! Durable URL → content-hash cache enabling idempotent re-crawls.
//!
//! One row per distinct URL ever ingested; rows are overwritten on each successful
//! re-ingest and never expire. A page whose extracted content hash matches the cached
//! value is skipped wholesale by the coordinator.

use std::path::Path;

use thiserror::Error;
use time::OffsetDateTime;
use tokio_rusqlite::Connection;

/// Errors raised by the document cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Underlying SQLite operation failed.
    #[error("document cache storage error: {0}")]
    Storage(#[from] tokio_rusqlite::Error),
}

/// SQLite-backed change-detection cache keyed by URL.
pub struct DocumentCache {
    conn: Connection,
}

impl DocumentCache {
    /// Open (and migrate) the cache at the given SQLite path.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let conn = Connection::open(path).await?;
        Self::with_connection(conn).await
    }

    /// Wrap an existing connection, creating the cache table when missing.
    pub async fn with_connection(conn: Connection) -> Result<Self, CacheError> {
        conn.call(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS document_cache (
                    url TEXT PRIMARY KEY,
                    content_hash TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );",
            )
            .map_err(tokio_rusqlite::Error::Rusqlite)
        })
        .await?;
        Ok(Self { conn })
    }

    /// True iff a cached entry exists for `url` and its stored hash equals `content_hash`.
    pub async fn should_skip(&self, url: &str, content_hash: &str) -> Result<bool, CacheError> {
        let url = url.to_string();
        let content_hash = content_hash.to_string();
        let cached: Option<String> = self
            .conn
            .call(move |conn| {
                use tokio_rusqlite::OptionalExtension;
                conn.query_row(
                    "SELECT content_hash FROM document_cache WHERE url = ?1",
                    [&url],
                    |row| row.get(0),
                )
                .optional()
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await?;
        Ok(cached.as_deref() == Some(content_hash.as_str()))
    }

    /// Insert or overwrite the cached hash and timestamp for `url` atomically.
    pub async fn upsert(&self, url: &str, content_hash: &str) -> Result<(), CacheError> {
        let url = url.to_string();
        let content_hash = content_hash.to_string();
        let updated_at = current_timestamp_rfc3339();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO document_cache (url, content_hash, updated_at)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(url) DO UPDATE SET
                         content_hash = excluded.content_hash,
                         updated_at = excluded.updated_at",
                    (&url, &content_hash, &updated_at),
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

/// Current timestamp formatted for persistence.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open_temp_cache() -> (DocumentCache, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("temp dir");
        let cache = DocumentCache::open(dir.path().join("cache.db"))
            .await
            .expect("cache opens");
        (cache, dir)
    }

    #[tokio::test]
    async fn unknown_url_is_not_skipped() {
        let (cache, _dir) = open_temp_cache().await;
        let skip = cache
            .should_skip("https://example.com/a", "hash-1")
            .await
            .expect("query succeeds");
        assert!(!skip);
    }

    #[tokio::test]
    async fn matching_hash_short_circuits() {
        let (cache, _dir) = open_temp_cache().await;
        cache
            .upsert("https://example.com/a", "hash-1")
            .await
            .expect("upsert succeeds");

        assert!(
            cache
                .should_skip("https://example.com/a", "hash-1")
                .await
                .expect("query succeeds")
        );
        assert!(
            !cache
                .should_skip("https://example.com/a", "hash-2")
                .await
                .expect("query succeeds")
        );
    }

    #[tokio::test]
    async fn upsert_overwrites_previous_hash() {
        let (cache, _dir) = open_temp_cache().await;
        cache
            .upsert("https://example.com/a", "hash-1")
            .await
            .expect("first upsert");
        cache
            .upsert("https://example.com/a", "hash-2")
            .await
            .expect("second upsert");

        assert!(
            !cache
                .should_skip("https://example.com/a", "hash-1")
                .await
                .expect("query succeeds")
        );
        assert!(
            cache
                .should_skip("https://example.com/a", "hash-2")
                .await
                .expect("query succeeds")
        );
    }

    #[test]
    fn timestamp_is_rfc3339_like() {
        let ts = current_timestamp_rfc3339();
        assert!(ts.contains('T') && ts.ends_with('Z'));
    }
}
