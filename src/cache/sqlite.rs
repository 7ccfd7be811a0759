//! SQLite-backed cache shared across processes.
//!
//! Every server instance pointed at the same database file observes the same
//! entries; WAL mode on [`Database`] keeps readers from blocking the writer.

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use sqlx::Row;
use tracing::{debug, instrument};

use super::{Cache, CacheError};
use crate::db::{Database, unix_seconds};

/// [`Cache`] stored in the `cache_entries` table.
#[derive(Debug, Clone)]
pub struct SqliteCache {
    db: Database,
}

impl SqliteCache {
    /// Creates a cache over an already migrated database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Cache for SqliteCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let row = sqlx::query(r"SELECT value FROM cache_entries WHERE key = ? AND expires_at > ?")
            .bind(key)
            .bind(unix_seconds(SystemTime::now()))
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.map(|row| row.get::<Vec<u8>, _>("value")))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        let expires_at = unix_seconds(SystemTime::now() + ttl);
        sqlx::query(
            r"INSERT INTO cache_entries (key, value, expires_at)
              VALUES (?, ?, ?)
              ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn purge_expired(&self) -> Result<u64, CacheError> {
        let result = sqlx::query(r"DELETE FROM cache_entries WHERE expires_at <= ?")
            .bind(unix_seconds(SystemTime::now()))
            .execute(self.db.pool())
            .await?;
        let removed = result.rows_affected();
        debug!(removed, "purged expired cache entries");
        Ok(removed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn cache() -> SqliteCache {
        SqliteCache::new(Database::new_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_sqlite_cache_set_then_get() {
        let cache = cache().await;
        cache.set("k", b"\x00\x01bytes", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(b"\x00\x01bytes".to_vec()));
    }

    #[tokio::test]
    async fn test_sqlite_cache_overwrite_replaces_value() {
        let cache = cache().await;
        cache.set("k", b"old", Duration::from_secs(60)).await.unwrap();
        cache.set("k", b"new", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(b"new".to_vec()));
    }

    #[tokio::test]
    async fn test_sqlite_cache_expired_is_miss_and_purged() {
        let cache = cache().await;
        cache.set("gone", b"v", Duration::ZERO).await.unwrap();
        cache.set("kept", b"v", Duration::from_secs(60)).await.unwrap();

        assert_eq!(cache.get("gone").await.unwrap(), None);
        assert_eq!(cache.purge_expired().await.unwrap(), 1);
        assert!(cache.get("kept").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sqlite_cache_shared_between_handles() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("cache.db");
        let writer = SqliteCache::new(Database::new(&path).await.unwrap());
        let reader = SqliteCache::new(Database::new(&path).await.unwrap());

        writer.set("shared", b"v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(reader.get("shared").await.unwrap(), Some(b"v".to_vec()));
    }
}
