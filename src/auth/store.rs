//! Durable credential storage.

use std::fmt::Debug;
use std::time::SystemTime;

use async_trait::async_trait;
use sqlx::Row;
use tracing::instrument;

use super::CredentialPair;
use crate::db::{Database, from_unix_seconds, unix_seconds};

/// Errors for credential store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The database query failed.
    #[error("credential store database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistent home of upstream credential pairs.
#[async_trait]
pub trait CredentialStore: Send + Sync + Debug {
    /// Saves a newly issued pair.
    async fn create(&self, pair: &CredentialPair) -> Result<(), StoreError>;

    /// Returns the most recently updated pair.
    async fn find_latest(&self) -> Result<Option<CredentialPair>, StoreError>;

    /// Replaces the row whose access token is `access_token` with `pair`.
    ///
    /// Returns `false` when no such row exists.
    async fn update_by_token(
        &self,
        access_token: &str,
        pair: &CredentialPair,
    ) -> Result<bool, StoreError>;
}

/// [`CredentialStore`] over the `credentials` table.
#[derive(Debug, Clone)]
pub struct SqliteCredentialStore {
    db: Database,
}

impl SqliteCredentialStore {
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    #[instrument(skip(self, pair))]
    async fn create(&self, pair: &CredentialPair) -> Result<(), StoreError> {
        let issued = unix_seconds(pair.issued_at());
        sqlx::query(
            r"INSERT INTO credentials (access_token, refresh_token, created_at, updated_at)
              VALUES (?, ?, ?, ?)
              ON CONFLICT(access_token) DO UPDATE
              SET refresh_token = excluded.refresh_token, updated_at = excluded.updated_at",
        )
        .bind(pair.access_token())
        .bind(pair.refresh_token())
        .bind(unix_seconds(SystemTime::now()))
        .bind(issued)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_latest(&self) -> Result<Option<CredentialPair>, StoreError> {
        let row = sqlx::query(
            r"SELECT access_token, refresh_token, updated_at
              FROM credentials
              ORDER BY updated_at DESC, id DESC
              LIMIT 1",
        )
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|row| {
            CredentialPair::new(
                row.get::<String, _>("access_token"),
                row.get::<String, _>("refresh_token"),
                from_unix_seconds(row.get::<i64, _>("updated_at")),
            )
        }))
    }

    #[instrument(skip(self, access_token, pair))]
    async fn update_by_token(
        &self,
        access_token: &str,
        pair: &CredentialPair,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r"UPDATE credentials
              SET access_token = ?, refresh_token = ?, updated_at = ?
              WHERE access_token = ?",
        )
        .bind(pair.access_token())
        .bind(pair.refresh_token())
        .bind(unix_seconds(pair.issued_at()))
        .bind(access_token)
        .execute(self.db.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    async fn store() -> SqliteCredentialStore {
        SqliteCredentialStore::new(Database::new_in_memory().await.unwrap())
    }

    fn pair_at(access: &str, refresh: &str, secs_ago: u64) -> CredentialPair {
        CredentialPair::new(
            access,
            refresh,
            SystemTime::now() - Duration::from_secs(secs_ago),
        )
    }

    #[tokio::test]
    async fn test_find_latest_empty_store() {
        assert!(store().await.find_latest().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_latest_returns_most_recent() {
        let store = store().await;
        store.create(&pair_at("old", "r1", 600)).await.unwrap();
        store.create(&pair_at("new", "r2", 10)).await.unwrap();

        let latest = store.find_latest().await.unwrap().unwrap();
        assert_eq!(latest.access_token(), "new");
        assert_eq!(latest.refresh_token(), "r2");
    }

    #[tokio::test]
    async fn test_update_by_token_supersedes_row() {
        let store = store().await;
        store.create(&pair_at("a1", "r1", 600)).await.unwrap();

        let updated = store
            .update_by_token("a1", &pair_at("a2", "r2", 0))
            .await
            .unwrap();
        assert!(updated);

        let latest = store.find_latest().await.unwrap().unwrap();
        assert_eq!(latest.access_token(), "a2");
        assert!(latest.age(SystemTime::now()) < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_update_by_unknown_token_reports_false() {
        let store = store().await;
        let updated = store
            .update_by_token("missing", &pair_at("a2", "r2", 0))
            .await
            .unwrap();
        assert!(!updated);
        assert!(store.find_latest().await.unwrap().is_none());
    }
}
