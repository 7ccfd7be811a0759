//! Key-value cache with per-key TTL.
//!
//! Every component that wants to avoid a repeated upstream call goes through
//! the [`Cache`] trait: chapter metadata, the total-pages shadow key and raw
//! page bytes. Values are opaque byte strings; JSON records are encoded with
//! [`get_json`] / [`set_json`].
//!
//! Two backends are provided:
//! - [`MemoryCache`] - process-local, used by tests and single-instance setups
//! - [`SqliteCache`] - file-backed, shared by every process opening the same file
//!
//! There is no invalidation. Staleness is bounded by TTL only, and concurrent
//! `set` calls on one key are last-write-wins.

mod error;
mod memory;
mod sqlite;

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};

pub use error::CacheError;
pub use memory::MemoryCache;
pub use sqlite::SqliteCache;

use crate::chapter::Quality;

/// TTL applied to chapter metadata, its shadow key and cached page bytes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// How often [`spawn_sweeper`] reclaims expired entries by default.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// A shared key-value store with per-key expiry.
#[async_trait]
pub trait Cache: Send + Sync + Debug {
    /// Returns the value stored under `key`, or `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Stores `value` under `key`, replacing any previous value, for `ttl`.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError>;

    /// Drops every expired entry, read or not, and returns how many went.
    async fn purge_expired(&self) -> Result<u64, CacheError>;
}

/// Runs [`Cache::purge_expired`] every `period` until the handle is aborted.
///
/// Keys are never revisited once their page falls out of use, so without a
/// sweep expired entries would pile up for the life of the process.
pub fn spawn_sweeper(cache: Arc<dyn Cache>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match cache.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => debug!(purged, "swept expired cache entries"),
                Err(e) => warn!(error = %e, "cache sweep failed"),
            }
        }
    })
}

/// Cache key layout. Kept in one place so every writer and reader agree.
pub mod keys {
    use super::Quality;

    /// Key of the serialized [`ChapterMetadata`](crate::chapter::ChapterMetadata).
    #[must_use]
    pub fn chapter_meta(chapter_id: &str) -> String {
        format!("chapterMeta:{chapter_id}")
    }

    /// Shadow key holding only the page count of a chapter.
    #[must_use]
    pub fn chapter_total_pages(chapter_id: &str) -> String {
        format!("chapterMeta:{chapter_id}:totalPages")
    }

    /// Key of the raw bytes of one page at one quality tier.
    #[must_use]
    pub fn chapter_page(chapter_id: &str, page: usize, quality: Quality) -> String {
        format!("chapterPage:{chapter_id}:{page}:{}", quality.as_str())
    }
}

/// Reads and decodes a JSON value. Any cache or decode failure is logged and
/// reported as a miss.
pub async fn get_json<T: DeserializeOwned>(cache: &dyn Cache, key: &str) -> Option<T> {
    let bytes = get_or_miss(cache, key).await?;
    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = %e, "discarding undecodable cache entry");
            None
        }
    }
}

/// Encodes and stores a JSON value. Failures are logged and swallowed.
pub async fn set_json<T: Serialize + ?Sized>(
    cache: &dyn Cache,
    key: &str,
    value: &T,
    ttl: Duration,
) {
    match serde_json::to_vec(value) {
        Ok(bytes) => set_or_warn(cache, key, &bytes, ttl).await,
        Err(e) => warn!(key, error = %e, "failed to encode cache entry"),
    }
}

/// [`Cache::get`] that degrades to a miss on backend failure.
pub async fn get_or_miss(cache: &dyn Cache, key: &str) -> Option<Vec<u8>> {
    match cache.get(key).await {
        Ok(value) => value,
        Err(e) => {
            warn!(key, error = %e, "cache read failed, treating as miss");
            None
        }
    }
}

/// [`Cache::set`] that logs and drops backend failures.
pub async fn set_or_warn(cache: &dyn Cache, key: &str, value: &[u8], ttl: Duration) {
    if let Err(e) = cache.set(key, value, ttl).await {
        warn!(key, error = %e, "cache write failed");
    }
}
