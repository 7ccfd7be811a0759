//! Cache-or-fetch resolution of chapter manifests.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use tracing::{debug, info, instrument};
use url::Url;

use super::{ChapterMetadata, UpstreamError};
use crate::cache::{self, Cache, DEFAULT_TTL, keys};
use crate::http_client::{API_READ_TIMEOUT, build_http_client};

/// Default upstream content API.
pub const DEFAULT_API_BASE_URL: &str = "https://api.mangadex.org";

/// Where the upstream content API lives.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// API root, without trailing slash (e.g. `https://api.mangadex.org`).
    pub api_base_url: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AtHomeResponse {
    base_url: String,
    chapter: AtHomeChapter,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AtHomeChapter {
    hash: String,
    data: Vec<String>,
    data_saver: Vec<String>,
}

/// Resolves chapter ids to [`ChapterMetadata`], consulting the cache first.
///
/// Upstream failures are not retried here; callers decide whether a
/// credential refresh is worth one more attempt.
#[derive(Debug, Clone)]
pub struct MetadataResolver {
    client: Client,
    api_base_url: String,
    cache: Arc<dyn Cache>,
    ttl: Duration,
}

impl MetadataResolver {
    /// Creates a resolver using the default 24-hour TTL.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Client`] if the HTTP client cannot be built.
    pub fn new(config: &UpstreamConfig, cache: Arc<dyn Cache>) -> Result<Self, UpstreamError> {
        let client = build_http_client(Some(API_READ_TIMEOUT)).map_err(UpstreamError::Client)?;
        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            cache,
            ttl: DEFAULT_TTL,
        })
    }

    /// Returns the metadata of `chapter_id`, fetching it on a cache miss.
    ///
    /// A hit returns the cached record unmodified and makes no upstream call.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError`] if the upstream call fails or its payload is
    /// unusable.
    #[instrument(skip(self, token), fields(chapter_id = %chapter_id))]
    pub async fn resolve(
        &self,
        chapter_id: &str,
        token: &str,
    ) -> Result<ChapterMetadata, UpstreamError> {
        if let Some(meta) = self.cached(chapter_id).await {
            info!("cache hit for chapter metadata");
            return Ok(meta);
        }

        info!("cache miss for chapter metadata");
        let meta = self.fetch(chapter_id, token).await?;

        cache::set_json(
            self.cache.as_ref(),
            &keys::chapter_meta(chapter_id),
            &meta,
            self.ttl,
        )
        .await;
        cache::set_or_warn(
            self.cache.as_ref(),
            &keys::chapter_total_pages(chapter_id),
            meta.total_pages().to_string().as_bytes(),
            self.ttl,
        )
        .await;
        debug!(total_pages = meta.total_pages(), "cached chapter metadata");

        Ok(meta)
    }

    /// Cached metadata, if present and internally consistent.
    pub async fn cached(&self, chapter_id: &str) -> Option<ChapterMetadata> {
        let meta: ChapterMetadata =
            cache::get_json(self.cache.as_ref(), &keys::chapter_meta(chapter_id)).await?;
        meta.is_consistent().then_some(meta)
    }

    /// Page count from the cache: the metadata record first, then the
    /// total-pages shadow key.
    pub async fn cached_total_pages(&self, chapter_id: &str) -> Option<usize> {
        if let Some(meta) = self.cached(chapter_id).await {
            return Some(meta.total_pages());
        }
        let raw =
            cache::get_or_miss(self.cache.as_ref(), &keys::chapter_total_pages(chapter_id)).await?;
        std::str::from_utf8(&raw).ok()?.trim().parse().ok()
    }

    async fn fetch(&self, chapter_id: &str, token: &str) -> Result<ChapterMetadata, UpstreamError> {
        let manifest_url = self.manifest_url(chapter_id)?;
        let url = manifest_url.to_string();
        debug!(url = %url, "requesting chapter server manifest");

        let response = self
            .client
            .get(manifest_url)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .send()
            .await
            .map_err(|e| UpstreamError::network(&url, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| UpstreamError::network(&url, e))?;

        if !status.is_success() {
            return Err(UpstreamError::status(&url, status.as_u16(), &body));
        }

        let manifest: AtHomeResponse = serde_json::from_str(&body)
            .map_err(|e| UpstreamError::malformed(&url, e.to_string()))?;

        ChapterMetadata::new(
            manifest.base_url,
            manifest.chapter.hash,
            manifest.chapter.data,
            manifest.chapter.data_saver,
        )
        .map_err(|reason| UpstreamError::malformed(&url, reason))
    }

    /// `{api}/at-home/server/{chapter_id}` with the id kept as one encoded
    /// path segment, so it can never address another endpoint.
    fn manifest_url(&self, chapter_id: &str) -> Result<Url, UpstreamError> {
        let mut url = Url::parse(&self.api_base_url)
            .map_err(|e| UpstreamError::malformed(&self.api_base_url, e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| UpstreamError::malformed(&self.api_base_url, "API base URL cannot hold a path"))?
            .pop_if_empty()
            .extend(["at-home", "server", chapter_id]);
        Ok(url)
    }
}
