//! Request pipeline: credential, manifest, pages, composite.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::ServiceError;
use crate::auth::SessionManager;
use crate::cache::{self, Cache, DEFAULT_TTL, keys};
use crate::chapter::{ChapterMetadata, MetadataResolver, Quality};
use crate::compose::Compositor;
use crate::download::PageFetcher;

/// Lifecycle of a whole-chapter assembly.
///
/// `Error` is reachable from every non-terminal state. Nothing is retried
/// across states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    ResolvingAuth,
    ResolvingMetadata,
    BuildingLinks,
    FetchingPages,
    Compositing,
    Streaming,
    Done,
    Error,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ResolvingAuth => "RESOLVING_AUTH",
            Self::ResolvingMetadata => "RESOLVING_METADATA",
            Self::BuildingLinks => "BUILDING_LINKS",
            Self::FetchingPages => "FETCHING_PAGES",
            Self::Compositing => "COMPOSITING",
            Self::Streaming => "STREAMING",
            Self::Done => "DONE",
            Self::Error => "ERROR",
        })
    }
}

pub(crate) fn transition(chapter_id: &str, state: PipelineState) {
    debug!(chapter_id, state = %state, "pipeline state");
}

/// A composed chapter, ready to be streamed.
#[derive(Debug, Clone)]
pub struct AssembledChapter {
    /// Chapter the image belongs to.
    pub chapter_id: String,
    /// Encoded PNG.
    pub image: Vec<u8>,
    /// Number of stacked pages.
    pub pages: usize,
}

impl AssembledChapter {
    /// Suggested download file name.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("chapter-{}.png", self.chapter_id)
    }
}

/// `{url, numberOfPages}` answer of the page-link operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLink {
    /// Direct page URL on the image host.
    pub url: String,
    /// Pages in the chapter.
    pub number_of_pages: usize,
}

/// `{totalPages}` answer of the page-count operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageCount {
    /// Pages in the chapter.
    pub total_pages: usize,
}

/// Serves chapters: whole composites, single pages, links and counts.
///
/// All handles are shared; one service instance serves every request.
#[derive(Debug, Clone)]
pub struct ChapterService {
    session: Arc<SessionManager>,
    resolver: MetadataResolver,
    cache: Arc<dyn Cache>,
    chapter_fetcher: PageFetcher,
    page_fetcher: PageFetcher,
    compositor: Compositor,
    page_ttl: Duration,
}

impl ChapterService {
    /// Creates a service. `fetcher` is used for whole chapters and, unless
    /// replaced with [`ChapterService::with_page_fetcher`], for single pages.
    #[must_use]
    pub fn new(
        session: Arc<SessionManager>,
        resolver: MetadataResolver,
        cache: Arc<dyn Cache>,
        fetcher: PageFetcher,
    ) -> Self {
        Self {
            session,
            resolver,
            cache,
            page_fetcher: fetcher.clone(),
            chapter_fetcher: fetcher,
            compositor: Compositor::new(),
            page_ttl: DEFAULT_TTL,
        }
    }

    /// Uses a separate fetcher for single-page requests.
    #[must_use]
    pub fn with_page_fetcher(mut self, fetcher: PageFetcher) -> Self {
        self.page_fetcher = fetcher;
        self
    }

    /// Resolves, downloads and stitches every high-quality page of a chapter.
    ///
    /// Leaves the pipeline in `STREAMING`; the body writer logs `DONE`.
    ///
    /// # Errors
    ///
    /// Returns the first failure of any stage; no partial image is produced.
    #[instrument(skip_all, fields(manga_id = %manga_id, chapter_id = %chapter_id))]
    pub async fn assemble_chapter(
        &self,
        manga_id: &str,
        chapter_id: &str,
    ) -> Result<AssembledChapter, ServiceError> {
        let result = self.run_assembly(chapter_id).await;
        if result.is_err() {
            transition(chapter_id, PipelineState::Error);
        }
        result
    }

    async fn run_assembly(&self, chapter_id: &str) -> Result<AssembledChapter, ServiceError> {
        let meta = self.metadata(chapter_id).await?;

        transition(chapter_id, PipelineState::BuildingLinks);
        let urls = meta.page_urls(Quality::High);
        info!(pages = urls.len(), "downloading chapter pages");

        transition(chapter_id, PipelineState::FetchingPages);
        let pages = self.chapter_fetcher.download_all(&urls).await?;

        transition(chapter_id, PipelineState::Compositing);
        let compositor = self.compositor;
        let page_count = pages.len();
        let image = tokio::task::spawn_blocking(move || compositor.compose(&pages))
            .await
            .map_err(|e| ServiceError::Internal(format!("composition task failed: {e}")))??;

        info!(pages = page_count, bytes = image.len(), "chapter assembled");
        transition(chapter_id, PipelineState::Streaming);
        Ok(AssembledChapter {
            chapter_id: chapter_id.to_string(),
            image,
            pages: page_count,
        })
    }

    /// Returns the bytes of one page, from the cache when possible.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::PageOutOfRange`] for an index outside the
    /// chapter, or the failure of resolving or downloading the page.
    #[instrument(skip_all, fields(chapter_id = %chapter_id, page = page, quality = %quality))]
    pub async fn get_page(
        &self,
        chapter_id: &str,
        page: usize,
        quality: Quality,
    ) -> Result<Vec<u8>, ServiceError> {
        let key = keys::chapter_page(chapter_id, page, quality);
        if let Some(bytes) = cache::get_or_miss(self.cache.as_ref(), &key).await {
            debug!(bytes = bytes.len(), "cache hit for page");
            return Ok(bytes);
        }

        let meta = self.metadata(chapter_id).await?;
        let url = meta.page_url(page, quality)?;

        transition(chapter_id, PipelineState::FetchingPages);
        let bytes = self.page_fetcher.fetch_one(&url).await.map_err(|mut e| {
            e.page_index = page;
            e.total_pages = meta.total_pages();
            e
        })?;

        cache::set_or_warn(self.cache.as_ref(), &key, &bytes, self.page_ttl).await;
        Ok(bytes)
    }

    /// Returns the direct URL of one page with the chapter's page count.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::PageOutOfRange`] for an index outside the
    /// chapter, or the failure of resolving the manifest.
    #[instrument(skip_all, fields(chapter_id = %chapter_id, page = page, quality = %quality))]
    pub async fn page_link(
        &self,
        chapter_id: &str,
        page: usize,
        quality: Quality,
    ) -> Result<PageLink, ServiceError> {
        let meta = self.metadata(chapter_id).await?;
        Ok(PageLink {
            url: meta.page_url(page, quality)?,
            number_of_pages: meta.total_pages(),
        })
    }

    /// Returns the number of pages of a chapter.
    ///
    /// # Errors
    ///
    /// Returns the failure of resolving the manifest on a cache miss.
    #[instrument(skip_all, fields(chapter_id = %chapter_id))]
    pub async fn page_count(&self, chapter_id: &str) -> Result<PageCount, ServiceError> {
        if let Some(total_pages) = self.resolver.cached_total_pages(chapter_id).await {
            debug!(total_pages, "page count from cache");
            return Ok(PageCount { total_pages });
        }
        let meta = self.metadata(chapter_id).await?;
        Ok(PageCount {
            total_pages: meta.total_pages(),
        })
    }

    /// Resolves the manifest; an upstream 401/403 renews the credential and
    /// retries exactly once.
    async fn metadata(&self, chapter_id: &str) -> Result<ChapterMetadata, ServiceError> {
        if let Some(meta) = self.resolver.cached(chapter_id).await {
            debug!(chapter_id, "cache hit for chapter metadata");
            return Ok(meta);
        }

        transition(chapter_id, PipelineState::ResolvingAuth);
        let token = self.session.access_token().await?;

        transition(chapter_id, PipelineState::ResolvingMetadata);
        match self.resolver.resolve(chapter_id, &token).await {
            Err(e) if e.is_auth_rejection() => {
                warn!(chapter_id, error = %e, "upstream rejected credential, renewing once");
                transition(chapter_id, PipelineState::ResolvingAuth);
                let token = self.session.renew_after_rejection(&token).await?;
                transition(chapter_id, PipelineState::ResolvingMetadata);
                Ok(self.resolver.resolve(chapter_id, &token).await?)
            }
            other => Ok(other?),
        }
    }
}
