//! Concurrent page fetcher with retry.
//!
//! Pages are downloaded in consecutive batches of `concurrency` URLs. A batch
//! must finish before the next one starts, so at most `concurrency` requests
//! are ever in flight. Results keep the order of the input URLs.
//!
//! The first page that exhausts its retries aborts the whole operation:
//! the remaining downloads of its batch are dropped and no later batch is
//! started.
//!
//! # Example
//!
//! ```no_run
//! use chapter_stitch::download::{PageClient, PageFetcher, RetryPolicy, default_concurrency};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = PageClient::new(None)?;
//! let fetcher = PageFetcher::new(client, default_concurrency(), RetryPolicy::default());
//! let pages = fetcher
//!     .download_all(&["https://uploads.example/data/hash/1.png".to_string()])
//!     .await?;
//! println!("downloaded {} pages", pages.len());
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::future::try_join_all;
use tracing::{debug, info, instrument, warn};

use super::constants::{ATTEMPT_TIMEOUT, MAX_CONCURRENCY, MIN_CONCURRENCY};
use super::retry::{RetryDecision, RetryPolicy};
use super::{DownloadError, FetchError, PageClient};

/// Concurrency derived from the host: one less than the available
/// parallelism, kept within 2..=6.
#[must_use]
pub fn default_concurrency() -> usize {
    let parallelism = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
    clamp_concurrency(parallelism.saturating_sub(1))
}

/// Clamps a requested concurrency into the supported range.
#[must_use]
pub fn clamp_concurrency(requested: usize) -> usize {
    requested.clamp(MIN_CONCURRENCY, MAX_CONCURRENCY)
}

/// Counters from one `download_all` run.
#[derive(Debug, Default)]
pub(crate) struct FetchStats {
    completed: AtomicUsize,
    retried: AtomicUsize,
}

impl FetchStats {
    /// Pages downloaded successfully.
    #[must_use]
    pub(crate) fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Retry attempts made across all pages.
    #[must_use]
    pub(crate) fn retried(&self) -> usize {
        self.retried.load(Ordering::SeqCst)
    }

    fn increment_completed(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_retried(&self) {
        self.retried.fetch_add(1, Ordering::SeqCst);
    }
}

/// Downloads chapter pages with bounded concurrency and per-page retry.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: PageClient,
    concurrency: usize,
    retry_policy: RetryPolicy,
    attempt_timeout: Duration,
}

impl PageFetcher {
    /// Creates a fetcher. `concurrency` is clamped into 2..=6.
    #[must_use]
    #[instrument(level = "debug", skip(client, retry_policy))]
    pub fn new(client: PageClient, concurrency: usize, retry_policy: RetryPolicy) -> Self {
        let concurrency = clamp_concurrency(concurrency);
        debug!(
            concurrency,
            max_attempts = retry_policy.max_attempts(),
            "creating page fetcher"
        );
        Self {
            client,
            concurrency,
            retry_policy,
            attempt_timeout: ATTEMPT_TIMEOUT,
        }
    }

    /// Overrides the per-attempt timeout.
    #[must_use]
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Returns the effective concurrency.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Downloads every URL and returns the bodies in input order.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] for the first page that failed all of its
    /// attempts. No partial result is returned.
    #[instrument(skip(self, urls), fields(pages = urls.len(), concurrency = self.concurrency))]
    pub async fn download_all(&self, urls: &[String]) -> Result<Vec<Vec<u8>>, FetchError> {
        let stats = FetchStats::default();
        let total_pages = urls.len();
        let mut pages = Vec::with_capacity(total_pages);

        info!("starting page downloads");

        for (batch_index, batch) in urls.chunks(self.concurrency).enumerate() {
            let offset = batch_index * self.concurrency;
            debug!(batch = batch_index, size = batch.len(), "starting batch");

            let downloads = batch.iter().enumerate().map(|(i, url)| {
                let page_index = offset + i + 1;
                let stats = &stats;
                async move {
                    match self.fetch_with_retry(url, stats).await {
                        Ok(bytes) => {
                            stats.increment_completed();
                            Ok(bytes)
                        }
                        Err((source, attempts)) => {
                            warn!(
                                page_index,
                                url = %url,
                                attempts,
                                error = %source,
                                "page download failed after all attempts"
                            );
                            Err(FetchError {
                                page_index,
                                total_pages,
                                attempts,
                                source,
                            })
                        }
                    }
                }
            });

            pages.extend(try_join_all(downloads).await?);
        }

        info!(
            completed = stats.completed(),
            retried = stats.retried(),
            "page downloads complete"
        );
        Ok(pages)
    }

    /// Downloads a single URL with the same retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] with page index 1 if every attempt failed.
    pub async fn fetch_one(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let stats = FetchStats::default();
        self.fetch_with_retry(url, &stats)
            .await
            .map_err(|(source, attempts)| FetchError {
                page_index: 1,
                total_pages: 1,
                attempts,
                source,
            })
    }

    /// Returns the body, or the last error with the number of attempts made.
    #[instrument(skip(self, stats), fields(url = %url))]
    async fn fetch_with_retry(
        &self,
        url: &str,
        stats: &FetchStats,
    ) -> Result<Vec<u8>, (DownloadError, u32)> {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!(attempt, "attempting page download");

            match self.client.fetch(url, self.attempt_timeout).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) => match self.retry_policy.should_retry(attempt) {
                    RetryDecision::Retry {
                        delay,
                        attempt: next_attempt,
                    } => {
                        info!(
                            url = %url,
                            attempt = next_attempt,
                            max_attempts = self.retry_policy.max_attempts(),
                            delay_ms = delay.as_millis(),
                            error = %e,
                            "retrying download"
                        );
                        stats.increment_retried();
                        tokio::time::sleep(delay).await;
                    }
                    RetryDecision::DoNotRetry { reason } => {
                        debug!(url = %url, %reason, "not retrying download");
                        return Err((e, attempt));
                    }
                },
            }
        }
    }
}
