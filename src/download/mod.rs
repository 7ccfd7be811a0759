//! Page downloads: HTTP client, retry policy and the concurrent fetcher.
//!
//! # Features
//!
//! - Whole-body downloads into memory (pages are small images)
//! - Hard per-attempt timeout (15s by default)
//! - Exponential backoff retry, 3 attempts by default
//! - Batch-wise concurrency clamped to 2..=6, order-preserving results
//! - Fail-fast: the first page out of retries aborts the chapter

mod client;
mod constants;
mod error;
mod fetcher;
mod retry;

pub use client::PageClient;
pub use constants::{ATTEMPT_TIMEOUT, MAX_CONCURRENCY, MIN_CONCURRENCY};
pub use error::{DownloadError, FetchError};
pub use fetcher::{PageFetcher, clamp_concurrency, default_concurrency};
pub use retry::{DEFAULT_MAX_RETRIES, RetryDecision, RetryPolicy};

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
