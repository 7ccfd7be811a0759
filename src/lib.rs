//! Chapter Stitch Core Library
//!
//! This library serves the read path for one upstream comic provider: it
//! resolves a chapter's page manifest, downloads the pages with bounded
//! concurrency and retry, stitches them into one vertical image and streams
//! the result to HTTP clients.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`auth`] - Upstream credential pair, token endpoint client and session manager
//! - [`cache`] - Key-value cache with per-key TTL (memory and `SQLite` backends)
//! - [`chapter`] - Chapter metadata model and cache-or-fetch resolver
//! - [`download`] - Page HTTP client, retry policy and concurrent page fetcher
//! - [`compose`] - Page normalization and vertical composition
//! - [`delivery`] - Request pipeline, error mapping and the axum router
//! - [`db`] - Database connection and schema management

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod cache;
pub mod chapter;
pub mod compose;
pub mod db;
pub mod delivery;
pub mod download;
mod http_client;
mod user_agent;

// Re-export commonly used types
pub use auth::{
    AuthClient, AuthConfig, AuthError, CredentialPair, CredentialStore, SessionManager,
    SqliteCredentialStore,
};
pub use cache::{Cache, CacheError, MemoryCache, SqliteCache};
pub use chapter::{ChapterMetadata, MetadataResolver, Quality, UpstreamConfig, UpstreamError};
pub use compose::{CompositionError, Compositor, TARGET_WIDTH};
pub use db::{Database, DbError};
pub use delivery::{ChapterService, ServiceError, router};
pub use download::{
    DEFAULT_MAX_RETRIES, DownloadError, FetchError, PageClient, PageFetcher, RetryPolicy,
    default_concurrency,
};
