//! Error types for the download module.
//!
//! [`DownloadError`] describes one failed attempt; [`FetchError`] is what a
//! page turns into once its retry budget is spent.

use thiserror::Error;

/// Errors from a single page download attempt.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The attempt exceeded its timeout.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// A successful response with no body.
    #[error("empty response body downloading {url}")]
    EmptyBody {
        /// The URL that returned nothing.
        url: String,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error, mapping timeouts to
    /// [`DownloadError::Timeout`].
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            return Self::Timeout { url: url.into() };
        }
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an empty-body error.
    pub fn empty_body(url: impl Into<String>) -> Self {
        Self::EmptyBody { url: url.into() }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }
}

// No `From<reqwest::Error>`: every variant needs the URL for context.

/// A page that still failed after every retry attempt.
///
/// Aborts the whole batch it belongs to.
#[derive(Debug, Error)]
#[error("failed to download page {page_index}/{total_pages} after {attempts} attempts: {source}")]
pub struct FetchError {
    /// 1-based index of the failing page.
    pub page_index: usize,
    /// Number of pages in the batch.
    pub total_pages: usize,
    /// Attempts made before giving up.
    pub attempts: u32,
    /// Error of the last attempt.
    #[source]
    pub source: DownloadError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_error_http_status_display() {
        let error = DownloadError::http_status("https://img.example/p1.png", 503);
        let msg = error.to_string();
        assert!(msg.contains("503"), "Expected '503' in: {msg}");
        assert!(msg.contains("https://img.example/p1.png"), "Expected URL in: {msg}");
    }

    #[test]
    fn test_download_error_empty_body_display() {
        let msg = DownloadError::empty_body("https://img.example/p1.png").to_string();
        assert!(msg.contains("empty response body"), "Expected reason in: {msg}");
    }

    #[test]
    fn test_fetch_error_display_carries_page_context() {
        let error = FetchError {
            page_index: 4,
            total_pages: 5,
            attempts: 3,
            source: DownloadError::timeout("https://img.example/p4.png"),
        };
        let msg = error.to_string();
        assert!(msg.contains("page 4/5"), "Expected page context in: {msg}");
        assert!(msg.contains("3 attempts"), "Expected attempts in: {msg}");
        assert!(msg.contains("timeout"), "Expected cause in: {msg}");
    }
}
