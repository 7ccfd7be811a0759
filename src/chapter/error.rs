//! Error types for the upstream content API.

use thiserror::Error;

/// Failure talking to the upstream chapter-server endpoint.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Non-2xx response. `body` holds the (possibly truncated) response text.
    #[error("upstream returned HTTP {status} for {url}")]
    Status {
        /// The requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("network error calling {url}: {source}")]
    Network {
        /// The requested URL.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// A 2xx response whose payload could not be used.
    #[error("malformed upstream response from {url}: {reason}")]
    Malformed {
        /// The requested URL.
        url: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build upstream HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Longest response body kept in [`UpstreamError::Status`].
const MAX_BODY_CHARS: usize = 512;

impl UpstreamError {
    /// Creates a status error, truncating the body.
    pub fn status(url: impl Into<String>, status: u16, body: &str) -> Self {
        Self::Status {
            url: url.into(),
            status,
            body: body.chars().take(MAX_BODY_CHARS).collect(),
        }
    }

    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a malformed-response error.
    pub fn malformed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// The upstream HTTP status, when one was received.
    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// `true` when upstream rejected the credential (401/403).
    #[must_use]
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self.http_status(), Some(401 | 403))
    }
}
