//! Error types for upstream authentication.

use thiserror::Error;

/// The upstream credential is invalid, expired or could not be obtained.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Password login is impossible because credentials are not configured.
    #[error("upstream credentials are not configured (missing {field})")]
    MissingCredentials {
        /// Name of the first missing setting.
        field: &'static str,
    },

    /// The token endpoint answered a grant with an error status.
    #[error("{grant} grant rejected by auth endpoint (HTTP {status}): {description}")]
    Rejected {
        /// `password` or `refresh_token`.
        grant: &'static str,
        /// HTTP status code.
        status: u16,
        /// `error_description` from the response, or the raw error code.
        description: String,
    },

    /// The token endpoint could not be reached.
    #[error("network error calling auth endpoint: {0}")]
    Network(#[source] reqwest::Error),

    /// The token endpoint returned an unusable payload.
    #[error("malformed auth endpoint response: {0}")]
    Malformed(String),

    /// The HTTP client could not be constructed.
    #[error("failed to build auth HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl AuthError {
    /// HTTP status to surface to clients: 403 when upstream said forbidden,
    /// 401 otherwise.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Rejected { status: 403, .. } => 403,
            _ => 401,
        }
    }
}
