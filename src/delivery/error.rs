//! Request-boundary error and its HTTP mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::auth::AuthError;
use crate::chapter::{PageOutOfRange, UpstreamError};
use crate::compose::CompositionError;
use crate::download::FetchError;

/// Everything a chapter request can fail with.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No usable upstream credential.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The content API failed or returned garbage.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// A page exhausted its retries.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The pages could not be stitched.
    #[error(transparent)]
    Composition(#[from] CompositionError),

    /// Page index outside the chapter.
    #[error(transparent)]
    PageOutOfRange(#[from] PageOutOfRange),

    /// Unparseable request parameter.
    #[error("invalid request: {0}")]
    BadRequest(String),

    /// Anything else, e.g. a panicked blocking task.
    #[error("{0}")]
    Internal(String),
}

/// JSON error envelope.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Short error text; the detail itself unless the status is 500.
    pub error: String,
    /// Detail of a 500.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ServiceError {
    /// HTTP status for this failure.
    ///
    /// Upstream statuses pass through when they are 4xx/5xx; auth failures
    /// are 401 or 403.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Auth(e) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::UNAUTHORIZED)
            }
            Self::Upstream(e) => e
                .http_status()
                .and_then(|s| StatusCode::from_u16(s).ok())
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Self::PageOutOfRange(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Fetch(_) | Self::Composition(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The JSON envelope sent to the client.
    #[must_use]
    pub fn body(&self) -> ErrorBody {
        if self.status_code() == StatusCode::INTERNAL_SERVER_ERROR {
            ErrorBody {
                error: "Internal server error".to_string(),
                message: Some(self.to_string()),
            }
        } else {
            ErrorBody {
                error: self.to_string(),
                message: None,
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "request rejected");
        }
        (status, Json(self.body())).into_response()
    }
}
