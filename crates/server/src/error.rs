//! HTTP-facing errors for the webchat server.
//!
//! Every error renders as a JSON body `{"error": <message>}` with a status
//! chosen from the core error class.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use webchat_core::Error;

/// Errors returned from route handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed caller input.
    #[error("{0}")]
    BadRequest(String),

    /// Requested record does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Sliding window exhausted.
    #[error("Too many requests")]
    TooManyRequests,

    /// Completion service failed or is not configured.
    #[error("{0}")]
    Upstream(String),

    /// Anything else. The detail is logged, not returned.
    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidInput(msg) | Error::InvalidUrl(msg) => Self::BadRequest(msg),
            Error::CompletionFailed(msg) => Self::Upstream(format!("completion failed: {msg}")),
            other => {
                tracing::error!("request failed: {other}");
                Self::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
