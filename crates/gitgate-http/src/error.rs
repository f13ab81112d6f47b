//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gitgate_bridge::BridgeError;
use gitgate_repo::LocateError;

/// Gateway error surfaced to HTTP clients.
///
/// Only failures discovered before any response bytes are committed reach
/// this type; once streaming has begun the only remaining signal is abrupt
/// stream termination.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Repository could not be resolved or does not exist.
    #[error("repository not found")]
    NotFound,
    /// Client sent a request the gateway cannot interpret.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Failure before any bytes were sent.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = match &self {
            HttpError::NotFound => StatusCode::NOT_FOUND,
            HttpError::BadRequest(_) => StatusCode::BAD_REQUEST,
            HttpError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }
        (status, self.to_string()).into_response()
    }
}

impl From<LocateError> for HttpError {
    fn from(e: LocateError) -> Self {
        match e {
            LocateError::NotResolvable
            | LocateError::InvalidName(_)
            | LocateError::RepositoryPathMissing(_) => HttpError::NotFound,
        }
    }
}

impl From<BridgeError> for HttpError {
    fn from(e: BridgeError) -> Self {
        match e {
            BridgeError::RepositoryPathMissing(_) => HttpError::NotFound,
            other => HttpError::Internal(other.to_string()),
        }
    }
}
