//! Gateway error types and HTTP responses
//!
//! The gateway speaks plain HTTP, so errors are plain-text bodies with an
//! explicit status code. The original silent failure modes (unreported
//! download errors, no-op on unknown methods) are replaced with 404/502 and
//! 405 respectively; HEAD responses stay body-less by contract.

use crate::storage::StorageError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors surfaced to HTTP clients
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Failed to store object: {0}")]
    UploadRejected(String),

    #[error("Method not allowed")]
    MethodNotAllowed,
}

impl GatewayError {
    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Backend(_) => StatusCode::BAD_GATEWAY,
            GatewayError::UploadRejected(_) => StatusCode::BAD_REQUEST,
            GatewayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = self.to_string();

        (status, [("Content-Type", "text/plain; charset=utf-8")], body).into_response()
    }
}

impl From<StorageError> for GatewayError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => GatewayError::NotFound(key),
            other => GatewayError::Backend(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(
            GatewayError::NotFound("k".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            GatewayError::Backend("boom".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            GatewayError::UploadRejected("boom".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::MethodNotAllowed.status_code(),
            StatusCode::METHOD_NOT_ALLOWED
        );
    }

    #[test]
    fn storage_not_found_maps_to_404() {
        let err: GatewayError = StorageError::NotFound("k".into()).into();
        assert!(matches!(err, GatewayError::NotFound(_)));
    }

    #[test]
    fn storage_backend_error_maps_to_502() {
        let err: GatewayError = StorageError::Backend("down".into()).into();
        assert!(matches!(err, GatewayError::Backend(_)));
    }
}
