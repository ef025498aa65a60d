//! Gateway request handlers: GET, HEAD, PUT/POST on any path.
//!
//! Every request path maps to one object key (configured prefix + path with
//! the leading slash stripped) and exactly one backend call. PUT and POST
//! are identical — the gateway does not distinguish create from replace.

use super::errors::GatewayError;
use crate::mapping::{self, HeaderMapping};
use crate::storage::{StorageBackend, StorageError};
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::{StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Application state shared across handlers.
///
/// Immutable after startup; the backend client is safe for concurrent use,
/// so requests share it without synchronization.
pub struct AppState {
    pub storage: Box<dyn StorageBackend>,
    pub key_prefix: String,
    pub header_mapping: HeaderMapping,
}

impl AppState {
    /// Derive the backend object key for a request path. The wildcard
    /// capture is `None` for requests to `/`, which map to the bare prefix.
    fn object_key(&self, path: Option<&str>) -> String {
        mapping::object_key(&self.key_prefix, path.unwrap_or(""))
    }
}

/// GET handler: stream the object to the response body.
///
/// The backend stream is sequential and in-order; it is handed to the
/// response as-is, so bytes reach the client in strict content order with
/// constant memory. Missing objects are 404, other backend failures 502.
#[instrument(skip(state))]
pub async fn download_object(
    State(state): State<Arc<AppState>>,
    path: Option<Path<String>>,
) -> Result<Response, GatewayError> {
    let key = state.object_key(path.as_ref().map(|p| p.0.as_str()));
    info!("GET {}", key);

    let (head, stream) = state.storage.get(&key).await.map_err(|e| {
        warn!("Failed to download {}: {}", key, e);
        GatewayError::from(e)
    })?;

    debug!(
        "Streaming {} ({} bytes)",
        key,
        head.content_length
            .map(|len| len.to_string())
            .unwrap_or_else(|| "?".to_string())
    );

    let headers = object_headers(head.content_length, head.content_type.as_deref());
    Ok((StatusCode::OK, headers, Body::from_stream(stream)).into_response())
}

/// HEAD handler: existence probe.
///
/// Every failure cause (missing object, transport error, permission error)
/// collapses to 404 — the probe answers "is it usable", not "why not".
/// No body in either case.
#[instrument(skip(state))]
pub async fn check_object(
    State(state): State<Arc<AppState>>,
    path: Option<Path<String>>,
) -> Response {
    let key = state.object_key(path.as_ref().map(|p| p.0.as_str()));
    info!("HEAD {}", key);

    match state.storage.head(&key).await {
        Ok(head) => {
            let headers = object_headers(head.content_length, head.content_type.as_deref());
            (StatusCode::OK, headers).into_response()
        }
        Err(e) => {
            debug!("Existence check failed for {}: {}", key, e);
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

/// PUT/POST handler: store the request body as the object content.
///
/// The body is consumed as a chunk stream and fed to the backend
/// incrementally. Content type comes from the request (empty when absent);
/// metadata is the configured projection of the request headers. All
/// failures surface synchronously as 400 with the backend error embedded.
#[instrument(skip(state, headers, body))]
pub async fn upload_object(
    State(state): State<Arc<AppState>>,
    path: Option<Path<String>>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, GatewayError> {
    let key = state.object_key(path.as_ref().map(|p| p.0.as_str()));
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let metadata = state.header_mapping.metadata_for(&headers);

    info!(
        "PUT {} (content-type: {:?}, {} metadata entries)",
        key,
        content_type,
        metadata.len()
    );

    let stream = body
        .into_data_stream()
        .map_err(|e| StorageError::Body(e.to_string()))
        .boxed();

    match state
        .storage
        .put(&key, content_type, metadata, stream)
        .await
    {
        Ok(()) => {
            debug!("Stored {}", key);
            Ok(StatusCode::CREATED.into_response())
        }
        Err(e) => {
            warn!("Failed to upload {}: {}", key, e);
            Err(GatewayError::UploadRejected(format!("{}: {}", key, e)))
        }
    }
}

/// Fallback for methods outside the dispatch table. Explicit 405 instead of
/// a silent no-op.
pub async fn method_not_allowed() -> GatewayError {
    GatewayError::MethodNotAllowed
}

/// Build Content-Length/Content-Type response headers from what the backend
/// reported; absent or empty attributes are omitted.
fn object_headers(content_length: Option<u64>, content_type: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(len) = content_length {
        if let Ok(value) = HeaderValue::from_str(&len.to_string()) {
            headers.insert(CONTENT_LENGTH, value);
        }
    }
    if let Some(ct) = content_type.filter(|ct| !ct.is_empty()) {
        if let Ok(value) = HeaderValue::from_str(ct) {
            headers.insert(CONTENT_TYPE, value);
        }
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_headers_skips_empty_content_type() {
        let headers = object_headers(Some(12), Some(""));
        assert_eq!(headers.get(CONTENT_LENGTH).unwrap(), "12");
        assert!(headers.get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn object_headers_full() {
        let headers = object_headers(Some(3), Some("text/plain"));
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "text/plain");
    }
}
