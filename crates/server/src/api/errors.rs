//! API error types mapped to HTTP status codes.
//!
//! Each [`ApiError`] variant maps to one status code and produces a JSON
//! body `{"error": "message"}`. Core errors convert via `From`, so handlers
//! can use `?` on `shelfdb_core` results.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use shelfdb_core::StoreError;

use crate::embedding::EmbeddingError;

/// Application-level error type that implements `IntoResponse`.
///
/// - `NotFound` → 404
/// - `BadRequest` → 400
/// - `Conflict` → 409 (duplicate id, dimension mismatch)
/// - `ServiceUnavailable` → 503 (embedding provider missing or failing)
/// - `Internal` → 500
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    ServiceUnavailable(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, axum::Json(json!({ "error": message }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => ApiError::NotFound(msg),
            StoreError::DimensionMismatch { .. } => ApiError::Conflict(err.to_string()),
            StoreError::UnknownIndex(_) | StoreError::InvalidInput(_) => {
                ApiError::BadRequest(err.to_string())
            }
            StoreError::Io(_) | StoreError::Serde(_) => {
                tracing::error!("storage failure: {err}");
                ApiError::Internal("storage failure".into())
            }
        }
    }
}

impl From<EmbeddingError> for ApiError {
    fn from(err: EmbeddingError) -> Self {
        tracing::warn!("embedding provider failure: {err}");
        ApiError::ServiceUnavailable("embedding provider unavailable".into())
    }
}
