//! API error types with HTTP response mapping.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use count_store::CountStoreError;
use counter::{CountError, DetectorError, LabelMapError};
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Counting pipeline error.
    Count(CountError),
    /// Repository error outside the counting pipeline.
    Storage(CountStoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Count(err) => count_error_to_response(err),
            ApiError::Storage(err) => storage_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn count_error_to_response(err: CountError) -> (StatusCode, String) {
    match err {
        CountError::InvalidInput(_) | CountError::InvalidImage(_) => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        CountError::Transient(_) => {
            tracing::warn!(error = %err, "detector unavailable");
            (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
        }
        CountError::Storage(err) => storage_error_to_response(err),
    }
}

fn storage_error_to_response(err: CountStoreError) -> (StatusCode, String) {
    match &err {
        CountStoreError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        CountStoreError::InvalidInput(_) => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
        _ => {
            tracing::error!(error = %err, retryable = err.is_retryable(), "storage failure");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl From<CountError> for ApiError {
    fn from(err: CountError) -> Self {
        ApiError::Count(err)
    }
}

impl From<CountStoreError> for ApiError {
    fn from(err: CountStoreError) -> Self {
        ApiError::Storage(err)
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::BadRequest(format!("Invalid multipart body: {err}"))
    }
}

/// Errors that abort startup while building the application state.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("count store: {0}")]
    Storage(#[from] CountStoreError),

    #[error("detector: {0}")]
    Detector(#[from] DetectorError),

    #[error("label map: {0}")]
    LabelMap(#[from] LabelMapError),

    /// Count batches run in MongoDB transactions, which standalone servers
    /// do not support.
    #[error("count store: MongoDB must be a replica set member (start mongod with --replSet)")]
    ReplicaSetRequired,
}
