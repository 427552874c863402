//! Counter error types.

use count_store::CountStoreError;
use thiserror::Error;

/// Errors reported by an object detector.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectorError {
    /// The detector could not be reached or answered with a server error.
    #[error("Detector unavailable: {0}")]
    Transient(String),

    /// The image could not be decoded or was rejected by the detector.
    #[error("Invalid image: {0}")]
    InvalidImage(String),
}

impl DetectorError {
    /// Returns true if the same request may succeed when retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DetectorError::Transient(_))
    }
}

/// Errors that can occur while counting detected objects.
#[derive(Debug, Error)]
pub enum CountError {
    /// The request or the detections are malformed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The uploaded image is not usable.
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// The upstream detector is temporarily unavailable.
    #[error("Detector unavailable: {0}")]
    Transient(String),

    /// Persisting or reading counts failed.
    #[error("Storage error: {0}")]
    Storage(#[from] CountStoreError),
}

impl From<DetectorError> for CountError {
    fn from(err: DetectorError) -> Self {
        match err {
            DetectorError::Transient(msg) => CountError::Transient(msg),
            DetectorError::InvalidImage(msg) => CountError::InvalidImage(msg),
        }
    }
}
