//! HTTP route handlers and the state they share.

pub mod counts;
pub mod detections;
pub mod health;

use axum::body::Bytes;
use axum::extract::Multipart;
use counter::{CountDetectedObjects, DEFAULT_THRESHOLD, DetectObjects};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
#[derive(Clone)]
pub struct AppState {
    pub count_objects: CountDetectedObjects,
    pub detect_objects: DetectObjects,
    /// Name of the configured count backend, reported by `/health`.
    pub backend: &'static str,
    /// Largest accepted request body in bytes.
    pub max_upload_bytes: usize,
}

/// An uploaded image together with its confidence threshold.
///
/// Parsed from a `multipart/form-data` body with a `file` part holding
/// the image and an optional `threshold` text part.
#[derive(Debug)]
pub struct ImageUpload {
    pub filename: Option<String>,
    pub image: Bytes,
    pub threshold: f32,
}

impl ImageUpload {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut file = None;
        let mut threshold = DEFAULT_THRESHOLD;

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().map(str::to_owned);
            match name.as_deref() {
                Some("file") => {
                    let filename = field.file_name().map(str::to_owned);
                    file = Some((filename, field.bytes().await?));
                }
                Some("threshold") => {
                    let text = field.text().await?;
                    threshold = text.trim().parse().map_err(|_| {
                        ApiError::BadRequest(format!("Invalid threshold: {text:?}"))
                    })?;
                }
                // Unknown parts are drained by the next call
                _ => {}
            }
        }

        let (filename, image) =
            file.ok_or_else(|| ApiError::BadRequest("Missing file part".to_string()))?;

        Ok(Self {
            filename,
            image,
            threshold,
        })
    }
}
