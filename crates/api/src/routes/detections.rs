//! Detection-only endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Multipart, State};
use counter::Prediction;
use serde::Serialize;

use super::{AppState, ImageUpload};
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct DetectionResponse {
    pub predictions: Vec<Prediction>,
}

/// POST /object-detection — return the detections over the threshold
/// without updating the stored counts.
#[tracing::instrument(skip(state, multipart))]
pub async fn detect(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<DetectionResponse>, ApiError> {
    let upload = ImageUpload::from_multipart(multipart).await?;
    let predictions = state
        .detect_objects
        .execute(&upload.image, upload.threshold)
        .await?;

    Ok(Json(DetectionResponse { predictions }))
}
