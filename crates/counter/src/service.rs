//! Use cases wiring a detector, the aggregator and a count repository.

use std::sync::Arc;

use common::ObjectCount;
use count_store::CountRepository;
use serde::Serialize;

use crate::aggregate::{ObjectCounts, aggregate};
use crate::detector::ObjectDetector;
use crate::error::CountError;
use crate::prediction::{Prediction, over_threshold};

/// Default confidence threshold when a request does not name one.
pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// Outcome of counting the objects in one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountResponse {
    /// Counts detected in this image.
    pub current_objects: ObjectCounts,
    /// Cumulative counts across every processed image, ordered by class.
    pub total_objects: Vec<ObjectCount>,
}

/// Rejects empty uploads and thresholds outside `[0, 1]`.
pub fn validate_request(image: &[u8], threshold: f32) -> Result<(), CountError> {
    if image.is_empty() {
        return Err(CountError::InvalidInput("image is empty".to_string()));
    }
    if !(0.0..=1.0).contains(&threshold) {
        return Err(CountError::InvalidInput(format!(
            "threshold must be within [0, 1], got {threshold}"
        )));
    }
    Ok(())
}

async fn find_valid_predictions(
    detector: &dyn ObjectDetector,
    image: &[u8],
    threshold: f32,
) -> Result<Vec<Prediction>, CountError> {
    validate_request(image, threshold)?;
    let predictions = detector.detect(image, threshold).await?;
    Ok(over_threshold(predictions, threshold))
}

/// Detects objects in an image, adds them to the running totals and
/// reports both the per-image and the cumulative counts.
#[derive(Clone)]
pub struct CountDetectedObjects {
    detector: Arc<dyn ObjectDetector>,
    repository: Arc<dyn CountRepository>,
}

impl CountDetectedObjects {
    pub fn new(detector: Arc<dyn ObjectDetector>, repository: Arc<dyn CountRepository>) -> Self {
        Self {
            detector,
            repository,
        }
    }

    /// Returns the repository holding the cumulative counts.
    pub fn repository(&self) -> &Arc<dyn CountRepository> {
        &self.repository
    }

    /// Counts the objects found in `image` and persists them.
    ///
    /// Storage and detector errors propagate unchanged; a failed update
    /// leaves the totals as they were.
    #[tracing::instrument(
        skip(self, image),
        fields(request_id = %uuid::Uuid::new_v4(), image_len = image.len())
    )]
    pub async fn execute(
        &self,
        image: &[u8],
        threshold: f32,
    ) -> Result<CountResponse, CountError> {
        metrics::counter!("object_count_requests_total").increment(1);

        let predictions = find_valid_predictions(self.detector.as_ref(), image, threshold).await?;
        let current_objects = aggregate(&predictions)?;
        metrics::counter!("objects_detected_total").increment(current_objects.total());

        self.repository
            .update_values(current_objects.to_object_counts())
            .await?;
        let total_objects = self.repository.read_values(None).await?;

        tracing::info!(
            detections = predictions.len(),
            classes = current_objects.len(),
            "object count completed"
        );

        Ok(CountResponse {
            current_objects,
            total_objects,
        })
    }
}

/// Runs detection only, without touching the stored counts.
#[derive(Clone)]
pub struct DetectObjects {
    detector: Arc<dyn ObjectDetector>,
}

impl DetectObjects {
    pub fn new(detector: Arc<dyn ObjectDetector>) -> Self {
        Self { detector }
    }

    #[tracing::instrument(skip(self, image), fields(image_len = image.len()))]
    pub async fn execute(
        &self,
        image: &[u8],
        threshold: f32,
    ) -> Result<Vec<Prediction>, CountError> {
        let predictions = find_valid_predictions(self.detector.as_ref(), image, threshold).await?;
        tracing::info!(detections = predictions.len(), "object detection completed");
        Ok(predictions)
    }
}
