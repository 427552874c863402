//! Object detector trait and its implementations.

pub mod fake;
pub mod labels;
pub mod tf_serving;

use async_trait::async_trait;

pub use fake::FakeObjectDetector;
pub use labels::{LabelMap, LabelMapError};
pub use tf_serving::{TfServingConfig, TfServingDetector};

use crate::error::DetectorError;
use crate::prediction::Prediction;

/// Trait for object detection backends.
///
/// Implementations return the detections whose score is at least
/// `threshold`, which callers keep within `[0, 1]`.
#[async_trait]
pub trait ObjectDetector: Send + Sync {
    /// Runs detection over encoded image bytes.
    async fn detect(&self, image: &[u8], threshold: f32)
    -> Result<Vec<Prediction>, DetectorError>;
}
