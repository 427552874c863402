//! Counting of detected objects.
//!
//! This crate provides:
//! - the aggregator turning detections into per-class counts
//! - the `ObjectDetector` trait with TF Serving and fake implementations
//! - the `CountDetectedObjects` and `DetectObjects` use cases

pub mod aggregate;
pub mod detector;
pub mod error;
pub mod prediction;
pub mod service;

pub use aggregate::{ObjectCounts, aggregate};
pub use detector::{
    FakeObjectDetector, LabelMap, LabelMapError, ObjectDetector, TfServingConfig,
    TfServingDetector,
};
pub use error::{CountError, DetectorError};
pub use prediction::{BoundingBox, Prediction, over_threshold};
pub use service::{CountDetectedObjects, CountResponse, DEFAULT_THRESHOLD, DetectObjects};
