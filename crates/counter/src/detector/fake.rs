//! Fixed-output detector for development and testing.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::ObjectDetector;
use crate::error::DetectorError;
use crate::prediction::{BoundingBox, Prediction, over_threshold};

#[derive(Debug, Default)]
struct FakeDetectorState {
    failure: Option<DetectorError>,
    calls: usize,
}

/// Detector that ignores the image and returns a configured prediction set.
#[derive(Debug, Clone)]
pub struct FakeObjectDetector {
    predictions: Arc<Vec<Prediction>>,
    state: Arc<RwLock<FakeDetectorState>>,
}

impl FakeObjectDetector {
    /// Creates a detector returning the default sample predictions.
    pub fn new() -> Self {
        Self::with_predictions(default_predictions())
    }

    /// Creates a detector returning `predictions` for every image.
    pub fn with_predictions(predictions: Vec<Prediction>) -> Self {
        Self {
            predictions: Arc::new(predictions),
            state: Arc::new(RwLock::new(FakeDetectorState::default())),
        }
    }

    /// Configures the detector to fail every call with `failure`, or to
    /// succeed again with `None`.
    pub fn set_failure(&self, failure: Option<DetectorError>) {
        self.state.write().unwrap().failure = failure;
    }

    /// Returns the number of `detect` calls made so far.
    pub fn call_count(&self) -> usize {
        self.state.read().unwrap().calls
    }
}

impl Default for FakeObjectDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectDetector for FakeObjectDetector {
    async fn detect(
        &self,
        _image: &[u8],
        threshold: f32,
    ) -> Result<Vec<Prediction>, DetectorError> {
        let mut state = self.state.write().unwrap();
        state.calls += 1;
        if let Some(failure) = &state.failure {
            return Err(failure.clone());
        }

        Ok(over_threshold(self.predictions.as_ref().clone(), threshold))
    }
}

fn default_predictions() -> Vec<Prediction> {
    let sample = |xmin, ymin, xmax, ymax| BoundingBox {
        xmin,
        ymin,
        xmax,
        ymax,
    };
    vec![
        Prediction::new("cat", 0.999, sample(0.05, 0.10, 0.40, 0.62)),
        Prediction::new("cat", 0.91, sample(0.48, 0.12, 0.80, 0.70)),
        Prediction::new("dog", 0.82, sample(0.30, 0.45, 0.95, 0.98)),
        Prediction::new("person", 0.64, sample(0.00, 0.00, 0.25, 0.90)),
        Prediction::new("car", 0.31, sample(0.60, 0.70, 0.99, 0.99)),
    ]
}
