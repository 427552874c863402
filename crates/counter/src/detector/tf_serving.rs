//! Detector backed by a TensorFlow Serving REST endpoint.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use super::{LabelMap, ObjectDetector};
use crate::error::DetectorError;
use crate::prediction::{BoundingBox, Prediction, over_threshold};

/// Location and model of a TensorFlow Serving instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TfServingConfig {
    pub host: String,
    pub port: u16,
    pub model: String,
    pub timeout: Duration,
}

impl TfServingConfig {
    /// Returns the REST predict URL for the configured model.
    pub fn predict_url(&self) -> String {
        format!(
            "http://{}:{}/v1/models/{}:predict",
            self.host, self.port, self.model
        )
    }
}

impl Default for TfServingConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8501,
            model: "rfcn".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    predictions: Vec<RawDetections>,
}

/// Output tensors of a TF Object Detection API model for one image.
#[derive(Debug, Deserialize)]
struct RawDetections {
    num_detections: f64,
    /// `[ymin, xmin, ymax, xmax]` per detection.
    detection_boxes: Vec<[f32; 4]>,
    detection_scores: Vec<f32>,
    detection_classes: Vec<f64>,
}

/// Object detector calling TF Serving's `:predict` endpoint.
///
/// The upload is decoded locally and sent as an `H x W x 3` pixel tensor.
/// Requests are not retried; transport failures and 5xx answers surface as
/// [`DetectorError::Transient`].
#[derive(Debug, Clone)]
pub struct TfServingDetector {
    client: reqwest::Client,
    url: String,
    labels: LabelMap,
}

impl TfServingDetector {
    pub fn new(config: &TfServingConfig, labels: LabelMap) -> Result<Self, DetectorError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DetectorError::Transient(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: config.predict_url(),
            labels,
        })
    }

    /// Returns the predict URL requests are sent to.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn to_predictions(&self, raw: RawDetections) -> Vec<Prediction> {
        let available = raw
            .detection_boxes
            .len()
            .min(raw.detection_scores.len())
            .min(raw.detection_classes.len());
        let n = (raw.num_detections.max(0.0) as usize).min(available);

        let mut predictions = Vec::with_capacity(n);
        for i in 0..n {
            let class_id = raw.detection_classes[i].round() as u32;
            let Some(class_name) = self.labels.label(class_id) else {
                tracing::warn!(class_id, "skipping detection with unknown class id");
                continue;
            };
            let [ymin, xmin, ymax, xmax] = raw.detection_boxes[i];
            predictions.push(Prediction::new(
                class_name,
                raw.detection_scores[i],
                BoundingBox {
                    xmin,
                    ymin,
                    xmax,
                    ymax,
                },
            ));
        }
        predictions
    }
}

/// Decodes an encoded image into the `{"instances": [...]}` request body.
fn encode_instances(image: &[u8]) -> Result<serde_json::Value, DetectorError> {
    let rgb = image::load_from_memory(image)
        .map_err(|e| DetectorError::InvalidImage(e.to_string()))?
        .to_rgb8();
    let rows: Vec<Vec<[u8; 3]>> = rgb.rows().map(|row| row.map(|p| p.0).collect()).collect();
    Ok(serde_json::json!({ "instances": [rows] }))
}

#[async_trait]
impl ObjectDetector for TfServingDetector {
    #[tracing::instrument(skip(self, image), fields(url = %self.url, image_len = image.len()))]
    async fn detect(
        &self,
        image: &[u8],
        threshold: f32,
    ) -> Result<Vec<Prediction>, DetectorError> {
        let owned = image.to_vec();
        let body = tokio::task::spawn_blocking(move || encode_instances(&owned))
            .await
            .map_err(|e| DetectorError::Transient(format!("image decoding task failed: {e}")))??;

        let started = Instant::now();
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| DetectorError::Transient(e.to_string()))?;
        metrics::histogram!("detector_request_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        let status = response.status();
        if status == StatusCode::BAD_REQUEST {
            let detail = response.text().await.unwrap_or_default();
            return Err(DetectorError::InvalidImage(format!(
                "detector rejected image: {detail}"
            )));
        }
        if !status.is_success() {
            return Err(DetectorError::Transient(format!(
                "detector responded with {status}"
            )));
        }

        let parsed: PredictResponse = response
            .json()
            .await
            .map_err(|e| DetectorError::Transient(format!("malformed detector response: {e}")))?;
        let raw = parsed.predictions.into_iter().next().ok_or_else(|| {
            DetectorError::Transient("detector returned no predictions".to_string())
        })?;

        let predictions = over_threshold(self.to_predictions(raw), threshold);
        tracing::debug!(detections = predictions.len(), "detector call completed");
        Ok(predictions)
    }
}
