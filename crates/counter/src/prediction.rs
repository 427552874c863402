use serde::{Deserialize, Serialize};

/// Bounding box in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

/// One object instance found in an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub class_name: String,
    pub score: f32,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
}

impl Prediction {
    pub fn new(class_name: impl Into<String>, score: f32, bbox: BoundingBox) -> Self {
        Self {
            class_name: class_name.into(),
            score,
            bbox,
        }
    }
}

/// Keeps the predictions whose score reaches `threshold`.
pub fn over_threshold(predictions: Vec<Prediction>, threshold: f32) -> Vec<Prediction> {
    predictions
        .into_iter()
        .filter(|p| p.score >= threshold)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOX: BoundingBox = BoundingBox {
        xmin: 0.1,
        ymin: 0.1,
        xmax: 0.5,
        ymax: 0.5,
    };

    #[test]
    fn over_threshold_is_inclusive() {
        let predictions = vec![
            Prediction::new("cat", 0.5, BOX),
            Prediction::new("dog", 0.49, BOX),
            Prediction::new("car", 0.9, BOX),
        ];

        let kept = over_threshold(predictions, 0.5);
        let names: Vec<_> = kept.iter().map(|p| p.class_name.as_str()).collect();
        assert_eq!(names, vec!["cat", "car"]);
    }

    #[test]
    fn prediction_serializes_box_field() {
        let json = serde_json::to_value(Prediction::new("cat", 0.75, BOX)).unwrap();
        assert_eq!(json["class_name"], "cat");
        assert_eq!(json["box"]["xmax"], 0.5);
    }
}
