//! Mapping from numeric detector class ids to labels.

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

/// COCO class ids as emitted by TensorFlow Object Detection API models.
const COCO_LABELS: &[(u32, &str)] = &[
    (1, "person"),
    (2, "bicycle"),
    (3, "car"),
    (4, "motorcycle"),
    (5, "airplane"),
    (6, "bus"),
    (7, "train"),
    (8, "truck"),
    (9, "boat"),
    (10, "traffic light"),
    (11, "fire hydrant"),
    (13, "stop sign"),
    (14, "parking meter"),
    (15, "bench"),
    (16, "bird"),
    (17, "cat"),
    (18, "dog"),
    (19, "horse"),
    (20, "sheep"),
    (21, "cow"),
    (22, "elephant"),
    (23, "bear"),
    (24, "zebra"),
    (25, "giraffe"),
    (27, "backpack"),
    (28, "umbrella"),
    (31, "handbag"),
    (32, "tie"),
    (33, "suitcase"),
    (34, "frisbee"),
    (35, "skis"),
    (36, "snowboard"),
    (37, "sports ball"),
    (38, "kite"),
    (39, "baseball bat"),
    (40, "baseball glove"),
    (41, "skateboard"),
    (42, "surfboard"),
    (43, "tennis racket"),
    (44, "bottle"),
    (46, "wine glass"),
    (47, "cup"),
    (48, "fork"),
    (49, "knife"),
    (50, "spoon"),
    (51, "bowl"),
    (52, "banana"),
    (53, "apple"),
    (54, "sandwich"),
    (55, "orange"),
    (56, "broccoli"),
    (57, "carrot"),
    (58, "hot dog"),
    (59, "pizza"),
    (60, "donut"),
    (61, "cake"),
    (62, "chair"),
    (63, "couch"),
    (64, "potted plant"),
    (65, "bed"),
    (67, "dining table"),
    (70, "toilet"),
    (72, "tv"),
    (73, "laptop"),
    (74, "mouse"),
    (75, "remote"),
    (76, "keyboard"),
    (77, "cell phone"),
    (78, "microwave"),
    (79, "oven"),
    (80, "toaster"),
    (81, "sink"),
    (82, "refrigerator"),
    (84, "book"),
    (85, "clock"),
    (86, "vase"),
    (87, "scissors"),
    (88, "teddy bear"),
    (89, "hair drier"),
    (90, "toothbrush"),
];

/// Errors that can occur while loading a label map.
#[derive(Debug, Error)]
pub enum LabelMapError {
    #[error("Failed to read label map: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse label map: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid class id in label map: {0}")]
    InvalidId(String),

    #[error("Blank label for class id {0} in label map")]
    BlankLabel(u32),
}

/// Lookup table from class id to label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    labels: HashMap<u32, String>,
}

impl LabelMap {
    /// The 90-id COCO label map.
    pub fn coco() -> Self {
        Self {
            labels: COCO_LABELS
                .iter()
                .map(|(id, name)| (*id, (*name).to_string()))
                .collect(),
        }
    }

    /// Parses a JSON object of the form `{"1": "person", "2": "bicycle"}`.
    pub fn from_json_str(json: &str) -> Result<Self, LabelMapError> {
        let raw: HashMap<String, String> = serde_json::from_str(json)?;
        let labels = raw
            .into_iter()
            .map(|(id, name)| {
                let id = id
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| LabelMapError::InvalidId(id.clone()))?;
                if name.trim().is_empty() {
                    return Err(LabelMapError::BlankLabel(id));
                }
                Ok((id, name))
            })
            .collect::<Result<_, LabelMapError>>()?;
        Ok(Self { labels })
    }

    /// Loads a JSON label map from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LabelMapError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Returns the label for `id`, if known.
    pub fn label(&self, id: u32) -> Option<&str> {
        self.labels.get(&id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl Default for LabelMap {
    fn default() -> Self {
        Self::coco()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coco_map_has_eighty_classes() {
        let labels = LabelMap::coco();
        assert_eq!(labels.len(), 80);
        assert_eq!(labels.label(17), Some("cat"));
        assert_eq!(labels.label(18), Some("dog"));
        assert_eq!(labels.label(12), None);
    }

    #[test]
    fn parses_json_label_map() {
        let labels = LabelMap::from_json_str(r#"{"1": "widget", "7": "gadget"}"#).unwrap();
        assert_eq!(labels.label(1), Some("widget"));
        assert_eq!(labels.label(7), Some("gadget"));
        assert_eq!(labels.len(), 2);
    }

    #[test]
    fn rejects_non_numeric_ids() {
        let result = LabelMap::from_json_str(r#"{"one": "widget"}"#);
        assert!(matches!(result, Err(LabelMapError::InvalidId(_))));
    }

    #[test]
    fn rejects_blank_labels() {
        let result = LabelMap::from_json_str(r#"{"1": "widget", "5": "  "}"#);
        assert!(matches!(result, Err(LabelMapError::BlankLabel(5))));
    }
}
