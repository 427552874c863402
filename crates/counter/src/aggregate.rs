//! Per-request aggregation of detections into class counts.

use std::collections::BTreeMap;

use common::{ObjectClass, ObjectCount};
use serde::Serialize;

use crate::error::CountError;
use crate::prediction::Prediction;

/// Number of detections per object class for a single image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ObjectCounts(BTreeMap<ObjectClass, u64>);

impl ObjectCounts {
    /// Returns the count for `class`, zero when it was not detected.
    pub fn get(&self, class: &ObjectClass) -> u64 {
        self.0.get(class).copied().unwrap_or(0)
    }

    /// Number of distinct classes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of all counts, equal to the number of aggregated detections.
    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    /// Iterates over `(class, count)` pairs ordered by class.
    pub fn iter(&self) -> impl Iterator<Item = (&ObjectClass, u64)> {
        self.0.iter().map(|(class, count)| (class, *count))
    }

    /// Builds the repository batch, one entry per class ordered by class.
    pub fn to_object_counts(&self) -> Vec<ObjectCount> {
        self.iter()
            .map(|(class, count)| ObjectCount::new(class.clone(), count))
            .collect()
    }
}

/// Counts how many times each label occurs in `predictions`.
///
/// A prediction with a blank label makes the whole list malformed.
pub fn aggregate(predictions: &[Prediction]) -> Result<ObjectCounts, CountError> {
    let mut counts = BTreeMap::new();
    for prediction in predictions {
        let class = ObjectClass::new(prediction.class_name.as_str()).map_err(|_| {
            CountError::InvalidInput(format!(
                "detection with score {} has an empty label",
                prediction.score
            ))
        })?;
        *counts.entry(class).or_insert(0) += 1;
    }
    Ok(ObjectCounts(counts))
}
