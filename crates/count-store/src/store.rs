use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use common::{ObjectClass, ObjectCount};

use crate::{CountStoreError, Result};

/// Core trait for count repository implementations.
///
/// A count repository owns the cumulative number of detections per object
/// class. Updates are additive: each batch entry adds its count to the
/// stored total, creating the class on first sight. All implementations
/// must be thread-safe (Send + Sync) and apply a batch atomically.
#[async_trait]
pub trait CountRepository: Send + Sync {
    /// Reads stored counts, ordered by object class.
    ///
    /// With `None` every stored record is returned. With a filter only the
    /// records whose class is in the set are returned; classes that were
    /// never written are omitted rather than reported as errors.
    async fn read_values(
        &self,
        filter: Option<&BTreeSet<ObjectClass>>,
    ) -> Result<Vec<ObjectCount>>;

    /// Adds a batch of per-class deltas to the stored totals.
    ///
    /// Duplicate classes within one batch accumulate left-to-right. The
    /// batch is applied all-or-nothing: on error no entry is persisted. An
    /// empty batch is a no-op.
    async fn update_values(&self, new_values: Vec<ObjectCount>) -> Result<()>;
}

/// Extension trait providing single-key conveniences for count repositories.
#[async_trait]
pub trait CountRepositoryExt: CountRepository {
    /// Reads the stored count for one class.
    ///
    /// Fails with `NotFound` when the class has never been written.
    async fn read_value(&self, object_class: &ObjectClass) -> Result<ObjectCount> {
        let filter = BTreeSet::from([object_class.clone()]);
        self.read_values(Some(&filter))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CountStoreError::NotFound(object_class.clone()))
    }

    /// Adds a single delta to the stored total.
    async fn update_value(&self, value: ObjectCount) -> Result<()> {
        self.update_values(vec![value]).await
    }
}

// Blanket implementation for all CountRepository implementations
impl<T: CountRepository + ?Sized> CountRepositoryExt for T {}

/// Folds a batch into one delta per class, ordered by class.
///
/// Duplicates are summed left-to-right. Fails when a merged delta no longer
/// fits the signed 64-bit range every backend stores.
pub fn merge_batch(values: Vec<ObjectCount>) -> Result<Vec<ObjectCount>> {
    let mut merged: BTreeMap<ObjectClass, u64> = BTreeMap::new();
    for value in values {
        let slot = merged.entry(value.object_class).or_insert(0);
        *slot = checked_total(*slot, value.count)?;
    }
    Ok(merged
        .into_iter()
        .map(|(object_class, count)| ObjectCount::new(object_class, count))
        .collect())
}

/// Adds a delta to a stored total, keeping the result within `i64::MAX`.
pub fn checked_total(current: u64, delta: u64) -> Result<u64> {
    current
        .checked_add(delta)
        .filter(|total| *total <= i64::MAX as u64)
        .ok_or_else(|| {
            CountStoreError::InvalidInput(format!(
                "count overflow: {current} + {delta} exceeds {}",
                i64::MAX
            ))
        })
}

/// Records the outcome of a batch update for the given backend.
pub(crate) fn record_update(backend: &'static str, result: &Result<()>) {
    match result {
        Ok(()) => metrics::counter!("count_store_updates_total", "backend" => backend).increment(1),
        Err(e) => {
            metrics::counter!("count_store_update_failures_total", "backend" => backend)
                .increment(1);
            tracing::warn!(backend, error = %e, "count batch rejected");
        }
    }
}

/// Converts a delta to the signed representation used by the backends.
pub(crate) fn to_stored(count: u64) -> Result<i64> {
    i64::try_from(count)
        .map_err(|_| CountStoreError::InvalidInput(format!("count {count} exceeds {}", i64::MAX)))
}

/// Converts a stored signed count back to the domain representation.
pub(crate) fn from_stored(object_class: &str, count: i64) -> Result<ObjectCount> {
    let object_class = ObjectClass::new(object_class)
        .map_err(|e| CountStoreError::InvalidInput(format!("stored class: {e}")))?;
    let count = u64::try_from(count).map_err(|_| {
        CountStoreError::InvalidInput(format!("stored count for {object_class} is negative"))
    })?;
    Ok(ObjectCount::new(object_class, count))
}
