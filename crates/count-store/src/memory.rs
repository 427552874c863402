use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use common::{ObjectClass, ObjectCount};
use tokio::sync::RwLock;

use crate::{
    CountStoreError, Result,
    store::{CountRepository, checked_total, merge_batch, record_update},
};

#[derive(Debug, Default)]
struct InMemoryState {
    counts: BTreeMap<ObjectClass, u64>,
    fail_on: BTreeSet<ObjectClass>,
    unavailable: bool,
}

/// In-memory count repository for development and testing.
///
/// State lives only as long as the process. A batch is applied to a staged
/// copy under the write lock and swapped in once every entry succeeds, so
/// concurrent batches are serialized and never lose increments.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCountStore {
    state: Arc<RwLock<InMemoryState>>,
}

impl InMemoryCountStore {
    /// Creates a new empty in-memory count store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored object classes.
    pub async fn len(&self) -> usize {
        self.state.read().await.counts.len()
    }

    /// Returns true if no class has been counted yet.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.counts.is_empty()
    }

    /// Clears all stored counts.
    pub async fn clear(&self) {
        self.state.write().await.counts.clear();
    }

    /// Makes any batch containing `object_class` fail when that entry is
    /// applied.
    pub async fn fail_on_class(&self, object_class: ObjectClass) {
        self.state.write().await.fail_on.insert(object_class);
    }

    /// Configures every read and update to fail as if the store were down.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.write().await.unavailable = unavailable;
    }
}

#[async_trait]
impl CountRepository for InMemoryCountStore {
    async fn read_values(
        &self,
        filter: Option<&BTreeSet<ObjectClass>>,
    ) -> Result<Vec<ObjectCount>> {
        let state = self.state.read().await;
        if state.unavailable {
            return Err(CountStoreError::Unavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }

        let values = state
            .counts
            .iter()
            .filter(|(class, _)| filter.is_none_or(|f| f.contains(*class)))
            .map(|(class, count)| ObjectCount::new(class.clone(), *count))
            .collect();
        Ok(values)
    }

    async fn update_values(&self, new_values: Vec<ObjectCount>) -> Result<()> {
        if new_values.is_empty() {
            return Ok(());
        }

        let result = match merge_batch(new_values) {
            Ok(batch) => self.apply_batch(batch).await,
            Err(e) => Err(e),
        };
        record_update("memory", &result);
        result
    }
}

impl InMemoryCountStore {
    async fn apply_batch(&self, batch: Vec<ObjectCount>) -> Result<()> {
        let mut state = self.state.write().await;
        if state.unavailable {
            return Err(CountStoreError::Unavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }

        let mut staged = state.counts.clone();
        for value in batch {
            if state.fail_on.contains(&value.object_class) {
                return Err(CountStoreError::Unavailable(format!(
                    "injected failure for {}",
                    value.object_class
                )));
            }
            let current = staged.get(&value.object_class).copied().unwrap_or(0);
            staged.insert(value.object_class, checked_total(current, value.count)?);
        }

        state.counts = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CountRepositoryExt;

    fn class(label: &str) -> ObjectClass {
        ObjectClass::new(label).unwrap()
    }

    fn count(label: &str, n: u64) -> ObjectCount {
        ObjectCount::new(class(label), n)
    }

    fn filter(labels: &[&str]) -> BTreeSet<ObjectClass> {
        labels.iter().map(|l| class(l)).collect()
    }

    #[tokio::test]
    async fn update_creates_and_accumulates() {
        let store = InMemoryCountStore::new();

        store.update_values(vec![count("cat", 2)]).await.unwrap();
        store.update_values(vec![count("cat", 2)]).await.unwrap();

        let values = store.read_values(Some(&filter(&["cat"]))).await.unwrap();
        assert_eq!(values, vec![count("cat", 4)]);
    }

    #[tokio::test]
    async fn cat_and_dog_scenario() {
        let store = InMemoryCountStore::new();

        store
            .update_values(vec![count("cat", 2), count("dog", 1)])
            .await
            .unwrap();
        store.update_values(vec![count("cat", 1)]).await.unwrap();

        let values = store.read_values(Some(&filter(&["cat"]))).await.unwrap();
        assert_eq!(values, vec![count("cat", 3)]);
    }

    #[tokio::test]
    async fn duplicate_keys_in_one_batch_accumulate() {
        let store = InMemoryCountStore::new();

        store
            .update_values(vec![count("cat", 1), count("cat", 2)])
            .await
            .unwrap();

        assert_eq!(store.read_value(&class("cat")).await.unwrap(), count("cat", 3));
    }

    #[tokio::test]
    async fn empty_batch_is_noop() {
        let store = InMemoryCountStore::new();
        store.update_values(vec![count("dog", 5)]).await.unwrap();

        let before = store.read_values(None).await.unwrap();
        store.update_values(Vec::new()).await.unwrap();
        let after = store.read_values(None).await.unwrap();

        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn unknown_filtered_class_is_omitted() {
        let store = InMemoryCountStore::new();
        store.update_values(vec![count("cat", 1)]).await.unwrap();

        let values = store
            .read_values(Some(&filter(&["cat", "giraffe"])))
            .await
            .unwrap();
        assert_eq!(values, vec![count("cat", 1)]);

        let values = store.read_values(Some(&filter(&["giraffe"]))).await.unwrap();
        assert!(values.is_empty());
    }

    #[tokio::test]
    async fn empty_filter_returns_nothing() {
        let store = InMemoryCountStore::new();
        store.update_values(vec![count("cat", 1)]).await.unwrap();

        let values = store.read_values(Some(&BTreeSet::new())).await.unwrap();
        assert!(values.is_empty());
    }

    #[tokio::test]
    async fn read_all_is_superset_of_filtered_read() {
        let store = InMemoryCountStore::new();
        store
            .update_values(vec![count("cat", 1), count("dog", 2), count("car", 3)])
            .await
            .unwrap();

        let all = store.read_values(None).await.unwrap();
        let some = store
            .read_values(Some(&filter(&["cat", "car"])))
            .await
            .unwrap();

        assert_eq!(all.len(), 3);
        assert!(some.iter().all(|v| all.contains(v)));
    }

    #[tokio::test]
    async fn read_values_is_ordered_by_class() {
        let store = InMemoryCountStore::new();
        store
            .update_values(vec![count("dog", 1), count("cat", 1), count("bird", 1)])
            .await
            .unwrap();

        let classes: Vec<_> = store
            .read_values(None)
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.object_class.into_inner())
            .collect();
        assert_eq!(classes, vec!["bird", "cat", "dog"]);
    }

    #[tokio::test]
    async fn failure_mid_batch_leaves_store_unchanged() {
        let store = InMemoryCountStore::new();
        store.update_values(vec![count("cat", 1)]).await.unwrap();
        store.fail_on_class(class("dog")).await;

        let before = store.read_values(None).await.unwrap();
        let result = store
            .update_values(vec![count("cat", 1), count("dog", 1), count("eel", 1)])
            .await;

        assert!(matches!(result, Err(CountStoreError::Unavailable(_))));
        assert_eq!(store.read_values(None).await.unwrap(), before);
    }

    #[tokio::test]
    async fn overflow_rolls_back_batch() {
        let store = InMemoryCountStore::new();
        store
            .update_values(vec![count("dog", i64::MAX as u64)])
            .await
            .unwrap();

        let result = store
            .update_values(vec![count("cat", 1), count("dog", 1)])
            .await;

        assert!(matches!(result, Err(CountStoreError::InvalidInput(_))));
        assert!(matches!(
            store.read_value(&class("cat")).await,
            Err(CountStoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn unavailable_store_errors() {
        let store = InMemoryCountStore::new();
        store.set_unavailable(true).await;

        assert!(store.read_values(None).await.is_err());
        assert!(store.update_values(vec![count("cat", 1)]).await.is_err());

        store.set_unavailable(false).await;
        assert!(store.read_values(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_updates_do_not_lose_increments() {
        let store = InMemoryCountStore::new();

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .update_values(vec![count("cat", 1), count("dog", 2)])
                        .await
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.read_value(&class("cat")).await.unwrap().count, 32);
        assert_eq!(store.read_value(&class("dog")).await.unwrap().count, 64);
    }

    #[tokio::test]
    async fn clear_and_len() {
        let store = InMemoryCountStore::new();
        assert!(store.is_empty().await);

        store
            .update_values(vec![count("cat", 1), count("dog", 1)])
            .await
            .unwrap();
        assert_eq!(store.len().await, 2);

        store.clear().await;
        assert!(store.is_empty().await);
    }
}
