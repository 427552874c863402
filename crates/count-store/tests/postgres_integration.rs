//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p count-store --test postgres_integration
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use count_store::{
    CountRepository, CountRepositoryExt, CountStoreError, ObjectClass, ObjectCount,
    PostgresCountStore,
};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_object_counts_table.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and an empty table
async fn get_test_store() -> PostgresCountStore {
    let info = get_container_info().await;
    let store = PostgresCountStore::connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE object_counts")
        .execute(store.pool())
        .await
        .unwrap();

    store
}

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
#[serial]
async fn update_and_read_values() {
    let store = get_test_store().await;

    store
        .update_values(vec![count("cat", 2), count("dog", 1)])
        .await
        .unwrap();

    let values = store.read_values(None).await.unwrap();
    assert_eq!(values, vec![count("cat", 2), count("dog", 1)]);
}

#[tokio::test]
#[serial]
async fn read_values_with_filter() {
    let store = get_test_store().await;

    store
        .update_values(vec![count("cat", 2), count("dog", 1), count("car", 3)])
        .await
        .unwrap();

    let values = store
        .read_values(Some(&filter(&["cat", "car"])))
        .await
        .unwrap();
    assert_eq!(values, vec![count("car", 3), count("cat", 2)]);
}

#[tokio::test]
#[serial]
async fn repeated_updates_accumulate() {
    let store = get_test_store().await;

    store.update_values(vec![count("cat", 5)]).await.unwrap();
    store.update_values(vec![count("cat", 5)]).await.unwrap();

    let values = store.read_values(Some(&filter(&["cat"]))).await.unwrap();
    assert_eq!(values, vec![count("cat", 10)]);
}

#[tokio::test]
#[serial]
async fn cat_and_dog_scenario() {
    let store = get_test_store().await;

    store
        .update_values(vec![count("cat", 2), count("dog", 1)])
        .await
        .unwrap();
    store.update_values(vec![count("cat", 1)]).await.unwrap();

    assert_eq!(store.read_value(&class("cat")).await.unwrap(), count("cat", 3));
    assert_eq!(store.read_value(&class("dog")).await.unwrap(), count("dog", 1));
}

#[tokio::test]
#[serial]
async fn duplicate_keys_in_one_batch_accumulate() {
    let store = get_test_store().await;

    store
        .update_values(vec![count("cat", 1), count("cat", 2)])
        .await
        .unwrap();

    let values = store.read_values(Some(&filter(&["cat"]))).await.unwrap();
    assert_eq!(values, vec![count("cat", 3)]);
}

#[tokio::test]
#[serial]
async fn empty_batch_is_noop() {
    let store = get_test_store().await;
    store.update_values(vec![count("cat", 1)]).await.unwrap();

    let before = store.read_values(None).await.unwrap();
    store.update_values(Vec::new()).await.unwrap();
    let after = store.read_values(None).await.unwrap();

    assert_eq!(before, after);
}

#[tokio::test]
#[serial]
async fn unknown_class_is_omitted_from_filtered_read() {
    let store = get_test_store().await;
    store.update_values(vec![count("cat", 1)]).await.unwrap();

    let values = store
        .read_values(Some(&filter(&["unicorn"])))
        .await
        .unwrap();
    assert!(values.is_empty());

    let single = store.read_value(&class("unicorn")).await;
    assert!(matches!(single, Err(CountStoreError::NotFound(_))));
}

#[tokio::test]
#[serial]
async fn rereading_is_idempotent() {
    let store = get_test_store().await;
    store
        .update_values(vec![count("cat", 1), count("dog", 4)])
        .await
        .unwrap();

    let first = store.read_values(None).await.unwrap();
    let second = store.read_values(None).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
#[serial]
async fn failure_mid_batch_rolls_back() {
    let store = get_test_store().await;

    // dog sits at the top of the BIGINT range so any further increment fails
    store
        .update_values(vec![count("dog", i64::MAX as u64)])
        .await
        .unwrap();
    let before = store.read_values(None).await.unwrap();

    let result = store
        .update_values(vec![count("cat", 1), count("dog", 1), count("eel", 1)])
        .await;

    assert!(matches!(result, Err(CountStoreError::InvalidInput(_))));
    assert_eq!(store.read_values(None).await.unwrap(), before);
}

#[tokio::test]
#[serial]
async fn concurrent_batches_do_not_lose_increments() {
    let store = get_test_store().await;

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .update_values(vec![count("cat", 1), count("dog", 1)])
                    .await
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let values = store.read_values(None).await.unwrap();
    assert_eq!(values, vec![count("cat", 16), count("dog", 16)]);
}
