use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use common::{ObjectClass, ObjectCount};
use futures_util::TryStreamExt;
use mongodb::bson::{Document, doc};
use mongodb::error::{TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT};
use mongodb::options::IndexOptions;
use mongodb::{Client, ClientSession, Collection, IndexModel};
use serde::{Deserialize, Serialize};

use crate::{
    CountStoreError, Result,
    store::{
        CountRepository, checked_total, from_stored, merge_batch, record_update, to_stored,
    },
};

const COLLECTION: &str = "counter";

/// How long a batch keeps retrying transient transaction failures.
const RETRY_WINDOW: Duration = Duration::from_secs(30);
const RETRY_BACKOFF: Duration = Duration::from_millis(10);

/// Stored shape of one counter document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CounterDocument {
    object_class: String,
    count: i64,
}

/// MongoDB-backed count repository, one document per object class.
///
/// Updates use server-side `$inc` with upsert. A batch runs inside a single
/// session transaction, which requires the server to be a replica set
/// member; transactions aborted by a write conflict with a concurrent batch
/// are rerun, so concurrent writers never lose increments.
#[derive(Clone)]
pub struct MongoCountStore {
    client: Client,
    counters: Collection<CounterDocument>,
}

impl MongoCountStore {
    /// Creates a store over an existing client and database name.
    pub fn new(client: Client, database: &str) -> Self {
        let counters = client.database(database).collection(COLLECTION);
        Self { client, counters }
    }

    /// Connects using a full connection string.
    pub async fn connect(url: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(url).await?;
        Ok(Self::new(client, database))
    }

    /// Connects to `host:port`.
    pub async fn connect_host(host: &str, port: u16, database: &str) -> Result<Self> {
        Self::connect(&format!("mongodb://{host}:{port}"), database).await
    }

    /// Creates the unique index on `object_class`.
    pub async fn ensure_indexes(&self) -> Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { "object_class": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.counters.create_index(index).await?;
        Ok(())
    }

    /// Returns true when the server is a replica set member, which session
    /// transactions require.
    pub async fn is_replica_set(&self) -> Result<bool> {
        let hello = self
            .client
            .database("admin")
            .run_command(doc! { "hello": 1 })
            .await?;
        Ok(reports_replica_set(&hello))
    }

    /// Applies the batch in one transaction, retrying it from the start while
    /// the server labels the failure as transient (write conflicts between
    /// concurrent batches).
    async fn apply_batch(&self, batch: &[ObjectCount]) -> Result<()> {
        let mut session = self.client.start_session().await?;
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            session.start_transaction().await?;

            let result = match self.increment_all(&mut session, batch).await {
                Ok(()) => commit(&mut session, started).await,
                Err(e) => {
                    if let Err(abort) = session.abort_transaction().await {
                        tracing::warn!(error = %abort, "failed to abort count transaction");
                    }
                    Err(e)
                }
            };

            match result {
                Err(CountStoreError::Document(e))
                    if e.contains_label(TRANSIENT_TRANSACTION_ERROR)
                        && started.elapsed() < RETRY_WINDOW =>
                {
                    tracing::debug!(attempt, error = %e, "retrying count transaction");
                    tokio::time::sleep(RETRY_BACKOFF * attempt.min(10)).await;
                }
                Ok(()) => {
                    tracing::debug!(classes = batch.len(), attempt, "committed count batch");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn increment_all(
        &self,
        session: &mut ClientSession,
        batch: &[ObjectCount],
    ) -> Result<()> {
        for value in batch {
            let object_class = value.object_class.as_str();

            // Totals stay within i64::MAX; reading inside the transaction
            // turns a concurrent change into a write conflict on the update
            let current = self
                .counters
                .find_one(doc! { "object_class": object_class })
                .session(&mut *session)
                .await?;
            if let Some(document) = current {
                let stored = from_stored(&document.object_class, document.count)?;
                checked_total(stored.count, value.count)?;
            }

            self.counters
                .update_one(
                    doc! { "object_class": object_class },
                    doc! { "$inc": { "count": to_stored(value.count)? } },
                )
                .upsert(true)
                .session(&mut *session)
                .await?;
        }
        Ok(())
    }

    /// Gets a reference to the underlying client.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Commits the running transaction, retrying while the outcome is unknown.
async fn commit(session: &mut ClientSession, started: Instant) -> Result<()> {
    loop {
        match session.commit_transaction().await {
            Err(e)
                if e.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
                    && started.elapsed() < RETRY_WINDOW =>
            {
                tracing::debug!(error = %e, "retrying count transaction commit");
            }
            result => return Ok(result?),
        }
    }
}

fn reports_replica_set(hello: &Document) -> bool {
    hello.get_str("setName").is_ok()
}

#[async_trait]
impl CountRepository for MongoCountStore {
    #[tracing::instrument(skip(self))]
    async fn read_values(
        &self,
        filter: Option<&BTreeSet<ObjectClass>>,
    ) -> Result<Vec<ObjectCount>> {
        let query = match filter {
            Some(classes) => {
                let classes: Vec<&str> = classes.iter().map(ObjectClass::as_str).collect();
                doc! { "object_class": { "$in": classes } }
            }
            None => doc! {},
        };

        let documents: Vec<CounterDocument> = self
            .counters
            .find(query)
            .sort(doc! { "object_class": 1 })
            .await?
            .try_collect()
            .await?;

        documents
            .into_iter()
            .map(|d| from_stored(&d.object_class, d.count))
            .collect()
    }

    #[tracing::instrument(skip(self, new_values), fields(batch_len = new_values.len()))]
    async fn update_values(&self, new_values: Vec<ObjectCount>) -> Result<()> {
        if new_values.is_empty() {
            return Ok(());
        }

        let result = match merge_batch(new_values) {
            Ok(batch) => self.apply_batch(&batch).await,
            Err(e) => Err(e),
        };
        record_update("mongodb", &result);
        result
    }
}
