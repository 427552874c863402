use std::collections::BTreeSet;

use async_trait::async_trait;
use common::{ObjectClass, ObjectCount};
use sqlx::{PgPool, Row, postgres::PgPoolOptions, postgres::PgRow};

use crate::{
    CountStoreError, Result,
    store::{CountRepository, from_stored, merge_batch, record_update, to_stored},
};

/// SQLSTATE `numeric_value_out_of_range`, raised when a total leaves BIGINT.
const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";

/// Reports a total past `i64::MAX` as invalid input, like the other backends.
fn map_overflow(err: sqlx::Error) -> CountStoreError {
    match &err {
        sqlx::Error::Database(db)
            if db.code().as_deref() == Some(NUMERIC_VALUE_OUT_OF_RANGE) =>
        {
            CountStoreError::InvalidInput(format!("count overflow: {}", db.message()))
        }
        _ => err.into(),
    }
}

/// PostgreSQL-backed count repository, one row per object class.
///
/// Each batch runs in its own transaction on a pooled connection. Rows are
/// incremented with `INSERT .. ON CONFLICT DO UPDATE`, so concurrent batches
/// touching the same class serialize on the row lock instead of losing
/// increments.
#[derive(Clone)]
pub struct PostgresCountStore {
    pool: PgPool,
}

impl PostgresCountStore {
    /// Creates a new PostgreSQL count store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to the database at `url` with a small connection pool.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn apply_batch(&self, batch: &[ObjectCount]) -> Result<()> {
        // Dropping the transaction without commit rolls it back
        let mut tx = self.pool.begin().await?;

        for value in batch {
            sqlx::query(
                r#"
                INSERT INTO object_counts (object_class, count, updated_at)
                VALUES ($1, $2, now())
                ON CONFLICT (object_class) DO UPDATE SET
                    count = object_counts.count + EXCLUDED.count,
                    updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(value.object_class.as_str())
            .bind(to_stored(value.count)?)
            .execute(&mut *tx)
            .await
            .map_err(map_overflow)?;
        }

        tx.commit().await?;
        tracing::debug!(classes = batch.len(), "committed count batch");
        Ok(())
    }

    fn row_to_count(row: PgRow) -> Result<ObjectCount> {
        let object_class: String = row.try_get("object_class")?;
        let count: i64 = row.try_get("count")?;
        from_stored(&object_class, count)
    }
}

#[async_trait]
impl CountRepository for PostgresCountStore {
    #[tracing::instrument(skip(self))]
    async fn read_values(
        &self,
        filter: Option<&BTreeSet<ObjectClass>>,
    ) -> Result<Vec<ObjectCount>> {
        let classes: Option<Vec<String>> =
            filter.map(|f| f.iter().map(|c| c.as_str().to_owned()).collect());

        let rows = sqlx::query(
            r#"
            SELECT object_class, count
            FROM object_counts
            WHERE $1::text[] IS NULL OR object_class = ANY($1)
            ORDER BY object_class ASC
            "#,
        )
        .bind(classes)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_count).collect()
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
        record_update("postgres", &result);
        result
    }
}
