//! SQLite TimelineStore implementation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use sea_query::{Expr, Order, Query, SqliteQueryBuilder};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::material::MaterialRevisionSet;
use crate::storage::schema::{PipelineInstances, CREATE_PIPELINE_INSTANCES_TABLE};
use crate::storage::{Result, StorageError, TimelineStore};
use crate::timeline::{Revision, TimelineEntry};

/// SQLite implementation of TimelineStore.
///
/// Revision sets and timeline revisions are stored as JSON text.
pub struct SqliteTimelineStore {
    pool: SqlitePool,
}

impl SqliteTimelineStore {
    /// Create a new SQLite timeline store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the schema if it does not exist yet.
    pub async fn init(&self) -> Result<()> {
        sqlx::raw_sql(CREATE_PIPELINE_INSTANCES_TABLE)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Insert an instance within an already-started transaction.
    async fn insert_instance(
        conn: &mut SqliteConnection,
        pipeline: &str,
        revisions: &MaterialRevisionSet,
    ) -> Result<TimelineEntry> {
        let counter = {
            let query = Query::select()
                .expr(Expr::col(PipelineInstances::Counter).max())
                .from(PipelineInstances::Table)
                .and_where(Expr::col(PipelineInstances::PipelineName).eq(pipeline))
                .to_string(SqliteQueryBuilder);

            let row = sqlx::query(&query).fetch_one(&mut *conn).await?;
            let max_counter: Option<u32> = row.try_get(0)?;
            max_counter.unwrap_or(0) + 1
        };

        let snapshot = TimelineEntry::from_revision_set(pipeline, 0, counter, revisions);
        let revision_set_json = serde_json::to_string(revisions)?;
        let revisions_json = serde_json::to_string(snapshot.revisions())?;

        let query = Query::insert()
            .into_table(PipelineInstances::Table)
            .columns([
                PipelineInstances::PipelineName,
                PipelineInstances::Counter,
                PipelineInstances::RevisionSet,
                PipelineInstances::Revisions,
                PipelineInstances::NaturalOrder,
                PipelineInstances::CreatedAt,
            ])
            .values_panic([
                pipeline.into(),
                counter.into(),
                revision_set_json.into(),
                revisions_json.into(),
                0.0f64.into(),
                Utc::now().to_rfc3339().into(),
            ])
            .to_string(SqliteQueryBuilder);

        let id = sqlx::query(&query)
            .execute(&mut *conn)
            .await?
            .last_insert_rowid();

        Ok(TimelineEntry::new(pipeline, id, counter, snapshot.revisions().clone()))
    }

    fn decode_entry(row: &SqliteRow) -> Result<TimelineEntry> {
        let revisions_json: String = row.try_get("revisions")?;
        let revisions: BTreeMap<String, Vec<Revision>> = serde_json::from_str(&revisions_json)?;
        let pipeline: String = row.try_get("pipeline_name")?;

        Ok(TimelineEntry::new(
            pipeline,
            row.try_get("id")?,
            row.try_get("counter")?,
            revisions,
        )
        .restored(
            row.try_get("natural_order")?,
            row.try_get("inserted_after")?,
            row.try_get("inserted_before")?,
        ))
    }
}

#[async_trait]
impl TimelineStore for SqliteTimelineStore {
    async fn save_instance(
        &self,
        pipeline: &str,
        revisions: &MaterialRevisionSet,
    ) -> Result<TimelineEntry> {
        // BEGIN IMMEDIATE takes the write lock upfront so concurrent saves
        // cannot hand out the same counter.
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let result = Self::insert_instance(&mut conn, pipeline, revisions).await;

        match result {
            Ok(entry) => {
                sqlx::query("COMMIT").execute(&mut *conn).await?;
                debug!(pipeline = %pipeline, id = entry.id(), counter = entry.counter(), "Saved pipeline instance");
                Ok(entry)
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                Err(e)
            }
        }
    }

    async fn load_revision_set(&self, instance_id: i64) -> Result<Option<MaterialRevisionSet>> {
        let query = Query::select()
            .column(PipelineInstances::RevisionSet)
            .from(PipelineInstances::Table)
            .and_where(Expr::col(PipelineInstances::Id).eq(instance_id))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;

        match row {
            Some(row) => {
                let json: String = row.try_get("revision_set")?;
                Ok(Some(serde_json::from_str(&json)?))
            }
            None => Ok(None),
        }
    }

    async fn load_neighbor_candidates(
        &self,
        pipeline: &str,
        after_id: i64,
    ) -> Result<Vec<TimelineEntry>> {
        let query = Query::select()
            .columns([
                PipelineInstances::Id,
                PipelineInstances::PipelineName,
                PipelineInstances::Counter,
                PipelineInstances::Revisions,
                PipelineInstances::NaturalOrder,
                PipelineInstances::InsertedAfter,
                PipelineInstances::InsertedBefore,
            ])
            .from(PipelineInstances::Table)
            .and_where(Expr::col(PipelineInstances::PipelineName).eq(pipeline))
            .and_where(Expr::col(PipelineInstances::Id).gt(after_id))
            .order_by(PipelineInstances::Id, Order::Asc)
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        rows.iter().map(Self::decode_entry).collect()
    }

    async fn persist(&self, entry: &TimelineEntry) -> Result<()> {
        let revisions_json = serde_json::to_string(entry.revisions())?;

        let query = Query::update()
            .table(PipelineInstances::Table)
            .values([
                (PipelineInstances::Revisions, revisions_json.into()),
                (PipelineInstances::NaturalOrder, entry.natural_order().into()),
                (PipelineInstances::InsertedAfter, entry.inserted_after().into()),
                (PipelineInstances::InsertedBefore, entry.inserted_before().into()),
            ])
            .and_where(Expr::col(PipelineInstances::Id).eq(entry.id()))
            .to_string(SqliteQueryBuilder);

        let result = sqlx::query(&query).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(entry.id()));
        }
        Ok(())
    }

    async fn list_pipelines(&self) -> Result<Vec<String>> {
        let query = Query::select()
            .distinct()
            .column(PipelineInstances::PipelineName)
            .from(PipelineInstances::Table)
            .order_by(PipelineInstances::PipelineName, Order::Asc)
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        let mut pipelines = Vec::with_capacity(rows.len());
        for row in rows {
            pipelines.push(row.try_get("pipeline_name")?);
        }
        Ok(pipelines)
    }
}
