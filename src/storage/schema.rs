//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query building.

use sea_query::Iden;

/// Pipeline instances table schema.
#[derive(Iden)]
pub enum PipelineInstances {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "pipeline_name"]
    PipelineName,
    #[iden = "counter"]
    Counter,
    /// Full material revision set, JSON.
    #[iden = "revision_set"]
    RevisionSet,
    /// Timeline revisions keyed by fingerprint, JSON.
    #[iden = "revisions"]
    Revisions,
    #[iden = "natural_order"]
    NaturalOrder,
    #[iden = "inserted_after"]
    InsertedAfter,
    #[iden = "inserted_before"]
    InsertedBefore,
    #[iden = "created_at"]
    CreatedAt,
}

/// SQL for creating the pipeline instances table.
pub const CREATE_PIPELINE_INSTANCES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS pipeline_instances (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    pipeline_name TEXT NOT NULL,
    counter INTEGER NOT NULL,
    revision_set TEXT NOT NULL,
    revisions TEXT NOT NULL,
    natural_order REAL NOT NULL DEFAULT 0.0,
    inserted_after INTEGER,
    inserted_before INTEGER,
    created_at TEXT NOT NULL,
    UNIQUE (pipeline_name, counter)
);

CREATE INDEX IF NOT EXISTS idx_pipeline_instances_pipeline ON pipeline_instances(pipeline_name, id);
"#;
