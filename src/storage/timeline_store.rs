//! TimelineStore trait definition.

use async_trait::async_trait;

use super::Result;
use crate::material::MaterialRevisionSet;
use crate::timeline::TimelineEntry;

/// Interface for pipeline instance persistence.
///
/// Instance ids are assigned by the store and grow monotonically across all
/// pipelines. Counters are assigned per pipeline starting at 1.
///
/// Implementations:
/// - `SqliteTimelineStore`: SQLite storage
/// - `InMemoryTimelineStore`: In-memory storage, also used for testing
#[async_trait]
pub trait TimelineStore: Send + Sync {
    /// Store a new instance of `pipeline` consuming `revisions`.
    ///
    /// Returns the unordered timeline entry with its id and counter. The
    /// store keeps its own copy of the revision set.
    async fn save_instance(
        &self,
        pipeline: &str,
        revisions: &MaterialRevisionSet,
    ) -> Result<TimelineEntry>;

    /// Revision set consumed by an instance, if the instance exists.
    async fn load_revision_set(&self, instance_id: i64) -> Result<Option<MaterialRevisionSet>>;

    /// Entries of `pipeline` with an id greater than `after_id`, in id order.
    async fn load_neighbor_candidates(
        &self,
        pipeline: &str,
        after_id: i64,
    ) -> Result<Vec<TimelineEntry>>;

    /// Store an entry's revisions, links and natural order in one write.
    ///
    /// The instance must have been saved before.
    async fn persist(&self, entry: &TimelineEntry) -> Result<()>;

    /// Every pipeline with at least one stored instance, sorted.
    async fn list_pipelines(&self) -> Result<Vec<String>>;
}
