//! In-memory TimelineStore implementation.


use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::material::MaterialRevisionSet;
use crate::storage::{Result, StorageError, TimelineStore};
use crate::timeline::TimelineEntry;

/// Stored instance: the consumed revisions plus the timeline entry.
struct StoredInstance {
    revisions: MaterialRevisionSet,
    entry: TimelineEntry,
}

/// Timeline store that keeps instances in memory.
///
/// Failure toggles let tests exercise error paths of callers.
#[derive(Default)]
pub struct InMemoryTimelineStore {
    instances: RwLock<BTreeMap<i64, StoredInstance>>,
    fail_on_save: RwLock<bool>,
    fail_on_persist: RwLock<bool>,
    failing_persists: RwLock<u32>,
    persist_calls: RwLock<u32>,
}

impl InMemoryTimelineStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_save(&self, fail: bool) {
        *self.fail_on_save.write().await = fail;
    }

    pub async fn set_fail_on_persist(&self, fail: bool) {
        *self.fail_on_persist.write().await = fail;
    }

    /// Fail the next `count` persist calls, then succeed.
    pub async fn fail_next_persists(&self, count: u32) {
        *self.failing_persists.write().await = count;
    }

    /// Number of persist calls seen so far, failed ones included.
    pub async fn persist_calls(&self) -> u32 {
        *self.persist_calls.read().await
    }

    pub async fn stored_count(&self) -> usize {
        self.instances.read().await.len()
    }

    /// The entry as last persisted.
    pub async fn stored_entry(&self, id: i64) -> Option<TimelineEntry> {
        self.instances
            .read()
            .await
            .get(&id)
            .map(|stored| stored.entry.clone())
    }
}

#[async_trait]
impl TimelineStore for InMemoryTimelineStore {
    async fn save_instance(
        &self,
        pipeline: &str,
        revisions: &MaterialRevisionSet,
    ) -> Result<TimelineEntry> {
        if *self.fail_on_save.read().await {
            return Err(StorageError::Unavailable("save disabled".to_string()));
        }
        let mut instances = self.instances.write().await;
        let id = instances.keys().next_back().map_or(1, |last| last + 1);
        let counter = instances
            .values()
            .filter(|s| s.entry.pipeline_name() == pipeline)
            .map(|s| s.entry.counter())
            .max()
            .unwrap_or(0)
            + 1;
        let entry = TimelineEntry::from_revision_set(pipeline, id, counter, revisions);
        instances.insert(
            id,
            StoredInstance {
                revisions: revisions.clone(),
                entry: entry.clone(),
            },
        );
        Ok(entry)
    }

    async fn load_revision_set(&self, instance_id: i64) -> Result<Option<MaterialRevisionSet>> {
        let instances = self.instances.read().await;
        Ok(instances
            .get(&instance_id)
            .map(|stored| stored.revisions.clone()))
    }

    async fn load_neighbor_candidates(
        &self,
        pipeline: &str,
        after_id: i64,
    ) -> Result<Vec<TimelineEntry>> {
        let instances = self.instances.read().await;
        Ok(instances
            .range(after_id + 1..)
            .filter(|(_, s)| s.entry.pipeline_name() == pipeline)
            .map(|(_, s)| s.entry.clone())
            .collect())
    }

    async fn persist(&self, entry: &TimelineEntry) -> Result<()> {
        *self.persist_calls.write().await += 1;
        if *self.fail_on_persist.read().await {
            return Err(StorageError::Unavailable("persist disabled".to_string()));
        }
        {
            let mut remaining = self.failing_persists.write().await;
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StorageError::Unavailable("transient persist failure".to_string()));
            }
        }
        let mut instances = self.instances.write().await;
        let stored = instances
            .get_mut(&entry.id())
            .ok_or(StorageError::NotFound(entry.id()))?;
        stored.entry = entry.clone();
        Ok(())
    }

    async fn list_pipelines(&self) -> Result<Vec<String>> {
        let instances = self.instances.read().await;
        let mut pipelines: Vec<String> = instances
            .values()
            .map(|s| s.entry.pipeline_name().to_string())
            .collect();
        pipelines.sort();
        pipelines.dedup();
        Ok(pipelines)
    }
}
