//! Scheduling decisions for new pipeline instances.
//!
//! A candidate revision set is validated, compared against the revisions of
//! the pipeline's causally latest instance, saved through the store and
//! spliced into the timeline.


use std::sync::Arc;

use tracing::{debug, info};

use crate::material::{MaterialRevisionSet, RevisionError};
use crate::storage::{StorageError, TimelineStore};
use crate::timeline::{PipelineTimeline, TimelineEntry, TimelineError};

/// Result type for scheduling operations.
pub type Result<T> = std::result::Result<T, ScheduleError>;

/// Errors that can occur while scheduling an instance.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("No new revisions for pipeline {pipeline}")]
    NoChanges { pipeline: String },

    #[error(transparent)]
    Revision(#[from] RevisionError),

    #[error(transparent)]
    Timeline(#[from] TimelineError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A scheduled instance: its timeline slot and the revisions it consumes.
#[derive(Debug, Clone)]
pub struct ScheduledInstance {
    pub entry: TimelineEntry,
    pub revisions: MaterialRevisionSet,
}

impl ScheduledInstance {
    pub fn build_cause_message(&self) -> String {
        self.revisions.build_cause_message()
    }
}

/// Decides whether candidate revisions warrant a new instance and records it.
pub struct InstanceScheduler {
    store: Arc<dyn TimelineStore>,
    timeline: Arc<PipelineTimeline>,
}

impl InstanceScheduler {
    pub fn new(store: Arc<dyn TimelineStore>, timeline: Arc<PipelineTimeline>) -> Self {
        Self { store, timeline }
    }

    /// Revisions consumed by the causally latest instance of `pipeline`.
    pub async fn previous_revisions(&self, pipeline: &str) -> Result<Option<MaterialRevisionSet>> {
        self.timeline.update_pipeline(pipeline).await?;
        match self.timeline.latest_for(pipeline).await {
            Some(latest) => Ok(self.store.load_revision_set(latest.id()).await?),
            None => Ok(None),
        }
    }

    /// Schedule an instance when `candidate` differs from the previous
    /// instance's revisions, ignoring filtered changes.
    pub async fn schedule(
        &self,
        pipeline: &str,
        candidate: MaterialRevisionSet,
    ) -> Result<ScheduledInstance> {
        self.schedule_inner(pipeline, candidate, false).await
    }

    /// Schedule an instance even if nothing changed.
    pub async fn force_schedule(
        &self,
        pipeline: &str,
        candidate: MaterialRevisionSet,
    ) -> Result<ScheduledInstance> {
        self.schedule_inner(pipeline, candidate, true).await
    }

    async fn schedule_inner(
        &self,
        pipeline: &str,
        candidate: MaterialRevisionSet,
        forced: bool,
    ) -> Result<ScheduledInstance> {
        if candidate.is_missing_modifications() {
            return Err(RevisionError::MissingModifications {
                pipeline: pipeline.to_string(),
            }
            .into());
        }

        let previous = self.previous_revisions(pipeline).await?;
        if let Some(previous) = &previous {
            if !forced && !candidate.has_changed_since(previous) {
                debug!(pipeline = %pipeline, "Candidate revisions match the previous instance");
                return Err(ScheduleError::NoChanges {
                    pipeline: pipeline.to_string(),
                });
            }
        }

        let revisions = mark_changes(&candidate, previous.as_ref())?;
        let saved = self.store.save_instance(pipeline, &revisions).await?;
        self.timeline.update_pipeline(pipeline).await?;
        let entry = self
            .timeline
            .entry(saved.id())
            .await
            .ok_or(TimelineError::UnknownEntry(saved.id()))?;

        let scheduled = ScheduledInstance { entry, revisions };
        info!(
            pipeline = %pipeline,
            id = scheduled.entry.id(),
            counter = scheduled.entry.counter(),
            natural_order = scheduled.entry.natural_order(),
            forced,
            "Scheduled pipeline instance: {}",
            scheduled.build_cause_message()
        );
        Ok(scheduled)
    }
}

/// Flags each revision that differs from `previous` once filters are applied.
fn mark_changes(
    candidate: &MaterialRevisionSet,
    previous: Option<&MaterialRevisionSet>,
) -> Result<MaterialRevisionSet> {
    let filtered = previous.map(|p| candidate.filter(p));
    let marked = candidate.iter().enumerate().map(|(i, revision)| {
        let effective = filtered.as_ref().and_then(|f| f.get(i)).unwrap_or(revision);
        let counterpart = previous
            .zip(revision.material())
            .and_then(|(p, material)| p.find_revision_for(material));
        let changed = counterpart.map_or(true, |c| effective.has_changed_since(c));
        revision.clone().with_changed(changed)
    });
    Ok(MaterialRevisionSet::from_revisions(marked)?)
}
