//! The ordering service.
//!
//! [`PipelineTimeline`] owns every spliced entry in an arena keyed by id plus
//! the causal order of each pipeline. Insertions are serialized by one lock;
//! each insertion is computed against the committed state, persisted, and
//! only then committed, so readers never see partially linked entries.


use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use backon::{BackoffBuilder, ExponentialBuilder};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use super::{Result, TimelineEntry, TimelineError};
use crate::config::TimelineConfig;
use crate::storage::TimelineStore;
use crate::utils::retry::persist_backoff;

/// Committed timeline state.
#[derive(Debug, Clone, Default)]
struct TimelineState {
    entries: HashMap<i64, TimelineEntry>,
    /// Entry ids per pipeline, in causal order.
    order: HashMap<String, Vec<i64>>,
}

/// Where a new entry goes and what it looks like once linked.
struct Placement {
    entry: TimelineEntry,
    index: usize,
    /// False when the entry already carried exactly this ordering.
    changed: bool,
}

/// Natural order for an entry spliced between two neighbours.
fn natural_order_between(previous: f64, next: Option<f64>) -> f64 {
    match next {
        Some(next) => (previous + next) / 2.0,
        None => previous + 1.0,
    }
}

impl TimelineState {
    fn ordered(&self, pipeline: &str) -> &[i64] {
        self.order.get(pipeline).map(Vec::as_slice).unwrap_or_default()
    }

    fn get(&self, id: i64) -> Result<&TimelineEntry> {
        self.entries.get(&id).ok_or(TimelineError::UnknownEntry(id))
    }

    fn maximum_id_for(&self, pipeline: &str) -> Option<i64> {
        self.ordered(pipeline).iter().copied().max()
    }

    fn position(&self, id: i64) -> Result<(&[i64], usize)> {
        let entry = self.get(id)?;
        let ids = self.ordered(entry.pipeline_name());
        let index = ids
            .iter()
            .position(|candidate| *candidate == id)
            .ok_or(TimelineError::UnknownEntry(id))?;
        Ok((ids, index))
    }

    fn neighbour(&self, id: i64, offset: isize) -> Result<Option<&TimelineEntry>> {
        let (ids, index) = self.position(id)?;
        match index.checked_add_signed(offset).and_then(|i| ids.get(i)) {
            Some(neighbour) => self.get(*neighbour).map(Some),
            None => Ok(None),
        }
    }

    /// Links `entry` to its causal neighbours and assigns its natural order.
    /// Nothing in the state is modified.
    fn place(&self, entry: TimelineEntry) -> Result<Placement> {
        if self.entries.contains_key(&entry.id()) {
            return Err(TimelineError::InvalidArgument(format!(
                "Entry {} is already in the timeline",
                entry.id()
            )));
        }
        let ids = self.ordered(entry.pipeline_name());

        let mut index = 0;
        for (i, id) in ids.iter().enumerate().rev() {
            if self.get(*id)?.compare(&entry)? == Ordering::Less {
                index = i + 1;
                break;
            }
        }

        let predecessor = match index.checked_sub(1) {
            Some(i) => Some(self.get(ids[i])?),
            None => None,
        };
        let successor = match ids.get(index) {
            Some(id) => Some(self.get(*id)?),
            None => None,
        };

        let original = entry.clone();
        let mut entry = entry;
        if let Some(predecessor) = predecessor {
            entry.set_inserted_after(predecessor.id())?;
        }
        if let Some(successor) = successor {
            entry.set_inserted_before(successor.id())?;
        }
        if entry.inserted_after() != predecessor.map(TimelineEntry::id)
            || entry.inserted_before() != successor.map(TimelineEntry::id)
        {
            return Err(TimelineError::OrderingCorruption {
                pipeline: entry.pipeline_name().to_string(),
                id: entry.id(),
                message: "stored links point at entries that are no longer its neighbours"
                    .to_string(),
            });
        }

        let previous = predecessor.map_or(0.0, TimelineEntry::natural_order);
        let next = successor.map(TimelineEntry::natural_order);
        let natural_order = natural_order_between(previous, next);
        if natural_order <= previous || next.is_some_and(|next| natural_order >= next) {
            return Err(TimelineError::PrecisionExhausted {
                pipeline: entry.pipeline_name().to_string(),
                id: entry.id(),
                previous,
                next: next.unwrap_or(f64::INFINITY),
            });
        }
        entry.update_natural_order(natural_order)?;

        let changed = entry != original;
        Ok(Placement {
            entry,
            index,
            changed,
        })
    }

    fn commit(&mut self, placement: Placement) {
        let Placement { entry, index, .. } = placement;
        self.order
            .entry(entry.pipeline_name().to_string())
            .or_default()
            .insert(index, entry.id());
        self.entries.insert(entry.id(), entry);
    }
}

/// Causal timeline of every pipeline's instances.
pub struct PipelineTimeline {
    store: Arc<dyn TimelineStore>,
    backoff: ExponentialBuilder,
    insertion: Mutex<()>,
    state: RwLock<TimelineState>,
}

impl PipelineTimeline {
    pub fn new(store: Arc<dyn TimelineStore>, config: &TimelineConfig) -> Self {
        Self::with_backoff(store, persist_backoff(config))
    }

    pub fn with_backoff(store: Arc<dyn TimelineStore>, backoff: ExponentialBuilder) -> Self {
        Self {
            store,
            backoff,
            insertion: Mutex::new(()),
            state: RwLock::new(TimelineState::default()),
        }
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Entries of `pipeline` in causal order.
    pub async fn entries_for(&self, pipeline: &str) -> Vec<TimelineEntry> {
        let state = self.state.read().await;
        state
            .ordered(pipeline)
            .iter()
            .filter_map(|id| state.entries.get(id).cloned())
            .collect()
    }

    pub async fn entry(&self, id: i64) -> Option<TimelineEntry> {
        self.state.read().await.entries.get(&id).cloned()
    }

    /// Causally latest entry of `pipeline`.
    pub async fn latest_for(&self, pipeline: &str) -> Option<TimelineEntry> {
        let state = self.state.read().await;
        let id = state.ordered(pipeline).last()?;
        state.entries.get(id).cloned()
    }

    pub async fn natural_order(&self, id: i64) -> Option<f64> {
        self.state
            .read()
            .await
            .entries
            .get(&id)
            .map(TimelineEntry::natural_order)
    }

    /// Highest id spliced into any pipeline.
    pub async fn maximum_id(&self) -> Option<i64> {
        self.state.read().await.entries.keys().copied().max()
    }

    pub async fn maximum_id_for(&self, pipeline: &str) -> Option<i64> {
        self.state.read().await.maximum_id_for(pipeline)
    }

    /// The entry causally before `id` in its pipeline.
    pub async fn run_before(&self, id: i64) -> Result<Option<TimelineEntry>> {
        let state = self.state.read().await;
        Ok(state.neighbour(id, -1)?.cloned())
    }

    /// The entry causally after `id` in its pipeline.
    pub async fn run_after(&self, id: i64) -> Result<Option<TimelineEntry>> {
        let state = self.state.read().await;
        Ok(state.neighbour(id, 1)?.cloned())
    }

    pub async fn pipeline_before(&self, id: i64) -> Result<Option<i64>> {
        let state = self.state.read().await;
        Ok(state.neighbour(id, -1)?.map(TimelineEntry::id))
    }

    pub async fn pipeline_after(&self, id: i64) -> Result<Option<i64>> {
        let state = self.state.read().await;
        Ok(state.neighbour(id, 1)?.map(TimelineEntry::id))
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// Splice in new instances of every pipeline the store knows about.
    ///
    /// Returns the number of entries spliced.
    pub async fn update(&self) -> Result<usize> {
        let _guard = self.insertion.lock().await;
        let mut spliced = 0;
        for pipeline in self.store.list_pipelines().await? {
            spliced += self.update_pipeline_locked(&pipeline).await?;
        }
        Ok(spliced)
    }

    /// Splice in new instances of `pipeline`, in id order.
    pub async fn update_pipeline(&self, pipeline: &str) -> Result<usize> {
        let _guard = self.insertion.lock().await;
        self.update_pipeline_locked(pipeline).await
    }

    async fn update_pipeline_locked(&self, pipeline: &str) -> Result<usize> {
        let after = self.state.read().await.maximum_id_for(pipeline).unwrap_or(0);
        let candidates = self.store.load_neighbor_candidates(pipeline, after).await?;
        let count = candidates.len();
        for entry in candidates {
            self.splice(entry).await?;
        }
        if count > 0 {
            info!(pipeline = %pipeline, count, "Timeline updated");
        }
        Ok(count)
    }

    /// Splice a saved entry into its pipeline.
    ///
    /// Stored instances of the pipeline that are not spliced yet go in first,
    /// in id order. Inserting an entry that is already in the timeline returns
    /// the committed entry. An entry below the pipeline's highest spliced id
    /// is rejected.
    pub async fn insert(&self, entry: TimelineEntry) -> Result<TimelineEntry> {
        let _guard = self.insertion.lock().await;
        self.update_pipeline_locked(entry.pipeline_name()).await?;
        {
            let state = self.state.read().await;
            if let Some(existing) = state.entries.get(&entry.id()) {
                return Ok(existing.clone());
            }
            if let Some(max) = state.maximum_id_for(entry.pipeline_name()) {
                if entry.id() < max {
                    return Err(TimelineError::InvalidArgument(format!(
                        "Entry {} of {} arrives after entry {}",
                        entry.id(),
                        entry.pipeline_name(),
                        max
                    )));
                }
            }
        }
        self.splice(entry).await
    }

    /// Drop the in-memory timeline and rebuild it from the store.
    ///
    /// Every stored natural order and link must be reproduced. On error the
    /// previous in-memory timeline is kept.
    pub async fn rebuild(&self) -> Result<()> {
        let _guard = self.insertion.lock().await;
        let mut fresh = TimelineState::default();
        for pipeline in self.store.list_pipelines().await? {
            for entry in self.store.load_neighbor_candidates(&pipeline, 0).await? {
                let placement = fresh.place(entry).inspect_err(log_corruption)?;
                if placement.changed {
                    self.persist(&placement.entry).await?;
                }
                fresh.commit(placement);
            }
        }
        let entries = fresh.entries.len();
        *self.state.write().await = fresh;
        info!(entries, "Timeline rebuilt");
        Ok(())
    }

    /// Place, persist, commit. Caller holds the insertion lock.
    async fn splice(&self, entry: TimelineEntry) -> Result<TimelineEntry> {
        let placement = {
            let state = self.state.read().await;
            state.place(entry).inspect_err(log_corruption)?
        };
        if placement.changed {
            self.persist(&placement.entry).await?;
        }
        let entry = placement.entry.clone();
        debug!(
            pipeline = %entry.pipeline_name(),
            id = entry.id(),
            counter = entry.counter(),
            natural_order = entry.natural_order(),
            after = ?entry.inserted_after(),
            before = ?entry.inserted_before(),
            "Spliced timeline entry"
        );
        self.state.write().await.commit(placement);
        Ok(entry)
    }

    async fn persist(&self, entry: &TimelineEntry) -> Result<()> {
        let mut delays = self.backoff.build();
        let mut attempt = 1;
        loop {
            match self.store.persist(entry).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() => match delays.next() {
                    Some(delay) => {
                        warn!(
                            pipeline = %entry.pipeline_name(),
                            id = entry.id(),
                            attempt,
                            error = %e,
                            "Failed to persist timeline entry, retrying after {:?}",
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => return Err(e.into()),
                },
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn log_corruption(e: &TimelineError) {
    match e {
        TimelineError::OrderingCorruption { .. } => {
            error!(error = %e, "Timeline ordering corruption")
        }
        TimelineError::PrecisionExhausted { .. } => {
            warn!(error = %e, "Natural order precision exhausted")
        }
        _ => {}
    }
}
