//! A pipeline instance's slot in the timeline.

#[cfg(test)]
mod tests;

use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Result, TimelineError};
use crate::material::MaterialRevisionSet;

/// Head revision of one material declaration, as seen by the timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub date: DateTime<Utc>,
    pub revision: String,
    #[serde(default)]
    pub folder: Option<String>,
    /// Persisted modification id.
    #[serde(default)]
    pub id: i64,
}

impl Revision {
    pub fn new(date: DateTime<Utc>, revision: impl Into<String>, folder: Option<String>, id: i64) -> Self {
        Self {
            date,
            revision: revision.into(),
            folder,
            id,
        }
    }
}

/// One pipeline instance in causal order.
///
/// `revisions` maps a material fingerprint to one [`Revision`] per declaration
/// of that material, in declaration order. `natural_order` is 0.0 until the
/// entry is spliced in and never changes afterwards. `inserted_after` and
/// `inserted_before` hold the ids of the neighbours the entry was spliced
/// between; each is assigned at most once.
///
/// Equality is structural. Use [`TimelineEntry::same_identity`] to compare by
/// id and [`TimelineEntry::compare`] for causal order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pipeline_name: String,
    id: i64,
    counter: u32,
    revisions: BTreeMap<String, Vec<Revision>>,
    #[serde(default)]
    natural_order: f64,
    #[serde(default)]
    inserted_before: Option<i64>,
    #[serde(default)]
    inserted_after: Option<i64>,
}

impl TimelineEntry {
    pub fn new(
        pipeline_name: impl Into<String>,
        id: i64,
        counter: u32,
        revisions: BTreeMap<String, Vec<Revision>>,
    ) -> Self {
        Self {
            pipeline_name: pipeline_name.into(),
            id,
            counter,
            revisions,
            natural_order: 0.0,
            inserted_before: None,
            inserted_after: None,
        }
    }

    /// Snapshot of the head revision of every material in `set`. Materials
    /// without modifications contribute nothing.
    pub fn from_revision_set(
        pipeline_name: impl Into<String>,
        id: i64,
        counter: u32,
        set: &MaterialRevisionSet,
    ) -> Self {
        let mut revisions: BTreeMap<String, Vec<Revision>> = BTreeMap::new();
        for material_revision in set {
            let (Some(material), Some(latest)) = (
                material_revision.material(),
                material_revision.latest_modification(),
            ) else {
                continue;
            };
            revisions
                .entry(material.fingerprint().to_string())
                .or_default()
                .push(Revision::new(
                    latest.modified_time(),
                    latest.revision(),
                    material.folder().map(String::from),
                    latest.id(),
                ));
        }
        Self::new(pipeline_name, id, counter, revisions)
    }

    /// Rehydrates ordering state read back from storage.
    pub fn restored(
        mut self,
        natural_order: f64,
        inserted_after: Option<i64>,
        inserted_before: Option<i64>,
    ) -> Self {
        self.natural_order = natural_order;
        self.inserted_after = inserted_after;
        self.inserted_before = inserted_before;
        self
    }

    pub fn pipeline_name(&self) -> &str {
        &self.pipeline_name
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn revisions(&self) -> &BTreeMap<String, Vec<Revision>> {
        &self.revisions
    }

    pub fn natural_order(&self) -> f64 {
        self.natural_order
    }

    pub fn is_ordered(&self) -> bool {
        self.natural_order != 0.0
    }

    /// Id of the entry this one was inserted before.
    pub fn inserted_before(&self) -> Option<i64> {
        self.inserted_before
    }

    /// Id of the entry this one was inserted after.
    pub fn inserted_after(&self) -> Option<i64> {
        self.inserted_after
    }

    pub fn same_identity(&self, other: &TimelineEntry) -> bool {
        self.id == other.id
    }

    /// Causal order of two entries.
    ///
    /// For every material both entries consumed, the head revision times are
    /// compared. The earliest differing time decides which entry came first.
    /// When no material gives evidence, or materials disagree at that
    /// earliest time, entries of the same pipeline fall back to their counter
    /// and entries of different pipelines cannot be ordered.
    pub fn compare(&self, other: &TimelineEntry) -> Result<Ordering> {
        if self.id == other.id {
            return Ok(Ordering::Equal);
        }

        // None marks a contended time.
        let mut evidence: BTreeMap<DateTime<Utc>, Option<Ordering>> = BTreeMap::new();
        for (fingerprint, mine) in &self.revisions {
            let (Some(mine), Some(theirs)) = (
                mine.first(),
                other.revisions.get(fingerprint).and_then(|r| r.first()),
            ) else {
                continue;
            };
            let side = mine.date.cmp(&theirs.date);
            if side == Ordering::Equal {
                continue;
            }
            match evidence.entry(mine.date.min(theirs.date)) {
                Entry::Vacant(slot) => {
                    slot.insert(Some(side));
                }
                Entry::Occupied(mut slot) => {
                    if *slot.get() != Some(side) {
                        slot.insert(None);
                    }
                }
            }
        }

        match evidence.into_values().next() {
            Some(Some(side)) => Ok(side),
            _ => self.compare_by_counter(other),
        }
    }

    fn compare_by_counter(&self, other: &TimelineEntry) -> Result<Ordering> {
        if self.pipeline_name != other.pipeline_name {
            return Err(TimelineError::InvalidArgument(format!(
                "Cannot order {}/{} against {}/{}: no shared material revision tells them apart",
                self.pipeline_name, self.counter, other.pipeline_name, other.counter
            )));
        }
        Ok(self
            .counter
            .cmp(&other.counter)
            .then(self.id.cmp(&other.id)))
    }

    fn corruption(&self, message: String) -> TimelineError {
        TimelineError::OrderingCorruption {
            pipeline: self.pipeline_name.clone(),
            id: self.id,
            message,
        }
    }

    /// Sets the natural order once. Recomputing must reproduce the stored value.
    pub fn update_natural_order(&mut self, natural_order: f64) -> Result<()> {
        if self.natural_order == 0.0 {
            self.natural_order = natural_order;
            return Ok(());
        }
        if self.natural_order != natural_order {
            return Err(self.corruption(format!(
                "natural order {} recomputed as {}",
                self.natural_order, natural_order
            )));
        }
        Ok(())
    }

    pub fn set_inserted_before(&mut self, id: i64) -> Result<()> {
        match self.inserted_before {
            Some(existing) if existing != id => Err(self.corruption(format!(
                "already inserted before {existing}, cannot move before {id}"
            ))),
            _ => {
                self.inserted_before = Some(id);
                Ok(())
            }
        }
    }

    pub fn set_inserted_after(&mut self, id: i64) -> Result<()> {
        match self.inserted_after {
            Some(existing) if existing != id => Err(self.corruption(format!(
                "already inserted after {existing}, cannot move after {id}"
            ))),
            _ => {
                self.inserted_after = Some(id);
                Ok(())
            }
        }
    }
}
