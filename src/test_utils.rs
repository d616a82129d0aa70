//! Shared test fixtures for unit and integration tests.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use crate::config::TimelineConfig;
use crate::material::{Material, MaterialRevisionSet, Modification};
use crate::storage::InMemoryTimelineStore;
use crate::timeline::PipelineTimeline;

/// 2024-03-01 at `hour:minute` UTC.
pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, hour, minute, 0)
        .single()
        .expect("valid fixture time")
}

/// Named git material at a fixture URL.
pub fn git(name: &str) -> Material {
    Material::scm("git", format!("https://git.example.com/{name}.git")).with_name(name)
}

pub fn commit(revision: &str, time: DateTime<Utc>) -> Modification {
    Modification::new("dev", format!("commit {revision}"), revision, time)
}

/// Revision set with one head commit per material.
pub fn revision_set(heads: &[(&Material, &str, DateTime<Utc>)]) -> MaterialRevisionSet {
    let mut set = MaterialRevisionSet::new();
    for (material, revision, time) in heads {
        set.add((*material).clone(), vec![commit(revision, *time)])
            .expect("fixture materials are distinct");
    }
    set
}

/// Retry policy without noticeable delays.
pub fn fast_retries(retries: usize) -> TimelineConfig {
    TimelineConfig {
        persist_retries: retries,
        persist_min_delay_ms: 1,
        persist_max_delay_ms: 2,
    }
}

/// Timeline over a fresh in-memory store.
pub fn memory_timeline() -> (Arc<InMemoryTimelineStore>, PipelineTimeline) {
    let store = Arc::new(InMemoryTimelineStore::new());
    let timeline = PipelineTimeline::new(store.clone(), &fast_retries(3));
    (store, timeline)
}
