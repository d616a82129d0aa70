//! TimelineStore interface tests.
//!
//! These tests verify the contract of the TimelineStore trait.
//! Each storage implementation should run these tests. Every test uses its
//! own pipeline names, so they can share one store.

use chrono::{DateTime, TimeZone, Utc};

use revorder::material::{
    FileAction, Filter, Material, MaterialRevision, MaterialRevisionSet, Modification,
    ModifiedFile,
};
use revorder::storage::{StorageError, TimelineStore};
use revorder::timeline::TimelineEntry;

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, hour, minute, 0)
        .single()
        .unwrap()
}

fn git(name: &str) -> Material {
    Material::scm("git", format!("https://git.example.com/{name}.git")).with_name(name)
}

/// Set with one commit on a single material.
pub fn single_commit(revision: &str, time: DateTime<Utc>) -> MaterialRevisionSet {
    let mut set = MaterialRevisionSet::new();
    set.add(
        git("core"),
        vec![Modification::new("dev", "change", revision, time)],
    )
    .unwrap();
    set
}

/// Set exercising every serialized field.
pub fn rich_set() -> MaterialRevisionSet {
    let mut set = MaterialRevisionSet::new();
    set.add_revision(
        MaterialRevision::new(
            git("core")
                .with_folder("core")
                .with_filter(Filter::new(["docs/**/*"])),
            vec![
                Modification::new("alice", "second", "r2", at(10, 0))
                    .with_email("alice@example.com")
                    .with_files(vec![
                        ModifiedFile::new("src/lib.rs", FileAction::Modified),
                        ModifiedFile::new("docs/a.md", FileAction::Added),
                    ]),
                Modification::new("bob", "first", "r1", at(9, 0)),
            ],
        )
        .unwrap()
        .with_changed(true),
    )
    .unwrap();
    set.add(
        Material::dependency("upstream", "build"),
        vec![
            Modification::new("upstream", "triggered", "upstream/4/build/1", at(9, 30))
                .with_pipeline_label("4"),
        ],
    )
    .unwrap();
    set.add(
        Material::package("repo", "pkg"),
        vec![Modification::new("ci", "release", "1.2.3", at(8, 0))],
    )
    .unwrap();
    set
}

// =============================================================================
// TimelineStore::save_instance tests
// =============================================================================

pub async fn test_save_assigns_ids_and_counters<S: TimelineStore>(store: &S) {
    let a1 = store
        .save_instance("test_counters_a", &single_commit("1", at(9, 0)))
        .await
        .expect("save should succeed");
    let b1 = store
        .save_instance("test_counters_b", &single_commit("1", at(9, 0)))
        .await
        .expect("save should succeed");
    let a2 = store
        .save_instance("test_counters_a", &single_commit("2", at(10, 0)))
        .await
        .expect("save should succeed");

    assert_eq!(a1.counter(), 1, "first instance gets counter 1");
    assert_eq!(b1.counter(), 1, "counters are per pipeline");
    assert_eq!(a2.counter(), 2, "counters grow per pipeline");
    assert!(a1.id() < b1.id() && b1.id() < a2.id(), "ids grow across pipelines");
    assert_eq!(a2.natural_order(), 0.0, "saved entries are unordered");
    assert_eq!(a2.inserted_after(), None);
    assert_eq!(a2.inserted_before(), None);
}

pub async fn test_save_snapshots_head_revisions<S: TimelineStore>(store: &S) {
    let set = rich_set();
    let entry = store
        .save_instance("test_snapshot", &set)
        .await
        .expect("save should succeed");

    assert_eq!(entry.pipeline_name(), "test_snapshot");
    assert_eq!(entry.revisions().len(), 3);
    let core = &entry.revisions()[git("core").fingerprint()];
    assert_eq!(core.len(), 1);
    assert_eq!(core[0].revision, "r2");
    assert_eq!(core[0].date, at(10, 0));
    assert_eq!(core[0].folder.as_deref(), Some("core"));
}

// =============================================================================
// TimelineStore::load_revision_set tests
// =============================================================================

pub async fn test_revision_set_roundtrip<S: TimelineStore>(store: &S) {
    let set = rich_set();
    let entry = store
        .save_instance("test_roundtrip", &set)
        .await
        .expect("save should succeed");

    let loaded = store
        .load_revision_set(entry.id())
        .await
        .expect("load should succeed")
        .expect("set should exist");

    assert_eq!(loaded, set);
    assert!(loaded.is_same_as(&set));
    assert!(!loaded.has_changed_since(&set));
}

pub async fn test_missing_revision_set<S: TimelineStore>(store: &S) {
    let loaded = store
        .load_revision_set(9_999_999)
        .await
        .expect("load should succeed");
    assert!(loaded.is_none());
}

// =============================================================================
// TimelineStore::load_neighbor_candidates tests
// =============================================================================

pub async fn test_neighbor_candidates<S: TimelineStore>(store: &S) {
    let mut ids = Vec::new();
    for (i, pipeline) in ["test_nc_main", "test_nc_other", "test_nc_main", "test_nc_main"]
        .iter()
        .enumerate()
    {
        let entry = store
            .save_instance(pipeline, &single_commit(&i.to_string(), at(9, i as u32)))
            .await
            .expect("save should succeed");
        ids.push(entry.id());
    }

    let all: Vec<i64> = store
        .load_neighbor_candidates("test_nc_main", 0)
        .await
        .expect("load should succeed")
        .iter()
        .map(TimelineEntry::id)
        .collect();
    assert_eq!(all, vec![ids[0], ids[2], ids[3]]);

    let after: Vec<i64> = store
        .load_neighbor_candidates("test_nc_main", ids[2])
        .await
        .expect("load should succeed")
        .iter()
        .map(TimelineEntry::id)
        .collect();
    assert_eq!(after, vec![ids[3]]);

    assert!(store
        .load_neighbor_candidates("test_nc_missing", 0)
        .await
        .expect("load should succeed")
        .is_empty());
}

// =============================================================================
// TimelineStore::persist tests
// =============================================================================

pub async fn test_persist_roundtrip<S: TimelineStore>(store: &S) {
    let first = store
        .save_instance("test_persist", &single_commit("1", at(9, 0)))
        .await
        .expect("save should succeed");
    let second = store
        .save_instance("test_persist", &single_commit("2", at(10, 0)))
        .await
        .expect("save should succeed");
    let third = store
        .save_instance("test_persist", &single_commit("3", at(9, 30)))
        .await
        .expect("save should succeed");

    let mut ordered = third.clone();
    ordered.set_inserted_after(first.id()).unwrap();
    ordered.set_inserted_before(second.id()).unwrap();
    ordered.update_natural_order(1.5).unwrap();
    store.persist(&ordered).await.expect("persist should succeed");

    let loaded = store
        .load_neighbor_candidates("test_persist", second.id())
        .await
        .expect("load should succeed");
    assert_eq!(loaded, vec![ordered]);
}

pub async fn test_persist_unknown_entry<S: TimelineStore>(store: &S) {
    let entry = TimelineEntry::new("test_persist_unknown", 9_999_999, 1, Default::default());
    let result = store.persist(&entry).await;
    assert!(
        matches!(result, Err(StorageError::NotFound(9_999_999))),
        "persisting an unsaved instance should fail"
    );
}

// =============================================================================
// TimelineStore::list_pipelines tests
// =============================================================================

pub async fn test_list_pipelines<S: TimelineStore>(store: &S) {
    for pipeline in ["test_list_b", "test_list_a", "test_list_b"] {
        store
            .save_instance(pipeline, &single_commit("1", at(9, 0)))
            .await
            .expect("save should succeed");
    }

    let pipelines = store.list_pipelines().await.expect("list should succeed");
    let listed: Vec<&str> = pipelines
        .iter()
        .map(String::as_str)
        .filter(|p| p.starts_with("test_list_"))
        .collect();
    assert_eq!(listed, vec!["test_list_a", "test_list_b"]);
    assert!(pipelines.windows(2).all(|w| w[0] < w[1]), "sorted and distinct");
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all TimelineStore interface tests against a store implementation.
#[macro_export]
macro_rules! run_timeline_store_tests {
    ($store:expr) => {
        use $crate::storage::timeline_store_tests::*;

        test_save_assigns_ids_and_counters($store).await;
        println!("  test_save_assigns_ids_and_counters: PASSED");

        test_save_snapshots_head_revisions($store).await;
        println!("  test_save_snapshots_head_revisions: PASSED");

        test_revision_set_roundtrip($store).await;
        println!("  test_revision_set_roundtrip: PASSED");

        test_missing_revision_set($store).await;
        println!("  test_missing_revision_set: PASSED");

        test_neighbor_candidates($store).await;
        println!("  test_neighbor_candidates: PASSED");

        test_persist_roundtrip($store).await;
        println!("  test_persist_roundtrip: PASSED");

        test_persist_unknown_entry($store).await;
        println!("  test_persist_unknown_entry: PASSED");

        test_list_pipelines($store).await;
        println!("  test_list_pipelines: PASSED");
    };
}
