use chrono::{DateTime, TimeZone, Utc};

use super::*;
use crate::material::{Material, MaterialRevisionSet, Modification};

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, hour, minute, 0).single().unwrap()
}

fn entry(pipeline: &str, id: i64, counter: u32, revisions: &[(&str, DateTime<Utc>)]) -> TimelineEntry {
    let map = revisions
        .iter()
        .map(|(fp, date)| (fp.to_string(), vec![Revision::new(*date, format!("{fp}@{date}"), None, 0)]))
        .collect();
    TimelineEntry::new(pipeline, id, counter, map)
}

// ============================================================================
// Comparator
// ============================================================================

#[test]
fn test_same_id_is_equal() {
    let a = entry("p", 1, 1, &[("g", at(9, 0))]);
    let b = entry("q", 1, 7, &[("g", at(11, 0))]);
    assert_eq!(a.compare(&b).unwrap(), Ordering::Equal);
    assert!(a.same_identity(&b));
}

#[test]
fn test_earlier_shared_revision_comes_first() {
    let a = entry("p", 1, 2, &[("g", at(9, 0))]);
    let b = entry("p", 2, 1, &[("g", at(10, 0))]);
    assert_eq!(a.compare(&b).unwrap(), Ordering::Less);
    assert_eq!(b.compare(&a).unwrap(), Ordering::Greater);
}

#[test]
fn test_earliest_difference_decides() {
    // g says a first at 09:00, h says b first at 10:00; the earlier key wins.
    let a = entry("p", 1, 1, &[("g", at(9, 0)), ("h", at(12, 0))]);
    let b = entry("p", 2, 2, &[("g", at(11, 0)), ("h", at(10, 0))]);
    assert_eq!(a.compare(&b).unwrap(), Ordering::Less);
    assert_eq!(b.compare(&a).unwrap(), Ordering::Greater);
}

#[test]
fn test_contention_falls_back_to_counter() {
    // Both materials differ starting at 09:00 but disagree on the side.
    let a = entry("p", 10, 2, &[("g", at(9, 0)), ("h", at(10, 0))]);
    let b = entry("p", 11, 1, &[("g", at(10, 0)), ("h", at(9, 0))]);
    assert_eq!(a.compare(&b).unwrap(), Ordering::Greater);
    assert_eq!(b.compare(&a).unwrap(), Ordering::Less);
}

#[test]
fn test_no_shared_material_falls_back_to_counter() {
    let a = entry("p", 1, 3, &[("g", at(9, 0))]);
    let b = entry("p", 2, 4, &[("h", at(8, 0))]);
    assert_eq!(a.compare(&b).unwrap(), Ordering::Less);
}

#[test]
fn test_counter_tie_is_broken_by_id() {
    let a = entry("p", 5, 1, &[("g", at(9, 0))]);
    let b = entry("p", 6, 1, &[("g", at(9, 0))]);
    assert_eq!(a.compare(&b).unwrap(), Ordering::Less);
    assert_eq!(b.compare(&a).unwrap(), Ordering::Greater);
}

#[test]
fn test_cross_pipeline_tie_is_rejected() {
    // Fan-in: both pipelines consumed the same revision of G at 09:00.
    let up = entry("up", 1, 1, &[("g", at(9, 0))]);
    let down = entry("down", 2, 1, &[("g", at(9, 0))]);
    assert!(matches!(up.compare(&down), Err(TimelineError::InvalidArgument(_))));
    assert!(matches!(down.compare(&up), Err(TimelineError::InvalidArgument(_))));
}

#[test]
fn test_cross_pipeline_with_evidence_is_ordered() {
    let up = entry("up", 1, 1, &[("g", at(9, 0))]);
    let down = entry("down", 2, 1, &[("g", at(9, 30))]);
    assert_eq!(up.compare(&down).unwrap(), Ordering::Less);
}

#[test]
fn test_same_pipeline_triples_are_totally_ordered() {
    let entries = [
        entry("p", 1, 1, &[("g", at(9, 0)), ("h", at(9, 0))]),
        entry("p", 2, 2, &[("g", at(9, 30)), ("h", at(9, 0))]),
        entry("p", 3, 3, &[("g", at(9, 30)), ("h", at(10, 0))]),
        entry("p", 4, 4, &[("g", at(8, 0))]),
    ];
    for a in &entries {
        for b in &entries {
            let ab = a.compare(b).unwrap();
            let ba = b.compare(a).unwrap();
            assert_eq!(ab, ba.reverse(), "antisymmetry {} {}", a.id(), b.id());
            for c in &entries {
                if ab == Ordering::Less && b.compare(c).unwrap() == Ordering::Less {
                    assert_eq!(a.compare(c).unwrap(), Ordering::Less, "transitivity");
                }
            }
        }
    }
}

#[test]
fn test_only_first_revision_per_material_is_compared() {
    let mut a = entry("p", 1, 2, &[]);
    a.revisions.insert(
        "g".to_string(),
        vec![
            Revision::new(at(9, 0), "x", Some("one".into()), 0),
            Revision::new(at(12, 0), "y", Some("two".into()), 0),
        ],
    );
    let b = entry("p", 2, 1, &[("g", at(10, 0))]);
    assert_eq!(a.compare(&b).unwrap(), Ordering::Less);
}

// ============================================================================
// Natural order and links
// ============================================================================

#[test]
fn test_natural_order_is_set_once() {
    let mut e = entry("p", 1, 1, &[]);
    assert!(!e.is_ordered());
    e.update_natural_order(2.5).unwrap();
    e.update_natural_order(2.5).unwrap();
    assert_eq!(e.natural_order(), 2.5);

    let err = e.update_natural_order(3.0).unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(e.natural_order(), 2.5);
}

#[test]
fn test_links_are_assigned_once() {
    let mut e = entry("p", 3, 3, &[]);
    e.set_inserted_after(1).unwrap();
    e.set_inserted_before(2).unwrap();
    e.set_inserted_after(1).unwrap();

    assert!(matches!(
        e.set_inserted_before(4),
        Err(TimelineError::OrderingCorruption { id: 3, .. })
    ));
    assert!(e.set_inserted_after(5).is_err());
    assert_eq!(e.inserted_after(), Some(1));
    assert_eq!(e.inserted_before(), Some(2));
}

#[test]
fn test_from_revision_set_snapshots_heads() {
    let git = Material::scm("git", "https://example.com/a.git");
    let mut set = MaterialRevisionSet::new();
    set.add(
        git.clone().with_folder("one"),
        vec![
            Modification::new("a", "c", "r2", at(10, 0)).with_id(8),
            Modification::new("a", "c", "r1", at(9, 0)).with_id(7),
        ],
    )
    .unwrap();
    set.add(
        git.clone().with_folder("two"),
        vec![Modification::new("a", "c", "r2", at(10, 0)).with_id(8)],
    )
    .unwrap();
    set.add(Material::scm("git", "empty"), vec![]).unwrap();

    let e = TimelineEntry::from_revision_set("p", 1, 1, &set);

    assert_eq!(e.revisions().len(), 1);
    let revs = &e.revisions()[git.fingerprint()];
    assert_eq!(revs.len(), 2);
    assert_eq!(revs[0], Revision::new(at(10, 0), "r2", Some("one".into()), 8));
    assert_eq!(revs[1].folder.as_deref(), Some("two"));
}
