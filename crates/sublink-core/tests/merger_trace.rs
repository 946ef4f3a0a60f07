//! Merger Trace Tests
//!
//! Full branches and property peaks built from the past and future
//! branches of stored entities.

mod common;

use common::open_fixture;
use pretty_assertions::assert_eq;
use sublink_core::{Columns, MergerTrace, Peak, TreeError, SNAP_NUM, SUBHALO_ID};

#[test]
fn test_full_branch_of_intermediate_node() {
    let (_dir, forest, db) = open_fixture();
    let local_id = forest.local_id_of(2, 6.0);

    let trace = MergerTrace::trace(&db, 2, local_id, &Columns::select(["SubhaloMass"]))
        .unwrap()
        .unwrap();
    assert_eq!(trace.past().f32s("SubhaloMass").unwrap(), &[6.0, 4.0, 2.0]);
    assert_eq!(trace.future().f32s("SubhaloMass").unwrap(), &[6.0, 10.0]);

    let branch = trace.full_branch();
    assert_eq!(branch.i32s(SNAP_NUM).unwrap(), &[0, 1, 2, 3]);
    assert_eq!(branch.f32s("SubhaloMass").unwrap(), &[2.0, 4.0, 6.0, 10.0]);
    // only columns present in both branches
    assert_eq!(
        branch.column_names().collect::<Vec<_>>(),
        vec![SNAP_NUM, "SubhaloMass"]
    );
}

#[test]
fn test_full_branch_matches_facade() {
    let (_dir, forest, db) = open_fixture();

    for (snap, local_id, node) in forest.entities() {
        let columns = Columns::select([SUBHALO_ID]);
        let branch = db.get_full_branch(snap, local_id, &columns).unwrap().unwrap();
        let trace = MergerTrace::trace(&db, snap, local_id, &columns)
            .unwrap()
            .unwrap();
        assert_eq!(branch, trace.full_branch());

        let ids = branch.i64s(SUBHALO_ID).unwrap();
        assert_eq!(
            ids.len(),
            trace.past().len() + trace.future().len() - 1,
            "entity appears once"
        );
        assert_eq!(ids.iter().filter(|&&id| id == node.subhalo_id).count(), 1);
        assert!(branch.i32s(SNAP_NUM).unwrap().windows(2).all(|w| w[0] < w[1]));
    }
}

#[test]
fn test_peak_over_past_branch() {
    let (_dir, forest, db) = open_fixture();
    let local_id = forest.local_id_of(3, 6.0);

    let trace = MergerTrace::trace(&db, 3, local_id, &Columns::All)
        .unwrap()
        .unwrap();
    assert_eq!(
        trace.peak("SubhaloMass").unwrap(),
        Some(Peak {
            value: 6.0,
            snapshot: 3,
            index: 0
        })
    );

    let len_peak = trace.peak("SubhaloLen").unwrap().unwrap();
    assert_eq!(len_peak.snapshot, 3);

    assert!(matches!(
        trace.peak("SubhaloPos"),
        Err(TreeError::MalformedSchema(_))
    ));
}

#[test]
fn test_trace_of_no_tree_entity() {
    let (_dir, forest, db) = open_fixture();
    let local_id = forest.no_tree_id(0);
    assert!(MergerTrace::trace(&db, 0, local_id, &Columns::All)
        .unwrap()
        .is_none());
    assert_eq!(db.stats().open_shards, 0);
}
