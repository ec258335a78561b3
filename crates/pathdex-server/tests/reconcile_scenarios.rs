//! End-to-end reconciliation scenarios.
//!
//! These tests drive the full in-memory pipeline: raw segment sources
//! are joined into composite indexes, whose observations are ingested
//! across multiple patch versions and checked against the catalog's
//! guarantees (ranges only widen, strings never lost, staging rows
//! disappear on promotion, stats distinguish all-time from current).

#![allow(clippy::unwrap_used, clippy::expect_used)]

use pathdex_common::{
    hash_path, CollisionRecord, CompositeIndex, FullKey, GameVersion, IndexFormat, IndexId,
    OnePartIndex, OnePartRecord, SegmentSource, TwoPartIndex, TwoPartRecord,
};
use pathdex_server::catalog::CatalogState;

const SEGMENT: IndexId = IndexId(0x040000);

fn version(raw: &str) -> GameVersion {
    GameVersion::parse(raw).unwrap()
}

fn two_part_index(records: Vec<TwoPartRecord>, collisions: Vec<CollisionRecord>) -> TwoPartIndex {
    TwoPartIndex {
        format: IndexFormat::TwoPart,
        records,
        collisions,
    }
}

fn one_part_index(records: Vec<OnePartRecord>, collisions: Vec<CollisionRecord>) -> OnePartIndex {
    OnePartIndex {
        format: IndexFormat::OnePart,
        records,
        collisions,
    }
}

fn ingest_segment(state: &mut CatalogState, ver: &GameVersion, segment: &CompositeIndex) {
    for observation in segment.observations() {
        state.ingest(ver, &observation).unwrap();
    }
    state.observe_segment(segment.index_id, ver);
}

#[test]
fn test_joined_formats_produce_confirmed_entries() {
    // Both formats list the same file id, so the pipeline learns the
    // full identity even though neither table alone carries it.
    let segment = CompositeIndex::build(SegmentSource {
        index_id: SEGMENT,
        two_part: Some(two_part_index(
            vec![TwoPartRecord {
                file_id: 7,
                folder_hash: 100,
                file_hash: 200,
            }],
            Vec::new(),
        )),
        one_part: Some(one_part_index(
            vec![OnePartRecord {
                file_id: 7,
                full_hash: 300,
            }],
            Vec::new(),
        )),
    })
    .unwrap();

    let mut state = CatalogState::new();
    ingest_segment(&mut state, &version("2023.01.01.0000.0000"), &segment);

    let key = FullKey::new(SEGMENT, 100, 200, 300);
    let entry = state.path(&key).expect("joined identity confirmed");
    assert!(entry.path.is_none());
    assert_eq!(state.staged_len(), 0);
}

#[test]
fn test_unjoined_records_stage_then_promote_across_patches() {
    let key = FullKey::new(SEGMENT, 100, 200, 300);

    // Patch 1 ships only the two-part table.
    let patch1 = CompositeIndex::build(SegmentSource {
        index_id: SEGMENT,
        two_part: Some(two_part_index(
            vec![TwoPartRecord {
                file_id: 7,
                folder_hash: 100,
                file_hash: 200,
            }],
            Vec::new(),
        )),
        one_part: None,
    })
    .unwrap();

    // Patch 2 ships only the one-part table.
    let patch2 = CompositeIndex::build(SegmentSource {
        index_id: SEGMENT,
        two_part: None,
        one_part: Some(one_part_index(
            vec![OnePartRecord {
                file_id: 9,
                full_hash: 300,
            }],
            Vec::new(),
        )),
    })
    .unwrap();

    // Patch 3 ships both, joined.
    let patch3 = CompositeIndex::build(SegmentSource {
        index_id: SEGMENT,
        two_part: Some(two_part_index(
            vec![TwoPartRecord {
                file_id: 3,
                folder_hash: 100,
                file_hash: 200,
            }],
            Vec::new(),
        )),
        one_part: Some(one_part_index(
            vec![OnePartRecord {
                file_id: 3,
                full_hash: 300,
            }],
            Vec::new(),
        )),
    })
    .unwrap();

    let v1 = version("2023.01.01.0000.0000");
    let v2 = version("2023.02.01.0000.0000");
    let v3 = version("2023.03.01.0000.0000");

    let mut state = CatalogState::new();
    ingest_segment(&mut state, &v1, &patch1);
    ingest_segment(&mut state, &v2, &patch2);
    assert_eq!(state.confirmed_len(), 0);
    assert_eq!(state.staged_len(), 2);

    ingest_segment(&mut state, &v3, &patch3);
    let entry = state.path(&key).expect("promoted on join");
    // The merged range spans the earliest staged sighting.
    assert_eq!(entry.first_seen, v1);
    assert_eq!(entry.last_seen, v3);
    assert_eq!(state.staged_len(), 0);
}

#[test]
fn test_collision_records_carry_path_strings() {
    let hashes = hash_path("exd/root.exl");
    let segment = CompositeIndex::build(SegmentSource {
        index_id: SEGMENT,
        two_part: Some(two_part_index(
            Vec::new(),
            vec![CollisionRecord {
                folder_hash: Some(hashes.folder_hash),
                file_hash: Some(hashes.file_hash),
                full_hash: hashes.full_hash,
                path: "exd/root.exl".to_string(),
            }],
        )),
        one_part: None,
    })
    .unwrap();

    let mut state = CatalogState::new();
    ingest_segment(&mut state, &version("2023.01.01.0000.0000"), &segment);

    let key = FullKey::new(
        SEGMENT,
        hashes.folder_hash,
        hashes.file_hash,
        hashes.full_hash,
    );
    assert_eq!(
        state.path(&key).unwrap().path.as_deref(),
        Some("exd/root.exl")
    );
}

#[test]
fn test_reingesting_a_patch_changes_nothing() {
    let segment = CompositeIndex::build(SegmentSource {
        index_id: SEGMENT,
        two_part: Some(two_part_index(
            vec![
                TwoPartRecord {
                    file_id: 1,
                    folder_hash: 10,
                    file_hash: 11,
                },
                TwoPartRecord {
                    file_id: 2,
                    folder_hash: 20,
                    file_hash: 21,
                },
            ],
            Vec::new(),
        )),
        one_part: Some(one_part_index(
            vec![OnePartRecord {
                file_id: 1,
                full_hash: 12,
            }],
            Vec::new(),
        )),
    })
    .unwrap();

    let ver = version("2023.01.01.0000.0000");
    let mut state = CatalogState::new();
    ingest_segment(&mut state, &ver, &segment);

    let confirmed = state.confirmed_len();
    let staged = state.staged_len();
    let key = FullKey::new(SEGMENT, 10, 11, 12);
    let snapshot = state.path(&key).unwrap().clone();

    ingest_segment(&mut state, &ver, &segment);
    assert_eq!(state.confirmed_len(), confirmed);
    assert_eq!(state.staged_len(), staged);
    assert_eq!(state.path(&key).unwrap(), &snapshot);
}

#[test]
fn test_stats_split_all_time_from_current() {
    let mut state = CatalogState::new();
    let old = version("2023.01.01.0000.0000");
    let live = version("2023.06.01.0000.0000");

    // An entry removed from the archive after the old patch.
    let removed = CompositeIndex::build(SegmentSource {
        index_id: SEGMENT,
        two_part: Some(two_part_index(
            vec![TwoPartRecord {
                file_id: 1,
                folder_hash: 1,
                file_hash: 2,
            }],
            Vec::new(),
        )),
        one_part: Some(one_part_index(
            vec![OnePartRecord {
                file_id: 1,
                full_hash: 3,
            }],
            Vec::new(),
        )),
    })
    .unwrap();

    // An entry present in both patches.
    let kept = CompositeIndex::build(SegmentSource {
        index_id: SEGMENT,
        two_part: Some(two_part_index(
            vec![TwoPartRecord {
                file_id: 2,
                folder_hash: 4,
                file_hash: 5,
            }],
            Vec::new(),
        )),
        one_part: Some(one_part_index(
            vec![OnePartRecord {
                file_id: 2,
                full_hash: 6,
            }],
            Vec::new(),
        )),
    })
    .unwrap();

    ingest_segment(&mut state, &old, &removed);
    ingest_segment(&mut state, &old, &kept);
    ingest_segment(&mut state, &live, &kept);

    let stats = state.stats();
    assert_eq!(stats.totals.get(&SEGMENT).unwrap().total_paths, 2);
    assert_eq!(stats.current.get(&SEGMENT).unwrap().total_paths, 1);
}

#[test]
fn test_out_of_order_patches_converge() {
    let segment = |file_id: u64| {
        CompositeIndex::build(SegmentSource {
            index_id: SEGMENT,
            two_part: Some(two_part_index(
                vec![TwoPartRecord {
                    file_id,
                    folder_hash: 50,
                    file_hash: 51,
                }],
                Vec::new(),
            )),
            one_part: Some(one_part_index(
                vec![OnePartRecord {
                    file_id,
                    full_hash: 52,
                }],
                Vec::new(),
            )),
        })
        .unwrap()
    };

    let v1 = version("2023.01.01.0000.0000");
    let v2 = version("2023.02.01.0000.0000");
    let v3 = version("2023.03.01.0000.0000");

    // Forward order.
    let mut forward = CatalogState::new();
    for ver in [&v1, &v2, &v3] {
        ingest_segment(&mut forward, ver, &segment(1));
    }

    // Reverse order.
    let mut reverse = CatalogState::new();
    for ver in [&v3, &v2, &v1] {
        ingest_segment(&mut reverse, ver, &segment(1));
    }

    let key = FullKey::new(SEGMENT, 50, 51, 52);
    let a = forward.path(&key).unwrap();
    let b = reverse.path(&key).unwrap();
    assert_eq!(a.first_seen, b.first_seen);
    assert_eq!(a.last_seen, b.last_seen);
    assert_eq!(a.first_seen, v1);
    assert_eq!(a.last_seen, v3);

    // The segment ledger keeps the maximum either way.
    assert_eq!(forward.latest_index_version(SEGMENT), Some(&v3));
    assert_eq!(reverse.latest_index_version(SEGMENT), Some(&v3));
}
