//! Composite index builder.
//!
//! Joins the two lookup-table shapes of one archive segment into a single
//! set of observations. Collision records are the highest-confidence
//! source and always produce a combined observation with the literal
//! string attached. Non-collision records from the two formats can only
//! be correlated through the `file_id` the archive stores per entry;
//! whatever fails to join is emitted as a format-specific observation.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::{CatalogError, Result};
use crate::hash::hash_path;
use crate::keys::{FullKey, IndexId, OnePartKey, TwoPartKey};
use crate::observation::Observation;
use crate::records::{CollisionRecord, IndexFormat, SegmentSource};

/// A fully identified entry, optionally with its literal path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedEntry {
    pub key: FullKey,
    pub path: Option<String>,
}

/// Joined view of one archive segment's lookup tables
#[derive(Debug, Clone)]
pub struct CompositeIndex {
    pub index_id: IndexId,
    pub combined: Vec<CombinedEntry>,
    pub two_part_only: Vec<TwoPartKey>,
    pub one_part_only: Vec<OnePartKey>,
}

impl CompositeIndex {
    /// Join a segment's decoded record sets.
    ///
    /// Returns a [`CatalogError::Format`] when a file's stored format tag
    /// disagrees with the slot it was handed in; the segment is then
    /// skipped by the caller, the cycle continues.
    pub fn build(source: SegmentSource) -> Result<Self> {
        let index_id = source.index_id;

        if let Some(ref two_part) = source.two_part {
            if two_part.format != IndexFormat::TwoPart {
                return Err(CatalogError::format(
                    index_id.0,
                    "one-part data handed to the two-part reader",
                ));
            }
        }
        if let Some(ref one_part) = source.one_part {
            if one_part.format != IndexFormat::OnePart {
                return Err(CatalogError::format(
                    index_id.0,
                    "two-part data handed to the one-part reader",
                ));
            }
        }

        // Collisions first: they carry strings and win over everything.
        let mut combined: BTreeMap<FullKey, Option<String>> = BTreeMap::new();
        for collision in source
            .two_part
            .iter()
            .flat_map(|i| &i.collisions)
            .chain(source.one_part.iter().flat_map(|i| &i.collisions))
        {
            let key = collision_key(index_id, collision);
            // A collision seen in both formats stays a single entry.
            let slot = combined.entry(key).or_default();
            if slot.is_none() {
                *slot = Some(collision.path.clone());
            }
        }

        let combined_two_part: HashSet<TwoPartKey> =
            combined.keys().map(FullKey::two_part).collect();
        let combined_one_part: HashSet<OnePartKey> =
            combined.keys().map(FullKey::one_part).collect();

        // Remaining records by the archive's own join key.
        let mut two_part_by_id: HashMap<u64, (u32, u32)> = HashMap::new();
        if let Some(ref index) = source.two_part {
            for record in &index.records {
                let key = TwoPartKey {
                    index_id,
                    folder_hash: record.folder_hash,
                    file_hash: record.file_hash,
                };
                if combined_two_part.contains(&key) {
                    continue;
                }
                two_part_by_id.insert(record.file_id, (record.folder_hash, record.file_hash));
            }
        }

        let mut one_part_by_id: HashMap<u64, u32> = HashMap::new();
        if let Some(ref index) = source.one_part {
            for record in &index.records {
                let key = OnePartKey {
                    index_id,
                    full_hash: record.full_hash,
                };
                if combined_one_part.contains(&key) {
                    continue;
                }
                one_part_by_id.insert(record.file_id, record.full_hash);
            }
        }

        // With both formats present, records sharing a file_id name the
        // same asset; both are consumed.
        if source.two_part.is_some() && source.one_part.is_some() {
            let joinable: Vec<u64> = two_part_by_id
                .keys()
                .filter(|id| one_part_by_id.contains_key(id))
                .copied()
                .collect();
            for file_id in joinable {
                let (folder_hash, file_hash) = two_part_by_id
                    .remove(&file_id)
                    .unwrap_or_default();
                let Some(full_hash) = one_part_by_id.remove(&file_id) else {
                    continue;
                };
                combined
                    .entry(FullKey::new(index_id, folder_hash, file_hash, full_hash))
                    .or_default();
            }
        }

        let mut two_part_only: Vec<TwoPartKey> = two_part_by_id
            .into_values()
            .map(|(folder_hash, file_hash)| TwoPartKey {
                index_id,
                folder_hash,
                file_hash,
            })
            .collect();
        two_part_only.sort_unstable();
        two_part_only.dedup();

        let mut one_part_only: Vec<OnePartKey> = one_part_by_id
            .into_values()
            .map(|full_hash| OnePartKey {
                index_id,
                full_hash,
            })
            .collect();
        one_part_only.sort_unstable();
        one_part_only.dedup();

        Ok(Self {
            index_id,
            combined: combined
                .into_iter()
                .map(|(key, path)| CombinedEntry { key, path })
                .collect(),
            two_part_only,
            one_part_only,
        })
    }

    /// Total number of observations this segment will contribute
    pub fn len(&self) -> usize {
        self.combined.len() + self.two_part_only.len() + self.one_part_only.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All observations, combined entries first
    pub fn observations(&self) -> impl Iterator<Item = Observation> + '_ {
        self.combined
            .iter()
            .map(|entry| Observation::Combined {
                key: entry.key,
                path: entry.path.clone(),
            })
            .chain(self.two_part_only.iter().copied().map(Observation::TwoPartOnly))
            .chain(self.one_part_only.iter().copied().map(Observation::OnePartOnly))
    }
}

/// Full identity of a collision record; the missing half of the hash
/// pair is recomputed from the literal string it always carries.
fn collision_key(index_id: IndexId, collision: &CollisionRecord) -> FullKey {
    match (collision.folder_hash, collision.file_hash) {
        (Some(folder_hash), Some(file_hash)) => {
            FullKey::new(index_id, folder_hash, file_hash, collision.full_hash)
        }
        _ => {
            let hashes = hash_path(&collision.path);
            FullKey::new(
                index_id,
                hashes.folder_hash,
                hashes.file_hash,
                collision.full_hash,
            )
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::records::{OnePartIndex, OnePartRecord, TwoPartIndex, TwoPartRecord};

    const SEGMENT: IndexId = IndexId(0x040000);

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

    #[test]
    fn test_format_mismatch_is_fatal_for_segment() {
        let source = SegmentSource {
            index_id: SEGMENT,
            two_part: Some(TwoPartIndex {
                format: IndexFormat::OnePart,
                records: vec![],
                collisions: vec![],
            }),
            one_part: None,
        };
        assert!(matches!(
            CompositeIndex::build(source),
            Err(CatalogError::Format { .. })
        ));
    }

    #[test]
    fn test_join_consumes_both_records() {
        let source = SegmentSource {
            index_id: SEGMENT,
            two_part: Some(two_part_index(
                vec![
                    TwoPartRecord { file_id: 1, folder_hash: 11, file_hash: 12 },
                    TwoPartRecord { file_id: 2, folder_hash: 21, file_hash: 22 },
                ],
                vec![],
            )),
            one_part: Some(one_part_index(
                vec![
                    OnePartRecord { file_id: 1, full_hash: 13 },
                    OnePartRecord { file_id: 3, full_hash: 33 },
                ],
                vec![],
            )),
        };
        let composite = CompositeIndex::build(source).unwrap();

        // file_id 1 joins, 2 and 3 stay one-sided
        assert_eq!(composite.combined.len(), 1);
        assert_eq!(
            composite.combined[0].key,
            FullKey::new(SEGMENT, 11, 12, 13)
        );
        assert_eq!(composite.combined[0].path, None);
        assert_eq!(
            composite.two_part_only,
            vec![TwoPartKey { index_id: SEGMENT, folder_hash: 21, file_hash: 22 }]
        );
        assert_eq!(
            composite.one_part_only,
            vec![OnePartKey { index_id: SEGMENT, full_hash: 33 }]
        );
    }

    #[test]
    fn test_collision_yields_combined_without_counterpart() {
        let source = SegmentSource {
            index_id: SEGMENT,
            two_part: Some(two_part_index(
                vec![],
                vec![CollisionRecord {
                    folder_hash: Some(11),
                    file_hash: Some(12),
                    full_hash: 13,
                    path: "chara/a.mdl".to_string(),
                }],
            )),
            one_part: None,
        };
        let composite = CompositeIndex::build(source).unwrap();
        assert_eq!(composite.combined.len(), 1);
        assert_eq!(composite.combined[0].path.as_deref(), Some("chara/a.mdl"));
        assert!(composite.two_part_only.is_empty());
    }

    #[test]
    fn test_one_part_collision_recomputes_pair_hashes() {
        let source = SegmentSource {
            index_id: SEGMENT,
            two_part: None,
            one_part: Some(one_part_index(
                vec![],
                vec![CollisionRecord {
                    folder_hash: None,
                    file_hash: None,
                    full_hash: 99,
                    path: "chara/b.mdl".to_string(),
                }],
            )),
        };
        let composite = CompositeIndex::build(source).unwrap();
        let hashes = hash_path("chara/b.mdl");
        assert_eq!(
            composite.combined[0].key,
            FullKey::new(SEGMENT, hashes.folder_hash, hashes.file_hash, 99)
        );
    }

    #[test]
    fn test_collision_shadows_matching_records() {
        // The record covered by a collision must not also appear one-sided.
        let source = SegmentSource {
            index_id: SEGMENT,
            two_part: Some(two_part_index(
                vec![TwoPartRecord { file_id: 7, folder_hash: 11, file_hash: 12 }],
                vec![CollisionRecord {
                    folder_hash: Some(11),
                    file_hash: Some(12),
                    full_hash: 13,
                    path: "chara/c.mdl".to_string(),
                }],
            )),
            one_part: None,
        };
        let composite = CompositeIndex::build(source).unwrap();
        assert_eq!(composite.combined.len(), 1);
        assert!(composite.two_part_only.is_empty());
    }

    #[test]
    fn test_single_set_yields_only_that_kind() {
        let source = SegmentSource {
            index_id: SEGMENT,
            two_part: None,
            one_part: Some(one_part_index(
                vec![
                    OnePartRecord { file_id: 1, full_hash: 41 },
                    OnePartRecord { file_id: 2, full_hash: 42 },
                ],
                vec![],
            )),
        };
        let composite = CompositeIndex::build(source).unwrap();
        assert!(composite.combined.is_empty());
        assert!(composite.two_part_only.is_empty());
        assert_eq!(composite.one_part_only.len(), 2);
    }

    #[test]
    fn test_observation_order_is_combined_first() {
        let source = SegmentSource {
            index_id: SEGMENT,
            two_part: Some(two_part_index(
                vec![TwoPartRecord { file_id: 2, folder_hash: 21, file_hash: 22 }],
                vec![CollisionRecord {
                    folder_hash: Some(11),
                    file_hash: Some(12),
                    full_hash: 13,
                    path: "chara/d.mdl".to_string(),
                }],
            )),
            one_part: None,
        };
        let composite = CompositeIndex::build(source).unwrap();
        let observations: Vec<Observation> = composite.observations().collect();
        assert_eq!(observations.len(), 2);
        assert!(matches!(observations[0], Observation::Combined { .. }));
        assert!(matches!(observations[1], Observation::TwoPartOnly(_)));
    }
}
