//! In-memory catalog mirror and the reconciliation algorithm.
//!
//! The catalog holds confirmed entries (all three hashes known, possibly
//! with a literal path) and two staging tables for partially identified
//! observations awaiting corroboration. Ingestion upgrades weak records
//! to strong ones and never loses information already learned:
//!
//! - version ranges only ever widen (min/max),
//! - a path string, once attached, is never cleared or replaced,
//! - promotion merges staged ranges into the new confirmed entry and
//!   removes the staging rows, so no key is ever staged and confirmed
//!   at the same time.
//!
//! All mutations are recorded in a [`ChangeSet`] so the storage flush is
//! a separate, testable step.

use std::collections::{hash_map::Entry, BTreeMap, HashMap};

use serde::Serialize;
use tracing::debug;

use pathdex_common::{
    CatalogError, FullKey, GameVersion, IndexId, Observation, OnePartKey, Result, TwoPartKey,
};

use super::diff::ChangeSet;

/// A confirmed catalog entry, unique per [`FullKey`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEntry {
    pub key: FullKey,
    pub path: Option<String>,
    pub first_seen: GameVersion,
    pub last_seen: GameVersion,
}

impl PathEntry {
    /// Widen the seen range to include `version`. Returns whether the
    /// range actually changed.
    fn update_seen(&mut self, version: &GameVersion) -> bool {
        let mut changed = false;
        if *version < self.first_seen {
            self.first_seen = version.clone();
            changed = true;
        }
        if *version > self.last_seen {
            self.last_seen = version.clone();
            changed = true;
        }
        changed
    }
}

/// A two-part observation awaiting corroboration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingEntry1 {
    pub key: TwoPartKey,
    pub first_seen: GameVersion,
    pub last_seen: GameVersion,
}

/// A one-part observation awaiting corroboration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingEntry2 {
    pub key: OnePartKey,
    pub first_seen: GameVersion,
    pub last_seen: GameVersion,
}

macro_rules! impl_update_seen {
    ($ty:ty) => {
        impl $ty {
            fn update_seen(&mut self, version: &GameVersion) -> bool {
                let mut changed = false;
                if *version < self.first_seen {
                    self.first_seen = version.clone();
                    changed = true;
                }
                if *version > self.last_seen {
                    self.last_seen = version.clone();
                    changed = true;
                }
                changed
            }
        }
    };
}

impl_update_seen!(StagingEntry1);
impl_update_seen!(StagingEntry2);

/// Per-segment aggregate counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub total_paths: u64,
    pub paths_with_string: u64,
}

/// Catalog aggregates, all-time and restricted to the live release
#[derive(Debug, Clone, Default, Serialize)]
pub struct CatalogStats {
    /// Over every confirmed entry ever seen per segment
    pub totals: BTreeMap<IndexId, IndexStats>,
    /// Only entries still present in the segment's latest observed version
    pub current: BTreeMap<IndexId, IndexStats>,
}

/// Outcome of confirming one uploaded path string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Confirmed entry already carried this identity and a string
    AlreadyKnown,
    /// String attached to a previously string-less confirmed entry
    Named,
    /// Staging rows promoted into a new confirmed entry
    Promoted,
    /// Identity never observed in any index; nothing to upgrade
    Unknown,
}

/// The in-memory catalog mirror for one reconciliation cycle
#[derive(Debug, Default)]
pub struct CatalogState {
    paths: HashMap<FullKey, PathEntry>,
    // Projection lookups for O(1) matching of partial observations.
    // Distinct full hashes can share a projection when paths collide;
    // the most recently inserted key wins, matching first-match lookup.
    by_two_part: HashMap<TwoPartKey, FullKey>,
    by_one_part: HashMap<OnePartKey, FullKey>,
    staging1: HashMap<TwoPartKey, StagingEntry1>,
    staging2: HashMap<OnePartKey, StagingEntry2>,
    latest_indexes: HashMap<IndexId, GameVersion>,
    latest_processed: HashMap<String, GameVersion>,
    changes: ChangeSet,
}

impl CatalogState {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Loading (used by the storage layer; does not mark anything dirty)
    // ========================================================================

    pub(crate) fn load_path(&mut self, entry: PathEntry) {
        let key = entry.key;
        self.by_two_part.insert(key.two_part(), key);
        self.by_one_part.insert(key.one_part(), key);
        self.paths.insert(key, entry);
    }

    pub(crate) fn load_staging1(&mut self, entry: StagingEntry1) {
        self.staging1.insert(entry.key, entry);
    }

    pub(crate) fn load_staging2(&mut self, entry: StagingEntry2) {
        self.staging2.insert(entry.key, entry);
    }

    pub(crate) fn load_latest_index(&mut self, index_id: IndexId, version: GameVersion) {
        self.latest_indexes.insert(index_id, version);
    }

    pub(crate) fn load_latest_processed(&mut self, repo: String, version: GameVersion) {
        self.latest_processed.insert(repo, version);
    }

    // ========================================================================
    // Ingestion
    // ========================================================================

    /// Apply one observation seen in `version`.
    ///
    /// Re-ingesting an already-processed observation is a no-op beyond
    /// range widening and string attachment, both idempotent.
    pub fn ingest(&mut self, version: &GameVersion, observation: &Observation) -> Result<()> {
        match observation {
            Observation::Combined { key, path } => {
                self.ingest_combined(version, *key, path.as_deref())
            }
            Observation::TwoPartOnly(key) => self.ingest_two_part(version, *key),
            Observation::OnePartOnly(key) => self.ingest_one_part(version, *key),
        }
    }

    fn ingest_combined(
        &mut self,
        version: &GameVersion,
        key: FullKey,
        path: Option<&str>,
    ) -> Result<()> {
        if let Some(entry) = self.paths.get_mut(&key) {
            let mut changed = entry.update_seen(version);
            if entry.path.is_none() {
                if let Some(path) = path {
                    entry.path = Some(path.to_string());
                    changed = true;
                }
            }
            if changed {
                self.changes.touch_path(key);
            }
            return Ok(());
        }

        // Promotion: consume matching staging rows and merge their ranges.
        let mut first_seen = version.clone();
        let mut last_seen = version.clone();

        if let Some(staged) = self.staging1.remove(&key.two_part()) {
            first_seen = first_seen.min(staged.first_seen);
            last_seen = last_seen.max(staged.last_seen);
            self.changes.remove_staging1(key.two_part());
        }
        if let Some(staged) = self.staging2.remove(&key.one_part()) {
            first_seen = first_seen.min(staged.first_seen);
            last_seen = last_seen.max(staged.last_seen);
            self.changes.remove_staging2(key.one_part());
        }

        self.insert_confirmed(PathEntry {
            key,
            path: path.map(str::to_string),
            first_seen,
            last_seen,
        })
    }

    fn ingest_two_part(&mut self, version: &GameVersion, key: TwoPartKey) -> Result<()> {
        // A weaker observation never shadows a stronger one: a confirmed
        // entry absorbs the sighting, no staging row is created.
        if let Some(full_key) = self.by_two_part.get(&key).copied() {
            if let Some(entry) = self.paths.get_mut(&full_key) {
                if entry.update_seen(version) {
                    self.changes.touch_path(full_key);
                }
                return Ok(());
            }
        }

        if let Some(staged) = self.staging1.get_mut(&key) {
            if staged.update_seen(version) {
                self.changes.touch_staging1(key);
            }
            return Ok(());
        }

        self.insert_staging1(StagingEntry1 {
            key,
            first_seen: version.clone(),
            last_seen: version.clone(),
        })
    }

    fn ingest_one_part(&mut self, version: &GameVersion, key: OnePartKey) -> Result<()> {
        if let Some(full_key) = self.by_one_part.get(&key).copied() {
            if let Some(entry) = self.paths.get_mut(&full_key) {
                if entry.update_seen(version) {
                    self.changes.touch_path(full_key);
                }
                return Ok(());
            }
        }

        if let Some(staged) = self.staging2.get_mut(&key) {
            if staged.update_seen(version) {
                self.changes.touch_staging2(key);
            }
            return Ok(());
        }

        self.insert_staging2(StagingEntry2 {
            key,
            first_seen: version.clone(),
            last_seen: version.clone(),
        })
    }

    // Exact-slot inserts. An occupied slot here means lookup-before-insert
    // was not followed; that is a defect and must abort the cycle.

    fn insert_confirmed(&mut self, entry: PathEntry) -> Result<()> {
        let key = entry.key;
        match self.paths.entry(key) {
            Entry::Occupied(_) => {
                return Err(CatalogError::duplicate(format!("confirmed slot {key}")))
            }
            Entry::Vacant(slot) => {
                slot.insert(entry);
            }
        }
        self.by_two_part.insert(key.two_part(), key);
        self.by_one_part.insert(key.one_part(), key);
        self.changes.touch_path(key);
        Ok(())
    }

    fn insert_staging1(&mut self, entry: StagingEntry1) -> Result<()> {
        let key = entry.key;
        match self.staging1.entry(key) {
            Entry::Occupied(_) => {
                return Err(CatalogError::duplicate(format!("staging1 slot {key}")))
            }
            Entry::Vacant(slot) => {
                slot.insert(entry);
            }
        }
        self.changes.touch_staging1(key);
        Ok(())
    }

    fn insert_staging2(&mut self, entry: StagingEntry2) -> Result<()> {
        let key = entry.key;
        match self.staging2.entry(key) {
            Entry::Occupied(_) => {
                return Err(CatalogError::duplicate(format!("staging2 slot {key}")))
            }
            Entry::Vacant(slot) => {
                slot.insert(entry);
            }
        }
        self.changes.touch_staging2(key);
        Ok(())
    }

    // ========================================================================
    // Upload confirmation
    // ========================================================================

    /// Confirm a literal path against existing knowledge.
    ///
    /// Uploads carry no version of their own, so a path can only upgrade
    /// what an index observation already established: attach the string
    /// to a confirmed entry, or promote staging rows using their merged
    /// range. An identity never seen in any index is reported
    /// [`UploadOutcome::Unknown`] and left alone.
    pub fn confirm_path(&mut self, key: FullKey, path: &str) -> Result<UploadOutcome> {
        if let Some(entry) = self.paths.get_mut(&key) {
            if entry.path.is_some() {
                return Ok(UploadOutcome::AlreadyKnown);
            }
            entry.path = Some(path.to_string());
            self.changes.touch_path(key);
            debug!(path = %path, key = %key, "named existing entry");
            return Ok(UploadOutcome::Named);
        }

        let staged1 = self.staging1.remove(&key.two_part());
        let staged2 = self.staging2.remove(&key.one_part());

        let mut range: Option<(GameVersion, GameVersion)> = None;
        if let Some(ref staged) = staged1 {
            self.changes.remove_staging1(key.two_part());
            range = Some((staged.first_seen.clone(), staged.last_seen.clone()));
        }
        if let Some(ref staged) = staged2 {
            self.changes.remove_staging2(key.one_part());
            range = Some(match range {
                Some((first, last)) => (
                    first.min(staged.first_seen.clone()),
                    last.max(staged.last_seen.clone()),
                ),
                None => (staged.first_seen.clone(), staged.last_seen.clone()),
            });
        }

        let Some((first_seen, last_seen)) = range else {
            return Ok(UploadOutcome::Unknown);
        };

        self.insert_confirmed(PathEntry {
            key,
            path: Some(path.to_string()),
            first_seen,
            last_seen,
        })?;
        debug!(path = %path, key = %key, "promoted staged entry");
        Ok(UploadOutcome::Promoted)
    }

    // ========================================================================
    // Version ledger
    // ========================================================================

    /// Record that `version` of this segment was observed
    pub fn observe_segment(&mut self, index_id: IndexId, version: &GameVersion) {
        match self.latest_indexes.get(&index_id) {
            Some(latest) if *latest >= *version => {}
            _ => {
                self.latest_indexes.insert(index_id, version.clone());
                self.changes.touch_latest_index(index_id);
            }
        }
    }

    /// Record that `version` of this release channel was fully ingested
    pub fn record_processed(&mut self, repo: &str, version: &GameVersion) {
        match self.latest_processed.get(repo) {
            Some(latest) if *latest >= *version => {}
            _ => {
                self.latest_processed
                    .insert(repo.to_string(), version.clone());
                self.changes.touch_latest_processed(repo);
            }
        }
    }

    /// Whether this version of the channel was already fully ingested
    pub fn is_version_processed(&self, repo: &str, version: &GameVersion) -> bool {
        self.latest_processed
            .get(repo)
            .is_some_and(|latest| *latest >= *version)
    }

    pub fn latest_index_version(&self, index_id: IndexId) -> Option<&GameVersion> {
        self.latest_indexes.get(&index_id)
    }

    pub fn latest_processed_version(&self, repo: &str) -> Option<&GameVersion> {
        self.latest_processed.get(repo)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn path(&self, key: &FullKey) -> Option<&PathEntry> {
        self.paths.get(key)
    }

    pub fn staging1(&self, key: &TwoPartKey) -> Option<&StagingEntry1> {
        self.staging1.get(key)
    }

    pub fn staging2(&self, key: &OnePartKey) -> Option<&StagingEntry2> {
        self.staging2.get(key)
    }

    pub fn confirmed_len(&self) -> usize {
        self.paths.len()
    }

    pub fn staged_len(&self) -> usize {
        self.staging1.len() + self.staging2.len()
    }

    pub fn iter_latest_indexes(&self) -> impl Iterator<Item = (&IndexId, &GameVersion)> {
        self.latest_indexes.iter()
    }

    pub fn iter_latest_processed(&self) -> impl Iterator<Item = (&String, &GameVersion)> {
        self.latest_processed.iter()
    }

    /// Per-segment aggregates, all-time and restricted to entries whose
    /// last-seen version equals the segment's latest observed version
    pub fn stats(&self) -> CatalogStats {
        let mut stats = CatalogStats::default();
        for entry in self.paths.values() {
            let index_id = entry.key.index_id;
            let totals = stats.totals.entry(index_id).or_default();
            totals.total_paths += 1;
            if entry.path.is_some() {
                totals.paths_with_string += 1;
            }
            if self.latest_indexes.get(&index_id) == Some(&entry.last_seen) {
                let current = stats.current.entry(index_id).or_default();
                current.total_paths += 1;
                if entry.path.is_some() {
                    current.paths_with_string += 1;
                }
            }
        }
        stats
    }

    // ========================================================================
    // Change tracking
    // ========================================================================

    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    pub fn take_changes(&mut self) -> ChangeSet {
        std::mem::take(&mut self.changes)
    }
}
