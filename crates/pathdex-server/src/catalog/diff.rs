//! Change tracking for one reconciliation cycle.
//!
//! Every catalog mutation records the touched key here, so the final
//! flush can write exactly the rows that changed in a single
//! transaction. The reconciliation algorithm itself stays free of any
//! storage dependency: it produces state plus this diff, and applying
//! the diff is a separate step.

use std::collections::BTreeSet;

use pathdex_common::{FullKey, IndexId, OnePartKey, TwoPartKey};

/// Keys touched since the catalog state was loaded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub paths: BTreeSet<FullKey>,
    pub staging1_upserts: BTreeSet<TwoPartKey>,
    pub staging1_deletes: BTreeSet<TwoPartKey>,
    pub staging2_upserts: BTreeSet<OnePartKey>,
    pub staging2_deletes: BTreeSet<OnePartKey>,
    pub latest_indexes: BTreeSet<IndexId>,
    pub latest_processed: BTreeSet<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
            && self.staging1_upserts.is_empty()
            && self.staging1_deletes.is_empty()
            && self.staging2_upserts.is_empty()
            && self.staging2_deletes.is_empty()
            && self.latest_indexes.is_empty()
            && self.latest_processed.is_empty()
    }

    /// Total number of dirty rows across all tables
    pub fn len(&self) -> usize {
        self.paths.len()
            + self.staging1_upserts.len()
            + self.staging1_deletes.len()
            + self.staging2_upserts.len()
            + self.staging2_deletes.len()
            + self.latest_indexes.len()
            + self.latest_processed.len()
    }

    pub(crate) fn touch_path(&mut self, key: FullKey) {
        self.paths.insert(key);
    }

    pub(crate) fn touch_staging1(&mut self, key: TwoPartKey) {
        self.staging1_upserts.insert(key);
    }

    pub(crate) fn touch_staging2(&mut self, key: OnePartKey) {
        self.staging2_upserts.insert(key);
    }

    /// A staging row created earlier in the cycle and promoted within
    /// the same cycle never reaches storage at all.
    pub(crate) fn remove_staging1(&mut self, key: TwoPartKey) {
        self.staging1_upserts.remove(&key);
        self.staging1_deletes.insert(key);
    }

    pub(crate) fn remove_staging2(&mut self, key: OnePartKey) {
        self.staging2_upserts.remove(&key);
        self.staging2_deletes.insert(key);
    }

    pub(crate) fn touch_latest_index(&mut self, index_id: IndexId) {
        self.latest_indexes.insert(index_id);
    }

    pub(crate) fn touch_latest_processed(&mut self, repo: &str) {
        self.latest_processed.insert(repo.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promote_within_cycle_leaves_only_delete() {
        let key = TwoPartKey {
            index_id: IndexId(1),
            folder_hash: 2,
            file_hash: 3,
        };
        let mut changes = ChangeSet::default();
        changes.touch_staging1(key);
        changes.remove_staging1(key);
        assert!(changes.staging1_upserts.is_empty());
        assert!(changes.staging1_deletes.contains(&key));
    }

    #[test]
    fn test_empty_and_len() {
        let mut changes = ChangeSet::default();
        assert!(changes.is_empty());
        changes.touch_latest_processed("global");
        assert!(!changes.is_empty());
        assert_eq!(changes.len(), 1);
    }
}
