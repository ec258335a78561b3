//! Key types identifying catalog entries at their three granularities.
//!
//! The archive exposes two on-disk lookup shapes: one keyed by a
//! (folder-hash, file-hash) pair and one keyed by a single full-path
//! hash. A fully identified entry carries all three hashes plus the
//! segment it lives in; the two projections are what partial
//! observations are keyed by.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an archive segment (category/expansion-derived)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct IndexId(pub u32);

impl fmt::Display for IndexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06x}", self.0)
    }
}

/// Full identity of a catalog entry: segment plus all three hashes
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct FullKey {
    pub index_id: IndexId,
    pub folder_hash: u32,
    pub file_hash: u32,
    pub full_hash: u32,
}

impl FullKey {
    pub fn new(index_id: IndexId, folder_hash: u32, file_hash: u32, full_hash: u32) -> Self {
        Self {
            index_id,
            folder_hash,
            file_hash,
            full_hash,
        }
    }

    /// Projection onto the (folder, file) hash pair
    pub fn two_part(&self) -> TwoPartKey {
        TwoPartKey {
            index_id: self.index_id,
            folder_hash: self.folder_hash,
            file_hash: self.file_hash,
        }
    }

    /// Projection onto the full-path hash
    pub fn one_part(&self) -> OnePartKey {
        OnePartKey {
            index_id: self.index_id,
            full_hash: self.full_hash,
        }
    }
}

impl fmt::Display for FullKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{:08x}/{:08x}:{:08x}",
            self.index_id, self.folder_hash, self.file_hash, self.full_hash
        )
    }
}

/// Identity as seen by the two-part (folder, file) lookup table
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TwoPartKey {
    pub index_id: IndexId,
    pub folder_hash: u32,
    pub file_hash: u32,
}

impl fmt::Display for TwoPartKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{:08x}/{:08x}",
            self.index_id, self.folder_hash, self.file_hash
        )
    }
}

/// Identity as seen by the one-part full-hash lookup table
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct OnePartKey {
    pub index_id: IndexId,
    pub full_hash: u32,
}

impl fmt::Display for OnePartKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:08x}", self.index_id, self.full_hash)
    }
}
