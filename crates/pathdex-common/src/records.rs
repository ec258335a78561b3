//! Structured records yielded by the index-file decoder.
//!
//! The binary decoder itself is an external collaborator; these types are
//! its output contract. Every non-collision record carries the `file_id`
//! the archive stores alongside it (the data-locator for the entry's
//! contents). Records from the two lookup formats that describe the same
//! asset share a `file_id`, which is the only way to correlate them
//! without a literal string — hash correspondence cannot be recomputed.

use serde::{Deserialize, Serialize};

use crate::keys::IndexId;

/// Which on-disk lookup-table shape a segment file was written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexFormat {
    /// Keyed by (folder-hash, file-hash) pair
    TwoPart,
    /// Keyed by a single full-path hash
    OnePart,
}

/// Entry from a two-part lookup table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwoPartRecord {
    /// Archive-assigned data locator, the join key across formats
    pub file_id: u64,
    pub folder_hash: u32,
    pub file_hash: u32,
}

/// Entry from a one-part lookup table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnePartRecord {
    /// Archive-assigned data locator, the join key across formats
    pub file_id: u64,
    pub full_hash: u32,
}

/// An entry the archive stored with its literal path because two distinct
/// paths hashed to the same slot. Always carries the full-path hash; the
/// folder/file pair is present only for two-part collisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionRecord {
    pub folder_hash: Option<u32>,
    pub file_hash: Option<u32>,
    pub full_hash: u32,
    pub path: String,
}

/// Decoded contents of one lookup-table file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwoPartIndex {
    pub format: IndexFormat,
    pub records: Vec<TwoPartRecord>,
    pub collisions: Vec<CollisionRecord>,
}

/// Decoded contents of one full-hash lookup-table file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnePartIndex {
    pub format: IndexFormat,
    pub records: Vec<OnePartRecord>,
    pub collisions: Vec<CollisionRecord>,
}

/// Everything the decoder produced for one archive segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentSource {
    pub index_id: IndexId,
    pub two_part: Option<TwoPartIndex>,
    pub one_part: Option<OnePartIndex>,
}
