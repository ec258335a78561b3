//! Per-version observations fed into the catalog.
//!
//! An observation records that an identity was seen in some game version,
//! at one of three confidence levels. The enum keeps the ingestion
//! algorithm's three cases exhaustively checked instead of branching on
//! nullable fields.

use serde::{Deserialize, Serialize};

use crate::keys::{FullKey, OnePartKey, TwoPartKey};

/// A single observation of an identity in one archive segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Observation {
    /// All four hash fields known, possibly with a literal path string.
    /// Produced by collision records, by joining the two lookup formats,
    /// or by re-hashing an uploaded path.
    Combined {
        key: FullKey,
        path: Option<String>,
    },
    /// Seen only in the two-part (folder, file) lookup table
    TwoPartOnly(TwoPartKey),
    /// Seen only in the one-part full-hash lookup table
    OnePartOnly(OnePartKey),
}

impl Observation {
    /// Combined observation without a path string
    pub fn combined(key: FullKey) -> Self {
        Self::Combined { key, path: None }
    }

    /// Combined observation carrying a literal path
    pub fn named(key: FullKey, path: impl Into<String>) -> Self {
        Self::Combined {
            key,
            path: Some(path.into()),
        }
    }

    /// The segment this observation belongs to
    pub fn index_id(&self) -> crate::keys::IndexId {
        match self {
            Self::Combined { key, .. } => key.index_id,
            Self::TwoPartOnly(key) => key.index_id,
            Self::OnePartOnly(key) => key.index_id,
        }
    }
}
