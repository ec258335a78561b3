//! Game version identifier and ordering.
//!
//! Versions follow the `YYYY.MM.DD.PPPP.RRRR` scheme of the game's patch
//! naming. The comparison order is (year, month, day, revision, part) —
//! revision is compared *before* part. Existing catalog data was built
//! with that order, so it is preserved as-is; see the note on
//! [`GameVersion::cmp`].

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// A released game version.
///
/// Ordering, equality and hashing consider only the five numeric fields;
/// `is_special` and `comment` are annotations carried alongside.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameVersion {
    pub year: u32,
    pub month: u32,
    pub day: u32,
    pub part: u32,
    pub revision: u32,
    #[serde(default)]
    pub is_special: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl GameVersion {
    pub fn new(year: u32, month: u32, day: u32, part: u32, revision: u32) -> Self {
        Self {
            year,
            month,
            day,
            part,
            revision,
            is_special: false,
            comment: None,
        }
    }

    /// Attach a comment, marking the version as special (out-of-band build)
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self.is_special = true;
        self
    }

    /// Parse a `YYYY.MM.DD.PPPP.RRRR` version string
    pub fn parse(input: &str) -> Result<Self, CatalogError> {
        let parts: Vec<&str> = input.split('.').collect();
        if parts.len() != 5 {
            return Err(CatalogError::InvalidVersion(format!(
                "expected 5 dot-separated fields, got {} in {:?}",
                parts.len(),
                input
            )));
        }
        let field = |idx: usize| -> Result<u32, CatalogError> {
            parts[idx]
                .parse::<u32>()
                .map_err(|_| CatalogError::InvalidVersion(format!("non-numeric field in {input:?}")))
        };
        Ok(Self::new(
            field(0)?,
            field(1)?,
            field(2)?,
            field(3)?,
            field(4)?,
        ))
    }

    fn sort_key(&self) -> (u32, u32, u32, u32, u32) {
        // Revision before part. This looks backwards but matches the order
        // the existing catalog was built with; changing it would silently
        // reorder first/last-seen ranges for historical entries.
        (self.year, self.month, self.day, self.revision, self.part)
    }
}

impl PartialEq for GameVersion {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}

impl Eq for GameVersion {}

impl Hash for GameVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sort_key().hash(state);
    }
}

impl PartialOrd for GameVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GameVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl fmt::Display for GameVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}.{:02}.{:02}.{:04}.{:04}",
            self.year, self.month, self.day, self.part, self.revision
        )
    }
}

impl FromStr for GameVersion {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
