//! Error types shared across pathdex components

use thiserror::Error;

/// Result type alias for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Main error type for catalog and index handling
#[derive(Error, Debug)]
pub enum CatalogError {
    /// A segment's stored format tag disagrees with how it is being read.
    /// Fatal for that segment only; the enclosing cycle continues.
    #[error("format mismatch in segment {index_id:#08x}: {reason}")]
    Format { index_id: u32, reason: String },

    /// An exact map slot was already occupied on insert. Signals a caller
    /// defect, not a data condition; the enclosing cycle must abort.
    #[error("duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("invalid game version: {0}")]
    InvalidVersion(String),
}

impl CatalogError {
    /// Create a format error with segment context
    pub fn format(index_id: u32, reason: impl Into<String>) -> Self {
        Self::Format {
            index_id,
            reason: reason.into(),
        }
    }

    /// Create a duplicate-entry error naming the violated slot
    pub fn duplicate(slot: impl Into<String>) -> Self {
        Self::DuplicateEntry(slot.into())
    }
}
