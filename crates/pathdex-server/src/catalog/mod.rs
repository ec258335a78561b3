//! Catalog state and change tracking.
//!
//! The reconciliation algorithm lives in [`state`] and operates purely
//! in memory; [`diff`] accumulates the dirty keys a cycle produced so
//! the storage layer can flush exactly what changed.

pub mod diff;
pub mod state;

pub use diff::ChangeSet;
pub use state::{
    CatalogState, CatalogStats, IndexStats, PathEntry, StagingEntry1, StagingEntry2, UploadOutcome,
};
