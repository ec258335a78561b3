//! Pathdex Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared domain types for the pathdex path catalog.
//!
//! # Overview
//!
//! The archive this project catalogs stores per-segment lookup tables
//! keyed by hashes, never by literal names. This crate holds everything
//! both the server and offline tooling need to talk about that world:
//!
//! - **Versions**: the totally ordered game version identifier
//! - **Keys**: full and partial identities of catalog entries
//! - **Observations**: per-version sightings at three confidence levels
//! - **Composite builder**: joining a segment's two lookup formats
//! - **Hashing**: path hashing and category mapping for uploads
//! - **Errors / Logging**: shared error taxonomy and tracing setup

pub mod composite;
pub mod error;
pub mod hash;
pub mod keys;
pub mod logging;
pub mod observation;
pub mod records;
pub mod version;

// Re-export commonly used types
pub use composite::{CombinedEntry, CompositeIndex};
pub use error::{CatalogError, Result};
pub use hash::{category_id_for_path, hash_path, key_for_path, PathHashes};
pub use keys::{FullKey, IndexId, OnePartKey, TwoPartKey};
pub use observation::Observation;
pub use records::{
    CollisionRecord, IndexFormat, OnePartIndex, OnePartRecord, SegmentSource, TwoPartIndex,
    TwoPartRecord,
};
pub use version::GameVersion;
