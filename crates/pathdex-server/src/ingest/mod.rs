//! Catalog mutation: reconciliation cycles and upload confirmation.
//!
//! All writes funnel through [`CatalogService`], which serializes them
//! behind a bounded-wait writer lock.

pub mod lock;
pub mod orchestrator;

pub use lock::{CatalogGuard, CatalogLock};
pub use orchestrator::{CatalogService, CycleError, CycleSummary, PatchBatch, UploadSummary};
