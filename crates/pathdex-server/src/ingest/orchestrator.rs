//! Reconciliation cycles and upload confirmation.
//!
//! A cycle takes everything discovered since the last run, sorts it
//! into version order, and folds each patch's observations into the
//! catalog mirror under the writer lock. Per-patch acquisition failures
//! and malformed segments are skipped and counted; an internal
//! consistency violation aborts the whole cycle before anything is
//! flushed.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, warn};

use pathdex_common::{
    key_for_path, CatalogError, CompositeIndex, GameVersion, SegmentSource,
};

use crate::catalog::UploadOutcome;
use crate::db::{self, DbError};

use super::lock::CatalogLock;

/// Terminal failure of one reconciliation or upload attempt
#[derive(Error, Debug)]
pub enum CycleError {
    /// Writer lock was not acquired within the bounded wait
    #[error("catalog writer lock not acquired within {0:?}")]
    LockTimeout(Duration),

    /// The mirror detected an internal consistency violation
    #[error(transparent)]
    Invariant(#[from] CatalogError),

    /// Storage failed while loading or flushing the mirror
    #[error(transparent)]
    Db(#[from] DbError),
}

/// One discovered patch, ready for reconciliation
#[derive(Debug)]
pub struct PatchBatch {
    pub version: GameVersion,
    pub repo: String,
    pub segments: Vec<CompositeIndex>,
}

impl PatchBatch {
    /// Combine a patch's raw segment sources into composite indexes.
    ///
    /// A segment whose format tags disagree with its payload is skipped
    /// with a warning; the rest of the patch is still processed.
    pub fn from_sources(
        version: GameVersion,
        repo: impl Into<String>,
        sources: Vec<SegmentSource>,
    ) -> Self {
        let repo = repo.into();
        let mut segments = Vec::with_capacity(sources.len());
        for source in sources {
            let index_id = source.index_id;
            match CompositeIndex::build(source) {
                Ok(segment) => segments.push(segment),
                Err(e) => {
                    warn!(%version, %index_id, error = %e, "Skipping malformed segment");
                }
            }
        }
        Self {
            version,
            repo,
            segments,
        }
    }
}

/// Counters reported by one reconciliation cycle
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    pub patches_processed: usize,
    pub patches_skipped: usize,
    pub source_failures: usize,
    pub observations: usize,
    pub changes_flushed: usize,
}

/// Counters reported by one upload confirmation
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UploadSummary {
    pub received: usize,
    pub named: usize,
    pub promoted: usize,
    pub already_known: usize,
    pub unknown: usize,
    pub invalid: usize,
}

/// Owns the writer lock and drives all catalog mutation
pub struct CatalogService {
    pool: PgPool,
    lock: CatalogLock,
}

impl CatalogService {
    pub fn new(pool: PgPool, lock_wait: Duration) -> Arc<Self> {
        Arc::new(Self {
            pool,
            lock: CatalogLock::new(lock_wait),
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run one reconciliation cycle over freshly discovered patches.
    ///
    /// Source errors (a patch that failed to download or parse) are
    /// counted and skipped. Surviving patches are applied in version
    /// order, oldest first, under a single lock acquisition so the
    /// flush sees a consistent mirror.
    pub async fn run_cycle(
        &self,
        sources: Vec<anyhow::Result<PatchBatch>>,
    ) -> Result<CycleSummary, CycleError> {
        let mut summary = CycleSummary::default();

        let mut batches = Vec::with_capacity(sources.len());
        for source in sources {
            match source {
                Ok(batch) => batches.push(batch),
                Err(e) => {
                    warn!(error = %e, "Patch source failed, skipping");
                    summary.source_failures += 1;
                }
            }
        }
        batches.sort_by(|a, b| a.version.cmp(&b.version));

        if batches.is_empty() {
            info!(
                source_failures = summary.source_failures,
                "Reconciliation cycle had no patches to process"
            );
            return Ok(summary);
        }

        let Some(_guard) = self.lock.acquire().await else {
            return Err(CycleError::LockTimeout(self.lock.wait()));
        };

        let mut state = db::load_state(&self.pool).await?;

        for batch in &batches {
            if state.is_version_processed(&batch.repo, &batch.version) {
                info!(version = %batch.version, repo = %batch.repo, "Version already processed, skipping");
                summary.patches_skipped += 1;
                continue;
            }

            for segment in &batch.segments {
                for observation in segment.observations() {
                    state.ingest(&batch.version, &observation)?;
                    summary.observations += 1;
                }
                state.observe_segment(segment.index_id, &batch.version);
            }
            state.record_processed(&batch.repo, &batch.version);
            summary.patches_processed += 1;
        }

        let changes = state.take_changes();
        summary.changes_flushed = changes.len();
        db::flush(&self.pool, &state, &changes).await?;

        info!(
            patches = summary.patches_processed,
            skipped = summary.patches_skipped,
            observations = summary.observations,
            flushed = summary.changes_flushed,
            "Reconciliation cycle complete"
        );
        Ok(summary)
    }

    /// Confirm a batch of uploaded path strings against the catalog.
    ///
    /// Each path is re-hashed server side; client-supplied hashes are
    /// never trusted. Paths whose identity was never observed in any
    /// index are counted and dropped.
    pub async fn process_upload(&self, paths: &[String]) -> Result<UploadSummary, CycleError> {
        let mut summary = UploadSummary {
            received: paths.len(),
            ..UploadSummary::default()
        };

        let Some(_guard) = self.lock.acquire().await else {
            return Err(CycleError::LockTimeout(self.lock.wait()));
        };

        let mut state = db::load_state(&self.pool).await?;

        for path in paths {
            let Some(key) = key_for_path(path) else {
                warn!(path = %path, "Upload rejected, unrecognized category");
                summary.invalid += 1;
                continue;
            };
            match state.confirm_path(key, path)? {
                UploadOutcome::Named => summary.named += 1,
                UploadOutcome::Promoted => summary.promoted += 1,
                UploadOutcome::AlreadyKnown => summary.already_known += 1,
                UploadOutcome::Unknown => {
                    warn!(path = %path, "Upload skipped, identity never observed");
                    summary.unknown += 1;
                }
            }
        }

        let changes = state.take_changes();
        db::flush(&self.pool, &state, &changes).await?;

        info!(
            received = summary.received,
            named = summary.named,
            promoted = summary.promoted,
            unknown = summary.unknown,
            invalid = summary.invalid,
            "Upload batch processed"
        );
        Ok(summary)
    }
}
