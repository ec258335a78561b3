//! Single-writer catalog lock.
//!
//! Every mutation of the catalog (reconciliation cycles and upload
//! confirmation) runs under this lock so only one writer loads,
//! mutates and flushes the mirror at a time. Acquisition waits a
//! bounded time and then gives up so callers can surface a retryable
//! busy signal instead of queueing indefinitely.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::timeout;

#[derive(Debug, Clone)]
pub struct CatalogLock {
    inner: Arc<Mutex<()>>,
    wait: Duration,
}

/// Held for the duration of one catalog write
pub struct CatalogGuard {
    _guard: OwnedMutexGuard<()>,
}

impl CatalogLock {
    pub fn new(wait: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(())),
            wait,
        }
    }

    pub fn wait(&self) -> Duration {
        self.wait
    }

    /// Acquire the writer lock, waiting at most the configured bound.
    /// Returns `None` when the wait elapsed with the lock still held.
    pub async fn acquire(&self) -> Option<CatalogGuard> {
        match timeout(self.wait, Arc::clone(&self.inner).lock_owned()).await {
            Ok(guard) => Some(CatalogGuard { _guard: guard }),
            Err(_) => None,
        }
    }
}
