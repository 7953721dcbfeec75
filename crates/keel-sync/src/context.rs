//! # Run Context
//!
//! Everything a sync function receives from the orchestrator for one run:
//! the cancellation token, the progress reporter, the shared store-write
//! gate and a bounded-call helper.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use keel_core::{SyncProgress, SyncRequest, SyncType};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};

/// Races `fut` against a timer.
///
/// Use for calls whose SDK exposes no cancellation of its own (session
/// checks, token refresh, connectivity probes).
pub async fn bounded<F>(limit: Duration, fut: F) -> SyncResult<F::Output>
where
    F: Future,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| SyncError::Timeout(limit.as_secs()))
}

// =============================================================================
// Progress Reporter
// =============================================================================

/// Sink for progress updates, republished through the orchestrator's
/// subscription channel.
#[derive(Clone)]
pub struct ProgressReporter {
    sink: Arc<dyn Fn(SyncProgress) + Send + Sync>,
}

impl ProgressReporter {
    pub(crate) fn new(sink: Arc<dyn Fn(SyncProgress) + Send + Sync>) -> Self {
        ProgressReporter { sink }
    }

    /// A reporter that drops every update.
    pub fn noop() -> Self {
        ProgressReporter {
            sink: Arc::new(|_| {}),
        }
    }

    pub fn report(&self, progress: SyncProgress) {
        (self.sink)(progress)
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter").finish_non_exhaustive()
    }
}

// =============================================================================
// Store Write Gate
// =============================================================================

/// Process-wide single-writer section around local store writes.
///
/// Independent of per-type run exclusivity: two different types may run at
/// once, but their persistence calls go through here one at a time.
#[derive(Debug, Clone, Default)]
pub struct StoreWriteGate {
    lock: Arc<Mutex<()>>,
}

impl StoreWriteGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive write access. Released when the guard drops.
    pub async fn acquire(&self) -> OwnedMutexGuard<()> {
        self.lock.clone().lock_owned().await
    }
}

// =============================================================================
// Sync Context
// =============================================================================

/// Per-run handle passed to a `SyncFunction`.
#[derive(Debug, Clone)]
pub struct SyncContext {
    request: SyncRequest,
    run_id: Uuid,
    cancel: CancellationToken,
    progress: ProgressReporter,
    store: StoreWriteGate,
    helper_timeout: Duration,
}

impl SyncContext {
    pub(crate) fn new(
        request: SyncRequest,
        run_id: Uuid,
        cancel: CancellationToken,
        progress: ProgressReporter,
        store: StoreWriteGate,
        helper_timeout: Duration,
    ) -> Self {
        SyncContext {
            request,
            run_id,
            cancel,
            progress,
            store,
            helper_timeout,
        }
    }

    /// Standalone context for exercising a sync function outside the
    /// orchestrator.
    pub fn detached(request: SyncRequest) -> Self {
        Self::new(
            request,
            Uuid::new_v4(),
            CancellationToken::new(),
            ProgressReporter::noop(),
            StoreWriteGate::new(),
            Duration::from_secs(12),
        )
    }

    pub fn sync_type(&self) -> &SyncType {
        &self.request.sync_type
    }

    /// The request that started this run (after dedup merging).
    pub fn request(&self) -> &SyncRequest {
        &self.request
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Safe-point check: `Err(Cancelled)` once cancellation was requested.
    pub fn check_cancelled(&self) -> SyncResult<()> {
        if self.cancel.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn report_progress(&self, progress: SyncProgress) {
        self.progress.report(progress);
    }

    /// Exclusive access to the shared local store.
    pub async fn store_write(&self) -> OwnedMutexGuard<()> {
        self.store.acquire().await
    }

    /// Runs a helper call bounded by the configured helper timeout and by
    /// this run's cancellation.
    pub async fn bounded<F>(&self, fut: F) -> SyncResult<F::Output>
    where
        F: Future,
    {
        tokio::select! {
            result = bounded(self.helper_timeout, fut) => result,
            _ = self.cancel.cancelled() => Err(SyncError::Cancelled),
        }
    }
}
