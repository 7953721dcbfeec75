//! # Sync Orchestrator
//!
//! The single entry point for triggering, queuing, cancelling and observing
//! sync work.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       request_sync(type, options)                       │
//! │                                                                         │
//! │  registered? ──no──► Validation(Unregistered)                          │
//! │  shutting down? ───► ShuttingDown                                       │
//! │  OfflineGuard ─────► OfflineBlocked        (network types only)         │
//! │  RateLimiter ──────► RateLimited           (unless manual + force)      │
//! │        │                                                                │
//! │        ▼  status                                                        │
//! │  ┌─────────────┬─────────────────┬──────────────────────────────────┐  │
//! │  │ idle / done │ queued          │ running                          │  │
//! │  │ → queued    │ merge in place  │ unforced → AlreadyRunning        │  │
//! │  │ Queued      │ Merged          │ forced   → follow-up queued      │  │
//! │  └─────────────┴─────────────────┴──────────────────────────────────┘  │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  dispatch: walk the global FIFO, start every entry whose type is not   │
//! │  running and that fits the concurrency and store-writer caps           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Run Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  queued ──► running ──► success | error | cancelled                     │
//! │                │                      │                                 │
//! │                │ TaskTracker task     │ follow-up pending?              │
//! │                │  └─ inner spawn      │   → idle → queued → running     │
//! │                │     (panic → error)  │ then re-dispatch the queue      │
//! │                ▼                      │                                 │
//! │         SyncEvent::Transition ────────┴──► every subscriber, in order   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All mutable state sits behind one `std::sync::Mutex` that is never held
//! across an `.await`. Nothing is ever retried automatically.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::Utc;
use keel_core::{
    RequestOptions, RequestOutcome, StatusIndicator, SyncFailure, SyncProgress, SyncReport, SyncRequest,
    SyncState, SyncStatus, SyncType, ValidationError,
};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{NotificationSettings, OrchestratorSettings, SyncConfig};
use crate::context::{ProgressReporter, StoreWriteGate, SyncContext};
use crate::error::{SyncError, SyncResult};
use crate::events::{SyncEvent, SyncEventListener};
use crate::offline::OfflineGuard;
use crate::queue::{EnqueueOutcome, SyncQueue};
use crate::rate_limiter::RateLimiter;
use crate::registry::{RegistryBuilder, SyncFunction, SyncRegistry, TypeSpec};

// =============================================================================
// Builder
// =============================================================================

/// Start-up wiring for a `SyncOrchestrator`.
pub struct OrchestratorBuilder {
    config: SyncConfig,
    registry: RegistryBuilder,
    offline: Option<OfflineGuard>,
}

impl OrchestratorBuilder {
    /// Binds a sync function. Fails on a second registration for the same type.
    pub fn register<F>(mut self, sync_type: SyncType, spec: TypeSpec, function: F) -> SyncResult<Self>
    where
        F: SyncFunction,
    {
        self.registry.register(sync_type, spec, function)?;
        Ok(self)
    }

    /// Uses an existing connectivity guard instead of spawning one.
    pub fn offline_guard(mut self, guard: OfflineGuard) -> Self {
        self.offline = Some(guard);
        self
    }

    /// Freezes the registry and starts the orchestrator.
    ///
    /// Without an explicit guard and with offline checks enabled, a TCP
    /// heartbeat is spawned, which needs a running tokio runtime.
    pub fn build(self) -> SyncResult<SyncOrchestrator> {
        self.config.validate()?;

        let mut registry = self.registry.build();
        for name in self.config.types.keys() {
            if !registry.types().any(|t| t.as_str() == name.as_str()) {
                warn!(sync_type = %name, "Config overrides an unregistered sync type");
            }
        }
        registry.apply_settings(self.config.types.iter());

        let (offline, owns_offline) = match self.offline {
            Some(guard) => (guard, false),
            None if !self.config.offline.enabled => (OfflineGuard::always_online(), false),
            None => (OfflineGuard::spawn_tcp(&self.config.offline)?, true),
        };

        let now = Utc::now();
        let mut limiter = RateLimiter::new();
        let mut states = HashMap::new();
        for sync_type in registry.types() {
            let spec = registry.spec(sync_type)?;
            limiter.configure(sync_type.clone(), spec.cooldown_or_default(&self.config.rate_limit));
            states.insert(sync_type.clone(), SyncState::new(sync_type.clone(), now));
        }

        info!(
            types = registry.len(),
            max_concurrent = self.config.orchestrator.max_concurrent,
            store_writer_limit = self.config.orchestrator.store_writer_limit,
            "Sync orchestrator started"
        );

        Ok(SyncOrchestrator {
            inner: Arc::new(Inner {
                registry,
                settings: self.config.orchestrator,
                notifications: self.config.notifications,
                offline,
                owns_offline,
                store: StoreWriteGate::new(),
                shutdown: CancellationToken::new(),
                tracker: TaskTracker::new(),
                core: Mutex::new(Core {
                    states,
                    queue: SyncQueue::new(),
                    active: HashMap::new(),
                    store_writers: 0,
                    limiter,
                    subscribers: Vec::new(),
                    next_subscriber: 0,
                    shutting_down: false,
                }),
            }),
        })
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Owns every sync state and the only path to the registered functions.
///
/// Cheap to clone; clones share the same engine.
#[derive(Clone)]
pub struct SyncOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    registry: SyncRegistry,
    settings: OrchestratorSettings,
    notifications: NotificationSettings,
    offline: OfflineGuard,
    owns_offline: bool,
    store: StoreWriteGate,
    /// Parent of every run's cancellation token.
    shutdown: CancellationToken,
    tracker: TaskTracker,
    core: Mutex<Core>,
}

struct Core {
    states: HashMap<SyncType, SyncState>,
    /// Pending requests, including follow-ups behind running types.
    queue: SyncQueue,
    active: HashMap<SyncType, ActiveRun>,
    store_writers: usize,
    limiter: RateLimiter,
    subscribers: Vec<Subscriber>,
    next_subscriber: u64,
    shutting_down: bool,
}

struct ActiveRun {
    run_id: Uuid,
    cancel: CancellationToken,
    writes_store: bool,
}

struct Subscriber {
    id: u64,
    tx: mpsc::UnboundedSender<SyncEvent>,
}

enum RunOutcome {
    Succeeded(SyncReport),
    Cancelled(Option<SyncReport>),
    Failed(SyncError),
}

impl SyncOrchestrator {
    pub fn builder(config: SyncConfig) -> OrchestratorBuilder {
        OrchestratorBuilder {
            config,
            registry: RegistryBuilder::new(),
            offline: None,
        }
    }

    /// Requests a run of `sync_type`.
    ///
    /// Rejections come back as errors and leave the state untouched. Must be
    /// called from inside a tokio runtime, since accepted work is spawned
    /// right away.
    pub fn request_sync(&self, sync_type: &SyncType, options: RequestOptions) -> SyncResult<RequestOutcome> {
        let spec = self.inner.registry.spec(sync_type)?;

        if options.force && !options.source.may_force() {
            warn!(
                sync_type = %sync_type,
                source = %options.source,
                "Ignoring force flag on automatic sync trigger"
            );
        }
        let force = options.effective_force();

        let mut core = self.inner.lock();

        // Gate 1: no new work once draining has started
        if core.shutting_down {
            return Err(SyncError::ShuttingDown);
        }

        // Gate 2: network types need connectivity
        if !self.inner.offline.allows(spec.network) {
            debug!(sync_type = %sync_type, "Sync blocked while offline");
            return Err(SyncError::OfflineBlocked {
                sync_type: sync_type.clone(),
            });
        }

        // Gate 3: per-type cooldown, bypassed by a manual force
        let now = Instant::now();
        if let Err(retry_after) = core.limiter.check(sync_type, now) {
            if !force {
                debug!(
                    sync_type = %sync_type,
                    retry_after_ms = retry_after.as_millis() as u64,
                    "Sync rate limited"
                );
                return Err(SyncError::RateLimited {
                    sync_type: sync_type.clone(),
                    retry_after_ms: retry_after.as_millis() as u64,
                });
            }
            debug!(sync_type = %sync_type, "Forced sync bypasses cooldown");
        }

        let request = SyncRequest::new(sync_type.clone(), force, options.source, Utc::now());
        let status = core.state(sync_type)?.status;

        // Route by current status
        let outcome = match status {
            SyncStatus::Running => {
                // Without force a running type rejects, with force it gets one follow-up
                if !force {
                    return Err(SyncError::AlreadyRunning {
                        sync_type: sync_type.clone(),
                    });
                }
                let outcome = match core.queue.enqueue(request) {
                    EnqueueOutcome::Inserted => RequestOutcome::FollowUpQueued,
                    EnqueueOutcome::Merged { .. } => RequestOutcome::Merged,
                };
                info!(sync_type = %sync_type, "Follow-up sync queued behind running sync");
                core.refresh_queued_request(sync_type)?;
                outcome
            }
            SyncStatus::Queued => {
                // Only ever merges: one entry per type
                let _ = core.queue.enqueue(request);
                core.refresh_queued_request(sync_type)?;
                RequestOutcome::Merged
            }
            SyncStatus::Idle | SyncStatus::Success | SyncStatus::Error | SyncStatus::Cancelled => {
                // Terminal states pass through idle so subscribers see a fresh cycle
                if status.is_terminal() {
                    core.transition(sync_type, SyncStatus::Idle, None)?;
                }
                let _ = core.queue.enqueue(request);
                let queued = core.queue.get(sync_type).cloned();
                core.state_mut(sync_type)?.queued_request = queued;
                core.transition(sync_type, SyncStatus::Queued, None)?;
                RequestOutcome::Queued
            }
        };

        // Accepted requests start the cooldown, follow-ups included
        core.limiter.record(sync_type, now);
        debug!(sync_type = %sync_type, ?outcome, force, source = %options.source, "Sync request accepted");

        if outcome == RequestOutcome::Queued {
            self.inner.dispatch(&mut core);
        }
        Ok(outcome)
    }

    /// Requests cooperative cancellation.
    ///
    /// A running run sees its token cancelled and a pending follow-up is
    /// dropped. A queued request that has not started ends as `cancelled`.
    pub fn cancel_sync(&self, sync_type: &SyncType) -> SyncResult<()> {
        let mut core = self.inner.lock();
        let status = core.state(sync_type)?.status;

        match status {
            SyncStatus::Running => {
                if let Some(run) = core.active.get(sync_type) {
                    info!(sync_type = %sync_type, run_id = %run.run_id, "Cancelling running sync");
                    run.cancel.cancel();
                }
                if core.queue.remove(sync_type).is_some() {
                    debug!(sync_type = %sync_type, "Dropped pending follow-up");
                    core.refresh_queued_request(sync_type)?;
                }
            }
            SyncStatus::Queued => {
                core.queue.remove(sync_type);
                core.state_mut(sync_type)?.queued_request = None;
                core.transition(sync_type, SyncStatus::Cancelled, None)?;
                info!(sync_type = %sync_type, "Cancelled queued sync before start");
            }
            _ => debug!(sync_type = %sync_type, %status, "Nothing to cancel"),
        }

        Ok(())
    }

    /// Snapshot of one type's state.
    pub fn get_state(&self, sync_type: &SyncType) -> SyncResult<SyncState> {
        self.inner.lock().state(sync_type).cloned()
    }

    /// Snapshots of every registered type, by name.
    pub fn states(&self) -> Vec<SyncState> {
        let core = self.inner.lock();
        let mut states: Vec<SyncState> = core.states.values().cloned().collect();
        states.sort_by(|a, b| a.sync_type.cmp(&b.sync_type));
        states
    }

    /// Pending requests in global FIFO order, as the UI lists them.
    pub fn pending_queue(&self) -> Vec<SyncRequest> {
        self.inner.lock().queue.pending()
    }

    /// UI indicator for a type right now.
    pub fn indicator(&self, sync_type: &SyncType) -> SyncResult<StatusIndicator> {
        let window = chrono::Duration::from_std(self.inner.notifications.complete_display())
            .unwrap_or(chrono::Duration::MAX);
        let core = self.inner.lock();
        Ok(core.state(sync_type)?.indicator(Utc::now(), window))
    }

    pub fn is_registered(&self, sync_type: &SyncType) -> bool {
        self.inner.registry.contains(sync_type)
    }

    /// Number of runs in flight.
    pub fn running_count(&self) -> usize {
        self.inner.lock().active.len()
    }

    pub fn offline_guard(&self) -> &OfflineGuard {
        &self.inner.offline
    }

    pub fn notification_settings(&self) -> &NotificationSettings {
        &self.inner.notifications
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Receiver for every event from now on, in mutation order.
    ///
    /// Unbounded, so a slow reader never makes the orchestrator drop or
    /// reorder events. Closed by `drain_and_cancel_all`.
    pub fn subscribe_channel(&self) -> mpsc::UnboundedReceiver<SyncEvent> {
        self.inner.add_subscriber().1
    }

    /// Forwards events to `listener` from a dedicated task until the
    /// returned `Subscription` is dropped.
    pub fn subscribe<L>(&self, listener: L) -> Subscription
    where
        L: SyncEventListener,
    {
        let (id, mut rx) = self.inner.add_subscriber();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                listener.on_event(&event);
            }
        });

        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    /// Stops accepting requests, cancels everything and waits for runs to
    /// return, bounded by the configured grace period.
    pub async fn drain_and_cancel_all(&self) {
        {
            let mut core = self.inner.lock();
            if !core.shutting_down {
                core.shutting_down = true;
                core.publish(SyncEvent::ShutdownStarted);
            }

            for request in core.queue.drain() {
                let sync_type = request.sync_type;
                let result = match core.state(&sync_type).map(|s| s.status) {
                    Ok(SyncStatus::Queued) => core
                        .state_mut(&sync_type)
                        .map(|s| s.queued_request = None)
                        .and_then(|_| core.transition(&sync_type, SyncStatus::Cancelled, None)),
                    Ok(_) => core.refresh_queued_request(&sync_type),
                    Err(e) => Err(e),
                };
                if let Err(e) = result {
                    error!(sync_type = %sync_type, ?e, "Failed to cancel queued sync");
                }
            }

            info!(running = core.active.len(), "Draining sync orchestrator");
        }

        self.inner.shutdown.cancel();
        self.inner.tracker.close();

        let grace = self.inner.settings.shutdown_grace();
        if tokio::time::timeout(grace, self.inner.tracker.wait()).await.is_err() {
            warn!(
                remaining = self.inner.tracker.len(),
                grace_secs = grace.as_secs(),
                "Sync runs still busy after shutdown grace period"
            );
        }

        if self.inner.owns_offline {
            self.inner.offline.shutdown();
        }

        self.inner.lock().subscribers.clear();
        info!("Sync orchestrator drained");
    }
}

// =============================================================================
// Subscription
// =============================================================================

/// Keeps a listener attached. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    inner: Weak<Inner>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.lock().subscribers.retain(|s| s.id != self.id);
        }
    }
}

// =============================================================================
// Engine Internals
// =============================================================================

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn add_subscriber(&self) -> (u64, mpsc::UnboundedReceiver<SyncEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut core = self.lock();
        let id = core.next_subscriber;
        core.next_subscriber += 1;
        core.subscribers.push(Subscriber { id, tx });
        (id, rx)
    }

    /// Starts every queued entry that can run now, oldest first.
    fn dispatch(self: &Arc<Self>, core: &mut Core) {
        if core.shutting_down {
            return;
        }

        loop {
            // Global cap reached: leave the rest queued
            if let Some(cap) = self.settings.concurrency_cap() {
                if core.active.len() >= cap {
                    break;
                }
            }
            let store_full = self
                .settings
                .store_writer_cap()
                .map_or(false, |cap| core.store_writers >= cap);

            // First request in FIFO order whose type is idle and fits the writer cap
            let registry = &self.registry;
            let active = &core.active;
            let Some(request) = core.queue.pop_first_where(|r| {
                let writes_store = registry.spec(&r.sync_type).map_or(false, |s| s.writes_store);
                !active.contains_key(&r.sync_type) && !(store_full && writes_store)
            }) else {
                break;
            };

            self.start_run(core, request);
        }
    }

    fn start_run(self: &Arc<Self>, core: &mut Core, request: SyncRequest) {
        let sync_type = request.sync_type.clone();
        let (function, spec) = match (self.registry.resolve(&sync_type), self.registry.spec(&sync_type)) {
            (Ok(function), Ok(spec)) => (function, spec),
            (Err(e), _) | (_, Err(e)) => {
                error!(sync_type = %sync_type, ?e, "Queued sync has no registered function");
                return;
            }
        };

        let run_id = Uuid::new_v4();
        let cancel = self.shutdown.child_token();

        let started = core.state_mut(&sync_type).map(|state| {
            state.queued_request = None;
            state.progress = None;
        });
        if let Err(e) = started.and_then(|_| core.transition(&sync_type, SyncStatus::Running, Some(run_id))) {
            error!(sync_type = %sync_type, ?e, "Failed to start sync run");
            return;
        }

        core.active.insert(
            sync_type.clone(),
            ActiveRun {
                run_id,
                cancel: cancel.clone(),
                writes_store: spec.writes_store,
            },
        );
        if spec.writes_store {
            core.store_writers += 1;
        }

        let weak = Arc::downgrade(self);
        let progress_type = sync_type.clone();
        let progress = ProgressReporter::new(Arc::new(move |progress| {
            if let Some(inner) = weak.upgrade() {
                inner.record_progress(&progress_type, run_id, progress);
            }
        }));

        let ctx = SyncContext::new(
            request,
            run_id,
            cancel,
            progress,
            self.store.clone(),
            self.settings.helper_timeout(),
        );

        let span = info_span!("sync_run", sync_type = %sync_type, run_id = %run_id);
        let inner = Arc::clone(self);
        self.tracker.spawn(
            async move {
                info!("Sync run started");
                let outcome = execute(function, ctx).await;
                inner.finish(&sync_type, run_id, outcome);
            }
            .instrument(span),
        );
    }

    fn record_progress(&self, sync_type: &SyncType, run_id: Uuid, progress: SyncProgress) {
        let mut core = self.lock();
        if !matches!(core.active.get(sync_type), Some(run) if run.run_id == run_id) {
            return;
        }

        let now = Utc::now();
        if let Ok(state) = core.state_mut(sync_type) {
            state.progress = Some(progress);
            state.updated_at = now;
            let state = state.clone();
            core.publish(SyncEvent::Updated { state });
        }
    }

    /// Records the terminal state, promotes a pending follow-up and
    /// re-dispatches the queue.
    fn finish(self: &Arc<Self>, sync_type: &SyncType, run_id: Uuid, outcome: RunOutcome) {
        let mut core = self.lock();

        // A stale run id means the run was already finished elsewhere
        let is_current = matches!(core.active.get(sync_type), Some(run) if run.run_id == run_id);
        let Some(run) = is_current.then(|| core.active.remove(sync_type)).flatten() else {
            error!(sync_type = %sync_type, run_id = %run_id, "Finished run is not the active run");
            return;
        };
        if run.writes_store {
            core.store_writers = core.store_writers.saturating_sub(1);
        }

        // Classify the outcome into a terminal status
        let now = Utc::now();
        let to = match core.state_mut(sync_type) {
            Ok(state) => {
                state.progress = None;
                match outcome {
                    RunOutcome::Succeeded(report) => {
                        info!(
                            items_processed = report.items_processed,
                            items_new = report.items_new,
                            issues = report.errors.len(),
                            "Sync run succeeded"
                        );
                        state.last_run_at = Some(now);
                        state.last_report = Some(report);
                        state.last_error = None;
                        SyncStatus::Success
                    }
                    RunOutcome::Cancelled(report) => {
                        info!("Sync run cancelled");
                        if report.is_some() {
                            state.last_report = report;
                        }
                        SyncStatus::Cancelled
                    }
                    RunOutcome::Failed(err) => {
                        warn!(?err, "Sync run failed");
                        state.last_error = Some(SyncFailure {
                            kind: err.failure_kind(),
                            code: err.code().map(str::to_string),
                            message: err.to_string(),
                            at: now,
                        });
                        SyncStatus::Error
                    }
                }
            }
            Err(e) => {
                error!(?e, "Finished run has no state");
                return;
            }
        };

        if let Err(e) = core.transition(sync_type, to, Some(run_id)) {
            error!(?e, "Failed to record terminal state");
        }

        // A follow-up waiting behind this run goes back through idle to queued
        if core.queue.contains(sync_type) && !core.shutting_down {
            let promoted = core
                .transition(sync_type, SyncStatus::Idle, None)
                .and_then(|_| core.refresh_queued_request(sync_type))
                .and_then(|_| core.transition(sync_type, SyncStatus::Queued, None));
            match promoted {
                Ok(()) => debug!("Promoted follow-up sync"),
                Err(e) => error!(?e, "Failed to promote follow-up sync"),
            }
        }

        // Freed slots may let other queued types start
        self.dispatch(&mut core);
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if self.owns_offline {
            self.offline.shutdown();
        }
    }
}

/// Runs the function on its own task so a panic stays contained.
///
/// `run` is called inside the spawned task: a function may panic while
/// building its future, not only while polling it.
async fn execute(function: Arc<dyn SyncFunction>, ctx: SyncContext) -> RunOutcome {
    match tokio::spawn(async move { function.run(ctx).await }).await {
        Ok(Ok(report)) if report.cancelled => RunOutcome::Cancelled(Some(report)),
        Ok(Ok(report)) => RunOutcome::Succeeded(report),
        Ok(Err(SyncError::Cancelled)) => RunOutcome::Cancelled(None),
        Ok(Err(err)) => RunOutcome::Failed(err),
        Err(join_err) if join_err.is_panic() => {
            let message = panic_message(join_err.into_panic());
            error!(panic = %message, "Sync function panicked");
            RunOutcome::Failed(SyncError::Internal(format!("sync function panicked: {}", message)))
        }
        Err(join_err) => RunOutcome::Failed(SyncError::Internal(join_err.to_string())),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl Core {
    fn state(&self, sync_type: &SyncType) -> SyncResult<&SyncState> {
        self.states.get(sync_type).ok_or_else(|| unregistered(sync_type))
    }

    fn state_mut(&mut self, sync_type: &SyncType) -> SyncResult<&mut SyncState> {
        self.states.get_mut(sync_type).ok_or_else(|| unregistered(sync_type))
    }

    fn transition(&mut self, sync_type: &SyncType, to: SyncStatus, run_id: Option<Uuid>) -> SyncResult<()> {
        let state = self.state_mut(sync_type)?;
        let from = state.transition(to, Utc::now())?;
        let state = state.clone();
        debug!(sync_type = %sync_type, %from, %to, "Sync status changed");
        self.publish(SyncEvent::Transition {
            from,
            to,
            state,
            run_id,
        });
        Ok(())
    }

    /// Mirrors the queue entry into `SyncState::queued_request`.
    fn refresh_queued_request(&mut self, sync_type: &SyncType) -> SyncResult<()> {
        let queued = self.queue.get(sync_type).cloned();
        let state = self.state_mut(sync_type)?;
        if state.queued_request == queued {
            return Ok(());
        }
        state.queued_request = queued;
        state.updated_at = Utc::now();
        let state = state.clone();
        self.publish(SyncEvent::Updated { state });
        Ok(())
    }

    fn publish(&mut self, event: SyncEvent) {
        self.subscribers.retain(|s| s.tx.send(event.clone()).is_ok());
    }
}

fn unregistered(sync_type: &SyncType) -> SyncError {
    ValidationError::Unregistered {
        sync_type: sync_type.to_string(),
    }
    .into()
}
