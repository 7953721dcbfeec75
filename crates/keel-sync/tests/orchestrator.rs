//! Integration tests for the sync orchestrator
//!
//! Drive the engine end to end with a paused clock: request, run, cancel,
//! follow-ups, notifications and shutdown.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use keel_sync::{
    BatchCompletion, FailureKind, NotificationDeriver, OfflineGuard, RequestOptions, RequestOutcome,
    StatusIndicator, SyncConfig, SyncContext, SyncError, SyncEvent, SyncFunction, SyncOrchestrator,
    SyncProgress, SyncReport, SyncSource, SyncStatus, SyncType, TypeSpec,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing_subscriber::EnvFilter;

use SyncStatus::{Cancelled, Error, Idle, Queued, Running, Success};

// =============================================================================
// Helpers
// =============================================================================

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,keel_sync=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

fn config() -> SyncConfig {
    let mut config = SyncConfig::default();
    config.offline.enabled = false;
    config
}

/// Counts invocations, works for `work`, stops early on cancellation.
fn import(calls: Arc<AtomicUsize>, work: Duration) -> impl SyncFunction {
    move |ctx: SyncContext| {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            ctx.report_progress(SyncProgress::Indeterminate);
            tokio::select! {
                _ = tokio::time::sleep(work) => Ok(SyncReport::completed(10, 2)),
                _ = ctx.cancel_token().cancelled() => Err(SyncError::Cancelled),
            }
        }
    }
}

fn transitions(rx: &mut UnboundedReceiver<SyncEvent>, sync_type: &SyncType) -> Vec<(SyncStatus, SyncStatus)> {
    let mut seen = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let SyncEvent::Transition { from, to, state, .. } = event {
            if &state.sync_type == sync_type {
                seen.push((from, to));
            }
        }
    }
    seen
}

async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_scenario_a_single_run_transitions_in_order() {
    init_tracing();
    let calls = Arc::new(AtomicUsize::new(0));
    let orchestrator = SyncOrchestrator::builder(config())
        .register(SyncType::contacts(), TypeSpec::local(), import(calls.clone(), Duration::from_millis(100)))
        .unwrap()
        .build()
        .unwrap();
    let mut rx = orchestrator.subscribe_channel();

    let outcome = orchestrator
        .request_sync(&SyncType::contacts(), RequestOptions::manual())
        .unwrap();
    assert_eq!(outcome, RequestOutcome::Queued);
    assert_eq!(orchestrator.get_state(&SyncType::contacts()).unwrap().status, Running);

    advance(500).await;

    assert_eq!(
        transitions(&mut rx, &SyncType::contacts()),
        vec![(Idle, Queued), (Queued, Running), (Running, Success)]
    );
    let state = orchestrator.get_state(&SyncType::contacts()).unwrap();
    assert_eq!(state.status, Success);
    assert!(state.last_run_at.is_some());
    assert_eq!(state.last_report.unwrap().items_processed, 10);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_scenario_b_unforced_request_while_running_conflicts() {
    init_tracing();
    let calls = Arc::new(AtomicUsize::new(0));
    let orchestrator = SyncOrchestrator::builder(config())
        .register(
            SyncType::email(),
            TypeSpec::network().with_cooldown(Duration::ZERO),
            import(calls.clone(), Duration::from_secs(10)),
        )
        .unwrap()
        .offline_guard(OfflineGuard::always_online())
        .build()
        .unwrap();

    orchestrator
        .request_sync(&SyncType::email(), RequestOptions::manual())
        .unwrap();
    let before = orchestrator.get_state(&SyncType::email()).unwrap();
    let mut rx = orchestrator.subscribe_channel();

    let err = orchestrator
        .request_sync(&SyncType::email(), RequestOptions::manual())
        .unwrap_err();
    assert!(matches!(err, SyncError::AlreadyRunning { .. }));
    assert!(err.is_rejection());

    assert_eq!(orchestrator.get_state(&SyncType::email()).unwrap(), before);
    assert!(rx.try_recv().is_err());
    assert!(orchestrator.pending_queue().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_scenario_c_forced_request_runs_follow_up() {
    init_tracing();
    let calls = Arc::new(AtomicUsize::new(0));
    let orchestrator = SyncOrchestrator::builder(config())
        .register(
            SyncType::email(),
            TypeSpec::network(),
            import(calls.clone(), Duration::from_millis(300)),
        )
        .unwrap()
        .offline_guard(OfflineGuard::always_online())
        .build()
        .unwrap();
    let mut rx = orchestrator.subscribe_channel();

    orchestrator
        .request_sync(&SyncType::email(), RequestOptions::manual())
        .unwrap();
    advance(100).await;

    // Inside the provider cooldown, but a manual retry bypasses it
    let outcome = orchestrator
        .request_sync(&SyncType::email(), RequestOptions::retry())
        .unwrap();
    assert_eq!(outcome, RequestOutcome::FollowUpQueued);

    let state = orchestrator.get_state(&SyncType::email()).unwrap();
    assert_eq!(state.status, Running);
    assert!(state.queued_request.as_ref().is_some_and(|r| r.force));
    assert_eq!(orchestrator.pending_queue().len(), 1);

    advance(1_000).await;

    assert_eq!(
        transitions(&mut rx, &SyncType::email()),
        vec![
            (Idle, Queued),
            (Queued, Running),
            (Running, Success),
            (Success, Idle),
            (Idle, Queued),
            (Queued, Running),
            (Running, Success),
        ]
    );
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(orchestrator.pending_queue().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_scenario_d_cooldown_rejects_second_request() {
    init_tracing();
    let calls = Arc::new(AtomicUsize::new(0));
    let orchestrator = SyncOrchestrator::builder(config())
        .register(
            SyncType::messages(),
            TypeSpec::local().with_cooldown(Duration::from_secs(5)),
            import(calls.clone(), Duration::from_millis(100)),
        )
        .unwrap()
        .build()
        .unwrap();

    orchestrator
        .request_sync(&SyncType::messages(), RequestOptions::manual())
        .unwrap();
    advance(1_000).await;

    let before = orchestrator.get_state(&SyncType::messages()).unwrap();
    let err = orchestrator
        .request_sync(&SyncType::messages(), RequestOptions::manual())
        .unwrap_err();
    match err {
        SyncError::RateLimited { retry_after_ms, .. } => {
            assert!(retry_after_ms > 3_000 && retry_after_ms <= 4_000)
        }
        other => panic!("expected RateLimited, got {:?}", other),
    }
    assert_eq!(orchestrator.get_state(&SyncType::messages()).unwrap(), before);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    advance(5_000).await;
    assert_eq!(
        orchestrator
            .request_sync(&SyncType::messages(), RequestOptions::manual())
            .unwrap(),
        RequestOutcome::Queued
    );
}

// =============================================================================
// Properties
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_duplicate_requests_merge_into_one_entry() {
    init_tracing();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut cfg = config();
    cfg.orchestrator.max_concurrent = 1;
    let orchestrator = SyncOrchestrator::builder(cfg)
        .register(SyncType::contacts(), TypeSpec::local(), import(calls.clone(), Duration::from_secs(1)))
        .unwrap()
        .register(
            SyncType::email(),
            TypeSpec::network().with_cooldown(Duration::ZERO),
            import(calls.clone(), Duration::from_secs(1)),
        )
        .unwrap()
        .offline_guard(OfflineGuard::always_online())
        .build()
        .unwrap();

    orchestrator
        .request_sync(&SyncType::contacts(), RequestOptions::manual())
        .unwrap();
    assert_eq!(
        orchestrator
            .request_sync(&SyncType::email(), RequestOptions::auto_refresh())
            .unwrap(),
        RequestOutcome::Queued
    );
    assert_eq!(orchestrator.get_state(&SyncType::email()).unwrap().status, Queued);

    assert_eq!(
        orchestrator
            .request_sync(&SyncType::email(), RequestOptions::retry())
            .unwrap(),
        RequestOutcome::Merged
    );

    let pending = orchestrator.pending_queue();
    assert_eq!(pending.len(), 1);
    assert!(pending[0].force);
    assert_eq!(pending[0].source, SyncSource::AutoRefresh);

    advance(5_000).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(orchestrator.get_state(&SyncType::email()).unwrap().status, Success);
}

#[tokio::test(start_paused = true)]
async fn test_force_from_automatic_source_is_ignored() {
    init_tracing();
    let calls = Arc::new(AtomicUsize::new(0));
    let orchestrator = SyncOrchestrator::builder(config())
        .register(SyncType::contacts(), TypeSpec::local(), import(calls.clone(), Duration::from_millis(10)))
        .unwrap()
        .build()
        .unwrap();

    orchestrator
        .request_sync(&SyncType::contacts(), RequestOptions::onboarding())
        .unwrap();
    advance(100).await;

    let forced_auto = RequestOptions {
        force: true,
        source: SyncSource::AutoRefresh,
    };
    let err = orchestrator
        .request_sync(&SyncType::contacts(), forced_auto)
        .unwrap_err();
    assert!(matches!(err, SyncError::RateLimited { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_offline_blocks_network_types_only() {
    init_tracing();
    let calls = Arc::new(AtomicUsize::new(0));
    let guard = OfflineGuard::new(false);
    let orchestrator = SyncOrchestrator::builder(config())
        .register(SyncType::email(), TypeSpec::network(), import(calls.clone(), Duration::from_millis(10)))
        .unwrap()
        .register(SyncType::messages(), TypeSpec::local(), import(calls.clone(), Duration::from_millis(10)))
        .unwrap()
        .offline_guard(guard.clone())
        .build()
        .unwrap();

    let err = orchestrator
        .request_sync(&SyncType::email(), RequestOptions::manual())
        .unwrap_err();
    assert!(matches!(err, SyncError::OfflineBlocked { .. }));
    assert_eq!(orchestrator.get_state(&SyncType::email()).unwrap().status, Idle);

    orchestrator
        .request_sync(&SyncType::messages(), RequestOptions::manual())
        .unwrap();

    // Reconnecting never starts work by itself
    guard.set_online(true);
    advance(100).await;
    assert_eq!(orchestrator.get_state(&SyncType::email()).unwrap().status, Idle);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    orchestrator
        .request_sync(&SyncType::email(), RequestOptions::manual())
        .unwrap();
    advance(100).await;
    assert_eq!(orchestrator.get_state(&SyncType::email()).unwrap().status, Success);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_running_ends_cancelled() {
    init_tracing();
    let calls = Arc::new(AtomicUsize::new(0));
    let orchestrator = SyncOrchestrator::builder(config())
        .register(SyncType::contacts(), TypeSpec::local(), import(calls.clone(), Duration::from_secs(60)))
        .unwrap()
        .build()
        .unwrap();
    let mut rx = orchestrator.subscribe_channel();

    orchestrator
        .request_sync(&SyncType::contacts(), RequestOptions::manual())
        .unwrap();
    advance(100).await;
    orchestrator.cancel_sync(&SyncType::contacts()).unwrap();
    advance(100).await;

    let state = orchestrator.get_state(&SyncType::contacts()).unwrap();
    assert_eq!(state.status, Cancelled);
    assert!(state.last_error.is_none());
    assert_eq!(
        orchestrator.indicator(&SyncType::contacts()).unwrap(),
        StatusIndicator::Pending
    );
    assert_eq!(
        transitions(&mut rx, &SyncType::contacts()),
        vec![(Idle, Queued), (Queued, Running), (Running, Cancelled)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancel_queued_before_start() {
    init_tracing();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut cfg = config();
    cfg.orchestrator.max_concurrent = 1;
    let orchestrator = SyncOrchestrator::builder(cfg)
        .register(SyncType::contacts(), TypeSpec::local(), import(calls.clone(), Duration::from_secs(1)))
        .unwrap()
        .register(SyncType::messages(), TypeSpec::local(), import(calls.clone(), Duration::from_secs(1)))
        .unwrap()
        .build()
        .unwrap();

    orchestrator
        .request_sync(&SyncType::contacts(), RequestOptions::manual())
        .unwrap();
    orchestrator
        .request_sync(&SyncType::messages(), RequestOptions::manual())
        .unwrap();
    orchestrator.cancel_sync(&SyncType::messages()).unwrap();

    let state = orchestrator.get_state(&SyncType::messages()).unwrap();
    assert_eq!(state.status, Cancelled);
    assert!(state.queued_request.is_none());
    assert!(orchestrator.pending_queue().is_empty());

    advance(3_000).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_function_records_internal_error() {
    init_tracing();
    let orchestrator = SyncOrchestrator::builder(config())
        .register(SyncType::contacts(), TypeSpec::local(), |_ctx: SyncContext| async move {
            if true {
                panic!("address book handle closed");
            }
            Ok::<_, SyncError>(SyncReport::default())
        })
        .unwrap()
        .build()
        .unwrap();

    orchestrator
        .request_sync(&SyncType::contacts(), RequestOptions::manual())
        .unwrap();
    advance(100).await;

    let state = orchestrator.get_state(&SyncType::contacts()).unwrap();
    assert_eq!(state.status, Error);
    let failure = state.last_error.unwrap();
    assert_eq!(failure.kind, FailureKind::Internal);
    assert!(failure.message.contains("address book handle closed"));
    assert_eq!(
        orchestrator.indicator(&SyncType::contacts()).unwrap(),
        StatusIndicator::Failed
    );

    // The engine keeps working after a panic
    advance(3_000).await;
    assert_eq!(
        orchestrator
            .request_sync(&SyncType::contacts(), RequestOptions::manual())
            .unwrap(),
        RequestOutcome::Queued
    );
}

#[tokio::test(start_paused = true)]
async fn test_panic_before_future_is_built_records_internal_error() {
    init_tracing();
    let orchestrator = SyncOrchestrator::builder(config())
        .register(SyncType::contacts(), TypeSpec::local().writing_store(), |_ctx: SyncContext| {
            if true {
                panic!("provider handle missing");
            }
            async { Ok::<_, SyncError>(SyncReport::default()) }
        })
        .unwrap()
        .build()
        .unwrap();

    orchestrator
        .request_sync(&SyncType::contacts(), RequestOptions::manual())
        .unwrap();
    advance(100).await;

    let state = orchestrator.get_state(&SyncType::contacts()).unwrap();
    assert_eq!(state.status, Error);
    let failure = state.last_error.unwrap();
    assert_eq!(failure.kind, FailureKind::Internal);
    assert!(failure.message.contains("provider handle missing"));
    assert_eq!(orchestrator.running_count(), 0);

    // The store-writer slot was released, so the type can run again
    advance(3_000).await;
    assert_eq!(
        orchestrator
            .request_sync(&SyncType::contacts(), RequestOptions::manual())
            .unwrap(),
        RequestOutcome::Queued
    );
}

#[tokio::test(start_paused = true)]
async fn test_provider_error_is_recorded() {
    init_tracing();
    let orchestrator = SyncOrchestrator::builder(config())
        .register(SyncType::email(), TypeSpec::network(), |_ctx: SyncContext| async move {
            Err::<SyncReport, _>(SyncError::provider("401", "token expired"))
        })
        .unwrap()
        .offline_guard(OfflineGuard::always_online())
        .build()
        .unwrap();

    orchestrator
        .request_sync(&SyncType::email(), RequestOptions::manual())
        .unwrap();
    advance(100).await;

    let failure = orchestrator.get_state(&SyncType::email()).unwrap().last_error.unwrap();
    assert_eq!(failure.kind, FailureKind::Provider);
    assert_eq!(failure.code.as_deref(), Some("401"));
}

#[tokio::test(start_paused = true)]
async fn test_store_writer_cap_serializes_writers() {
    init_tracing();
    let calls = Arc::new(AtomicUsize::new(0));
    let orchestrator = SyncOrchestrator::builder(config())
        .register(
            SyncType::contacts(),
            TypeSpec::local().writing_store(),
            import(calls.clone(), Duration::from_secs(1)),
        )
        .unwrap()
        .register(
            SyncType::messages(),
            TypeSpec::local().writing_store(),
            import(calls.clone(), Duration::from_secs(1)),
        )
        .unwrap()
        .register(SyncType::email(), TypeSpec::network(), import(calls.clone(), Duration::from_secs(1)))
        .unwrap()
        .offline_guard(OfflineGuard::always_online())
        .build()
        .unwrap();

    for sync_type in [SyncType::contacts(), SyncType::messages(), SyncType::email()] {
        orchestrator
            .request_sync(&sync_type, RequestOptions::manual())
            .unwrap();
    }

    assert_eq!(orchestrator.get_state(&SyncType::contacts()).unwrap().status, Running);
    assert_eq!(orchestrator.get_state(&SyncType::messages()).unwrap().status, Queued);
    assert_eq!(orchestrator.get_state(&SyncType::email()).unwrap().status, Running);
    assert_eq!(orchestrator.running_count(), 2);

    advance(1_500).await;
    assert_eq!(orchestrator.get_state(&SyncType::contacts()).unwrap().status, Success);
    assert_eq!(orchestrator.get_state(&SyncType::messages()).unwrap().status, Running);

    advance(1_000).await;
    assert_eq!(orchestrator.get_state(&SyncType::messages()).unwrap().status, Success);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_progress_and_indicator_while_running() {
    init_tracing();
    let orchestrator = SyncOrchestrator::builder(config())
        .register(SyncType::messages(), TypeSpec::local(), |ctx: SyncContext| async move {
            ctx.report_progress(SyncProgress::from_counts(50, 100));
            tokio::time::sleep(Duration::from_secs(1)).await;
            ctx.check_cancelled()?;
            Ok::<_, SyncError>(SyncReport::completed(100, 7))
        })
        .unwrap()
        .build()
        .unwrap();

    orchestrator
        .request_sync(&SyncType::messages(), RequestOptions::manual())
        .unwrap();
    advance(100).await;

    let state = orchestrator.get_state(&SyncType::messages()).unwrap();
    assert_eq!(state.progress, Some(SyncProgress::Percent(50)));
    assert_eq!(
        orchestrator.indicator(&SyncType::messages()).unwrap(),
        StatusIndicator::Active
    );

    advance(1_000).await;
    let state = orchestrator.get_state(&SyncType::messages()).unwrap();
    assert_eq!(state.progress, None);
    assert_eq!(
        orchestrator.indicator(&SyncType::messages()).unwrap(),
        StatusIndicator::Complete
    );
}

#[tokio::test(start_paused = true)]
async fn test_unregistered_type_is_rejected() {
    init_tracing();
    let orchestrator = SyncOrchestrator::builder(config()).build().unwrap();
    let calendar = SyncType::new("calendar").unwrap();
    assert!(!orchestrator.is_registered(&calendar));

    let err = orchestrator
        .request_sync(&calendar, RequestOptions::manual())
        .unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)));
    assert!(orchestrator.get_state(&calendar).is_err());
}

#[test]
fn test_double_registration_fails_at_startup() {
    let calls = Arc::new(AtomicUsize::new(0));
    let result = SyncOrchestrator::builder(config())
        .register(SyncType::contacts(), TypeSpec::local(), import(calls.clone(), Duration::ZERO))
        .unwrap()
        .register(SyncType::contacts(), TypeSpec::local(), import(calls, Duration::ZERO));
    assert!(matches!(result, Err(SyncError::Validation(_))));
}

// =============================================================================
// Observation
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_one_completion_signal_per_batch() {
    init_tracing();
    let calls = Arc::new(AtomicUsize::new(0));
    let orchestrator = SyncOrchestrator::builder(config())
        .register(SyncType::contacts(), TypeSpec::local(), import(calls.clone(), Duration::from_millis(200)))
        .unwrap()
        .register(SyncType::messages(), TypeSpec::local(), import(calls.clone(), Duration::from_millis(800)))
        .unwrap()
        .build()
        .unwrap();

    let seen = Arc::new(Mutex::new(Vec::<BatchCompletion>::new()));
    let sink = seen.clone();
    let _notifications = NotificationDeriver::attach(
        &orchestrator,
        Arc::new(move |c: &BatchCompletion| sink.lock().unwrap().push(c.clone())),
    );

    orchestrator
        .request_sync(&SyncType::contacts(), RequestOptions::manual())
        .unwrap();
    advance(100).await;
    orchestrator
        .request_sync(&SyncType::messages(), RequestOptions::manual())
        .unwrap();

    advance(5_000).await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].members.len(), 2);
    assert!(seen[0].all_succeeded());
}

#[tokio::test(start_paused = true)]
async fn test_subscription_stops_on_drop() {
    init_tracing();
    let calls = Arc::new(AtomicUsize::new(0));
    let orchestrator = SyncOrchestrator::builder(config())
        .register(SyncType::contacts(), TypeSpec::local(), import(calls.clone(), Duration::from_millis(10)))
        .unwrap()
        .register(SyncType::messages(), TypeSpec::local(), import(calls.clone(), Duration::from_millis(10)))
        .unwrap()
        .build()
        .unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let subscription = orchestrator.subscribe(move |event: &SyncEvent| {
        if let SyncEvent::Transition { to, .. } = event {
            sink.lock().unwrap().push(*to);
        }
    });

    orchestrator
        .request_sync(&SyncType::contacts(), RequestOptions::manual())
        .unwrap();
    advance(100).await;
    assert_eq!(*seen.lock().unwrap(), vec![Queued, Running, Success]);

    drop(subscription);
    orchestrator
        .request_sync(&SyncType::messages(), RequestOptions::manual())
        .unwrap();
    advance(100).await;
    assert_eq!(seen.lock().unwrap().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_drain_cancels_everything() {
    init_tracing();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut cfg = config();
    cfg.orchestrator.max_concurrent = 1;
    let orchestrator = SyncOrchestrator::builder(cfg)
        .register(SyncType::contacts(), TypeSpec::local(), import(calls.clone(), Duration::from_secs(60)))
        .unwrap()
        .register(SyncType::messages(), TypeSpec::local(), import(calls.clone(), Duration::from_secs(60)))
        .unwrap()
        .build()
        .unwrap();
    let mut rx = orchestrator.subscribe_channel();

    orchestrator
        .request_sync(&SyncType::contacts(), RequestOptions::manual())
        .unwrap();
    orchestrator
        .request_sync(&SyncType::messages(), RequestOptions::manual())
        .unwrap();
    advance(100).await;

    orchestrator.drain_and_cancel_all().await;

    assert_eq!(orchestrator.get_state(&SyncType::contacts()).unwrap().status, Cancelled);
    assert_eq!(orchestrator.get_state(&SyncType::messages()).unwrap().status, Cancelled);
    assert_eq!(orchestrator.running_count(), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let err = orchestrator
        .request_sync(&SyncType::contacts(), RequestOptions::retry())
        .unwrap_err();
    assert!(matches!(err, SyncError::ShuttingDown));

    let mut saw_shutdown = false;
    while let Some(event) = rx.recv().await {
        saw_shutdown |= event == SyncEvent::ShutdownStarted;
    }
    assert!(saw_shutdown);
}

// =============================================================================
// Connectivity Heartbeat
// =============================================================================

fn heartbeat_config() -> SyncConfig {
    let mut config = SyncConfig::default();
    config.offline.enabled = true;
    config.offline.probe_url = "http://127.0.0.1:9".to_string();
    config
}

#[tokio::test]
async fn test_owned_heartbeat_stops_when_orchestrator_dropped() {
    init_tracing();
    let orchestrator = SyncOrchestrator::builder(heartbeat_config()).build().unwrap();
    let guard = orchestrator.offline_guard().clone();
    assert!(!guard.is_stopped());

    drop(orchestrator);
    assert!(guard.is_stopped());
}

#[tokio::test]
async fn test_supplied_guard_outlives_orchestrator() {
    init_tracing();
    let guard = OfflineGuard::new(true);
    let orchestrator = SyncOrchestrator::builder(heartbeat_config())
        .offline_guard(guard.clone())
        .build()
        .unwrap();

    drop(orchestrator);
    assert!(!guard.is_stopped());
}
