//! # Notification Deriver
//!
//! Turns the orchestrator's event stream into one completion signal per
//! batch of requests.
//!
//! ## Batching
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Coalescing Completion Batches                       │
//! │                                                                         │
//! │  t=0    contacts idle→queued   ──┐                                     │
//! │  t=200  messages idle→queued   ──┼── batch #1 (window 1500 ms)         │
//! │  t=1500 window closes          ──┘   sealed, waits for members         │
//! │  t=1700 contacts → success                                             │
//! │  t=2100 messages → error       ──►  ONE BatchCompletion                 │
//! │                                     { contacts: success,               │
//! │                                       messages: error }                │
//! │                                                                         │
//! │  t=3000 email idle→queued      ──── batch #2 (a batch of one)          │
//! │                                                                         │
//! │  ShutdownStarted / channel closed → open batches dropped silently      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use keel_core::{SyncStatus, SyncType};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::events::SyncEvent;
use crate::orchestrator::SyncOrchestrator;

// =============================================================================
// Batch Completion
// =============================================================================

/// Emitted once per batch, after every member reached a terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchCompletion {
    pub batch_id: Uuid,
    /// Terminal status of each member.
    pub members: BTreeMap<SyncType, SyncStatus>,
    pub opened_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl BatchCompletion {
    pub fn all_succeeded(&self) -> bool {
        self.members.values().all(|s| *s == SyncStatus::Success)
    }

    /// Members that ended in `error`.
    pub fn failed(&self) -> Vec<&SyncType> {
        self.members
            .iter()
            .filter(|(_, s)| **s == SyncStatus::Error)
            .map(|(t, _)| t)
            .collect()
    }
}

/// Receives batch completions (toast, tray notification, ...).
pub trait NotificationSink: Send + Sync + 'static {
    fn notify(&self, completion: &BatchCompletion);
}

impl<F> NotificationSink for F
where
    F: Fn(&BatchCompletion) + Send + Sync + 'static,
{
    fn notify(&self, completion: &BatchCompletion) {
        self(completion)
    }
}

// =============================================================================
// Batch Bookkeeping
// =============================================================================

#[derive(Debug)]
struct Batch {
    id: Uuid,
    opened_at: DateTime<Utc>,
    closes_at: Instant,
    /// `None` until the member reaches a terminal state.
    members: BTreeMap<SyncType, Option<SyncStatus>>,
}

impl Batch {
    fn open(window: Duration) -> Self {
        Batch {
            id: Uuid::new_v4(),
            opened_at: Utc::now(),
            closes_at: Instant::now() + window,
            members: BTreeMap::new(),
        }
    }

    fn is_complete(&self) -> bool {
        self.members.values().all(Option::is_some)
    }

    fn awaits(&self, sync_type: &SyncType) -> bool {
        matches!(self.members.get(sync_type), Some(None))
    }

    fn into_completion(self) -> BatchCompletion {
        BatchCompletion {
            batch_id: self.id,
            members: self
                .members
                .into_iter()
                .filter_map(|(t, s)| s.map(|s| (t, s)))
                .collect(),
            opened_at: self.opened_at,
            completed_at: Utc::now(),
        }
    }
}

// =============================================================================
// Deriver
// =============================================================================

/// Handle to a running deriver task.
pub struct NotificationHandle {
    stop: CancellationToken,
    task: JoinHandle<()>,
}

impl NotificationHandle {
    /// Stops the task, dropping open batches.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Waits for the task to end.
    pub async fn stopped(self) {
        if let Err(e) = self.task.await {
            warn!(?e, "Notification deriver ended abnormally");
        }
    }
}

/// Batches requests and signals completion once per batch.
pub struct NotificationDeriver {
    window: Duration,
    sink: Arc<dyn NotificationSink>,
    collecting: Option<Batch>,
    sealed: Vec<Batch>,
}

impl NotificationDeriver {
    /// Subscribes to `orchestrator` with its configured window.
    pub fn attach(orchestrator: &SyncOrchestrator, sink: Arc<dyn NotificationSink>) -> NotificationHandle {
        let window = orchestrator.notification_settings().coalesce_window();
        Self::spawn(window, orchestrator.subscribe_channel(), sink)
    }

    /// Starts the deriver on an event channel.
    pub fn spawn(
        window: Duration,
        events: mpsc::UnboundedReceiver<SyncEvent>,
        sink: Arc<dyn NotificationSink>,
    ) -> NotificationHandle {
        let stop = CancellationToken::new();
        let deriver = NotificationDeriver {
            window,
            sink,
            collecting: None,
            sealed: Vec::new(),
        };
        let task = tokio::spawn(deriver.run(events, stop.clone()));
        NotificationHandle { stop, task }
    }

    async fn run(mut self, mut events: mpsc::UnboundedReceiver<SyncEvent>, stop: CancellationToken) {
        debug!(window_ms = self.window.as_millis() as u64, "Notification deriver started");

        loop {
            // Only a collecting batch has a deadline to wait on
            let deadline = self.collecting.as_ref().map(|b| b.closes_at);

            tokio::select! {
                _ = stop.cancelled() => break,
                event = events.recv() => match event {
                    Some(SyncEvent::ShutdownStarted) | None => break,
                    Some(event) => self.handle(event),
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.seal();
                }
            }
        }

        let open = self.sealed.len() + usize::from(self.collecting.is_some());
        if open > 0 {
            debug!(open, "Abandoning open notification batches");
        }
    }

    fn handle(&mut self, event: SyncEvent) {
        let SyncEvent::Transition { from, to, state, .. } = event else {
            return;
        };

        if from == SyncStatus::Idle && to == SyncStatus::Queued {
            self.join(state.sync_type);
        } else if to.is_terminal() {
            self.record_terminal(state.sync_type, to);
        }
    }

    fn join(&mut self, sync_type: SyncType) {
        // Window expired but the timer has not fired yet
        let now = Instant::now();
        if self.collecting.as_ref().is_some_and(|b| now >= b.closes_at) {
            self.seal();
        }

        let window = self.window;
        let batch = self.collecting.get_or_insert_with(|| Batch::open(window));
        debug!(batch_id = %batch.id, sync_type = %sync_type, "Request joined notification batch");
        batch.members.insert(sync_type, None);
    }

    fn record_terminal(&mut self, sync_type: SyncType, status: SyncStatus) {
        // Oldest sealed batch first, then the one still collecting
        let batch = self
            .sealed
            .iter_mut()
            .chain(self.collecting.iter_mut())
            .find(|b| b.awaits(&sync_type));

        if let Some(batch) = batch {
            batch.members.insert(sync_type, Some(status));
        }
        self.emit_complete();
    }

    /// Closes the collecting window.
    fn seal(&mut self) {
        if let Some(batch) = self.collecting.take() {
            debug!(batch_id = %batch.id, members = batch.members.len(), "Notification batch sealed");
            self.sealed.push(batch);
        }
        self.emit_complete();
    }

    fn emit_complete(&mut self) {
        // Collecting batches never emit, new members may still join
        let (done, pending): (Vec<Batch>, Vec<Batch>) =
            std::mem::take(&mut self.sealed).into_iter().partition(Batch::is_complete);
        self.sealed = pending;

        for batch in done {
            let completion = batch.into_completion();
            info!(
                batch_id = %completion.batch_id,
                members = completion.members.len(),
                all_succeeded = completion.all_succeeded(),
                "Sync batch complete"
            );
            self.sink.notify(&completion);
        }
    }
}
