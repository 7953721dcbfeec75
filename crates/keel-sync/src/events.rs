//! Events published by the orchestrator, in mutation order.

use keel_core::{SyncState, SyncStatus, SyncType};
use uuid::Uuid;

/// A change observed by subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A status transition, with the state right after it.
    Transition {
        from: SyncStatus,
        to: SyncStatus,
        state: SyncState,
        /// Set for transitions that belong to a run (`running` and its
        /// terminal state).
        run_id: Option<Uuid>,
    },
    /// A non-status change: progress, follow-up queued or dropped.
    Updated { state: SyncState },
    /// `drain_and_cancel_all` has begun. No further requests are accepted.
    ShutdownStarted,
}

impl SyncEvent {
    pub fn sync_type(&self) -> Option<&SyncType> {
        self.state().map(|s| &s.sync_type)
    }

    pub fn state(&self) -> Option<&SyncState> {
        match self {
            SyncEvent::Transition { state, .. } | SyncEvent::Updated { state } => Some(state),
            SyncEvent::ShutdownStarted => None,
        }
    }

    /// True for a transition into `success`, `error` or `cancelled`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncEvent::Transition { to, .. } if to.is_terminal())
    }
}

/// Receives orchestrator events.
///
/// Called from a dedicated forwarding task, one event at a time.
pub trait SyncEventListener: Send + Sync + 'static {
    fn on_event(&self, event: &SyncEvent);
}

impl<F> SyncEventListener for F
where
    F: Fn(&SyncEvent) + Send + Sync + 'static,
{
    fn on_event(&self, event: &SyncEvent) {
        self(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_event_accessors() {
        let state = SyncState::new(SyncType::email(), Utc::now());
        let event = SyncEvent::Transition {
            from: SyncStatus::Running,
            to: SyncStatus::Error,
            state,
            run_id: Some(Uuid::new_v4()),
        };
        assert_eq!(event.sync_type(), Some(&SyncType::email()));
        assert!(event.is_terminal());

        assert!(SyncEvent::ShutdownStarted.state().is_none());
        assert!(!SyncEvent::ShutdownStarted.is_terminal());
    }
}
