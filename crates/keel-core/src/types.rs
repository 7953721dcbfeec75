//! # Sync Types
//!
//! Domain types for sync orchestration. Everything here is plain data plus
//! pure rules; the orchestrator in `keel-sync` owns the mutable copies and
//! hands out clones.
//!
//! ## Per-Run Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SyncStatus Lifecycle                             │
//! │                                                                         │
//! │   ┌──────┐  request  ┌────────┐  dispatch  ┌─────────┐                 │
//! │   │ idle │ ────────► │ queued │ ─────────► │ running │                 │
//! │   └──────┘           └───┬────┘            └────┬────┘                 │
//! │      ▲                   │ cancel               │                       │
//! │      │                   ▼                      ▼                       │
//! │      │        ┌──────────────────────────────────────────┐             │
//! │      └─────── │   success  │   error   │   cancelled     │             │
//! │   next request└──────────────────────────────────────────┘             │
//! │                                                                         │
//! │  UI INDICATORS ("pills"):                                              │
//! │  idle | queued | cancelled → pending                                   │
//! │  running                   → active                                    │
//! │  success                   → complete (time-limited)                   │
//! │  error                     → failed                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::validation::{validate_sync_type_name, validate_transition};

// =============================================================================
// Sync Type
// =============================================================================

/// A named category of synchronization work (`contacts`, `email`, ...).
///
/// The set is open-ended, but fixed once the registry is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[serde(try_from = "String", into = "String")]
#[ts(export)]
pub struct SyncType(String);

impl SyncType {
    /// Creates a sync type after validating the name.
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        validate_sync_type_name(&name)?;
        Ok(SyncType(name))
    }

    /// Address book import.
    pub fn contacts() -> Self {
        SyncType("contacts".to_string())
    }

    /// Mailbox sync.
    pub fn email() -> Self {
        SyncType("email".to_string())
    }

    /// Device message import.
    pub fn messages() -> Self {
        SyncType("messages".to_string())
    }

    /// Returns the type name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SyncType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for SyncType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SyncType::new(s)
    }
}

impl TryFrom<String> for SyncType {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        SyncType::new(value)
    }
}

impl From<SyncType> for String {
    fn from(value: SyncType) -> Self {
        value.0
    }
}

// =============================================================================
// Request Source & Options
// =============================================================================

/// Who asked for a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SyncSource {
    /// The user pressed a button (sync now, retry).
    #[default]
    Manual,
    /// Periodic background refresh.
    AutoRefresh,
    /// Onboarding flow importing data for the first time.
    Onboarding,
}

impl SyncSource {
    /// Only explicit user actions may bypass the cooldown gate.
    pub fn may_force(&self) -> bool {
        matches!(self, SyncSource::Manual)
    }
}

impl std::fmt::Display for SyncSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncSource::Manual => write!(f, "manual"),
            SyncSource::AutoRefresh => write!(f, "auto_refresh"),
            SyncSource::Onboarding => write!(f, "onboarding"),
        }
    }
}

/// Options passed with a sync request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestOptions {
    /// Bypass the cooldown gate and queue after a running run.
    pub force: bool,
    /// Origin of the request.
    pub source: SyncSource,
}

impl RequestOptions {
    /// A plain user-initiated request.
    pub fn manual() -> Self {
        RequestOptions {
            force: false,
            source: SyncSource::Manual,
        }
    }

    /// An explicit user retry that bypasses the cooldown.
    pub fn retry() -> Self {
        RequestOptions {
            force: true,
            source: SyncSource::Manual,
        }
    }

    /// A periodic refresh trigger.
    pub fn auto_refresh() -> Self {
        RequestOptions {
            force: false,
            source: SyncSource::AutoRefresh,
        }
    }

    /// An onboarding import step.
    pub fn onboarding() -> Self {
        RequestOptions {
            force: false,
            source: SyncSource::Onboarding,
        }
    }

    /// The force flag after applying the source rule.
    pub fn effective_force(&self) -> bool {
        self.force && self.source.may_force()
    }
}

// =============================================================================
// Sync Request
// =============================================================================

/// An intent to run a sync type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SyncRequest {
    pub sync_type: SyncType,
    pub force: bool,
    pub source: SyncSource,
    #[ts(as = "String")]
    pub requested_at: DateTime<Utc>,
}

impl SyncRequest {
    /// Creates a request stamped with the given time.
    pub fn new(sync_type: SyncType, force: bool, source: SyncSource, requested_at: DateTime<Utc>) -> Self {
        SyncRequest {
            sync_type,
            force,
            source,
            requested_at,
        }
    }

    /// Folds a duplicate request into this one.
    ///
    /// Keeps the earliest `requested_at` so the entry does not lose its place,
    /// and escalates `force` if either side set it. Returns true if `force`
    /// was escalated.
    pub fn merge(&mut self, other: &SyncRequest) -> bool {
        if other.requested_at < self.requested_at {
            self.requested_at = other.requested_at;
        }
        let escalated = other.force && !self.force;
        self.force |= other.force;
        escalated
    }
}

// =============================================================================
// Sync Status
// =============================================================================

/// Status of one sync type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    #[default]
    Idle,
    Queued,
    Running,
    Success,
    Error,
    Cancelled,
}

impl SyncStatus {
    /// True for the three end states of a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncStatus::Success | SyncStatus::Error | SyncStatus::Cancelled)
    }

    /// Maps the status to the UI indicator, ignoring display windows.
    pub fn indicator(&self) -> StatusIndicator {
        match self {
            SyncStatus::Idle | SyncStatus::Queued | SyncStatus::Cancelled => StatusIndicator::Pending,
            SyncStatus::Running => StatusIndicator::Active,
            SyncStatus::Success => StatusIndicator::Complete,
            SyncStatus::Error => StatusIndicator::Failed,
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStatus::Idle => write!(f, "idle"),
            SyncStatus::Queued => write!(f, "queued"),
            SyncStatus::Running => write!(f, "running"),
            SyncStatus::Success => write!(f, "success"),
            SyncStatus::Error => write!(f, "error"),
            SyncStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// What the UI shows for a sync type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StatusIndicator {
    Pending,
    Active,
    Complete,
    Failed,
}

// =============================================================================
// Progress
// =============================================================================

/// Progress reported by a running sync function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SyncProgress {
    /// Work of unknown size is underway.
    Indeterminate,
    /// Percentage complete, 0 to 100.
    Percent(u8),
}

impl SyncProgress {
    /// Creates a percentage, clamped to 100.
    pub fn percent(value: u8) -> Self {
        SyncProgress::Percent(value.min(100))
    }

    /// Creates a percentage from a done/total pair.
    pub fn from_counts(done: u64, total: u64) -> Self {
        if total == 0 {
            return SyncProgress::Indeterminate;
        }
        let pct = (done.min(total) * 100) / total;
        SyncProgress::Percent(pct as u8)
    }
}

// =============================================================================
// Run Results
// =============================================================================

/// A per-item problem reported by a provider without failing the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProviderIssue {
    pub code: String,
    pub message: String,
}

/// What a sync function returns when it finishes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SyncReport {
    /// Items looked at during the run.
    pub items_processed: u64,
    /// Items that did not exist locally before.
    pub items_new: u64,
    /// Non-fatal item failures.
    pub errors: Vec<ProviderIssue>,
    /// The function stopped early because it observed cancellation.
    pub cancelled: bool,
}

impl SyncReport {
    /// A finished run.
    pub fn completed(items_processed: u64, items_new: u64) -> Self {
        SyncReport {
            items_processed,
            items_new,
            ..Default::default()
        }
    }

    /// A run that stopped at a cancellation check.
    pub fn cancelled(items_processed: u64) -> Self {
        SyncReport {
            items_processed,
            cancelled: true,
            ..Default::default()
        }
    }

    /// Adds a non-fatal item failure.
    pub fn with_issue(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.errors.push(ProviderIssue {
            code: code.into(),
            message: message.into(),
        });
        self
    }
}

/// Category of a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The provider reported an error.
    Provider,
    /// A bounded helper call ran out of time.
    Timeout,
    /// Anything else, including panics inside the function.
    Internal,
}

/// The error recorded in `SyncState::last_error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SyncFailure {
    pub kind: FailureKind,
    pub code: Option<String>,
    pub message: String,
    #[ts(as = "String")]
    pub at: DateTime<Utc>,
}

// =============================================================================
// Sync State
// =============================================================================

/// Per-type state record.
///
/// The orchestrator is the only writer. Subscribers and `get_state` callers
/// always receive clones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SyncState {
    pub sync_type: SyncType,
    pub status: SyncStatus,
    pub progress: Option<SyncProgress>,
    /// Completion time of the last successful run.
    #[ts(as = "Option<String>")]
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_error: Option<SyncFailure>,
    pub last_report: Option<SyncReport>,
    /// Pending request waiting behind this type (queued or follow-up).
    pub queued_request: Option<SyncRequest>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl SyncState {
    /// Fresh idle state.
    pub fn new(sync_type: SyncType, now: DateTime<Utc>) -> Self {
        SyncState {
            sync_type,
            status: SyncStatus::Idle,
            progress: None,
            last_run_at: None,
            last_error: None,
            last_report: None,
            queued_request: None,
            updated_at: now,
        }
    }

    /// Moves to `to`, rejecting changes that break the lifecycle.
    ///
    /// Returns the previous status.
    pub fn transition(&mut self, to: SyncStatus, at: DateTime<Utc>) -> Result<SyncStatus, ValidationError> {
        validate_transition(self.status, to)?;
        let from = self.status;
        self.status = to;
        self.updated_at = at;
        Ok(from)
    }

    /// UI indicator at `now`; `complete` only lasts for `display_window`.
    pub fn indicator(&self, now: DateTime<Utc>, display_window: Duration) -> StatusIndicator {
        match self.status {
            SyncStatus::Success => match self.last_run_at {
                Some(finished) if now - finished < display_window => StatusIndicator::Complete,
                _ => StatusIndicator::Pending,
            },
            other => other.indicator(),
        }
    }
}

// =============================================================================
// Request Outcome
// =============================================================================

/// How an accepted request was handled.
///
/// Rejections (rate limit, conflict, offline, validation) are errors in
/// `keel-sync`, not outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
#[must_use]
pub enum RequestOutcome {
    /// A new queue entry was created.
    Queued,
    /// Folded into an entry that was already queued.
    Merged,
    /// Queued to run right after the current run finishes.
    FollowUpQueued,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_sync_type_validation() {
        assert!(SyncType::new("contacts").is_ok());
        assert!(SyncType::new("Contacts").is_err());
        assert!("".parse::<SyncType>().is_err());
        assert_eq!(SyncType::email().as_str(), "email");
    }

    #[test]
    fn test_sync_type_serde_validates() {
        let t: SyncType = serde_json::from_str("\"messages\"").unwrap();
        assert_eq!(t, SyncType::messages());
        assert!(serde_json::from_str::<SyncType>("\"bad name\"").is_err());
    }

    #[test]
    fn test_force_only_for_manual() {
        assert!(RequestOptions::retry().effective_force());
        let auto = RequestOptions {
            force: true,
            source: SyncSource::AutoRefresh,
        };
        assert!(!auto.effective_force());
        let onboarding = RequestOptions {
            force: true,
            source: SyncSource::Onboarding,
        };
        assert!(!onboarding.effective_force());
    }

    #[test]
    fn test_request_merge_keeps_earliest_and_escalates() {
        let mut first = SyncRequest::new(SyncType::contacts(), false, SyncSource::AutoRefresh, at(10));
        let second = SyncRequest::new(SyncType::contacts(), true, SyncSource::Manual, at(20));

        assert!(first.merge(&second));
        assert!(first.force);
        assert_eq!(first.requested_at, at(10));
        assert_eq!(first.source, SyncSource::AutoRefresh);

        let earlier = SyncRequest::new(SyncType::contacts(), false, SyncSource::Manual, at(5));
        assert!(!first.merge(&earlier));
        assert!(first.force);
        assert_eq!(first.requested_at, at(5));
    }

    #[test]
    fn test_state_transitions() {
        let mut state = SyncState::new(SyncType::contacts(), at(0));
        assert_eq!(state.transition(SyncStatus::Queued, at(1)).unwrap(), SyncStatus::Idle);
        assert_eq!(state.transition(SyncStatus::Running, at(2)).unwrap(), SyncStatus::Queued);
        assert!(state.transition(SyncStatus::Queued, at(3)).is_err());
        assert_eq!(state.transition(SyncStatus::Success, at(3)).unwrap(), SyncStatus::Running);
        assert_eq!(state.status, SyncStatus::Success);
        assert_eq!(state.updated_at, at(3));
    }

    #[test]
    fn test_indicator_mapping() {
        let mut state = SyncState::new(SyncType::email(), at(0));
        let window = Duration::seconds(5);
        assert_eq!(state.indicator(at(0), window), StatusIndicator::Pending);

        state.status = SyncStatus::Running;
        assert_eq!(state.indicator(at(0), window), StatusIndicator::Active);

        state.status = SyncStatus::Success;
        state.last_run_at = Some(at(10));
        assert_eq!(state.indicator(at(12), window), StatusIndicator::Complete);
        assert_eq!(state.indicator(at(16), window), StatusIndicator::Pending);

        state.status = SyncStatus::Error;
        assert_eq!(state.indicator(at(16), window), StatusIndicator::Failed);

        state.status = SyncStatus::Cancelled;
        assert_eq!(state.indicator(at(16), window), StatusIndicator::Pending);
    }

    #[test]
    fn test_progress_from_counts() {
        assert_eq!(SyncProgress::from_counts(0, 0), SyncProgress::Indeterminate);
        assert_eq!(SyncProgress::from_counts(25, 100), SyncProgress::Percent(25));
        assert_eq!(SyncProgress::from_counts(300, 100), SyncProgress::Percent(100));
        assert_eq!(SyncProgress::percent(250), SyncProgress::Percent(100));
    }

    #[test]
    fn test_state_serializes_for_frontend() {
        let state = SyncState::new(SyncType::messages(), at(0));
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["sync_type"], "messages");
        assert_eq!(json["status"], "idle");
    }
}
