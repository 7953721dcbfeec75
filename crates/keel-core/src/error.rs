//! # Error Types
//!
//! Validation errors raised by keel-core rules.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  keel-core errors (this file)                                          │
//! │  └── ValidationError  - Bad sync type names, registration mistakes,    │
//! │                         illegal status transitions                      │
//! │                                                                         │
//! │  keel-sync errors (separate crate)                                     │
//! │  └── SyncError        - Rejections, run failures, config problems      │
//! │                                                                         │
//! │  Flow: ValidationError → SyncError::Validation → caller / frontend     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::types::SyncStatus;

/// Validation failures.
///
/// These never reach the sync queue: the orchestrator returns them straight
/// to the caller without touching any `SyncState`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Sync type name does not follow the naming rules.
    #[error("Invalid sync type '{name}': {reason}")]
    InvalidSyncType { name: String, reason: String },

    /// A second function was registered for the same sync type.
    ///
    /// ## When This Occurs
    /// - Two provider modules both try to own `contacts`
    /// - Start-up code registers the same provider twice
    #[error("Sync type '{sync_type}' is already registered")]
    AlreadyRegistered { sync_type: String },

    /// A request or lookup named a sync type nobody registered.
    #[error("Unregistered sync type '{sync_type}'")]
    Unregistered { sync_type: String },

    /// A status change that breaks the per-run lifecycle.
    #[error("Illegal status transition {from} -> {to}")]
    IllegalTransition { from: SyncStatus, to: SyncStatus },
}
