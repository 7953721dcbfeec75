//! # Validation Module
//!
//! Rule checks shared by the registry and the orchestrator.
//!
//! ## Usage
//! ```rust
//! use keel_core::types::SyncStatus;
//! use keel_core::validation::{validate_sync_type_name, validate_transition};
//!
//! validate_sync_type_name("contacts").unwrap();
//! validate_transition(SyncStatus::Queued, SyncStatus::Running).unwrap();
//! assert!(validate_transition(SyncStatus::Idle, SyncStatus::Running).is_err());
//! ```

use crate::error::ValidationError;
use crate::types::SyncStatus;
use crate::MAX_SYNC_TYPE_LEN;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates a sync type name.
///
/// ## Rules
/// - Must not be empty
/// - At most 64 characters
/// - Starts with a lowercase ASCII letter
/// - Only lowercase ASCII letters, digits, `-` and `_`
pub fn validate_sync_type_name(name: &str) -> ValidationResult<()> {
    let invalid = |reason: &str| ValidationError::InvalidSyncType {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let Some(first) = name.chars().next() else {
        return Err(invalid("must not be empty"));
    };

    if name.len() > MAX_SYNC_TYPE_LEN {
        return Err(invalid("must be at most 64 characters"));
    }

    if !first.is_ascii_lowercase() {
        return Err(invalid("must start with a lowercase letter"));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err(invalid("only lowercase letters, digits, '-' and '_' are allowed"));
    }

    Ok(())
}

/// Validates a status change against the per-run lifecycle.
///
/// ```text
/// idle → queued → running → {success | error | cancelled} → idle
///           └──────────────→ cancelled   (cancelled before start)
/// ```
pub fn validate_transition(from: SyncStatus, to: SyncStatus) -> ValidationResult<()> {
    use SyncStatus::*;

    let allowed = matches!(
        (from, to),
        (Idle, Queued)
            | (Queued, Running)
            | (Queued, Cancelled)
            | (Running, Success)
            | (Running, Error)
            | (Running, Cancelled)
            | (Success, Idle)
            | (Error, Idle)
            | (Cancelled, Idle)
    );

    if allowed {
        Ok(())
    } else {
        Err(ValidationError::IllegalTransition { from, to })
    }
}
