//! # Sync Error Types
//!
//! Error types for the orchestration engine.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   Rejections    │  │  Run Outcomes   │  │     Configuration       │ │
//! │  │ (request_sync)  │  │ (in SyncState)  │  │                         │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Validation     │  │  Cancelled      │  │  InvalidConfig          │ │
//! │  │  RateLimited    │  │  Provider       │  │  ConfigLoadFailed       │ │
//! │  │  AlreadyRunning │  │  Timeout        │  │  ConfigSaveFailed       │ │
//! │  │  OfflineBlocked │  │  Internal       │  │  InvalidUrl             │ │
//! │  │  ShuttingDown   │  │                 │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Rejections never enter the queue and never touch SyncState.           │
//! │  Run outcomes are caught at the invocation boundary and recorded as    │
//! │  the `error` (or `cancelled`) terminal state. Nothing is retried.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use keel_core::{FailureKind, SyncType, ValidationError};
use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering every failure the engine reports.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Rejections
    // =========================================================================
    /// Unregistered type, double registration, bad type name.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The type is still cooling down from its last trigger.
    #[error("Sync '{sync_type}' is rate limited, retry in {retry_after_ms} ms")]
    RateLimited { sync_type: SyncType, retry_after_ms: u64 },

    /// The type is running and the request was not forced.
    #[error("Sync '{sync_type}' is already running")]
    AlreadyRunning { sync_type: SyncType },

    /// Network-bound type requested while disconnected.
    #[error("Sync '{sync_type}' needs a network connection")]
    OfflineBlocked { sync_type: SyncType },

    /// The orchestrator is draining for shutdown.
    #[error("Sync orchestrator is shutting down")]
    ShuttingDown,

    // =========================================================================
    // Run Outcomes
    // =========================================================================
    /// The function observed its cancellation token.
    #[error("Sync cancelled")]
    Cancelled,

    /// Failure surfaced by the external provider.
    #[error("Provider error [{code}]: {message}")]
    Provider { code: String, message: String },

    /// A bounded call did not finish in time.
    #[error("Timed out after {0} seconds")]
    Timeout(u64),

    /// Unexpected failure escaping a sync function.
    #[error("Internal error: {0}")]
    Internal(String),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    /// Invalid connectivity probe URL.
    #[error("Invalid probe URL: {0}")]
    InvalidUrl(String),

    /// Connectivity probe could not reach its target.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Builds a provider error.
    pub fn provider(code: impl Into<String>, message: impl Into<String>) -> Self {
        SyncError::Provider {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Returns true if `request_sync` refused the request up front.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            SyncError::Validation(_)
                | SyncError::RateLimited { .. }
                | SyncError::AlreadyRunning { .. }
                | SyncError::OfflineBlocked { .. }
                | SyncError::ShuttingDown
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
                | SyncError::InvalidUrl(_)
        )
    }

    /// How a run that ended with this error is recorded.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            SyncError::Provider { .. } | SyncError::ConnectionFailed(_) => FailureKind::Provider,
            SyncError::Timeout(_) => FailureKind::Timeout,
            _ => FailureKind::Internal,
        }
    }

    /// Provider error code, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            SyncError::Provider { code, .. } => Some(code),
            _ => None,
        }
    }
}
