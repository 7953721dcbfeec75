//! # keel-core: Pure Sync Types for Keel
//!
//! Shared vocabulary of the sync orchestration engine: what a sync type is,
//! what a request looks like, which status changes are legal and how a status
//! maps to the UI indicator. No I/O and no async runtime.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Keel Architecture                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            Frontend (status pills, sync buttons)                │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ SyncState snapshots (ts-rs types)      │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              keel-sync (SyncOrchestrator)                       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ keel-core (THIS CRATE) ★                        │   │
//! │  │   types: SyncType, SyncRequest, SyncState, SyncReport           │   │
//! │  │   validation: names, lifecycle transitions                      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types
//! - [`error`] - Validation errors
//! - [`validation`] - Naming and lifecycle rules

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::ValidationError;
pub use types::{
    FailureKind, ProviderIssue, RequestOptions, RequestOutcome, StatusIndicator, SyncFailure,
    SyncProgress, SyncReport, SyncRequest, SyncSource, SyncState, SyncStatus, SyncType,
};

// =============================================================================
// Constants
// =============================================================================

/// Longest accepted sync type name.
pub const MAX_SYNC_TYPE_LEN: usize = 64;
