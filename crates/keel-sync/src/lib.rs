//! # keel-sync: Sync Orchestration Engine for Keel
//!
//! The single entry point for triggering, queuing, rate-limiting, cancelling
//! and observing synchronization work for independent data sources
//! (contacts, email, device messages).
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Sync Orchestration Engine                           │
//! │                                                                         │
//! │  caller (UI button, auto refresh, onboarding)                          │
//! │     │ request_sync(type, options)                                      │
//! │     ▼                                                                   │
//! │  ┌────────────────┐  ┌────────────────┐                                │
//! │  │  OfflineGuard  │─►│  RateLimiter   │──► rejection (Err)             │
//! │  │  network types │  │  per-type      │                                │
//! │  │  only          │  │  cooldown      │                                │
//! │  └────────────────┘  └───────┬────────┘                                │
//! │                              ▼                                          │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                      SyncOrchestrator                            │  │
//! │  │                                                                  │  │
//! │  │  SyncQueue (global FIFO, one entry per type)                     │  │
//! │  │  SyncRegistry (one SyncFunction per type, frozen)                │  │
//! │  │  per-type exclusivity, optional global and store-writer caps     │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │ SyncEvent (ordered, per subscriber)    │
//! │         ┌─────────────────────┴─────────────────────┐                  │
//! │         ▼                                           ▼                   │
//! │  ┌────────────────────────┐              ┌────────────────────────┐    │
//! │  │  UI listeners          │              │  NotificationDeriver   │    │
//! │  │  status pills          │              │  one signal per batch  │    │
//! │  └────────────────────────┘              └────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`orchestrator`] - `SyncOrchestrator` state machine and builder
//! - [`registry`] - `SyncFunction` registration
//! - [`queue`] - Deduplicating FIFO of pending requests
//! - [`rate_limiter`] - Per-type cooldowns
//! - [`offline`] - Connectivity gate and heartbeat
//! - [`notify`] - Batch completion signals
//! - [`context`] - What a sync function receives per run
//! - [`events`] - Events for subscribers
//! - [`config`] - Configuration (TOML + environment)
//! - [`error`] - Error taxonomy
//!
//! ## Usage
//!
//! ```rust,ignore
//! use keel_sync::{RequestOptions, SyncConfig, SyncOrchestrator, SyncType, TypeSpec};
//!
//! let orchestrator = SyncOrchestrator::builder(SyncConfig::load_or_default(None))
//!     .register(SyncType::contacts(), TypeSpec::local().writing_store(), import_contacts)?
//!     .register(SyncType::email(), TypeSpec::network().writing_store(), sync_mailbox)?
//!     .build()?;
//!
//! let _subscription = orchestrator.subscribe(|event: &SyncEvent| render(event));
//! orchestrator.request_sync(&SyncType::email(), RequestOptions::manual())?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod notify;
pub mod offline;
pub mod orchestrator;
pub mod queue;
pub mod rate_limiter;
pub mod registry;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{
    NotificationSettings, OfflineSettings, OrchestratorSettings, RateLimitSettings, SyncConfig, TypeSettings,
};
pub use context::{bounded, ProgressReporter, StoreWriteGate, SyncContext};
pub use error::{SyncError, SyncResult};
pub use events::{SyncEvent, SyncEventListener};
pub use notify::{BatchCompletion, NotificationDeriver, NotificationHandle, NotificationSink};
pub use offline::{ConnectivityProbe, OfflineGuard, TcpProbe};
pub use orchestrator::{OrchestratorBuilder, Subscription, SyncOrchestrator};
pub use queue::{EnqueueOutcome, SyncQueue};
pub use rate_limiter::{RateLimitEntry, RateLimiter};
pub use registry::{RegistryBuilder, SyncFunction, SyncRegistry, TypeSpec};

pub use keel_core::{
    FailureKind, ProviderIssue, RequestOptions, RequestOutcome, StatusIndicator, SyncFailure, SyncProgress,
    SyncReport, SyncRequest, SyncSource, SyncState, SyncStatus, SyncType, ValidationError,
};
