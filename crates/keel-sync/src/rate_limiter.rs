//! # Rate Limiter
//!
//! Per-type cooldown gate.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Cooldown Gate                                   │
//! │                                                                         │
//! │  request ──► allowed?  now - last_triggered_at >= cooldown              │
//! │                 │                                                       │
//! │          yes ───┴─── no                                                 │
//! │           │           │                                                 │
//! │        accepted    force && manual? ──► bypass                          │
//! │        record(now)    otherwise     ──► RateLimited { retry_after }     │
//! │                                                                         │
//! │  Automatic triggers (auto refresh, onboarding) can never bypass.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Uses `tokio::time::Instant` so a paused test clock drives it.

use std::collections::HashMap;
use std::time::Duration;

use keel_core::SyncType;
use tokio::time::Instant;

/// Cooldown bookkeeping for one sync type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub sync_type: SyncType,
    pub last_triggered_at: Option<Instant>,
    pub cooldown: Duration,
}

impl RateLimitEntry {
    pub fn new(sync_type: SyncType, cooldown: Duration) -> Self {
        RateLimitEntry {
            sync_type,
            last_triggered_at: None,
            cooldown,
        }
    }

    /// Pure check: never triggered, or the cooldown has fully elapsed.
    pub fn is_allowed(&self, now: Instant) -> bool {
        self.remaining(now).is_zero()
    }

    /// Time left before the next trigger is allowed.
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.last_triggered_at {
            Some(last) => self.cooldown.saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }
}

/// Cooldown gate for all registered types.
///
/// Lives inside the orchestrator's state lock, so it needs no locking of its
/// own.
#[derive(Debug, Default)]
pub struct RateLimiter {
    entries: HashMap<SyncType, RateLimitEntry>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cooldown for a type, keeping its trigger history.
    pub fn configure(&mut self, sync_type: SyncType, cooldown: Duration) {
        self.entries
            .entry(sync_type.clone())
            .and_modify(|e| e.cooldown = cooldown)
            .or_insert_with(|| RateLimitEntry::new(sync_type, cooldown));
    }

    /// Returns `Err(retry_after)` while the type is cooling down.
    ///
    /// Unknown types are always allowed.
    pub fn check(&self, sync_type: &SyncType, now: Instant) -> Result<(), Duration> {
        match self.entries.get(sync_type) {
            Some(entry) if !entry.is_allowed(now) => Err(entry.remaining(now)),
            _ => Ok(()),
        }
    }

    /// Records an accepted trigger.
    pub fn record(&mut self, sync_type: &SyncType, now: Instant) {
        if let Some(entry) = self.entries.get_mut(sync_type) {
            entry.last_triggered_at = Some(now);
        }
    }

    /// Current entry for a type.
    pub fn entry(&self, sync_type: &SyncType) -> Option<&RateLimitEntry> {
        self.entries.get(sync_type)
    }
}
