//! # Sync Registry
//!
//! Binds exactly one canonical `SyncFunction` to each `SyncType`.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Registration Lifecycle                             │
//! │                                                                         │
//! │  START-UP                         RUNTIME                               │
//! │  ────────                         ───────                               │
//! │  RegistryBuilder                  SyncRegistry (frozen)                 │
//! │   .register(contacts, ..)  ──►     resolve(contacts) ──► SyncFunction  │
//! │   .register(email, ..)    build    spec(email)       ──► TypeSpec      │
//! │   .register(email, ..) ✗                                                │
//! │      AlreadyRegistered            no register() exists after build     │
//! │                                                                         │
//! │  The frozen registry is owned by the orchestrator, so provider logic   │
//! │  is only reachable through request_sync.                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use keel_core::{SyncReport, SyncType, ValidationError};
use tracing::debug;

use crate::config::{RateLimitSettings, TypeSettings};
use crate::context::SyncContext;
use crate::error::SyncResult;

// =============================================================================
// Sync Function
// =============================================================================

/// The external operation that performs the actual fetch/import for a type.
///
/// Must be safe to invoke repeatedly: a re-run over data that was already
/// imported must not create duplicates. Should check
/// `SyncContext::check_cancelled` at safe points.
pub trait SyncFunction: Send + Sync + 'static {
    fn run(&self, ctx: SyncContext) -> BoxFuture<'static, SyncResult<SyncReport>>;
}

impl<F, Fut> SyncFunction for F
where
    F: Fn(SyncContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = SyncResult<SyncReport>> + Send + 'static,
{
    fn run(&self, ctx: SyncContext) -> BoxFuture<'static, SyncResult<SyncReport>> {
        self(ctx).boxed()
    }
}

// =============================================================================
// Type Spec
// =============================================================================

/// Scheduling traits of a sync type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TypeSpec {
    /// Needs network access; blocked while offline.
    pub network: bool,
    /// Writes to the shared local store; counts against the store-writer cap.
    pub writes_store: bool,
    /// Cooldown override. Falls back to the class default when `None`.
    pub cooldown: Option<Duration>,
}

impl TypeSpec {
    /// Local-only source (device databases, files).
    pub fn local() -> Self {
        TypeSpec::default()
    }

    /// Source backed by a provider API.
    pub fn network() -> Self {
        TypeSpec {
            network: true,
            ..Default::default()
        }
    }

    pub fn writing_store(mut self) -> Self {
        self.writes_store = true;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = Some(cooldown);
        self
    }

    /// Applies configured overrides.
    pub fn with_settings(mut self, settings: &TypeSettings) -> Self {
        if let Some(network) = settings.network {
            self.network = network;
        }
        if let Some(writes_store) = settings.writes_store {
            self.writes_store = writes_store;
        }
        if let Some(ms) = settings.cooldown_ms {
            self.cooldown = Some(Duration::from_millis(ms));
        }
        self
    }

    /// Effective cooldown given the class defaults.
    pub fn cooldown_or_default(&self, defaults: &RateLimitSettings) -> Duration {
        self.cooldown
            .unwrap_or_else(|| defaults.default_cooldown(self.network))
    }
}

// =============================================================================
// Registry
// =============================================================================

struct Registration {
    spec: TypeSpec,
    function: Arc<dyn SyncFunction>,
}

/// Collects registrations during start-up.
#[derive(Default)]
pub struct RegistryBuilder {
    entries: BTreeMap<SyncType, Registration>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `function` to `sync_type`. Write-once.
    pub fn register<F>(&mut self, sync_type: SyncType, spec: TypeSpec, function: F) -> SyncResult<&mut Self>
    where
        F: SyncFunction,
    {
        if self.entries.contains_key(&sync_type) {
            return Err(ValidationError::AlreadyRegistered {
                sync_type: sync_type.to_string(),
            }
            .into());
        }

        debug!(sync_type = %sync_type, ?spec, "Registered sync function");
        self.entries.insert(
            sync_type,
            Registration {
                spec,
                function: Arc::new(function),
            },
        );
        Ok(self)
    }

    /// Freezes the registry.
    pub fn build(self) -> SyncRegistry {
        SyncRegistry {
            entries: self.entries,
        }
    }
}

/// Read-only registry owned by the orchestrator.
pub struct SyncRegistry {
    entries: BTreeMap<SyncType, Registration>,
}

impl SyncRegistry {
    /// The function bound to a type.
    pub fn resolve(&self, sync_type: &SyncType) -> SyncResult<Arc<dyn SyncFunction>> {
        self.registration(sync_type).map(|r| r.function.clone())
    }

    /// Scheduling traits of a type.
    pub fn spec(&self, sync_type: &SyncType) -> SyncResult<TypeSpec> {
        self.registration(sync_type).map(|r| r.spec)
    }

    pub fn contains(&self, sync_type: &SyncType) -> bool {
        self.entries.contains_key(sync_type)
    }

    /// Registered types in name order.
    pub fn types(&self) -> impl Iterator<Item = &SyncType> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Applies per-type config overrides.
    pub(crate) fn apply_settings<'a>(&mut self, overrides: impl Iterator<Item = (&'a String, &'a TypeSettings)>) {
        for (name, settings) in overrides {
            if let Some(entry) = self.entries.iter_mut().find(|(t, _)| t.as_str() == name.as_str()) {
                entry.1.spec = entry.1.spec.with_settings(settings);
            }
        }
    }

    fn registration(&self, sync_type: &SyncType) -> SyncResult<&Registration> {
        self.entries.get(sync_type).ok_or_else(|| {
            ValidationError::Unregistered {
                sync_type: sync_type.to_string(),
            }
            .into()
        })
    }
}

impl std::fmt::Debug for SyncRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(t, r)| (t, r.spec)))
            .finish()
    }
}
