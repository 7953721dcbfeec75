//! # Offline Guard
//!
//! Connectivity gate for network-bound sync types.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Offline Guard                                   │
//! │                                                                         │
//! │  ┌────────────────────┐   every heartbeat_interval                     │
//! │  │  Heartbeat Task    │ ─────────────────────────┐                     │
//! │  └────────────────────┘                          ▼                     │
//! │                                   ┌──────────────────────────────┐     │
//! │                                   │ probe() raced against        │     │
//! │                                   │ probe_timeout (default 12s)  │     │
//! │                                   └──────────────┬───────────────┘     │
//! │                                   ok ──► online  │  err/timeout ──► offline
//! │                                                  ▼                     │
//! │                                   ┌──────────────────────────────┐     │
//! │   request_sync ──► allows(net) ◄──│ watch::Sender<bool>          │     │
//! │                                   └──────────────────────────────┘     │
//! │                                                                         │
//! │  Local-only types always pass. Coming back online never starts work    │
//! │  by itself; callers re-request.                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::OfflineSettings;
use crate::context::bounded;
use crate::error::{SyncError, SyncResult};

// =============================================================================
// Connectivity Probe
// =============================================================================

/// One reachability check.
pub trait ConnectivityProbe: Send + Sync + 'static {
    fn probe(&self) -> BoxFuture<'_, SyncResult<()>>;
}

/// TCP connect to the host and port of a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpProbe {
    host: String,
    port: u16,
}

impl TcpProbe {
    pub fn from_url(raw: &str) -> SyncResult<Self> {
        let url = Url::parse(raw)?;
        let host = url
            .host_str()
            .ok_or_else(|| SyncError::InvalidUrl(format!("Probe URL has no host: {}", raw)))?
            .to_string();
        let port = url
            .port_or_known_default()
            .ok_or_else(|| SyncError::InvalidUrl(format!("Probe URL has no port: {}", raw)))?;

        Ok(TcpProbe { host, port })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl ConnectivityProbe for TcpProbe {
    fn probe(&self) -> BoxFuture<'_, SyncResult<()>> {
        async move {
            TcpStream::connect((self.host.as_str(), self.port))
                .await
                .map(|_| ())
                .map_err(|e| SyncError::ConnectionFailed(format!("{}: {}", self.address(), e)))
        }
        .boxed()
    }
}

// =============================================================================
// Offline Guard
// =============================================================================

/// Shared connectivity flag.
///
/// Cheap to clone; all clones observe the same flag.
#[derive(Debug, Clone)]
pub struct OfflineGuard {
    online: Arc<watch::Sender<bool>>,
    shutdown: CancellationToken,
}

impl OfflineGuard {
    /// A guard with a fixed initial state and no heartbeat.
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        OfflineGuard {
            online: Arc::new(tx),
            shutdown: CancellationToken::new(),
        }
    }

    /// A guard that reports online until told otherwise.
    pub fn always_online() -> Self {
        Self::new(true)
    }

    /// Starts a heartbeat that probes `probe` per `settings`.
    ///
    /// Disabled settings give an always-online guard. Must be called from
    /// inside a tokio runtime.
    pub fn spawn(settings: &OfflineSettings, probe: Arc<dyn ConnectivityProbe>) -> SyncResult<Self> {
        let guard = Self::always_online();
        if !settings.enabled {
            debug!("Offline checks disabled");
            return Ok(guard);
        }
        if settings.heartbeat_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "heartbeat_interval_secs must be greater than 0".into(),
            ));
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SyncError::Internal(format!("Offline heartbeat needs a runtime: {}", e)))?;

        let task = guard.clone();
        let interval = settings.heartbeat_interval();
        let timeout = settings.probe_timeout();
        runtime.spawn(async move {
            task.heartbeat(probe, interval, timeout).await;
        });

        info!(
            interval_secs = interval.as_secs(),
            timeout_secs = timeout.as_secs(),
            "Offline heartbeat started"
        );
        Ok(guard)
    }

    /// Starts a heartbeat against the configured probe URL.
    pub fn spawn_tcp(settings: &OfflineSettings) -> SyncResult<Self> {
        let probe = TcpProbe::from_url(&settings.probe_url)?;
        Self::spawn(settings, Arc::new(probe))
    }

    async fn heartbeat(&self, probe: Arc<dyn ConnectivityProbe>, interval: Duration, timeout: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    debug!("Offline heartbeat stopped");
                    break;
                }
                _ = ticker.tick() => {
                    self.check_now(probe.as_ref(), timeout).await;
                }
            }
        }
    }

    /// Probes once and updates the flag. Returns the new state.
    pub async fn check_now(&self, probe: &dyn ConnectivityProbe, timeout: Duration) -> bool {
        let online = match bounded(timeout, probe.probe()).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                debug!(?e, "Connectivity probe failed");
                false
            }
            Err(e) => {
                debug!(?e, "Connectivity probe timed out");
                false
            }
        };
        self.set_online(online);
        online
    }

    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    /// Whether a type with this network class may run right now.
    pub fn allows(&self, network: bool) -> bool {
        !network || self.is_online()
    }

    /// Overrides the flag (OS reachability callbacks, tests).
    pub fn set_online(&self, online: bool) {
        let changed = self.online.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });

        if changed {
            if online {
                info!("Connectivity restored");
            } else {
                warn!("Connectivity lost, network syncs blocked");
            }
        }
    }

    /// Receiver that wakes on every connectivity change.
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.online.subscribe()
    }

    /// Stops the heartbeat. The flag keeps its last value.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl Default for OfflineGuard {
    fn default() -> Self {
        Self::always_online()
    }
}
