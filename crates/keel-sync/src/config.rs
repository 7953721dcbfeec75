//! # Sync Configuration
//!
//! Configuration management for the orchestration engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     KEEL_MAX_CONCURRENT=2                                              │
//! │     KEEL_PROBE_URL=https://example.com                                 │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/audit/sync.toml (Linux)                                  │
//! │     ~/Library/Application Support/com.keel.audit/sync.toml (macOS)     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [orchestrator]
//! store_writer_limit = 1
//! helper_timeout_secs = 12
//!
//! [rate_limit]
//! local_cooldown_ms = 2000
//! provider_cooldown_ms = 30000
//!
//! [offline]
//! probe_url = "https://connectivitycheck.gstatic.com/generate_204"
//!
//! [notifications]
//! coalesce_window_ms = 1500
//!
//! [types.email]
//! network = true
//! cooldown_ms = 60000
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use keel_core::validation::validate_sync_type_name;

use crate::error::{SyncError, SyncResult};

/// Upper bound for any bounded call, in seconds.
const MAX_TIMEOUT_SECS: u64 = 120;

// =============================================================================
// Orchestrator Settings
// =============================================================================

/// Scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorSettings {
    /// Global cap on concurrent runs across all types. 0 = uncapped.
    #[serde(default)]
    pub max_concurrent: usize,

    /// Cap on concurrent runs of types registered as store writers.
    /// 0 = uncapped.
    #[serde(default = "default_store_writer_limit")]
    pub store_writer_limit: usize,

    /// Bound for helper calls made through `SyncContext::bounded`.
    #[serde(default = "default_helper_timeout")]
    pub helper_timeout_secs: u64,

    /// How long `drain_and_cancel_all` waits for cancelled runs to return.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

fn default_store_writer_limit() -> usize {
    1
}
fn default_helper_timeout() -> u64 {
    12
}
fn default_shutdown_grace() -> u64 {
    10
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        OrchestratorSettings {
            max_concurrent: 0,
            store_writer_limit: default_store_writer_limit(),
            helper_timeout_secs: default_helper_timeout(),
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

impl OrchestratorSettings {
    /// Global concurrency cap, if any.
    pub fn concurrency_cap(&self) -> Option<usize> {
        (self.max_concurrent > 0).then_some(self.max_concurrent)
    }

    /// Store-writer cap, if any.
    pub fn store_writer_cap(&self) -> Option<usize> {
        (self.store_writer_limit > 0).then_some(self.store_writer_limit)
    }

    pub fn helper_timeout(&self) -> Duration {
        Duration::from_secs(self.helper_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

// =============================================================================
// Rate Limit Settings
// =============================================================================

/// Default cooldowns by type class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Cooldown for local-only types (device message databases, ...).
    #[serde(default = "default_local_cooldown")]
    pub local_cooldown_ms: u64,

    /// Cooldown for types that call provider APIs.
    #[serde(default = "default_provider_cooldown")]
    pub provider_cooldown_ms: u64,
}

fn default_local_cooldown() -> u64 {
    2_000
}
fn default_provider_cooldown() -> u64 {
    30_000
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        RateLimitSettings {
            local_cooldown_ms: default_local_cooldown(),
            provider_cooldown_ms: default_provider_cooldown(),
        }
    }
}

impl RateLimitSettings {
    /// Default cooldown for a type class.
    pub fn default_cooldown(&self, network: bool) -> Duration {
        if network {
            Duration::from_millis(self.provider_cooldown_ms)
        } else {
            Duration::from_millis(self.local_cooldown_ms)
        }
    }
}

// =============================================================================
// Offline Settings
// =============================================================================

/// Connectivity heartbeat settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineSettings {
    /// Run the heartbeat. When disabled the guard always reports online.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Target of the TCP probe (host and port are taken from the URL).
    #[serde(default = "default_probe_url")]
    pub probe_url: String,

    /// Seconds between heartbeat probes.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// A probe slower than this counts as offline.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

fn default_true() -> bool {
    true
}
fn default_probe_url() -> String {
    "https://connectivitycheck.gstatic.com/generate_204".to_string()
}
fn default_heartbeat_interval() -> u64 {
    30
}
fn default_probe_timeout() -> u64 {
    12
}

impl Default for OfflineSettings {
    fn default() -> Self {
        OfflineSettings {
            enabled: true,
            probe_url: default_probe_url(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

impl OfflineSettings {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

// =============================================================================
// Notification Settings
// =============================================================================

/// Completion notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSettings {
    /// Requests within this window share one completion signal.
    #[serde(default = "default_coalesce_window")]
    pub coalesce_window_ms: u64,

    /// How long a `success` status shows as `complete` in the UI.
    #[serde(default = "default_complete_display")]
    pub complete_display_secs: u64,
}

fn default_coalesce_window() -> u64 {
    1_500
}
fn default_complete_display() -> u64 {
    5
}

impl Default for NotificationSettings {
    fn default() -> Self {
        NotificationSettings {
            coalesce_window_ms: default_coalesce_window(),
            complete_display_secs: default_complete_display(),
        }
    }
}

impl NotificationSettings {
    pub fn coalesce_window(&self) -> Duration {
        Duration::from_millis(self.coalesce_window_ms)
    }

    pub fn complete_display(&self) -> Duration {
        Duration::from_secs(self.complete_display_secs)
    }
}

// =============================================================================
// Per-Type Overrides
// =============================================================================

/// Overrides applied on top of a type's registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSettings {
    #[serde(default)]
    pub network: Option<bool>,

    #[serde(default)]
    pub writes_store: Option<bool>,

    #[serde(default)]
    pub cooldown_ms: Option<u64>,
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub orchestrator: OrchestratorSettings,

    #[serde(default)]
    pub rate_limit: RateLimitSettings,

    #[serde(default)]
    pub offline: OfflineSettings,

    #[serde(default)]
    pub notifications: NotificationSettings,

    /// Per-type overrides keyed by sync type name.
    #[serde(default)]
    pub types: BTreeMap<String, TypeSettings>,
}

impl SyncConfig {
    /// Creates a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (sync.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        // Layer the config file over defaults
        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        // Environment wins over the file
        config.apply_env_overrides();

        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load sync config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Sync config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        for (name, secs) in [
            ("helper_timeout_secs", self.orchestrator.helper_timeout_secs),
            ("probe_timeout_secs", self.offline.probe_timeout_secs),
        ] {
            if secs == 0 || secs > MAX_TIMEOUT_SECS {
                return Err(SyncError::InvalidConfig(format!(
                    "{} must be between 1 and {}, got {}",
                    name, MAX_TIMEOUT_SECS, secs
                )));
            }
        }

        if self.offline.enabled {
            if self.offline.heartbeat_interval_secs == 0 {
                return Err(SyncError::InvalidConfig(
                    "heartbeat_interval_secs must be greater than 0".into(),
                ));
            }

            let url = url::Url::parse(&self.offline.probe_url)?;
            if url.host_str().is_none() {
                return Err(SyncError::InvalidUrl(format!(
                    "Probe URL has no host: {}",
                    self.offline.probe_url
                )));
            }
        }

        for name in self.types.keys() {
            validate_sync_type_name(name)?;
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("KEEL_MAX_CONCURRENT") {
            match value.parse::<usize>() {
                Ok(n) => self.orchestrator.max_concurrent = n,
                Err(_) => warn!(value = %value, "Ignoring invalid KEEL_MAX_CONCURRENT"),
            }
        }

        if let Ok(value) = std::env::var("KEEL_STORE_WRITER_LIMIT") {
            match value.parse::<usize>() {
                Ok(n) => self.orchestrator.store_writer_limit = n,
                Err(_) => warn!(value = %value, "Ignoring invalid KEEL_STORE_WRITER_LIMIT"),
            }
        }

        if let Ok(url) = std::env::var("KEEL_PROBE_URL") {
            debug!(url = %url, "Overriding probe URL from environment");
            self.offline.probe_url = url;
        }

        if let Ok(value) = std::env::var("KEEL_OFFLINE_CHECKS") {
            match value.to_lowercase().as_str() {
                "1" | "true" | "on" => self.offline.enabled = true,
                "0" | "false" | "off" => self.offline.enabled = false,
                _ => warn!(value = %value, "Unknown KEEL_OFFLINE_CHECKS value"),
            }
        }

        if let Ok(value) = std::env::var("KEEL_COALESCE_WINDOW_MS") {
            match value.parse::<u64>() {
                Ok(ms) => self.notifications.coalesce_window_ms = ms,
                Err(_) => warn!(value = %value, "Ignoring invalid KEEL_COALESCE_WINDOW_MS"),
            }
        }

        if let Ok(value) = std::env::var("KEEL_PROVIDER_COOLDOWN_MS") {
            match value.parse::<u64>() {
                Ok(ms) => self.rate_limit.provider_cooldown_ms = ms,
                Err(_) => warn!(value = %value, "Ignoring invalid KEEL_PROVIDER_COOLDOWN_MS"),
            }
        }

        if let Ok(value) = std::env::var("KEEL_LOCAL_COOLDOWN_MS") {
            match value.parse::<u64>() {
                Ok(ms) => self.rate_limit.local_cooldown_ms = ms,
                Err(_) => warn!(value = %value, "Ignoring invalid KEEL_LOCAL_COOLDOWN_MS"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "keel", "audit")
            .map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    /// Overrides for one type, if configured.
    pub fn type_settings(&self, sync_type: &str) -> Option<&TypeSettings> {
        self.types.get(sync_type)
    }
}
