//! Configuration sections with defaults, RON persistence and conversion to
//! the runtime [`SyncConfig`].

use std::path::Path;
use std::time::Duration;

use parley_net::{DedupConfig, ReconnectPolicy, SyncConfig};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const CONFIG_FILE: &str = "config.ron";

/// Top-level client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Where to connect.
    pub connection: ConnectionConfig,
    /// Backoff between reconnection attempts.
    pub reconnect_policy: ReconnectPolicyConfig,
    /// Duplicate suppression for chat events.
    pub dedup: DedupSettings,
    /// Event classification.
    pub events: EventsConfig,
    /// Terminal client settings.
    pub client: ClientConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Connection target and handshake bounds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Primary server URL (`ws://`, `wss://`, `http://` or `https://`).
    pub base_url: String,
    /// Path that replaces the one in `base_url`; empty keeps it.
    pub path: String,
    /// Extra probe candidates, highest priority first.
    pub fallback_urls: Vec<String>,
    /// Handshake timeout in milliseconds.
    pub handshake_timeout_ms: u64,
    /// Per-candidate probe timeout in milliseconds.
    pub probe_timeout_ms: u64,
}

/// Reconnection backoff. `delay(n) = min(base * multiplier^(n-1), max)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReconnectPolicyConfig {
    /// First delay in milliseconds.
    pub base_delay_ms: u64,
    /// Growth factor per attempt.
    pub multiplier: f64,
    /// Delay cap in milliseconds.
    pub max_delay_ms: u64,
    /// Attempts before giving up.
    pub max_attempts: u32,
    /// Random spread as a fraction of the delay (0.0 disables).
    pub jitter: f64,
}

/// Dedup windows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DedupSettings {
    /// How long a seen message is remembered, milliseconds.
    pub dedup_ttl_ms: u64,
    /// Same sender+content within this many milliseconds is a duplicate.
    pub dedup_content_window_ms: u64,
    /// Hard cap on remembered messages.
    pub max_entries: usize,
}

/// Event classification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EventsConfig {
    /// Event names whose payloads are chat messages.
    pub message_events: Vec<String>,
}

/// Terminal client settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Name sent as `sender` on outgoing messages.
    pub display_name: String,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log filter (e.g., "debug", "info,parley_net=trace"). Empty selects
    /// the logger's built-in default.
    pub log_level: String,
}

// --- Default implementations ---

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            base_url: "ws://127.0.0.1:7777".to_string(),
            path: "/ws".to_string(),
            fallback_urls: Vec::new(),
            handshake_timeout_ms: 5000,
            probe_timeout_ms: 2000,
        }
    }
}

impl Default for ReconnectPolicyConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 2000,
            multiplier: 1.5,
            max_delay_ms: 30_000,
            max_attempts: 10,
            jitter: 0.0,
        }
    }
}

impl Default for DedupSettings {
    fn default() -> Self {
        Self {
            dedup_ttl_ms: 5000,
            dedup_content_window_ms: 3000,
            max_entries: 1000,
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            message_events: vec!["message".to_string()],
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            display_name: "anonymous".to_string(),
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: String::new(),
        }
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Load `config.ron` from `config_dir`, writing a default one first if
    /// none exists.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);

        if config_path.exists() {
            let config = Self::read(config_dir)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    fn read(config_dir: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(config_dir.join(CONFIG_FILE))
            .map_err(ConfigError::ReadError)?;
        ron::from_str(&contents).map_err(ConfigError::ParseError)
    }

    /// Write this config to `config_dir/config.ron`, creating the directory.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);
        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(config_dir.join(CONFIG_FILE), serialized).map_err(ConfigError::WriteError)
    }

    /// Re-read the file. `Some` if it differs from `self`.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let fresh = Self::read(config_dir)?;
        if &fresh != self {
            log::info!("Config reloaded with changes");
            Ok(Some(fresh))
        } else {
            Ok(None)
        }
    }

    /// Validate and convert into the runtime settings for a sync client.
    pub fn sync_config(&self) -> Result<SyncConfig, ConfigError> {
        let policy = &self.reconnect_policy;
        if policy.base_delay_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "reconnect_policy.base_delay_ms",
                reason: "must be positive".to_string(),
            });
        }
        if policy.max_delay_ms < policy.base_delay_ms {
            return Err(ConfigError::InvalidValue {
                field: "reconnect_policy.max_delay_ms",
                reason: "must not be below base_delay_ms".to_string(),
            });
        }
        if !policy.multiplier.is_finite() {
            return Err(ConfigError::InvalidValue {
                field: "reconnect_policy.multiplier",
                reason: "must be a finite number".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&policy.jitter) {
            return Err(ConfigError::InvalidValue {
                field: "reconnect_policy.jitter",
                reason: "must be within 0.0..=1.0".to_string(),
            });
        }
        if self.dedup.max_entries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "dedup.max_entries",
                reason: "must be positive".to_string(),
            });
        }

        let conn = &self.connection;
        let sync = SyncConfig {
            base_url: conn.base_url.clone(),
            path: conn.path.clone(),
            fallback_urls: conn.fallback_urls.clone(),
            handshake_timeout: Duration::from_millis(conn.handshake_timeout_ms),
            probe_timeout: Duration::from_millis(conn.probe_timeout_ms),
            reconnect_policy: ReconnectPolicy {
                base_delay: Duration::from_millis(policy.base_delay_ms),
                multiplier: policy.multiplier,
                max_delay: Duration::from_millis(policy.max_delay_ms),
                max_attempts: policy.max_attempts,
                jitter: policy.jitter,
            },
            dedup: DedupConfig {
                ttl: Duration::from_millis(self.dedup.dedup_ttl_ms),
                content_window: Duration::from_millis(self.dedup.dedup_content_window_ms),
                max_entries: self.dedup.max_entries,
            },
            message_events: self.events.message_events.clone(),
        };
        sync.candidates()?;
        Ok(sync)
    }
}
