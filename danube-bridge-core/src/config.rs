//! Configuration for the bridge.
//!
//! Two kinds of configuration exist with different lifetimes:
//!
//! - [`LinkConfig`] is a snapshot of connection parameters captured from the
//!   caller's arguments at each initialization call. It is immutable and owned
//!   by the role state that created it.
//! - [`BridgeSettings`] holds process-wide tunables (relay capacity, default
//!   poll timeout, log level), loaded once at bootstrap from an optional TOML
//!   file plus environment overrides.

use crate::{BridgeError, BridgeResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Connection parameters for one producer or consumer run.
///
/// The producer side carries no topic or tag at initialization time; an empty
/// tag on the consumer side means "no filter".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Danube broker service URL
    pub broker_url: String,

    /// Topic to subscribe to (consumer only; producers name the topic per send)
    pub topic: String,

    /// Producer group / consumer subscription group
    pub group: String,

    /// Tag filter expression, empty for "accept everything"
    pub tag: String,
}

impl LinkConfig {
    /// Snapshot the parameters of a producer initialization.
    pub fn for_producer(broker_url: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            broker_url: broker_url.into(),
            topic: String::new(),
            group: group.into(),
            tag: String::new(),
        }
    }

    /// Snapshot the parameters of a consumer initialization.
    pub fn for_consumer(
        broker_url: impl Into<String>,
        topic: impl Into<String>,
        group: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            broker_url: broker_url.into(),
            topic: topic.into(),
            group: group.into(),
            tag: tag.into(),
        }
    }

    /// Whether delivered messages should be filtered by tag.
    pub fn has_tag_filter(&self) -> bool {
        !self.tag.is_empty()
    }
}

/// Process-wide tunables for the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeSettings {
    /// Relay queue capacity in messages. Fixed for the process lifetime.
    #[serde(default = "default_relay_capacity")]
    pub relay_capacity: usize,

    /// Timeout applied when the caller passes a non-positive poll timeout.
    #[serde(default = "default_poll_timeout_ms")]
    pub default_poll_timeout_ms: u64,

    /// Log level filter used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_relay_capacity() -> usize {
    100
}

fn default_poll_timeout_ms() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl BridgeSettings {
    /// Load settings with the standard precedence:
    /// built-in defaults → TOML file named by `BRIDGE_CONFIG_FILE` →
    /// environment variable overrides.
    ///
    /// Environment variables:
    /// - `BRIDGE_RELAY_CAPACITY`: relay queue capacity (default: 100)
    /// - `BRIDGE_POLL_TIMEOUT_MS`: default poll timeout in ms (default: 10000)
    /// - `BRIDGE_LOG_LEVEL`: log level (default: info)
    pub fn load() -> BridgeResult<Self> {
        let mut settings = if let Ok(config_file) = env::var("BRIDGE_CONFIG_FILE") {
            Self::from_file(&config_file)?
        } else {
            Self::default()
        };

        settings.apply_env_overrides();
        settings.validate()?;

        Ok(settings)
    }

    /// Load settings from a TOML file
    pub fn from_file(path: &str) -> BridgeResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::config(format!("Failed to read config file {}: {}", path, e))
        })?;

        toml::from_str(&content).map_err(|e| {
            BridgeError::config(format!("Failed to parse config file {}: {}", path, e))
        })
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("BRIDGE_RELAY_CAPACITY") {
            if let Ok(n) = val.parse() {
                self.relay_capacity = n;
            }
        }
        if let Ok(val) = env::var("BRIDGE_POLL_TIMEOUT_MS") {
            if let Ok(n) = val.parse() {
                self.default_poll_timeout_ms = n;
            }
        }
        if let Ok(val) = env::var("BRIDGE_LOG_LEVEL") {
            self.log_level = val;
        }
    }

    /// Validate the settings
    pub fn validate(&self) -> BridgeResult<()> {
        if self.relay_capacity == 0 {
            return Err(BridgeError::config("relay_capacity must be > 0"));
        }

        if self.default_poll_timeout_ms == 0 {
            return Err(BridgeError::config("default_poll_timeout_ms must be > 0"));
        }

        Ok(())
    }

    /// Default poll timeout as a [`Duration`].
    pub fn default_poll_timeout(&self) -> Duration {
        Duration::from_millis(self.default_poll_timeout_ms)
    }
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            relay_capacity: default_relay_capacity(),
            default_poll_timeout_ms: default_poll_timeout_ms(),
            log_level: default_log_level(),
        }
    }
}
