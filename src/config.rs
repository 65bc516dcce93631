//! Configuration Module
//!
//! Handles loading the host settings and the cache cleaner settings from
//! environment variables or from the `Extra` section of a website config file.

use std::env;
use std::path::Path;
use std::time::Duration;

use serde_json::Value;
use tracing::warn;

use crate::error::{CleanerError, Result};

/// Website config key holding the memory threshold in megabytes.
pub const THRESHOLD_KEY: &str = "ClearCacheAfterUsedMemoryMoreThan";
/// Website config key holding the check interval in seconds.
pub const INTERVAL_KEY: &str = "CleanCacheCheckInterval";

/// Check interval used when none (or a non-positive one) is configured.
pub const DEFAULT_CHECK_INTERVAL_SECS: i64 = 15;

// == Cleaner Config ==
/// Settings for the memory-pressure cache cleaner.
///
/// Read once at startup and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanerConfig {
    /// Memory usage in megabytes above which caches are cleared.
    /// `None` disables the cleaner entirely. A negative value is below any
    /// reading, so every check clears.
    pub threshold_mb: Option<i64>,
    /// Delay between two memory checks
    pub interval: Duration,
}

impl CleanerConfig {
    /// Builds a config from raw values as they come out of a config source.
    ///
    /// The interval is given in seconds; missing or non-positive values fall
    /// back to [`DEFAULT_CHECK_INTERVAL_SECS`].
    pub fn new(threshold_mb: Option<i64>, interval_secs: Option<i64>) -> Self {
        let secs = interval_secs
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_CHECK_INTERVAL_SECS);

        Self {
            threshold_mb,
            interval: Duration::from_millis((secs as u64).saturating_mul(1000)),
        }
    }

    /// Returns true when a threshold is configured.
    pub fn is_enabled(&self) -> bool {
        self.threshold_mb.is_some()
    }

    /// Reads the cleaner settings from a website config `Extra` object.
    ///
    /// Values may be JSON numbers or numeric strings. Anything else under the
    /// threshold key is ignored with a warning, which leaves the cleaner off.
    pub fn from_extra(extra: &Value) -> Self {
        let threshold_mb = extra.get(THRESHOLD_KEY).and_then(|raw| {
            let parsed = json_integer(raw);
            if parsed.is_none() && !raw.is_null() {
                warn!("Ignoring invalid {} value: {}", THRESHOLD_KEY, raw);
            }
            parsed
        });
        let interval_secs = extra.get(INTERVAL_KEY).and_then(json_integer);

        Self::new(threshold_mb, interval_secs)
    }

    /// Reads the cleaner settings through a key lookup function.
    ///
    /// # Keys
    /// - `CLEAR_CACHE_AFTER_USED_MEMORY_MORE_THAN` - Threshold in MB (default: disabled)
    /// - `CLEAN_CACHE_CHECK_INTERVAL` - Check interval in seconds (default: 15)
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let threshold_mb = lookup("CLEAR_CACHE_AFTER_USED_MEMORY_MORE_THAN").and_then(|raw| {
            let parsed = raw.trim().parse::<i64>().ok();
            if parsed.is_none() {
                warn!(
                    "Ignoring invalid CLEAR_CACHE_AFTER_USED_MEMORY_MORE_THAN value: {}",
                    raw
                );
            }
            parsed
        });
        let interval_secs =
            lookup("CLEAN_CACHE_CHECK_INTERVAL").and_then(|raw| raw.trim().parse::<i64>().ok());

        Self::new(threshold_mb, interval_secs)
    }
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self::new(None, None)
    }
}

fn json_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Loads the `Extra` object of a website config file.
///
/// A file without an `Extra` section yields an empty object.
pub fn load_website_extra(path: impl AsRef<Path>) -> Result<Value> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .map_err(|e| CleanerError::Config(format!("{}: {}", path.display(), e)))?;
    let root: Value = serde_json::from_str(&raw)
        .map_err(|e| CleanerError::Config(format!("{}: {}", path.display(), e)))?;

    Ok(root
        .get("Extra")
        .cloned()
        .unwrap_or_else(|| Value::Object(Default::default())))
}

// == Host Config ==
/// Host configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries the demo cache can hold
    pub max_entries: usize,
    /// Default TTL in seconds for demo cache entries without explicit TTL
    pub default_ttl: u64,
    /// HTTP server port
    pub server_port: u16,
    /// Cache cleaner settings
    pub cleaner: CleanerConfig,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_ENTRIES` - Maximum demo cache entries (default: 1000)
    /// - `DEFAULT_TTL` - Default TTL in seconds (default: 300)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `WEBSITE_CONFIG` - Optional path to a website config JSON whose
    ///   `Extra` section replaces the cleaner variables below
    /// - `CLEAR_CACHE_AFTER_USED_MEMORY_MORE_THAN` - Threshold in MB
    /// - `CLEAN_CACHE_CHECK_INTERVAL` - Check interval in seconds (default: 15)
    pub fn from_env() -> Result<Self> {
        let mut config = Self::from_lookup(|key| env::var(key).ok());

        if let Ok(path) = env::var("WEBSITE_CONFIG") {
            let extra = load_website_extra(&path)?;
            config.cleaner = CleanerConfig::from_extra(&extra);
        }

        Ok(config)
    }

    /// Builds a Config through a key lookup function.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            max_entries: lookup("MAX_ENTRIES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(1000),
            default_ttl: lookup("DEFAULT_TTL")
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            server_port: lookup("SERVER_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            cleaner: CleanerConfig::from_lookup(&lookup),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            default_ttl: 300,
            server_port: 3000,
            cleaner: CleanerConfig::default(),
        }
    }
}
