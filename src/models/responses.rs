//! Response DTOs for the admin API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::{CacheStats, ClearFailure, ClearReport};
use crate::config::CleanerConfig;
use crate::system::bytes_to_megabytes;
use crate::tasks::MonitorSnapshot;

/// Response body for GET /cache/:key
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    pub key: String,
    pub value: String,
}

impl GetResponse {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Response body for PUT /cache
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    /// Success message
    pub message: String,
    /// The key that was set
    pub key: String,
}

impl SetResponse {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
        }
    }
}

/// Response body for DELETE /cache/:key
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub message: String,
    pub key: String,
}

impl DeleteResponse {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted successfully", key),
            key,
        }
    }
}

/// Response body for the monitor status endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct MonitorStatusResponse {
    /// Whether a memory threshold is configured
    pub enabled: bool,
    /// Whether a monitor worker was started by this host
    pub running: bool,
    /// Configured threshold in megabytes
    pub threshold_mb: Option<i64>,
    /// Delay between checks in milliseconds
    pub interval_ms: u64,
    /// Worker counters; all zero when no worker runs
    #[serde(flatten)]
    pub counters: MonitorSnapshot,
    /// Number of registered cache providers
    pub providers: usize,
}

impl MonitorStatusResponse {
    pub fn new(config: &CleanerConfig, counters: Option<MonitorSnapshot>, providers: usize) -> Self {
        Self {
            enabled: config.is_enabled(),
            running: counters.is_some(),
            threshold_mb: config.threshold_mb,
            interval_ms: config.interval.as_millis() as u64,
            counters: counters.unwrap_or_default(),
            providers,
        }
    }
}

/// Response body for the demo cache counters (GET /stats/cache)
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsResponse {
    pub name: String,
    #[serde(flatten)]
    pub stats: CacheStats,
    /// Hits over all lookups, 0.0 before the first lookup
    pub hit_rate: f64,
}

impl CacheStatsResponse {
    pub fn new(name: impl Into<String>, stats: CacheStats) -> Self {
        Self {
            name: name.into(),
            hit_rate: stats.hit_rate(),
            stats,
        }
    }
}

/// Response body for GET /memory
#[derive(Debug, Clone, Serialize)]
pub struct MemoryResponse {
    pub used_bytes: u64,
    /// Used memory in whole megabytes, rounded down
    pub used_mb: u64,
}

impl MemoryResponse {
    pub fn new(used_bytes: u64) -> Self {
        Self {
            used_bytes,
            used_mb: bytes_to_megabytes(used_bytes),
        }
    }
}

/// Response body for GET /providers
#[derive(Debug, Clone, Serialize)]
pub struct ProvidersResponse {
    pub count: usize,
    pub providers: Vec<String>,
}

impl ProvidersResponse {
    pub fn new(providers: Vec<String>) -> Self {
        Self {
            count: providers.len(),
            providers,
        }
    }
}

/// Response body for a manual clear (POST /clear)
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub cleared: usize,
    pub failed: usize,
    pub failures: Vec<ClearFailure>,
}

impl From<ClearReport> for ClearResponse {
    fn from(report: ClearReport) -> Self {
        Self {
            cleared: report.cleared,
            failed: report.failures.len(),
            failures: report.failures,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
