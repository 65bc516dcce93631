//! Cache Statistics Module
//!
//! Tracks demo cache activity, including how often it was cleared.

use serde::Serialize;

// == Cache Stats ==
/// Demo cache counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (key not found or expired)
    pub misses: u64,
    /// Number of entries dropped to stay under capacity
    pub evictions: u64,
    /// Number of times the whole cache was cleared
    pub clears: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
    /// Approximate bytes held by the entries
    pub approx_bytes: usize,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_clear(&mut self) {
        self.clears += 1;
    }
}
