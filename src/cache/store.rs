//! Memory Cache Module
//!
//! Thread-safe string cache with TTL expiration. It registers itself with the
//! pressure monitor as an evictable provider.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::cache::{CacheCleaner, CacheEntry, CacheStats, MAX_KEY_LENGTH, MAX_VALUE_SIZE};
use crate::error::{CleanerError, Result};

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, CacheEntry>,
    stats: CacheStats,
}

// == Memory Cache ==
/// In-process cache that can be cleared at any time by the pressure monitor.
#[derive(Debug)]
pub struct MemoryCache {
    name: String,
    inner: Mutex<Inner>,
    /// Maximum number of entries allowed
    max_entries: usize,
    /// Default TTL in seconds for entries without explicit TTL
    default_ttl: u64,
}

impl MemoryCache {
    // == Constructor ==
    /// Creates a new MemoryCache with specified capacity and default TTL.
    ///
    /// # Arguments
    /// * `name` - Name reported when clearing fails
    /// * `max_entries` - Maximum number of entries the cache can hold
    /// * `default_ttl` - Default TTL in seconds for entries without explicit TTL
    pub fn new(name: impl Into<String>, max_entries: usize, default_ttl: u64) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(Inner::default()),
            max_entries,
            default_ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // == Set ==
    /// Stores a key-value pair with optional TTL in seconds.
    ///
    /// Overwriting resets the TTL. When the cache is full, expired entries are
    /// purged first; if none were expired, the oldest entry is dropped.
    pub fn set(&self, key: String, value: String, ttl: Option<u64>) -> Result<()> {
        if key.is_empty() {
            return Err(CleanerError::InvalidRequest("Key cannot be empty".to_string()));
        }
        if key.len() > MAX_KEY_LENGTH {
            return Err(CleanerError::InvalidRequest(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            )));
        }
        if value.len() > MAX_VALUE_SIZE {
            return Err(CleanerError::InvalidRequest(format!(
                "Value exceeds maximum size of {} bytes",
                MAX_VALUE_SIZE
            )));
        }

        let mut inner = self.lock();

        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.max_entries {
            inner.entries.retain(|_, entry| !entry.is_expired());
        }

        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.max_entries {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.created_at)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                    inner.stats.record_eviction();
                }
                None => {
                    return Err(CleanerError::InvalidRequest(
                        "Cache has zero capacity".to_string(),
                    ))
                }
            }
        }

        let entry = CacheEntry::new(value, Some(ttl.unwrap_or(self.default_ttl)));
        inner.entries.insert(key, entry);
        Ok(())
    }

    // == Get ==
    /// Retrieves a value by key. Expired entries are removed and count as misses.
    pub fn get(&self, key: &str) -> Result<String> {
        let mut inner = self.lock();

        let expired = match inner.entries.get(key) {
            Some(entry) if !entry.is_expired() => {
                let value = entry.value.clone();
                inner.stats.record_hit();
                return Ok(value);
            }
            Some(_) => true,
            None => false,
        };

        inner.stats.record_miss();
        if expired {
            inner.entries.remove(key);
            Err(CleanerError::Expired(key.to_string()))
        } else {
            Err(CleanerError::NotFound(key.to_string()))
        }
    }

    // == Delete ==
    pub fn delete(&self, key: &str) -> Result<()> {
        match self.lock().entries.remove(key) {
            Some(_) => Ok(()),
            None => Err(CleanerError::NotFound(key.to_string())),
        }
    }

    // == Stats ==
    /// Returns a copy of the counters with current size figures filled in.
    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        let mut stats = inner.stats.clone();
        stats.total_entries = inner.entries.len();
        stats.approx_bytes = inner
            .entries
            .iter()
            .map(|(key, entry)| key.capacity() + entry.footprint())
            .sum();
        stats
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheCleaner for MemoryCache {
    fn name(&self) -> &str {
        &self.name
    }

    fn clear_cache(&self) -> anyhow::Result<()> {
        let mut inner = self.lock();
        let dropped = inner.entries.len();
        // Replace rather than clear so the table's allocation is released too.
        inner.entries = HashMap::new();
        inner.stats.record_clear();
        debug!("Cleared {} entries from '{}'", dropped, self.name);
        Ok(())
    }
}
