//! Cleaner Registry Module
//!
//! Process-wide set of cache providers that the pressure monitor clears.
//! Readers take a snapshot of the current providers under a short read lock
//! and iterate it without holding any lock, so providers can be registered or
//! removed while a clearing pass is running.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use tracing::debug;

use crate::cache::CacheCleaner;
use crate::error::{panic_message, CleanerError};

/// Handle returned by [`CleanerRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(u64);

// == Clear Report ==
/// One provider that failed during a clearing pass.
#[derive(Debug, Clone, Serialize)]
pub struct ClearFailure {
    /// Name of the failing provider
    pub provider: String,
    /// Error text, including the error chain
    pub reason: String,
}

impl From<ClearFailure> for CleanerError {
    fn from(failure: ClearFailure) -> Self {
        CleanerError::ClearFailed {
            provider: failure.provider,
            reason: failure.reason,
        }
    }
}

/// Outcome of clearing every provider of one snapshot.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClearReport {
    /// Number of providers cleared successfully
    pub cleared: usize,
    /// Providers that returned an error or panicked
    pub failures: Vec<ClearFailure>,
}

impl ClearReport {
    /// Total number of providers that were invoked.
    pub fn attempted(&self) -> usize {
        self.cleared + self.failures.len()
    }
}

// == Cleaner Registry ==
/// Thread-safe, open set of [`CacheCleaner`]s.
#[derive(Default)]
pub struct CleanerRegistry {
    next_id: AtomicU64,
    cleaners: RwLock<Vec<(RegistrationId, Arc<dyn CacheCleaner>)>>,
}

impl CleanerRegistry {
    // == Constructor ==
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // == Register ==
    /// Adds a provider. The same provider may be registered more than once.
    pub fn register(&self, cleaner: Arc<dyn CacheCleaner>) -> RegistrationId {
        let id = RegistrationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!("Registering cache cleaner '{}'", cleaner.name());
        self.cleaners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, cleaner));
        id
    }

    // == Unregister ==
    /// Removes a provider. Returns false if the id was not registered.
    pub fn unregister(&self, id: RegistrationId) -> bool {
        let mut cleaners = self.cleaners.write().unwrap_or_else(PoisonError::into_inner);
        let before = cleaners.len();
        cleaners.retain(|(existing, _)| *existing != id);
        cleaners.len() != before
    }

    // == Snapshot ==
    /// Returns the providers registered at this instant.
    pub fn snapshot(&self) -> Vec<Arc<dyn CacheCleaner>> {
        self.cleaners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, cleaner)| Arc::clone(cleaner))
            .collect()
    }

    /// Names of the registered providers, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.snapshot()
            .iter()
            .map(|cleaner| cleaner.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.cleaners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // == Clear All ==
    /// Clears every provider of a fresh snapshot.
    ///
    /// Each provider runs inside its own failure boundary: an error or a
    /// panic is recorded in the report and the remaining providers still run.
    /// Failures are only logged at debug level; the caller reports them.
    pub fn clear_all(&self) -> ClearReport {
        let mut report = ClearReport::default();

        for cleaner in self.snapshot() {
            let outcome = catch_unwind(AssertUnwindSafe(|| cleaner.clear_cache()));
            let reason = match outcome {
                Ok(Ok(())) => {
                    report.cleared += 1;
                    continue;
                }
                Ok(Err(err)) => format!("{:#}", err),
                Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
            };

            debug!("Cache cleaner '{}' failed: {}", cleaner.name(), reason);
            report.failures.push(ClearFailure {
                provider: cleaner.name().to_string(),
                reason,
            });
        }

        report
    }
}

impl std::fmt::Debug for CleanerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanerRegistry")
            .field("cleaners", &self.names())
            .finish()
    }
}
