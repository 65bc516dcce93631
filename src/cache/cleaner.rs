//! Cache Cleaner Capability
//!
//! The single operation every evictable cache exposes to the pressure monitor.

use std::fmt;

// == Cache Cleaner ==
/// A component holding evictable cached data.
///
/// Implementations must be safe to clear while the request path keeps
/// reading and writing them; the monitor provides no mutual exclusion.
/// Clearing an already empty cache must succeed.
pub trait CacheCleaner: Send + Sync {
    /// Name used when reporting failures.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Discards all cached contents.
    fn clear_cache(&self) -> anyhow::Result<()>;
}

// == Fn Cleaner ==
/// Adapts a closure into a [`CacheCleaner`].
///
/// # Example
/// ```ignore
/// let cleaner = FnCleaner::new("sessions", move || {
///     sessions.lock().unwrap().clear();
///     Ok(())
/// });
/// ```
pub struct FnCleaner<F> {
    name: String,
    clear: F,
}

impl<F> FnCleaner<F>
where
    F: Fn() -> anyhow::Result<()> + Send + Sync,
{
    pub fn new(name: impl Into<String>, clear: F) -> Self {
        Self {
            name: name.into(),
            clear,
        }
    }
}

impl<F> CacheCleaner for FnCleaner<F>
where
    F: Fn() -> anyhow::Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn clear_cache(&self) -> anyhow::Result<()> {
        (self.clear)()
    }
}

impl<F> fmt::Debug for FnCleaner<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCleaner").field("name", &self.name).finish()
    }
}
