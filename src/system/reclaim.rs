//! Memory Reclamation
//!
//! Rust has no collector to run, so reclaiming means asking the allocator to
//! return freed pages to the OS. It is a hint and may do nothing.

use tracing::debug;

// == Reclaimer ==
/// Best-effort request to release freed memory promptly.
pub trait Reclaimer: Send + Sync {
    fn reclaim(&self);
}

/// Trims the glibc heap after caches were dropped.
///
/// Does nothing on targets without `malloc_trim`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllocatorTrim;

impl Reclaimer for AllocatorTrim {
    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    fn reclaim(&self) {
        // SAFETY: malloc_trim only walks allocator state and has no preconditions.
        let released = unsafe { libc::malloc_trim(0) };
        debug!("malloc_trim released memory: {}", released != 0);
    }

    #[cfg(not(all(target_os = "linux", target_env = "gnu")))]
    fn reclaim(&self) {
        debug!("Allocator trim not supported on this target");
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReclaimer;

impl Reclaimer for NoopReclaimer {
    fn reclaim(&self) {}
}
