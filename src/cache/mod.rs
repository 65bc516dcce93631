//! Cache Module
//!
//! The cache cleaner capability, the registry the pressure monitor clears,
//! and a demo in-memory cache that plugs into it.

mod cleaner;
mod entry;
mod registry;
mod stats;
mod store;


// Re-export public types
pub use cleaner::{CacheCleaner, FnCleaner};
pub use entry::CacheEntry;
pub use registry::{ClearFailure, ClearReport, CleanerRegistry, RegistrationId};
pub use stats::CacheStats;
pub use store::MemoryCache;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum allowed value size in bytes
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB
