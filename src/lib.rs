//! Cache Pressure - memory-driven cache cleaning
//!
//! A background monitor samples process memory and, once usage exceeds a
//! configured threshold, clears every registered cache provider and asks the
//! allocator to hand freed memory back to the OS.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod system;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheCleaner, CleanerRegistry};
pub use config::{CleanerConfig, Config};
pub use error::{CleanerError, Result};
pub use tasks::{start_pressure_monitor, MonitorDeps, MonitorHandle};
