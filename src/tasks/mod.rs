//! Background Tasks Module
//!
//! Contains background work that runs for the lifetime of the host.
//!
//! # Tasks
//! - Cache pressure monitor: clears registered caches when process memory
//!   usage exceeds the configured threshold

mod pressure;

pub use pressure::{
    check_memory_pressure, start_pressure_monitor, CycleOutcome, MonitorDeps, MonitorHandle,
    MonitorSnapshot, MonitorStats, ShutdownSignal,
};
