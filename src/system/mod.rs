//! System Module
//!
//! Process-level collaborators of the pressure monitor: reading memory usage,
//! handing freed memory back to the OS, and reporting failures.

mod memory;
mod reclaim;
mod sink;

pub use memory::{bytes_to_megabytes, MemoryReader, ProcessMemoryReader, BYTES_PER_MEGABYTE};
pub use reclaim::{AllocatorTrim, NoopReclaimer, Reclaimer};
pub use sink::{ErrorSink, TracingErrorSink};
