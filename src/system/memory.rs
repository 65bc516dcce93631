//! Process Memory Sampling
//!
//! Reads the resident memory of the current process.

use std::sync::{Mutex, PoisonError};

use sysinfo::{Pid, System};

use crate::error::{CleanerError, Result};

/// Number of bytes in one megabyte (1024 x 1024).
pub const BYTES_PER_MEGABYTE: u64 = 1024 * 1024;

/// Converts bytes to whole megabytes, rounding down.
pub fn bytes_to_megabytes(bytes: u64) -> u64 {
    bytes / BYTES_PER_MEGABYTE
}

// == Memory Reader ==
/// Source of the current process memory usage.
///
/// Successive readings are independent; the value can rise or fall.
pub trait MemoryReader: Send + Sync {
    /// Current resident memory of the process, in bytes.
    fn used_memory_bytes(&self) -> Result<u64>;
}

// == Process Memory Reader ==
/// [`MemoryReader`] backed by `sysinfo`.
pub struct ProcessMemoryReader {
    pid: Pid,
    system: Mutex<System>,
}

impl ProcessMemoryReader {
    pub fn new() -> Result<Self> {
        let pid = sysinfo::get_current_pid()
            .map_err(|e| CleanerError::MemoryRead(format!("cannot resolve current pid: {}", e)))?;

        Ok(Self {
            pid,
            system: Mutex::new(System::new()),
        })
    }
}

impl MemoryReader for ProcessMemoryReader {
    fn used_memory_bytes(&self) -> Result<u64> {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);

        if !system.refresh_process(self.pid) {
            return Err(CleanerError::MemoryRead(format!(
                "process {} not found",
                self.pid
            )));
        }

        system
            .process(self.pid)
            .map(|process| process.memory())
            .ok_or_else(|| CleanerError::MemoryRead(format!("process {} not found", self.pid)))
    }
}

impl std::fmt::Debug for ProcessMemoryReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessMemoryReader")
            .field("pid", &self.pid)
            .finish()
    }
}
