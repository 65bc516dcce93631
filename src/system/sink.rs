//! Error Sink
//!
//! Where the pressure monitor sends failures it cannot surface to a caller.

use tracing::error;

// == Error Sink ==
/// Receives free-form failure reports from the background worker.
///
/// Implementations must not panic; the monitor guards calls anyway.
pub trait ErrorSink: Send + Sync {
    fn report(&self, message: &str);
}

/// Forwards reports to `tracing` at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, message: &str) {
        error!(target: "cache_pressure::monitor", "{}", message);
    }
}
