//! Cache Pressure Monitor
//!
//! Background worker that samples process memory at a fixed interval and,
//! when usage exceeds the configured threshold, clears every registered cache
//! provider and then asks the allocator to release freed memory.
//!
//! The worker is a dedicated OS thread so that blocking provider calls never
//! occupy the async runtime serving requests. Failures are sent to the error
//! sink and the loop carries on with the next cycle.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{ClearReport, CleanerRegistry};
use crate::config::CleanerConfig;
use crate::error::{panic_message, CleanerError, Result};
use crate::system::{
    bytes_to_megabytes, AllocatorTrim, ErrorSink, MemoryReader, ProcessMemoryReader, Reclaimer,
    TracingErrorSink,
};

const THREAD_NAME: &str = "cache-pressure-monitor";

// == Monitor Dependencies ==
/// Everything the monitor talks to, passed in explicitly.
#[derive(Clone)]
pub struct MonitorDeps {
    pub registry: Arc<CleanerRegistry>,
    pub memory: Arc<dyn MemoryReader>,
    pub reclaimer: Arc<dyn Reclaimer>,
    pub sink: Arc<dyn ErrorSink>,
}

impl MonitorDeps {
    /// Process memory via sysinfo, glibc heap trim, and tracing for failures.
    pub fn with_defaults(registry: Arc<CleanerRegistry>) -> Result<Self> {
        Ok(Self {
            registry,
            memory: Arc::new(ProcessMemoryReader::new()?),
            reclaimer: Arc::new(AllocatorTrim),
            sink: Arc::new(TracingErrorSink),
        })
    }
}

// == Monitor Stats ==
/// Counters updated by the worker, readable from any thread.
#[derive(Debug, Default)]
pub struct MonitorStats {
    cycles: AtomicU64,
    breaches: AtomicU64,
    clear_failures: AtomicU64,
    failed_samples: AtomicU64,
    last_used_mb: AtomicU64,
}

/// Point-in-time copy of [`MonitorStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MonitorSnapshot {
    /// Checks performed so far
    pub cycles: u64,
    /// Checks that found usage above the threshold
    pub breaches: u64,
    /// Provider clear calls that failed
    pub clear_failures: u64,
    /// Checks abandoned because memory could not be read
    pub failed_samples: u64,
    /// Usage seen by the latest successful sample, in megabytes
    pub last_used_mb: u64,
}

impl MonitorStats {
    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            breaches: self.breaches.load(Ordering::Relaxed),
            clear_failures: self.clear_failures.load(Ordering::Relaxed),
            failed_samples: self.failed_samples.load(Ordering::Relaxed),
            last_used_mb: self.last_used_mb.load(Ordering::Relaxed),
        }
    }
}

// == Cycle Outcome ==
/// What a single check did.
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// Usage was at or below the threshold; nothing was cleared
    BelowThreshold { used_mb: u64 },
    /// Usage exceeded the threshold; providers were cleared
    Evicted { used_mb: u64, report: ClearReport },
    /// Memory usage could not be read; the cycle was abandoned
    SampleFailed,
}

// == Check Memory Pressure ==
/// Runs one check: sample memory, and clear all providers then reclaim when
/// usage in whole megabytes is strictly above `threshold_mb`. A negative
/// threshold is exceeded by every reading.
///
/// Never fails; every problem is delivered to `deps.sink`, one report per
/// failing provider or per failed sample.
pub fn check_memory_pressure(
    threshold_mb: i64,
    deps: &MonitorDeps,
    stats: &MonitorStats,
) -> CycleOutcome {
    stats.cycles.fetch_add(1, Ordering::Relaxed);

    let sample = catch_unwind(AssertUnwindSafe(|| deps.memory.used_memory_bytes()));
    let used_bytes = match sample {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(err)) => {
            stats.failed_samples.fetch_add(1, Ordering::Relaxed);
            report_error(deps.sink.as_ref(), &err.to_string());
            return CycleOutcome::SampleFailed;
        }
        Err(payload) => {
            stats.failed_samples.fetch_add(1, Ordering::Relaxed);
            let err = CleanerError::MemoryRead(format!(
                "reader panicked: {}",
                panic_message(payload.as_ref())
            ));
            report_error(deps.sink.as_ref(), &err.to_string());
            return CycleOutcome::SampleFailed;
        }
    };

    let used_mb = bytes_to_megabytes(used_bytes);
    stats.last_used_mb.store(used_mb, Ordering::Relaxed);

    if !exceeds(used_mb, threshold_mb) {
        debug!("Memory usage {} MB within threshold {} MB", used_mb, threshold_mb);
        return CycleOutcome::BelowThreshold { used_mb };
    }

    stats.breaches.fetch_add(1, Ordering::Relaxed);
    info!(
        "Memory usage {} MB exceeds threshold {} MB, clearing caches",
        used_mb, threshold_mb
    );

    let report = deps.registry.clear_all();
    for failure in &report.failures {
        stats.clear_failures.fetch_add(1, Ordering::Relaxed);
        let err = CleanerError::from(failure.clone());
        report_error(deps.sink.as_ref(), &err.to_string());
    }

    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| deps.reclaimer.reclaim())) {
        let err = CleanerError::Internal(format!(
            "reclaimer panicked: {}",
            panic_message(payload.as_ref())
        ));
        report_error(deps.sink.as_ref(), &err.to_string());
    }

    info!(
        "Cleared {} of {} cache providers",
        report.cleared,
        report.attempted()
    );
    CycleOutcome::Evicted { used_mb, report }
}

fn exceeds(used_mb: u64, threshold_mb: i64) -> bool {
    i64::try_from(used_mb).map_or(true, |used| used > threshold_mb)
}

fn report_error(sink: &dyn ErrorSink, message: &str) {
    if catch_unwind(AssertUnwindSafe(|| sink.report(message))).is_err() {
        warn!("Error sink panicked while reporting: {}", message);
    }
}

// == Shutdown Signal ==
/// One-shot stop flag the worker waits on between checks.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag and wakes every waiter.
    pub fn trigger(&self) {
        let (flag, condvar) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
        condvar.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks for `timeout` unless triggered first. Returns true if triggered.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (flag, condvar) = &*self.inner;
        let deadline = Instant::now() + timeout;
        let mut triggered = flag.lock().unwrap_or_else(PoisonError::into_inner);

        while !*triggered {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            triggered = condvar
                .wait_timeout(triggered, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }

        *triggered
    }
}

// == Monitor Handle ==
/// Handle to a running monitor.
///
/// Dropping the handle leaves the worker running for the rest of the process.
#[derive(Debug)]
pub struct MonitorHandle {
    signal: ShutdownSignal,
    stats: Arc<MonitorStats>,
    thread: JoinHandle<()>,
}

impl MonitorHandle {
    pub fn stats(&self) -> MonitorSnapshot {
        self.stats.snapshot()
    }

    /// Shared counters, for reporting after the handle has moved elsewhere.
    pub fn shared_stats(&self) -> Arc<MonitorStats> {
        Arc::clone(&self.stats)
    }

    /// Asks the worker to exit. It wakes from its current wait immediately;
    /// a check already in progress completes first.
    pub fn stop(&self) {
        self.signal.trigger();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Stops the worker and waits for it to exit.
    pub fn shutdown(self) -> Result<()> {
        self.stop();
        self.thread
            .join()
            .map_err(|payload| CleanerError::Internal(panic_message(payload.as_ref())))
    }
}

// == Start ==
/// Starts the cache pressure monitor.
///
/// Returns `Ok(None)` without spawning anything when no threshold is
/// configured. Otherwise spawns the worker thread, which sleeps for
/// `config.interval` before each check.
///
/// # Example
/// ```ignore
/// let registry = Arc::new(CleanerRegistry::new());
/// registry.register(Arc::new(MemoryCache::new("pages", 1000, 300)));
/// let deps = MonitorDeps::with_defaults(registry)?;
/// if let Some(handle) = start_pressure_monitor(&config.cleaner, deps)? {
///     // Later, during shutdown:
///     handle.shutdown()?;
/// }
/// ```
pub fn start_pressure_monitor(
    config: &CleanerConfig,
    deps: MonitorDeps,
) -> Result<Option<MonitorHandle>> {
    let Some(threshold_mb) = config.threshold_mb else {
        info!("Cache pressure monitor disabled: no memory threshold configured");
        return Ok(None);
    };

    let interval = config.interval;
    let signal = ShutdownSignal::new();
    let stats = Arc::new(MonitorStats::default());

    let worker_signal = signal.clone();
    let worker_stats = Arc::clone(&stats);
    let thread = thread::Builder::new()
        .name(THREAD_NAME.to_string())
        .spawn(move || {
            info!(
                "Starting cache pressure monitor: threshold {} MB, interval {} ms",
                threshold_mb,
                interval.as_millis()
            );

            while !worker_signal.wait_timeout(interval) {
                check_memory_pressure(threshold_mb, &deps, &worker_stats);
            }

            info!("Cache pressure monitor stopped");
        })
        .map_err(|e| CleanerError::Internal(format!("cannot spawn {}: {}", THREAD_NAME, e)))?;

    Ok(Some(MonitorHandle {
        signal,
        stats,
        thread,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheCleaner, FnCleaner};
    use crate::system::{NoopReclaimer, BYTES_PER_MEGABYTE};
    use std::sync::atomic::AtomicUsize;

    // == Test Doubles ==
    #[derive(Default)]
    struct FixedReader {
        bytes: AtomicU64,
        reads: AtomicUsize,
    }

    impl FixedReader {
        fn new(bytes: u64) -> Self {
            Self {
                bytes: AtomicU64::new(bytes),
                reads: AtomicUsize::new(0),
            }
        }
    }

    impl MemoryReader for FixedReader {
        fn used_memory_bytes(&self) -> Result<u64> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.bytes.load(Ordering::SeqCst))
        }
    }

    struct FailingReader;

    impl MemoryReader for FailingReader {
        fn used_memory_bytes(&self) -> Result<u64> {
            Err(CleanerError::MemoryRead("proc unavailable".to_string()))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        reports: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        fn reports(&self) -> Vec<String> {
            self.reports.lock().unwrap().clone()
        }
    }

    impl ErrorSink for RecordingSink {
        fn report(&self, message: &str) {
            self.reports.lock().unwrap().push(message.to_string());
        }
    }

    struct PanickingSink;

    impl ErrorSink for PanickingSink {
        fn report(&self, _message: &str) {
            panic!("sink exploded");
        }
    }

    /// Shared, ordered log of provider and reclaimer calls.
    type EventLog = Arc<Mutex<Vec<String>>>;

    struct LoggingReclaimer(EventLog);

    impl Reclaimer for LoggingReclaimer {
        fn reclaim(&self) {
            self.0.lock().unwrap().push("reclaim".to_string());
        }
    }

    fn logging_cleaner(name: &str, log: &EventLog) -> Arc<dyn CacheCleaner> {
        let log = log.clone();
        let event = name.to_string();
        Arc::new(FnCleaner::new(name, move || {
            log.lock().unwrap().push(event.clone());
            Ok(())
        }))
    }

    fn deps_with(
        memory: Arc<dyn MemoryReader>,
        log: &EventLog,
        sink: Arc<dyn ErrorSink>,
    ) -> MonitorDeps {
        MonitorDeps {
            registry: Arc::new(CleanerRegistry::new()),
            memory,
            reclaimer: Arc::new(LoggingReclaimer(log.clone())),
            sink,
        }
    }

    fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    // == Single Cycle ==
    #[test]
    fn test_usage_equal_to_threshold_does_not_clear() {
        let log = EventLog::default();
        let reader = Arc::new(FixedReader::new(10 * BYTES_PER_MEGABYTE + BYTES_PER_MEGABYTE - 1));
        let deps = deps_with(reader, &log, Arc::new(RecordingSink::default()));
        deps.registry.register(logging_cleaner("pages", &log));

        let outcome = check_memory_pressure(10, &deps, &MonitorStats::default());

        assert!(matches!(outcome, CycleOutcome::BelowThreshold { used_mb: 10 }));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_usage_one_above_threshold_clears() {
        let log = EventLog::default();
        let reader = Arc::new(FixedReader::new(11 * BYTES_PER_MEGABYTE));
        let deps = deps_with(reader, &log, Arc::new(RecordingSink::default()));
        deps.registry.register(logging_cleaner("pages", &log));

        let stats = MonitorStats::default();
        let outcome = check_memory_pressure(10, &deps, &stats);

        assert!(matches!(outcome, CycleOutcome::Evicted { used_mb: 11, .. }));
        assert_eq!(stats.snapshot().breaches, 1);
        assert_eq!(stats.snapshot().last_used_mb, 11);
    }

    #[test]
    fn test_breach_clears_each_provider_once_then_reclaims() {
        let log = EventLog::default();
        let reader = Arc::new(FixedReader::new(512 * BYTES_PER_MEGABYTE));
        let deps = deps_with(reader, &log, Arc::new(RecordingSink::default()));
        for name in ["templates", "sessions", "pages"] {
            deps.registry.register(logging_cleaner(name, &log));
        }

        check_memory_pressure(100, &deps, &MonitorStats::default());

        let events = log.lock().unwrap().clone();
        assert_eq!(events.len(), 4);
        assert_eq!(events.last().map(String::as_str), Some("reclaim"));
        for name in ["templates", "sessions", "pages"] {
            assert_eq!(events.iter().filter(|e| *e == name).count(), 1);
        }
    }

    #[test]
    fn test_failing_provider_reports_once_and_others_still_clear() {
        let log = EventLog::default();
        let sink = Arc::new(RecordingSink::default());
        let reader = Arc::new(FixedReader::new(2 * BYTES_PER_MEGABYTE));
        let deps = deps_with(reader, &log, sink.clone());
        deps.registry.register(Arc::new(FnCleaner::new("broken", || {
            anyhow::bail!("redis connection refused")
        })));
        deps.registry.register(logging_cleaner("pages", &log));

        let stats = MonitorStats::default();
        let outcome = check_memory_pressure(1, &deps, &stats);

        let reports = sink.reports();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].contains("broken"));
        assert!(reports[0].contains("redis connection refused"));
        assert_eq!(*log.lock().unwrap(), vec!["pages", "reclaim"]);
        assert_eq!(stats.snapshot().clear_failures, 1);
        match outcome {
            CycleOutcome::Evicted { report, .. } => {
                assert_eq!(report.cleared, 1);
                assert_eq!(report.failures.len(), 1);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_failed_sample_reports_and_skips_providers() {
        let log = EventLog::default();
        let sink = Arc::new(RecordingSink::default());
        let deps = deps_with(Arc::new(FailingReader), &log, sink.clone());
        deps.registry.register(logging_cleaner("pages", &log));

        let stats = MonitorStats::default();
        let outcome = check_memory_pressure(0, &deps, &stats);

        assert!(matches!(outcome, CycleOutcome::SampleFailed));
        assert_eq!(sink.reports().len(), 1);
        assert!(sink.reports()[0].contains("proc unavailable"));
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(stats.snapshot().failed_samples, 1);
    }

    #[test]
    fn test_panicking_sink_is_swallowed() {
        let log = EventLog::default();
        let deps = deps_with(Arc::new(FailingReader), &log, Arc::new(PanickingSink));

        let outcome = check_memory_pressure(0, &deps, &MonitorStats::default());

        assert!(matches!(outcome, CycleOutcome::SampleFailed));
    }

    #[test]
    fn test_empty_registry_still_reclaims() {
        let log = EventLog::default();
        let reader = Arc::new(FixedReader::new(5 * BYTES_PER_MEGABYTE));
        let deps = deps_with(reader, &log, Arc::new(RecordingSink::default()));

        check_memory_pressure(1, &deps, &MonitorStats::default());

        assert_eq!(*log.lock().unwrap(), vec!["reclaim"]);
    }

    #[test]
    fn test_negative_threshold_clears_at_zero_usage() {
        let log = EventLog::default();
        let deps = deps_with(
            Arc::new(FixedReader::new(0)),
            &log,
            Arc::new(RecordingSink::default()),
        );
        deps.registry.register(logging_cleaner("pages", &log));

        let outcome = check_memory_pressure(-1, &deps, &MonitorStats::default());

        assert!(matches!(outcome, CycleOutcome::Evicted { used_mb: 0, .. }));
        assert_eq!(*log.lock().unwrap(), vec!["pages", "reclaim"]);
    }

    #[test]
    fn test_exceeds_handles_extremes() {
        assert!(exceeds(0, -1));
        assert!(!exceeds(0, 0));
        assert!(exceeds(u64::MAX, i64::MAX));
        assert!(!exceeds(i64::MAX as u64, i64::MAX));
    }

    #[test]
    fn test_default_deps_read_this_process() {
        let registry = Arc::new(CleanerRegistry::new());
        let deps = MonitorDeps::with_defaults(registry.clone()).unwrap();

        assert!(Arc::ptr_eq(&deps.registry, &registry));
        assert!(deps.memory.used_memory_bytes().unwrap() > 0);
    }

    // == Shutdown Signal ==
    #[test]
    fn test_signal_times_out_when_not_triggered() {
        let signal = ShutdownSignal::new();
        let started = Instant::now();
        assert!(!signal.wait_timeout(Duration::from_millis(30)));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_signal_wakes_waiter() {
        let signal = ShutdownSignal::new();
        let waiter = signal.clone();
        let handle = thread::spawn(move || waiter.wait_timeout(Duration::from_secs(30)));

        thread::sleep(Duration::from_millis(20));
        signal.trigger();

        assert!(handle.join().unwrap());
        assert!(signal.is_triggered());
    }

    // == Worker ==
    #[test]
    fn test_disabled_monitor_never_reads_memory() {
        let reader = Arc::new(FixedReader::new(u64::MAX));
        let log = EventLog::default();
        let deps = deps_with(reader.clone(), &log, Arc::new(RecordingSink::default()));
        deps.registry.register(logging_cleaner("pages", &log));
        let config = CleanerConfig {
            threshold_mb: None,
            interval: Duration::from_millis(5),
        };

        let handle = start_pressure_monitor(&config, deps).unwrap();
        thread::sleep(Duration::from_millis(50));

        assert!(handle.is_none());
        assert_eq!(reader.reads.load(Ordering::SeqCst), 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_worker_survives_many_failing_cycles() {
        let sink = Arc::new(RecordingSink::default());
        let deps = MonitorDeps {
            registry: Arc::new(CleanerRegistry::new()),
            memory: Arc::new(FixedReader::new(64 * BYTES_PER_MEGABYTE)),
            reclaimer: Arc::new(NoopReclaimer),
            sink: sink.clone(),
        };
        deps.registry.register(Arc::new(FnCleaner::new("always-broken", || {
            anyhow::bail!("nope")
        })));
        let config = CleanerConfig {
            threshold_mb: Some(1),
            interval: Duration::from_millis(1),
        };

        let handle = start_pressure_monitor(&config, deps).unwrap().unwrap();

        assert!(wait_until(Duration::from_secs(20), || handle.stats().cycles >= 120));
        assert!(!handle.is_finished());

        handle.shutdown().unwrap();
        assert!(sink.reports().len() >= 120);
    }

    #[test]
    fn test_negative_threshold_worker_clears_on_first_cycle() {
        let reader = Arc::new(FixedReader::new(0));
        let log = EventLog::default();
        let deps = deps_with(reader, &log, Arc::new(RecordingSink::default()));
        deps.registry.register(logging_cleaner("pages", &log));
        let config = CleanerConfig::from_extra(&serde_json::json!({
            "ClearCacheAfterUsedMemoryMoreThan": -1,
            "CleanCacheCheckInterval": 1
        }));
        let config = CleanerConfig {
            interval: Duration::from_millis(5),
            ..config
        };

        let handle = start_pressure_monitor(&config, deps).unwrap().unwrap();
        assert!(wait_until(Duration::from_secs(5), || handle.stats().breaches >= 1));
        handle.shutdown().unwrap();

        let events = log.lock().unwrap().clone();
        assert_eq!(&events[..2], ["pages", "reclaim"]);
    }

    #[test]
    fn test_stop_interrupts_long_interval() {
        let deps = MonitorDeps {
            registry: Arc::new(CleanerRegistry::new()),
            memory: Arc::new(FixedReader::new(0)),
            reclaimer: Arc::new(NoopReclaimer),
            sink: Arc::new(RecordingSink::default()),
        };
        let config = CleanerConfig::new(Some(1), None);

        let handle = start_pressure_monitor(&config, deps).unwrap().unwrap();
        let started = Instant::now();
        handle.shutdown().unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_dropping_handle_keeps_worker_running() {
        let reader = Arc::new(FixedReader::new(0));
        let deps = MonitorDeps {
            registry: Arc::new(CleanerRegistry::new()),
            memory: reader.clone(),
            reclaimer: Arc::new(NoopReclaimer),
            sink: Arc::new(RecordingSink::default()),
        };
        let config = CleanerConfig {
            threshold_mb: Some(1),
            interval: Duration::from_millis(2),
        };

        let handle = start_pressure_monitor(&config, deps).unwrap().unwrap();
        drop(handle);

        let seen = reader.reads.load(Ordering::SeqCst);
        assert!(wait_until(Duration::from_secs(5), || {
            reader.reads.load(Ordering::SeqCst) > seen + 3
        }));
    }
}
