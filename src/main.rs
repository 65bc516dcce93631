//! Cache Pressure - memory-driven cache cleaning
//!
//! Host binary: serves the admin API and runs the cache pressure monitor.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cache_pressure::api::create_router;
use cache_pressure::{start_pressure_monitor, AppState, Config, MonitorDeps, MonitorHandle};

/// Main entry point for the cache pressure host.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables (and website config)
/// 3. Create the demo cache and the provider registry
/// 4. Start the cache pressure monitor if a threshold is configured
/// 5. Serve the admin API on the configured port
/// 6. On SIGINT/SIGTERM, stop the monitor and shut down gracefully
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cache_pressure=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting cache pressure host");

    let config = Config::from_env().context("loading configuration")?;
    info!(
        "Configuration loaded: threshold_mb={:?}, interval={}ms, port={}, max_entries={}",
        config.cleaner.threshold_mb,
        config.cleaner.interval.as_millis(),
        config.server_port,
        config.max_entries
    );

    let mut state = AppState::from_config(&config).context("initializing application state")?;

    // The worker gets its own sysinfo reader so /memory never waits on it.
    let deps = MonitorDeps::with_defaults(state.registry.clone())
        .context("initializing monitor dependencies")?;
    let monitor = start_pressure_monitor(&config.cleaner, deps)
        .context("starting cache pressure monitor")?;
    if let Some(handle) = &monitor {
        state = state.with_monitor(handle.shared_stats());
    }

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(monitor))
        .await
        .context("serving admin API")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then stops the monitor.
async fn shutdown_signal(monitor: Option<MonitorHandle>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    if let Some(handle) = monitor {
        // Joining may wait for a check in progress; keep it off the runtime.
        match tokio::task::spawn_blocking(move || handle.shutdown()).await {
            Ok(Ok(())) => info!("Cache pressure monitor stopped"),
            Ok(Err(e)) => warn!("Cache pressure monitor ended abnormally: {}", e),
            Err(e) => warn!("Failed to stop cache pressure monitor: {}", e),
        }
    }
}
