//! API Handlers
//!
//! HTTP request handlers for the admin endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::info;

use crate::cache::{CacheCleaner, CleanerRegistry, MemoryCache};
use crate::config::{CleanerConfig, Config};
use crate::error::{CleanerError, Result};
use crate::models::{
    CacheStatsResponse, ClearResponse, DeleteResponse, GetResponse, HealthResponse, MemoryResponse,
    MonitorStatusResponse, ProvidersResponse, SetRequest, SetResponse,
};
use crate::system::{AllocatorTrim, MemoryReader, ProcessMemoryReader, Reclaimer};
use crate::tasks::MonitorStats;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Providers cleared under memory pressure
    pub registry: Arc<CleanerRegistry>,
    /// Demo cache, also registered in `registry`
    pub cache: Arc<MemoryCache>,
    pub memory: Arc<dyn MemoryReader>,
    pub reclaimer: Arc<dyn Reclaimer>,
    pub cleaner: CleanerConfig,
    /// Counters of the running monitor, if one was started
    pub monitor: Option<Arc<MonitorStats>>,
}

impl AppState {
    /// Creates a new AppState around the given demo cache.
    ///
    /// The cache is registered as a provider in a fresh registry.
    pub fn new(cache: MemoryCache, memory: Arc<dyn MemoryReader>) -> Self {
        let cache = Arc::new(cache);
        let registry = Arc::new(CleanerRegistry::new());
        registry.register(cache.clone());

        Self {
            registry,
            cache,
            memory,
            reclaimer: Arc::new(AllocatorTrim),
            cleaner: CleanerConfig::default(),
            monitor: None,
        }
    }

    /// Creates a new AppState from configuration, reading real process memory.
    pub fn from_config(config: &Config) -> Result<Self> {
        let cache = MemoryCache::new("demo", config.max_entries, config.default_ttl);
        let memory = Arc::new(ProcessMemoryReader::new()?);
        Ok(Self::new(cache, memory).with_cleaner_config(config.cleaner.clone()))
    }

    pub fn with_cleaner_config(mut self, cleaner: CleanerConfig) -> Self {
        self.cleaner = cleaner;
        self
    }

    pub fn with_reclaimer(mut self, reclaimer: Arc<dyn Reclaimer>) -> Self {
        self.reclaimer = reclaimer;
        self
    }

    pub fn with_monitor(mut self, stats: Arc<MonitorStats>) -> Self {
        self.monitor = Some(stats);
        self
    }
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Handler for GET /stats
///
/// Reports the cleaner configuration and the monitor counters.
pub async fn stats_handler(State(state): State<AppState>) -> Json<MonitorStatusResponse> {
    let counters = state.monitor.as_ref().map(|stats| stats.snapshot());
    Json(MonitorStatusResponse::new(
        &state.cleaner,
        counters,
        state.registry.len(),
    ))
}

/// Handler for GET /stats/cache
pub async fn cache_stats_handler(State(state): State<AppState>) -> Json<CacheStatsResponse> {
    Json(CacheStatsResponse::new(state.cache.name(), state.cache.stats()))
}

/// Handler for GET /memory
///
/// Sampling refreshes process info and may wait on the reader's lock, so it
/// runs on the blocking pool.
pub async fn memory_handler(State(state): State<AppState>) -> Result<Json<MemoryResponse>> {
    let memory = state.memory.clone();
    let used = tokio::task::spawn_blocking(move || memory.used_memory_bytes())
        .await
        .map_err(|e| CleanerError::Internal(format!("memory task failed: {}", e)))??;
    Ok(Json(MemoryResponse::new(used)))
}

/// Handler for GET /providers
pub async fn providers_handler(State(state): State<AppState>) -> Json<ProvidersResponse> {
    Json(ProvidersResponse::new(state.registry.names()))
}

/// Handler for POST /clear
///
/// Clears every provider and reclaims memory right away, regardless of the
/// threshold. Provider calls may block, so they run on the blocking pool.
pub async fn clear_handler(State(state): State<AppState>) -> Result<Json<ClearResponse>> {
    let registry = state.registry.clone();
    let reclaimer = state.reclaimer.clone();

    let report = tokio::task::spawn_blocking(move || {
        let report = registry.clear_all();
        reclaimer.reclaim();
        report
    })
    .await
    .map_err(|e| CleanerError::Internal(format!("clear task failed: {}", e)))?;

    info!(
        "Manual clear: {} cleared, {} failed",
        report.cleared,
        report.failures.len()
    );
    Ok(Json(report.into()))
}

/// Handler for PUT /cache
pub async fn set_cache_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    state.cache.set(req.key.clone(), req.value, req.ttl)?;
    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /cache/:key
pub async fn get_cache_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    let value = state.cache.get(&key)?;
    Ok(Json(GetResponse::new(key, value)))
}

/// Handler for DELETE /cache/:key
pub async fn delete_cache_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    state.cache.delete(&key)?;
    Ok(Json(DeleteResponse::new(key)))
}
