//! API Routes
//!
//! Configures the Axum router with all admin endpoints.

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    cache_stats_handler, clear_handler, delete_cache_handler, get_cache_handler, health_handler,
    memory_handler, providers_handler, set_cache_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/stats/cache", get(cache_stats_handler))
        .route("/memory", get(memory_handler))
        .route("/providers", get(providers_handler))
        .route("/clear", post(clear_handler))
        .route("/cache", put(set_cache_handler))
        .route(
            "/cache/:key",
            get(get_cache_handler).delete(delete_cache_handler),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
