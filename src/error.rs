//! Error types for the cache cleaner
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cleaner Error Enum ==
/// Unified error type for the cache cleaner and its admin surface.
#[derive(Error, Debug)]
pub enum CleanerError {
    /// A cache provider failed to clear its contents
    #[error("Cache provider '{provider}' failed to clear: {reason}")]
    ClearFailed { provider: String, reason: String },

    /// Process memory usage could not be sampled
    #[error("Memory read failed: {0}")]
    MemoryRead(String),

    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Key has expired
    #[error("Key expired: {0}")]
    Expired(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CleanerError {
    fn into_response(self) -> Response {
        let status = match &self {
            CleanerError::NotFound(_) | CleanerError::Expired(_) => StatusCode::NOT_FOUND,
            CleanerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CleanerError::ClearFailed { .. }
            | CleanerError::MemoryRead(_)
            | CleanerError::Config(_)
            | CleanerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache cleaner.
pub type Result<T> = std::result::Result<T, CleanerError>;

// == Panic Payload ==
/// Extracts a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
