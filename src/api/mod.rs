//! API Module
//!
//! HTTP handlers and routing for the admin surface of the host.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /stats` - Cache pressure monitor status
//! - `GET /stats/cache` - Demo cache counters and hit rate
//! - `GET /memory` - Current process memory usage
//! - `GET /providers` - Registered cache providers
//! - `POST /clear` - Clear every provider now
//! - `PUT /cache` - Store a value in the demo cache
//! - `GET /cache/:key` - Read a value from the demo cache
//! - `DELETE /cache/:key` - Delete a value from the demo cache

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
