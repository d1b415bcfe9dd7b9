//! API Routes
//!
//! Configures the Axum router with all service endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    cache_status_handler, create_handler, delete_handler, health_handler, read_handler,
    stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `POST /create` - Write a key-value pair through to the store
/// - `GET /read?key=` - Read a value, cache first
/// - `DELETE /delete?key=` - Delete a key from store and cache
/// - `GET /cache-status` - Cache contents, most recently used first
/// - `GET /stats` - Cache, pool and request statistics
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/create", post(create_handler))
        .route("/read", get(read_handler))
        .route("/delete", delete(delete_handler))
        .route("/cache-status", get(cache_status_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
