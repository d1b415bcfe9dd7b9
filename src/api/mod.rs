//! API Module
//!
//! HTTP handlers and routing for the key-value service.
//!
//! # Endpoints
//! - `POST /create` - Store a key-value pair
//! - `GET /read?key=` - Retrieve a value by key
//! - `DELETE /delete?key=` - Delete a key
//! - `GET /cache-status` - Inspect the cache
//! - `GET /stats` - Cache, pool and request statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
