//! Request and Response models for the key-value service API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! deserializing request parameters and serializing response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{KeyParams, KeyValueParams};
pub use responses::{CreateResponse, DeleteResponse, HealthResponse, ReadResponse, StatsResponse};
