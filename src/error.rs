//! Error types for the key-value service
//!
//! Provides unified error handling using thiserror.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::pool::PoolError;
use crate::store::StoreError;

// == Service Error Enum ==
/// Unified error type for the key-value service.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    /// Key not found in cache or store
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The backing store rejected or failed the operation
    #[error("Store operation failed: {0}")]
    StoreFailure(String),

    /// No store connection became available in time
    #[error("No store connection available within {0:?}")]
    PoolTimeout(Duration),

    /// The pool has no connections left to serve with
    #[error("Connection pool unavailable: {0}")]
    PoolExhausted(String),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        ServiceError::StoreFailure(err.to_string())
    }
}

impl From<PoolError> for ServiceError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Timeout(d) => ServiceError::PoolTimeout(d),
            other => ServiceError::PoolExhausted(other.to_string()),
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::StoreFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::PoolTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::PoolExhausted(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the service.
pub type Result<T> = std::result::Result<T, ServiceError>;
