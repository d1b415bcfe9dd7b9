//! API Handlers
//!
//! HTTP request handlers for each endpoint. Handlers only parse and validate
//! parameters; all cache and store work goes through the [`Coordinator`].

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Form, Json,
};

use crate::cache::{CacheSnapshot, LruCache};
use crate::config::Config;
use crate::coordinator::{Coordinator, ReadOutcome};
use crate::error::{Result, ServiceError};
use crate::metrics::ServiceMetrics;
use crate::models::{
    CreateResponse, DeleteResponse, HealthResponse, KeyParams, KeyValueParams, ReadResponse,
    StatsResponse,
};
use crate::pool::{ConnectionPool, PoolError};
use crate::store::ConnectionSource;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Coordinator,
}

impl AppState {
    pub fn new(coordinator: Coordinator) -> Self {
        Self { coordinator }
    }

    /// Opens the connection pool on `source` and wires up a fresh cache and
    /// metrics registry from the configuration.
    pub async fn connect<S>(source: S, config: &Config) -> std::result::Result<Self, PoolError>
    where
        S: ConnectionSource + 'static,
    {
        let pool = ConnectionPool::connect(source, config.pool_config()).await?;
        let coordinator = Coordinator::new(
            Arc::new(LruCache::new(config.cache_capacity)),
            pool,
            config.coordinator_config(),
            Arc::new(ServiceMetrics::new()),
        );
        Ok(Self::new(coordinator))
    }
}

/// Handler for POST /create
///
/// Accepts `key` and `value` from an urlencoded body or the query string.
pub async fn create_handler(
    State(state): State<AppState>,
    Query(query): Query<KeyValueParams>,
    form: Option<Form<KeyValueParams>>,
) -> Result<Json<CreateResponse>> {
    let params = match form {
        Some(Form(form)) => form.or(query),
        None => query,
    };
    let (key, value) = params.validate()?;

    state.coordinator.create(&key, &value).await?;
    Ok(Json(CreateResponse::new(key)))
}

/// Handler for GET /read
pub async fn read_handler(
    State(state): State<AppState>,
    Query(params): Query<KeyParams>,
) -> Result<Json<ReadResponse>> {
    let key = params.validate()?;

    match state.coordinator.read(&key).await? {
        ReadOutcome::Found { value, source } => Ok(Json(ReadResponse::new(key, value, source))),
        ReadOutcome::NotFound => Err(ServiceError::NotFound(key)),
    }
}

/// Handler for DELETE /delete
///
/// Deleting an absent key succeeds.
pub async fn delete_handler(
    State(state): State<AppState>,
    Query(params): Query<KeyParams>,
) -> Result<Json<DeleteResponse>> {
    let key = params.validate()?;

    state.coordinator.delete(&key).await?;
    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for GET /cache-status
pub async fn cache_status_handler(State(state): State<AppState>) -> Json<CacheSnapshot> {
    Json(state.coordinator.cache_status())
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let coordinator = &state.coordinator;
    Json(StatsResponse::new(
        coordinator.cache().stats(),
        coordinator.pool().status(),
        coordinator.metrics().snapshot(),
    ))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let pool = state.coordinator.pool().status();
    Json(HealthResponse::new(pool.open < pool.configured))
}
