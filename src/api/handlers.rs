//! API Handlers
//!
//! HTTP request handlers translating requests into tenant registry and
//! idempotency engine calls.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};

use crate::config::Config;
use crate::error::{IdempotencyError, Result};
use crate::idempotency::{IdempotencyEngine, IdempotencyRecord};
use crate::models::{
    DeleteResponse, HealthResponse, RegisterTenantRequest, StoreRequest, StoreResponse,
    TenantCreatedResponse,
};
use crate::store::KeyStore;
use crate::tenants::Tenant;

/// Application state shared across all handlers.
///
/// Holds the engine, which owns the shared store handle and the tenant
/// registry. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub engine: IdempotencyEngine,
}

impl AppState {
    /// Creates a new AppState over the given store.
    pub fn new(store: Arc<dyn KeyStore>, operation_timeout: Duration) -> Self {
        Self {
            engine: IdempotencyEngine::new(store, operation_timeout),
        }
    }

    /// Creates a new AppState using the timeout from configuration.
    pub fn from_config(config: &Config, store: Arc<dyn KeyStore>) -> Self {
        Self::new(store, config.operation_timeout())
    }
}

/// Handler for POST /tenants
///
/// Registers (or re-registers) a tenant.
pub async fn register_tenant_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RegisterTenantRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TenantCreatedResponse>)> {
    let Json(req) = payload?;
    if let Some(error_msg) = req.validate() {
        return Err(IdempotencyError::InvalidArgument(error_msg));
    }

    let tenant = state
        .engine
        .tenants()
        .register(&req.tenant_id, &req.name)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(TenantCreatedResponse::new(tenant)),
    ))
}

/// Handler for GET /tenants/:tenant_id
pub async fn get_tenant_handler(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> Result<Json<Tenant>> {
    match state.engine.tenants().get(&tenant_id).await? {
        Some(tenant) => Ok(Json(tenant)),
        None => Err(IdempotencyError::TenantNotFound(tenant_id)),
    }
}

/// Handler for POST /idempotencies
///
/// Stores an idempotency record, replacing any previous one for the key.
pub async fn store_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<StoreRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<StoreResponse>)> {
    let Json(req) = payload?;
    if let Some(error_msg) = req.validate() {
        return Err(IdempotencyError::InvalidArgument(error_msg));
    }

    let record = state
        .engine
        .store(
            &req.tenant_id,
            &req.idempotency_key,
            &req.status,
            req.http_status,
            req.response,
            req.ttl_seconds,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(StoreResponse::new(record))))
}

/// Handler for GET /idempotencies/:tenant_id/:idempotency_key
pub async fn retrieve_handler(
    State(state): State<AppState>,
    Path((tenant_id, idempotency_key)): Path<(String, String)>,
) -> Result<Json<IdempotencyRecord>> {
    let record = state
        .engine
        .retrieve(&tenant_id, &idempotency_key)
        .await?;

    Ok(Json(record))
}

/// Handler for DELETE /idempotencies/:tenant_id/:idempotency_key
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Path((tenant_id, idempotency_key)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>> {
    state
        .engine
        .invalidate(&tenant_id, &idempotency_key)
        .await?;

    Ok(Json(DeleteResponse::new(tenant_id, idempotency_key)))
}

/// Handler for GET /health-check
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::alive())
}
