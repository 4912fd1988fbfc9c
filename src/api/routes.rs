//! API Routes
//!
//! Configures the Axum router with all service endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    get_tenant_handler, health_handler, invalidate_handler, register_tenant_handler,
    retrieve_handler, store_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `POST /tenants` - Register a tenant
/// - `GET /tenants/:tenant_id` - Read a tenant
/// - `POST /idempotencies` - Store an idempotency record
/// - `GET /idempotencies/:tenant_id/:idempotency_key` - Retrieve a record
/// - `DELETE /idempotencies/:tenant_id/:idempotency_key` - Invalidate a record
/// - `GET /health-check` - Liveness check
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
        .route("/tenants", post(register_tenant_handler))
        .route("/tenants/:tenant_id", get(get_tenant_handler))
        .route("/idempotencies", post(store_handler))
        .route(
            "/idempotencies/:tenant_id/:idempotency_key",
            get(retrieve_handler).delete(invalidate_handler),
        )
        .route("/health-check", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
