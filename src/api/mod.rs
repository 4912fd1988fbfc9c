//! API Module
//!
//! HTTP handlers and routing for the idempotency service REST API.
//!
//! # Endpoints
//! - `POST /tenants` - Register a tenant
//! - `GET /tenants/:tenant_id` - Read a tenant
//! - `POST /idempotencies` - Store an idempotency record
//! - `GET /idempotencies/:tenant_id/:idempotency_key` - Retrieve a record
//! - `DELETE /idempotencies/:tenant_id/:idempotency_key` - Invalidate a record
//! - `GET /health-check` - Liveness check

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
