//! idemstore - A multi-tenant idempotency-key store
//!
//! Records the outcome of an operation per (tenant, idempotency key) with a
//! TTL, so retried requests can replay the outcome instead of re-executing.

pub mod api;
pub mod config;
pub mod error;
pub mod idempotency;
pub mod models;
pub mod store;
pub mod tasks;
pub mod tenants;

pub use api::AppState;
pub use config::Config;
pub use error::IdempotencyError;
pub use idempotency::{IdempotencyEngine, IdempotencyRecord};
pub use tasks::spawn_cleanup_task;
pub use tenants::TenantRegistry;
