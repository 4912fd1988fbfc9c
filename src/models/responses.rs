//! Response DTOs for the idempotency API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::idempotency::IdempotencyRecord;
use crate::tenants::Tenant;

/// Response body for tenant registration (POST /tenants)
#[derive(Debug, Clone, Serialize)]
pub struct TenantCreatedResponse {
    /// Success message
    pub message: String,
    /// The registered tenant
    pub tenant: Tenant,
}

impl TenantCreatedResponse {
    /// Creates a new TenantCreatedResponse
    pub fn new(tenant: Tenant) -> Self {
        Self {
            message: "Tenant created successfully".to_string(),
            tenant,
        }
    }
}

/// Response body for storing a record (POST /idempotencies)
#[derive(Debug, Clone, Serialize)]
pub struct StoreResponse {
    /// Success message
    pub message: String,
    /// The record as persisted, including its computed `expires_at`
    pub record: IdempotencyRecord,
}

impl StoreResponse {
    /// Creates a new StoreResponse
    pub fn new(record: IdempotencyRecord) -> Self {
        Self {
            message: "Idempotency key stored".to_string(),
            record,
        }
    }
}

/// Response body for invalidation (DELETE /idempotencies/:tenant_id/:idempotency_key)
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub message: String,
    pub tenant_id: String,
    pub idempotency_key: String,
}

impl DeleteResponse {
    /// Creates a new DeleteResponse
    pub fn new(tenant_id: impl Into<String>, idempotency_key: impl Into<String>) -> Self {
        Self {
            message: "Idempotency key deleted".to_string(),
            tenant_id: tenant_id.into(),
            idempotency_key: idempotency_key.into(),
        }
    }
}

/// Response body for the liveness check (GET /health-check)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always "alive"
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn alive() -> Self {
        Self {
            status: "alive".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Machine-readable error kind, e.g. "record_not_found"
    pub kind: String,
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(kind: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            error: error.into(),
        }
    }
}
