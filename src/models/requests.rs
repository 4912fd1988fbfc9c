//! Request DTOs for the idempotency API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;
use serde_json::value::RawValue;

/// Request body for tenant registration (POST /tenants)
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterTenantRequest {
    pub tenant_id: String,
    pub name: String,
}

impl RegisterTenantRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.tenant_id.is_empty() {
            return Some("tenant_id cannot be empty".to_string());
        }
        None
    }
}

/// Request body for storing an idempotency record (POST /idempotencies)
///
/// # Fields
/// - `tenant_id`: Registered tenant owning the key
/// - `idempotency_key`: Caller-supplied key, unique within the tenant
/// - `ttl_seconds`: Validity window, must be positive
/// - `status`: Free-form outcome label
/// - `http_status`: Outcome code to replay
/// - `response`: Opaque JSON payload, replayed verbatim
#[derive(Debug, Deserialize)]
pub struct StoreRequest {
    pub tenant_id: String,
    pub idempotency_key: String,
    pub ttl_seconds: i64,
    pub status: String,
    pub http_status: i32,
    pub response: Box<RawValue>,
}

impl StoreRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.tenant_id.is_empty() {
            return Some("tenant_id cannot be empty".to_string());
        }
        if self.idempotency_key.is_empty() {
            return Some("idempotency_key cannot be empty".to_string());
        }
        if self.ttl_seconds <= 0 {
            return Some("ttl_seconds must be a positive integer".to_string());
        }
        None
    }
}
