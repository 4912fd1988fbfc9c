//! Idempotency Record Module
//!
//! The persisted record shape and the tenant-scoped key it lives under.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

// == Idempotency Record ==
/// The recorded outcome of one (tenant, idempotency key) operation.
///
/// Persisted as JSON `{status, http_status, response, expires_at}`. The
/// `response` payload is kept as raw JSON text so it is replayed exactly as
/// it was submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    /// Free-form outcome label, e.g. "completed" or "in-progress"
    pub status: String,
    /// Outcome code the caller wants replayed
    pub http_status: i32,
    /// Opaque response payload
    pub response: Box<RawValue>,
    /// Expiration time (Unix seconds)
    pub expires_at: i64,
}

impl IdempotencyRecord {
    /// Whether the record has reached its expiration at `now` (Unix seconds).
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}

impl PartialEq for IdempotencyRecord {
    fn eq(&self, other: &Self) -> bool {
        self.status == other.status
            && self.http_status == other.http_status
            && self.response.get() == other.response.get()
            && self.expires_at == other.expires_at
    }
}

// == Key Naming ==
/// Store key for `idempotency_key` inside `tenant_id`'s namespace.
///
/// Tenant ids cannot contain `:`, so the first `:` always ends the tenant
/// part and distinct (tenant, key) pairs never share a store key.
pub fn record_key(tenant_id: &str, idempotency_key: &str) -> String {
    format!("{}:idempotency:{}", tenant_id, idempotency_key)
}
