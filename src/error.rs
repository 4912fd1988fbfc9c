//! Error types for the idempotency service
//!
//! Provides unified error handling using thiserror.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;
use crate::store::StoreError;

// == Idempotency Error Enum ==
/// Unified error type for tenant and idempotency operations.
#[derive(Error, Debug)]
pub enum IdempotencyError {
    /// The operation referenced a tenant that was never registered
    #[error("Tenant not found: {0}")]
    TenantNotFound(String),

    /// The idempotency key is absent, expired, or already deleted
    #[error("Idempotency key not found: {0}")]
    RecordNotFound(String),

    /// Malformed TTL, key, tenant id, or payload
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The backing store failed or could not be reached
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// A stored value could not be decoded
    #[error("Storage corruption at '{key}': {reason}")]
    StorageCorruption { key: String, reason: String },
}

impl IdempotencyError {
    /// Machine-readable kind reported in error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            IdempotencyError::TenantNotFound(_) => "tenant_not_found",
            IdempotencyError::RecordNotFound(_) => "record_not_found",
            IdempotencyError::InvalidArgument(_) => "invalid_argument",
            IdempotencyError::Storage(_) => "storage_error",
            IdempotencyError::StorageCorruption { .. } => "storage_corruption",
        }
    }

    /// HTTP status code this error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            IdempotencyError::TenantNotFound(_) | IdempotencyError::RecordNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            IdempotencyError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            IdempotencyError::Storage(_) | IdempotencyError::StorageCorruption { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

// Axum reports malformed JSON bodies as 400/415/422; all of them are invalid arguments here.
impl From<JsonRejection> for IdempotencyError {
    fn from(rejection: JsonRejection) -> Self {
        IdempotencyError::InvalidArgument(rejection.body_text())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for IdempotencyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), "{}", self);
        }

        let body = Json(ErrorResponse::new(self.kind(), self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the idempotency service.
pub type Result<T> = std::result::Result<T, IdempotencyError>;
