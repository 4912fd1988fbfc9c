//! Idempotency Module
//!
//! Tenant-scoped idempotency records: expiration, persistence, and the
//! store / retrieve / invalidate contract.

mod engine;
mod record;


pub use engine::IdempotencyEngine;
pub use record::{record_key, IdempotencyRecord};

// == Public Constants ==
/// Maximum allowed idempotency key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum allowed response payload size in bytes.
///
/// Over HTTP, axum's default 2 MB body limit rejects much larger requests
/// first; this bound applies to every caller of the engine, including
/// library users.
pub const MAX_RESPONSE_SIZE: usize = 1024 * 1024; // 1 MB
