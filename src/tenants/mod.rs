//! Tenants Module
//!
//! Tenant metadata, tenant id validation, and the registry that gates every
//! idempotency operation.

mod registry;

use serde::{Deserialize, Serialize};

use crate::error::{IdempotencyError, Result};

pub use registry::TenantRegistry;

// == Public Constants ==
/// Maximum allowed tenant id length in bytes
pub const MAX_TENANT_ID_LENGTH: usize = 128;

/// Counter key used to hand out partition numbers
pub const PARTITION_SEQ_KEY: &str = "tenant_partition_seq";

// == Tenant ==
/// A registered tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub tenant_id: String,
    pub name: String,
    /// Registration time (Unix seconds)
    pub created_at: i64,
    /// Storage partition assigned on first sight; never changes
    pub partition: Partition,
}

/// Storage partition number. Assigned sequentially from 0 in first-seen order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Partition(pub u32);

/// Tenant metadata as persisted under `tenant:{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TenantMetadata {
    tenant_id: String,
    name: String,
    created_at: i64,
}

// == Key Naming ==
pub(crate) fn metadata_key(tenant_id: &str) -> String {
    format!("tenant:{}", tenant_id)
}

pub(crate) fn partition_key(tenant_id: &str) -> String {
    format!("tenant_partition:{}", tenant_id)
}

/// Checks whether `tenant_id` is usable as a namespace prefix.
///
/// Ids are limited to `[A-Za-z0-9_.-]`. Keeping `:` out is what makes
/// `{tenant}:idempotency:{key}` unambiguous for every (tenant, key) pair.
pub fn is_valid_tenant_id(tenant_id: &str) -> bool {
    !tenant_id.is_empty()
        && tenant_id.len() <= MAX_TENANT_ID_LENGTH
        && tenant_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'))
}

pub(crate) fn validate_tenant_id(tenant_id: &str) -> Result<()> {
    if is_valid_tenant_id(tenant_id) {
        Ok(())
    } else {
        Err(IdempotencyError::InvalidArgument(format!(
            "tenant_id must be 1-{} characters of [A-Za-z0-9_.-]",
            MAX_TENANT_ID_LENGTH
        )))
    }
}
