//! Tenant Registry
//!
//! Registers tenants, answers existence checks, and assigns each tenant a
//! stable storage partition.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info};

use super::{
    is_valid_tenant_id, metadata_key, partition_key, validate_tenant_id, Partition, Tenant,
    TenantMetadata, PARTITION_SEQ_KEY,
};
use crate::error::{IdempotencyError, Result};
use crate::store::{with_deadline, KeyStore, StoreError};

// == Tenant Registry ==
/// Tenant metadata and partition assignment on top of a [`KeyStore`].
#[derive(Clone)]
pub struct TenantRegistry {
    store: Arc<dyn KeyStore>,
    timeout: Duration,
}

impl TenantRegistry {
    // == Constructor ==
    /// Creates a registry over `store`; every store call is bounded by `timeout`.
    pub fn new(store: Arc<dyn KeyStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    // == Register ==
    /// Creates or overwrites tenant metadata with `created_at` set to now.
    ///
    /// Re-registration is last-write-wins for `name` and `created_at`; the
    /// partition assigned on first registration is kept.
    pub async fn register(&self, tenant_id: &str, name: &str) -> Result<Tenant> {
        validate_tenant_id(tenant_id)?;

        let partition = self.resolve_partition(tenant_id).await?;
        let metadata = TenantMetadata {
            tenant_id: tenant_id.to_string(),
            name: name.to_string(),
            created_at: Utc::now().timestamp(),
        };
        let bytes = serde_json::to_vec(&metadata).map_err(|e| {
            IdempotencyError::InvalidArgument(format!("tenant metadata not encodable: {}", e))
        })?;

        with_deadline(
            self.timeout,
            self.store.set(&metadata_key(tenant_id), bytes, None),
        )
        .await?;

        info!(tenant_id, partition = partition.0, "Tenant registered");

        Ok(Tenant {
            tenant_id: metadata.tenant_id,
            name: metadata.name,
            created_at: metadata.created_at,
            partition,
        })
    }

    // == Exists ==
    /// Returns whether `tenant_id` is registered.
    ///
    /// A missing tenant is `Ok(false)`; store failures are errors.
    pub async fn exists(&self, tenant_id: &str) -> Result<bool> {
        if !is_valid_tenant_id(tenant_id) {
            return Ok(false);
        }
        let exists = with_deadline(self.timeout, self.store.exists(&metadata_key(tenant_id)))
            .await?;
        Ok(exists)
    }

    // == Get ==
    /// Reads a registered tenant, `None` if it was never registered.
    pub async fn get(&self, tenant_id: &str) -> Result<Option<Tenant>> {
        if !is_valid_tenant_id(tenant_id) {
            return Ok(None);
        }

        let key = metadata_key(tenant_id);
        let Some(bytes) = with_deadline(self.timeout, self.store.get(&key)).await? else {
            return Ok(None);
        };
        let metadata: TenantMetadata =
            serde_json::from_slice(&bytes).map_err(|e| IdempotencyError::StorageCorruption {
                key: key.clone(),
                reason: e.to_string(),
            })?;
        let partition = self.resolve_partition(tenant_id).await?;

        Ok(Some(Tenant {
            tenant_id: metadata.tenant_id,
            name: metadata.name,
            created_at: metadata.created_at,
            partition,
        }))
    }

    // == Resolve Partition ==
    /// Returns the partition of `tenant_id`, assigning the next free number
    /// on first sight.
    ///
    /// Numbers come from an atomic counter and are bound with a
    /// set-if-absent write, so concurrent first registrations of different
    /// tenants never share a number and a tenant never changes partition. A
    /// caller that loses the set-if-absent race adopts the winner's number.
    pub async fn resolve_partition(&self, tenant_id: &str) -> Result<Partition> {
        validate_tenant_id(tenant_id)?;

        let key = partition_key(tenant_id);
        if let Some(partition) = self.read_partition(&key).await? {
            return Ok(partition);
        }

        let seq = with_deadline(self.timeout, self.store.incr(PARTITION_SEQ_KEY)).await?;
        let candidate = seq
            .checked_sub(1)
            .and_then(|n| u32::try_from(n).ok())
            .map(Partition)
            .ok_or_else(|| IdempotencyError::StorageCorruption {
                key: PARTITION_SEQ_KEY.to_string(),
                reason: format!("partition counter out of range: {}", seq),
            })?;

        let claimed = with_deadline(
            self.timeout,
            self.store
                .set_if_absent(&key, candidate.0.to_string().into_bytes()),
        )
        .await?;
        if claimed {
            debug!(tenant_id, partition = candidate.0, "Partition assigned");
            return Ok(candidate);
        }

        self.read_partition(&key).await?.ok_or_else(|| {
            IdempotencyError::Storage(StoreError::Backend(format!(
                "partition mapping for '{}' disappeared during assignment",
                tenant_id
            )))
        })
    }

    async fn read_partition(&self, key: &str) -> Result<Option<Partition>> {
        let Some(bytes) = with_deadline(self.timeout, self.store.get(key)).await? else {
            return Ok(None);
        };
        std::str::from_utf8(&bytes)
            .ok()
            .and_then(|text| text.parse::<u32>().ok())
            .map(|n| Some(Partition(n)))
            .ok_or_else(|| IdempotencyError::StorageCorruption {
                key: key.to_string(),
                reason: "partition is not a number".to_string(),
            })
    }
}
