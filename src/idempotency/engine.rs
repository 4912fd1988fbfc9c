//! Idempotency Engine
//!
//! Stores, retrieves, and invalidates idempotency records inside a tenant's
//! namespace. The engine holds no state of its own beyond the store handle;
//! atomicity comes from the store's single-key operations.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::value::RawValue;
use tracing::{debug, info};

use super::record::{record_key, IdempotencyRecord};
use super::{MAX_KEY_LENGTH, MAX_RESPONSE_SIZE};
use crate::error::{IdempotencyError, Result};
use crate::store::{with_deadline, KeyStore};
use crate::tenants::TenantRegistry;

// == Idempotency Engine ==
/// Tenant-scoped idempotency record operations.
///
/// Every operation checks, in order: argument shape (store only), tenant
/// existence, and (for invalidation) key existence.
#[derive(Clone)]
pub struct IdempotencyEngine {
    store: Arc<dyn KeyStore>,
    tenants: TenantRegistry,
    timeout: Duration,
}

impl IdempotencyEngine {
    // == Constructor ==
    /// Creates an engine and its tenant registry over a shared store handle.
    ///
    /// # Arguments
    /// * `store` - The backing key store
    /// * `timeout` - Deadline applied to each individual store call
    pub fn new(store: Arc<dyn KeyStore>, timeout: Duration) -> Self {
        let tenants = TenantRegistry::new(store.clone(), timeout);
        Self {
            store,
            tenants,
            timeout,
        }
    }

    /// The tenant registry gating this engine.
    pub fn tenants(&self) -> &TenantRegistry {
        &self.tenants
    }

    // == Store ==
    /// Records the outcome for (`tenant_id`, `key`), replacing any previous
    /// record and resetting its TTL.
    ///
    /// `expires_at` is now + `ttl_seconds`, rounded up to the next whole second,
    /// and the store's native TTL is set to `ttl_seconds`. The stored value is
    /// therefore gone no later than `expires_at`. Nothing is written when
    /// validation fails.
    pub async fn store(
        &self,
        tenant_id: &str,
        key: &str,
        status: &str,
        http_status: i32,
        response: Box<RawValue>,
        ttl_seconds: i64,
    ) -> Result<IdempotencyRecord> {
        validate_key(key)?;
        if ttl_seconds <= 0 {
            return Err(IdempotencyError::InvalidArgument(format!(
                "ttl_seconds must be a positive integer, got {}",
                ttl_seconds
            )));
        }
        if response.get().len() > MAX_RESPONSE_SIZE {
            return Err(IdempotencyError::InvalidArgument(format!(
                "response exceeds maximum size of {} bytes",
                MAX_RESPONSE_SIZE
            )));
        }
        self.require_tenant(tenant_id).await?;

        let expires_at = expiry_after(Utc::now().timestamp_millis(), ttl_seconds).ok_or_else(|| {
            IdempotencyError::InvalidArgument(format!("ttl_seconds too large: {}", ttl_seconds))
        })?;

        let record = IdempotencyRecord {
            status: status.to_string(),
            http_status,
            response,
            expires_at,
        };
        let bytes = serde_json::to_vec(&record).map_err(|e| {
            IdempotencyError::InvalidArgument(format!("record not encodable: {}", e))
        })?;

        let ttl = Duration::from_secs(ttl_seconds.unsigned_abs());
        with_deadline(
            self.timeout,
            self.store.set(&record_key(tenant_id, key), bytes, Some(ttl)),
        )
        .await?;

        info!(tenant_id, key, ttl_seconds, "Idempotency key stored");
        Ok(record)
    }

    // == Retrieve ==
    /// Returns the live record for (`tenant_id`, `key`).
    ///
    /// Absent and expired records are both `RecordNotFound`; a stored value
    /// that does not decode is `StorageCorruption`.
    pub async fn retrieve(&self, tenant_id: &str, key: &str) -> Result<IdempotencyRecord> {
        self.require_tenant(tenant_id).await?;

        let store_key = record_key(tenant_id, key);
        let Some(bytes) = with_deadline(self.timeout, self.store.get(&store_key)).await? else {
            debug!(tenant_id, key, "Idempotency key miss");
            return Err(not_found(tenant_id, key));
        };

        let record: IdempotencyRecord =
            serde_json::from_slice(&bytes).map_err(|e| IdempotencyError::StorageCorruption {
                key: store_key,
                reason: e.to_string(),
            })?;

        if record.is_expired_at(Utc::now().timestamp()) {
            debug!(tenant_id, key, "Idempotency key expired");
            return Err(not_found(tenant_id, key));
        }

        debug!(tenant_id, key, "Idempotency key hit");
        Ok(record)
    }

    // == Invalidate ==
    /// Deletes the record for (`tenant_id`, `key`).
    ///
    /// Fails with `RecordNotFound` when there is nothing to delete, so a
    /// repeated call is distinguishable from the one that removed it.
    pub async fn invalidate(&self, tenant_id: &str, key: &str) -> Result<()> {
        self.require_tenant(tenant_id).await?;

        let store_key = record_key(tenant_id, key);
        if !with_deadline(self.timeout, self.store.exists(&store_key)).await? {
            return Err(not_found(tenant_id, key));
        }

        // The key may expire between the check and the delete.
        if !with_deadline(self.timeout, self.store.delete(&store_key)).await? {
            return Err(not_found(tenant_id, key));
        }

        info!(tenant_id, key, "Idempotency key invalidated");
        Ok(())
    }

    async fn require_tenant(&self, tenant_id: &str) -> Result<()> {
        if self.tenants.exists(tenant_id).await? {
            Ok(())
        } else {
            Err(IdempotencyError::TenantNotFound(tenant_id.to_string()))
        }
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(IdempotencyError::InvalidArgument(
            "idempotency_key cannot be empty".to_string(),
        ));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(IdempotencyError::InvalidArgument(format!(
            "idempotency_key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}

/// Unix second at which a record written at `now_ms` with `ttl_seconds` expires.
fn expiry_after(now_ms: i64, ttl_seconds: i64) -> Option<i64> {
    let now_secs = now_ms.div_euclid(1000) + i64::from(now_ms.rem_euclid(1000) > 0);
    now_secs.checked_add(ttl_seconds)
}

fn not_found(tenant_id: &str, key: &str) -> IdempotencyError {
    IdempotencyError::RecordNotFound(format!("{}/{}", tenant_id, key))
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreError, StoreResult};
    use async_trait::async_trait;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn raw(json: &str) -> Box<RawValue> {
        RawValue::from_string(json.to_string()).unwrap()
    }

    async fn engine_with_tenant(tenant_id: &str) -> (IdempotencyEngine, MemoryStore) {
        let store = MemoryStore::new();
        let engine = IdempotencyEngine::new(Arc::new(store.clone()), TIMEOUT);
        engine.tenants().register(tenant_id, "Test").await.unwrap();
        (engine, store)
    }

    /// A store whose backend is always down.
    struct FailingStore;

    #[async_trait]
    impl KeyStore for FailingStore {
        async fn set(&self, _: &str, _: Vec<u8>, _: Option<Duration>) -> StoreResult<()> {
            Err(StoreError::Backend("connection refused".into()))
        }
        async fn get(&self, _: &str) -> StoreResult<Option<Vec<u8>>> {
            Err(StoreError::Backend("connection refused".into()))
        }
        async fn delete(&self, _: &str) -> StoreResult<bool> {
            Err(StoreError::Backend("connection refused".into()))
        }
        async fn exists(&self, _: &str) -> StoreResult<bool> {
            Err(StoreError::Backend("connection refused".into()))
        }
        async fn incr(&self, _: &str) -> StoreResult<i64> {
            Err(StoreError::Backend("connection refused".into()))
        }
        async fn set_if_absent(&self, _: &str, _: Vec<u8>) -> StoreResult<bool> {
            Err(StoreError::Backend("connection refused".into()))
        }
    }

    /// A store that never answers.
    struct HangingStore;

    #[async_trait]
    impl KeyStore for HangingStore {
        async fn set(&self, _: &str, _: Vec<u8>, _: Option<Duration>) -> StoreResult<()> {
            std::future::pending().await
        }
        async fn get(&self, _: &str) -> StoreResult<Option<Vec<u8>>> {
            std::future::pending().await
        }
        async fn delete(&self, _: &str) -> StoreResult<bool> {
            std::future::pending().await
        }
        async fn exists(&self, _: &str) -> StoreResult<bool> {
            std::future::pending().await
        }
        async fn incr(&self, _: &str) -> StoreResult<i64> {
            std::future::pending().await
        }
        async fn set_if_absent(&self, _: &str, _: Vec<u8>) -> StoreResult<bool> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_store_and_retrieve() {
        let (engine, _) = engine_with_tenant("acme").await;

        let before = Utc::now().timestamp();
        let stored = engine
            .store("acme", "order-42", "completed", 200, raw(r#"{"order_id":42}"#), 60)
            .await
            .unwrap();
        let after = Utc::now().timestamp();

        let record = engine.retrieve("acme", "order-42").await.unwrap();
        assert_eq!(record, stored);
        assert_eq!(record.status, "completed");
        assert_eq!(record.http_status, 200);
        assert_eq!(record.response.get(), r#"{"order_id":42}"#);
        assert!(record.expires_at >= before + 60);
        assert!(record.expires_at <= after + 61);
    }

    #[tokio::test]
    async fn test_store_writes_tenant_scoped_key() {
        let (engine, store) = engine_with_tenant("acme").await;

        engine
            .store("acme", "order-42", "completed", 200, raw("{}"), 60)
            .await
            .unwrap();

        assert!(store.exists("acme:idempotency:order-42").await.unwrap());
        assert!(!store.exists("idempotency:order-42").await.unwrap());
    }

    #[tokio::test]
    async fn test_store_unknown_tenant() {
        let (engine, store) = engine_with_tenant("acme").await;
        let entries_before = store.len().await;

        let result = engine
            .store("globex", "order-42", "completed", 200, raw("{}"), 60)
            .await;

        assert!(matches!(result, Err(IdempotencyError::TenantNotFound(_))));
        assert_eq!(store.len().await, entries_before);
    }

    #[tokio::test]
    async fn test_store_rejects_non_positive_ttl() {
        let (engine, _) = engine_with_tenant("acme").await;

        for ttl in [0, -1, i64::MIN] {
            let result = engine
                .store("acme", "order-42", "completed", 200, raw("{}"), ttl)
                .await;
            assert!(matches!(result, Err(IdempotencyError::InvalidArgument(_))));
        }

        let result = engine.retrieve("acme", "order-42").await;
        assert!(matches!(result, Err(IdempotencyError::RecordNotFound(_))));
    }

    #[tokio::test]
    async fn test_store_rejects_overflowing_ttl() {
        let (engine, _) = engine_with_tenant("acme").await;

        let result = engine
            .store("acme", "k", "completed", 200, raw("{}"), i64::MAX)
            .await;
        assert!(matches!(result, Err(IdempotencyError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_store_rejects_bad_keys() {
        let (engine, _) = engine_with_tenant("acme").await;

        let result = engine.store("acme", "", "completed", 200, raw("{}"), 60).await;
        assert!(matches!(result, Err(IdempotencyError::InvalidArgument(_))));

        let long_key = "k".repeat(MAX_KEY_LENGTH + 1);
        let result = engine
            .store("acme", &long_key, "completed", 200, raw("{}"), 60)
            .await;
        assert!(matches!(result, Err(IdempotencyError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_store_rejects_oversized_response() {
        let (engine, _) = engine_with_tenant("acme").await;

        let payload = format!("\"{}\"", "x".repeat(MAX_RESPONSE_SIZE));
        let result = engine
            .store("acme", "big", "completed", 200, raw(&payload), 60)
            .await;
        assert!(matches!(result, Err(IdempotencyError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_restore_replaces_record() {
        let (engine, _) = engine_with_tenant("acme").await;

        engine
            .store("acme", "k", "in-progress", 202, raw(r#"{"step":1,"extra":true}"#), 600)
            .await
            .unwrap();
        let second = engine
            .store("acme", "k", "completed", 200, raw(r#"{"step":2}"#), 30)
            .await
            .unwrap();

        let record = engine.retrieve("acme", "k").await.unwrap();
        assert_eq!(record, second);
        assert_eq!(record.response.get(), r#"{"step":2}"#);
        assert!(record.expires_at <= Utc::now().timestamp() + 31);
    }

    #[tokio::test]
    async fn test_retrieve_unknown_tenant_never_leaks() {
        let (engine, _) = engine_with_tenant("acme").await;
        engine
            .store("acme", "X", "completed", 200, raw(r#""acme-secret""#), 60)
            .await
            .unwrap();

        let result = engine.retrieve("globex", "X").await;
        assert!(matches!(result, Err(IdempotencyError::TenantNotFound(_))));
    }

    #[tokio::test]
    async fn test_same_key_isolated_between_tenants() {
        let (engine, _) = engine_with_tenant("acme").await;
        engine.tenants().register("globex", "Globex").await.unwrap();

        engine
            .store("acme", "X", "completed", 200, raw(r#""acme""#), 60)
            .await
            .unwrap();

        let result = engine.retrieve("globex", "X").await;
        assert!(matches!(result, Err(IdempotencyError::RecordNotFound(_))));

        engine
            .store("globex", "X", "failed", 500, raw(r#""globex""#), 60)
            .await
            .unwrap();

        assert_eq!(
            engine.retrieve("acme", "X").await.unwrap().response.get(),
            r#""acme""#
        );
        assert_eq!(
            engine.retrieve("globex", "X").await.unwrap().response.get(),
            r#""globex""#
        );
    }

    #[tokio::test]
    async fn test_retrieve_after_ttl_elapses() {
        let (engine, _) = engine_with_tenant("acme").await;

        engine
            .store("acme", "short", "completed", 200, raw("{}"), 1)
            .await
            .unwrap();
        assert!(engine.retrieve("acme", "short").await.is_ok());

        tokio::time::sleep(Duration::from_millis(1100)).await;

        let result = engine.retrieve("acme", "short").await;
        assert!(matches!(result, Err(IdempotencyError::RecordNotFound(_))));
    }

    #[tokio::test]
    async fn test_retrieve_refuses_expired_record_left_in_store() {
        let (engine, store) = engine_with_tenant("acme").await;

        // A backend that kept the value past its expiry.
        let stale = format!(
            r#"{{"status":"completed","http_status":200,"response":{{}},"expires_at":{}}}"#,
            Utc::now().timestamp() - 10
        );
        store
            .set("acme:idempotency:stale", stale.into_bytes(), None)
            .await
            .unwrap();

        let result = engine.retrieve("acme", "stale").await;
        assert!(matches!(result, Err(IdempotencyError::RecordNotFound(_))));
    }

    #[tokio::test]
    async fn test_retrieve_refuses_record_at_its_expiry_second() {
        let (engine, store) = engine_with_tenant("acme").await;

        let due = format!(
            r#"{{"status":"completed","http_status":200,"response":{{}},"expires_at":{}}}"#,
            Utc::now().timestamp()
        );
        store
            .set("acme:idempotency:due", due.into_bytes(), None)
            .await
            .unwrap();

        let result = engine.retrieve("acme", "due").await;
        assert!(matches!(result, Err(IdempotencyError::RecordNotFound(_))));
    }

    #[test]
    fn test_expiry_after_rounds_up() {
        assert_eq!(expiry_after(1_700_000_000_000, 1), Some(1_700_000_001));
        assert_eq!(expiry_after(1_700_000_000_001, 1), Some(1_700_000_002));
        assert_eq!(expiry_after(1_700_000_000_999, 60), Some(1_700_000_061));
        assert_eq!(expiry_after(1_700_000_000_000, i64::MAX), None);
    }

    #[tokio::test]
    async fn test_store_never_outlives_expires_at() {
        let (engine, store) = engine_with_tenant("acme").await;

        let stored = engine
            .store("acme", "short", "completed", 200, raw("{}"), 1)
            .await
            .unwrap();

        // The store drops the value by the time the expiry second begins.
        let deadline_ms = stored.expires_at * 1000;
        let wait_ms = deadline_ms - Utc::now().timestamp_millis();
        if wait_ms > 0 {
            tokio::time::sleep(Duration::from_millis(wait_ms.unsigned_abs())).await;
        }

        assert!(!store.exists("acme:idempotency:short").await.unwrap());
        let result = engine.retrieve("acme", "short").await;
        assert!(matches!(result, Err(IdempotencyError::RecordNotFound(_))));
    }

    #[tokio::test]
    async fn test_retrieve_corrupt_record() {
        let (engine, store) = engine_with_tenant("acme").await;
        store
            .set("acme:idempotency:broken", b"\x00\x01not-json".to_vec(), None)
            .await
            .unwrap();

        let result = engine.retrieve("acme", "broken").await;
        match result {
            Err(IdempotencyError::StorageCorruption { key, .. }) => {
                assert_eq!(key, "acme:idempotency:broken");
            }
            other => panic!("expected StorageCorruption, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_retrieve_record_with_wrong_shape() {
        let (engine, store) = engine_with_tenant("acme").await;
        store
            .set(
                "acme:idempotency:old",
                br#"{"status":"completed"}"#.to_vec(),
                None,
            )
            .await
            .unwrap();

        let result = engine.retrieve("acme", "old").await;
        assert!(matches!(
            result,
            Err(IdempotencyError::StorageCorruption { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalidate() {
        let (engine, _) = engine_with_tenant("acme").await;
        engine
            .store("acme", "k", "completed", 200, raw("{}"), 60)
            .await
            .unwrap();

        engine.invalidate("acme", "k").await.unwrap();

        let result = engine.retrieve("acme", "k").await;
        assert!(matches!(result, Err(IdempotencyError::RecordNotFound(_))));

        let result = engine.invalidate("acme", "k").await;
        assert!(matches!(result, Err(IdempotencyError::RecordNotFound(_))));
    }

    #[tokio::test]
    async fn test_invalidate_checks_tenant_first() {
        let (engine, _) = engine_with_tenant("acme").await;

        let result = engine.invalidate("globex", "missing").await;
        assert!(matches!(result, Err(IdempotencyError::TenantNotFound(_))));
    }

    #[tokio::test]
    async fn test_unknown_tenant_wins_over_oversized_key() {
        let (engine, _) = engine_with_tenant("acme").await;
        let long_key = "k".repeat(300);

        let result = engine.retrieve("nobody", &long_key).await;
        assert!(matches!(result, Err(IdempotencyError::TenantNotFound(_))));

        let result = engine.invalidate("nobody", &long_key).await;
        assert!(matches!(result, Err(IdempotencyError::TenantNotFound(_))));

        // Registered tenant: a key that could never be stored is simply absent.
        let result = engine.retrieve("acme", &long_key).await;
        assert!(matches!(result, Err(IdempotencyError::RecordNotFound(_))));
    }

    #[tokio::test]
    async fn test_invalidate_does_not_touch_other_tenant() {
        let (engine, _) = engine_with_tenant("acme").await;
        engine.tenants().register("globex", "Globex").await.unwrap();
        engine
            .store("acme", "k", "completed", 200, raw("{}"), 60)
            .await
            .unwrap();

        let result = engine.invalidate("globex", "k").await;
        assert!(matches!(result, Err(IdempotencyError::RecordNotFound(_))));
        assert!(engine.retrieve("acme", "k").await.is_ok());
    }

    #[tokio::test]
    async fn test_storage_failure_is_not_not_found() {
        let engine = IdempotencyEngine::new(Arc::new(FailingStore), TIMEOUT);

        let result = engine.retrieve("acme", "k").await;
        assert!(matches!(result, Err(IdempotencyError::Storage(_))));

        let result = engine.invalidate("acme", "k").await;
        assert!(matches!(result, Err(IdempotencyError::Storage(_))));

        let result = engine
            .store("acme", "k", "completed", 200, raw("{}"), 60)
            .await;
        assert!(matches!(result, Err(IdempotencyError::Storage(_))));
    }

    #[tokio::test]
    async fn test_deadline_surfaces_storage_error() {
        let engine = IdempotencyEngine::new(Arc::new(HangingStore), Duration::from_millis(50));

        let result = engine.retrieve("acme", "k").await;
        assert!(matches!(
            result,
            Err(IdempotencyError::Storage(StoreError::Timeout(_)))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_stores_leave_one_whole_record() {
        let (engine, _) = engine_with_tenant("acme").await;

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let engine = engine.clone();
                tokio::spawn(async move {
                    engine
                        .store(
                            "acme",
                            "race",
                            &format!("writer-{}", i),
                            200 + i,
                            raw(&format!(r#"{{"writer":{}}}"#, i)),
                            60,
                        )
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut written = Vec::new();
        for handle in handles {
            written.push(handle.await.unwrap());
        }

        let record = engine.retrieve("acme", "race").await.unwrap();
        let writer = record.http_status - 200;
        assert_eq!(record.status, format!("writer-{}", writer));
        assert_eq!(record.response.get(), format!(r#"{{"writer":{}}}"#, writer));
        assert!(written.iter().any(|w| w.status == record.status));
    }
}
