//! Memory Store Module
//!
//! In-process key store: a HashMap of TTL-stamped entries behind a tokio
//! RwLock. Expired entries are hidden on read and physically removed either
//! lazily or by the background cleanup task.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{KeyStore, StoreEntry, StoreError, StoreResult};

// == Memory Store ==
/// Shared in-memory key store. Cloning yields another handle to the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, StoreEntry>>>,
}

impl MemoryStore {
    // == Constructor ==
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // == Purge Expired ==
    /// Removes all expired entries.
    ///
    /// Returns the number of entries removed.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        before - entries.len()
    }

    // == Length ==
    /// Returns the number of physically held entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    // == Is Empty ==
    /// Returns true if no entries are held.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl KeyStore for MemoryStore {
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> StoreResult<()> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), StoreEntry::new(value, ttl));
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        // Expired: reclaim it now rather than waiting for the sweep.
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(StoreEntry::is_expired) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut entries = self.entries.write().await;
        Ok(entries
            .remove(key)
            .is_some_and(|entry| !entry.is_expired()))
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).is_some_and(|entry| !entry.is_expired()))
    }

    async fn incr(&self, key: &str) -> StoreResult<i64> {
        let mut entries = self.entries.write().await;

        let live = entries.get(key).filter(|entry| !entry.is_expired());
        let current = match live {
            Some(entry) => std::str::from_utf8(&entry.value)
                .ok()
                .and_then(|text| text.parse::<i64>().ok())
                .ok_or_else(|| StoreError::NotAnInteger(key.to_string()))?,
            None => 0,
        };
        let expires_at = live.and_then(|entry| entry.expires_at);

        let next = current
            .checked_add(1)
            .ok_or_else(|| StoreError::NotAnInteger(key.to_string()))?;

        let mut entry = StoreEntry::new(next.to_string().into_bytes(), None);
        entry.expires_at = expires_at;
        entries.insert(key.to_string(), entry);

        Ok(next)
    }

    async fn set_if_absent(&self, key: &str, value: Vec<u8>) -> StoreResult<bool> {
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|entry| !entry.is_expired()) {
            return Ok(false);
        }
        entries.insert(key.to_string(), StoreEntry::new(value, None));
        Ok(true)
    }
}
