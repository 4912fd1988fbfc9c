//! Key Store Module
//!
//! Backing key-value stores with per-key expiration. The engine and tenant
//! registry only ever talk to the [`KeyStore`] trait, so the same code runs
//! against the in-memory store and against Redis.

mod entry;
mod memory;
mod redis_store;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use entry::StoreEntry;
pub use memory::MemoryStore;
pub use redis_store::RedisStore;

// == Store Error ==
/// Failures reported by a backing store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backend rejected the command or the connection failed
    #[error("backend failure: {0}")]
    Backend(String),

    /// The operation did not finish before its deadline
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// A counter key holds something that is not an integer
    #[error("value at '{0}' is not an integer")]
    NotAnInteger(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Convenience Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// == Key Store Trait ==
/// Key-value store with per-key TTL and atomic single-key operations.
///
/// Every method is a single atomic operation on one key. Expired keys behave
/// exactly like absent keys.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Writes `value` under `key`, replacing any previous value.
    ///
    /// With `ttl = Some(d)` the key is reclaimed once `d` has elapsed;
    /// `None` keeps it until deleted.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> StoreResult<()>;

    /// Reads the value at `key`, `None` if absent or expired.
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Removes `key`, returning whether a live value was removed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Returns whether a live value exists at `key`.
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Atomically increments the integer at `key` (absent counts as 0) and
    /// returns the new value.
    async fn incr(&self, key: &str) -> StoreResult<i64>;

    /// Writes `value` only if `key` holds no live value. Returns whether the
    /// write happened.
    async fn set_if_absent(&self, key: &str, value: Vec<u8>) -> StoreResult<bool>;
}

/// Runs a store operation, giving up once `timeout` elapses.
///
/// The in-flight future is dropped on timeout; single-key operations leave
/// either the old or the new value behind, never a partial one.
pub async fn with_deadline<T, F>(timeout: Duration, op: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(timeout, op).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(timeout)),
    }
}
