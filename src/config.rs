//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// A configuration variable is set but cannot be used.
#[derive(Error, Debug, PartialEq, Eq)]
#[error("invalid value '{value}' for {name}: {reason}")]
pub struct ConfigError {
    pub name: String,
    pub value: String,
    pub reason: String,
}

/// Which key store the server runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// In-process store; state is lost on restart
    Memory,
    /// Redis server at `redis_url`
    Redis,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "redis" => Ok(StorageBackend::Redis),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Key store backend
    pub storage_backend: StorageBackend,
    /// Redis connection URL, used when `storage_backend` is Redis
    pub redis_url: String,
    /// Deadline for each individual store call, in milliseconds
    pub operation_timeout_ms: u64,
    /// Background cleanup task interval in seconds (memory backend)
    pub cleanup_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 8080)
    /// - `STORAGE_BACKEND` - `memory` or `redis` (default: memory)
    /// - `REDIS_URL` - Redis URL (default: redis://127.0.0.1:6379/)
    /// - `OPERATION_TIMEOUT_MS` - Per-call store deadline (default: 2000)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 1)
    ///
    /// Unset variables take their default; a set but unparseable one is an
    /// error, so a mistyped backend never silently falls back to memory.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a Config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            server_port: parse_or(&lookup, "SERVER_PORT", defaults.server_port)?,
            storage_backend: parse_or(&lookup, "STORAGE_BACKEND", defaults.storage_backend)?,
            redis_url: lookup("REDIS_URL").unwrap_or(defaults.redis_url),
            operation_timeout_ms: parse_or(
                &lookup,
                "OPERATION_TIMEOUT_MS",
                defaults.operation_timeout_ms,
            )?,
            cleanup_interval: parse_or(&lookup, "CLEANUP_INTERVAL", defaults.cleanup_interval)?,
        })
    }

    /// Deadline applied to each store call.
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

fn parse_or<T, F>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => match value.parse::<T>() {
            Ok(parsed) => Ok(parsed),
            Err(e) => Err(ConfigError {
                name: name.to_string(),
                reason: e.to_string(),
                value,
            }),
        },
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 8080,
            storage_backend: StorageBackend::Memory,
            redis_url: "redis://127.0.0.1:6379/".to_string(),
            operation_timeout_ms: 2000,
            cleanup_interval: 1,
        }
    }
}
