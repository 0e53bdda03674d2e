//! Cache service with TTL semantics.

mod filesystem;
pub(crate) mod memcached;
mod redis;

pub use filesystem::FileCache;
pub use self::memcached::MemcachedCache;
pub use self::redis::RedisCache;

use serde_json::Value;
use std::time::Duration;

use crate::Result;
use crate::config::CacheDriver;

/// Key/value store backing the progress slots.
///
/// Values are JSON. Implementations must make [`CacheStore::increment`]
/// atomic across processes sharing the backend.
pub trait CacheStore: Send + Sync {
    /// Reads a value; expired entries read as `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Writes a value that expires after `ttl`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    fn put(&self, key: &str, value: &Value, ttl: Duration) -> Result<()>;

    /// Writes a value without expiration.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    fn forever(&self, key: &str, value: &Value) -> Result<()>;

    /// Deletes a value. Returns true if it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    fn forget(&self, key: &str) -> Result<bool>;

    /// Atomically adds one, treating a missing key as zero. Returns the new value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached or the stored
    /// value is not an integer.
    fn increment(&self, key: &str) -> Result<i64>;

    /// The driver behind this store, used to pick the matching lock.
    fn driver(&self) -> CacheDriver;
}

/// Parses a raw backend string as JSON, keeping non-JSON text as a string.
pub(crate) fn decode_value(raw: String) -> Value {
    serde_json::from_str(&raw).unwrap_or(Value::String(raw))
}
