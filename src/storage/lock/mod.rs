//! Named locks with a TTL.
//!
//! A lock is scoped by a string key and owned by the instance that acquired
//! it. `release` only removes a lock held by the same instance, while
//! `is_held` reports whether anybody holds it.

mod filesystem;
mod memcached;
mod redis;

pub use filesystem::{FileLock, FileLockFactory};
pub use self::memcached::{MemcachedLock, MemcachedLockFactory};
pub use self::redis::{RedisLock, RedisLockFactory};

use std::time::Duration;

use crate::Result;
use crate::config::CacheDriver;

/// Distributed mutual exclusion scoped by a key.
pub trait NamedLock: Send + Sync {
    /// Tries to take the lock for `ttl`. Never blocks; returns false if held.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    fn acquire(&self, ttl: Duration) -> Result<bool>;

    /// Releases the lock if this instance holds it.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    fn release(&self) -> Result<bool>;

    /// Returns true if any live holder exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    fn is_held(&self) -> Result<bool>;

    /// The lock key.
    fn key(&self) -> &str;
}

/// Creates named locks for one backend.
pub trait LockFactory: Send + Sync {
    /// Creates a lock for `key` with a fresh owner token.
    fn named_lock(&self, key: &str) -> Box<dyn NamedLock>;

    /// The backend these locks live in.
    fn driver(&self) -> CacheDriver;
}

/// Generates a unique owner token.
pub(crate) fn owner_token() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Lock key for an import identifier.
#[must_use]
pub fn lock_key(identifier: &str) -> String {
    format!("{identifier}_lock")
}
