//! Storage layer abstraction.
//!
//! Two shared-state concerns live here:
//! - **Cache**: key/value store with TTLs holding the progress slots
//! - **Lock**: named, owner-aware mutual exclusion with a TTL
//!
//! Both come in file, memcached and Redis flavours. [`BackendFactory`]
//! builds a matching pair from [`CacheSettings`](crate::config::CacheSettings).

// Allow significant_drop_tightening - guards and connections live for one call.
#![allow(clippy::significant_drop_tightening)]

pub mod cache;
mod factory;
pub mod lock;

pub use cache::{CacheStore, FileCache, MemcachedCache, RedisCache};
pub use factory::{BackendFactory, Backends};
pub use lock::{FileLockFactory, LockFactory, MemcachedLockFactory, NamedLock, RedisLockFactory};

/// Joins a key prefix and a key with `:`.
#[must_use]
pub fn prefixed(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}:{key}")
    }
}

/// Hex-encoded SHA-256 of a key, used as a file name.
#[must_use]
pub fn hashed_key(key: &str) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(key.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed() {
        assert_eq!(prefixed("csv_importer", "Guitars_quantity"), "csv_importer:Guitars_quantity");
        assert_eq!(prefixed("", "k"), "k");
    }

    #[test]
    fn test_hashed_key_is_stable() {
        assert_eq!(hashed_key("a"), hashed_key("a"));
        assert_ne!(hashed_key("a"), hashed_key("b"));
        assert_eq!(hashed_key("a").len(), 64);
    }
}
