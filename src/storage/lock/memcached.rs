//! Memcached locks.
//!
//! `add` only stores a key that does not exist yet, which gives the mutual
//! exclusion. The stored value is the owner token so that only the holder
//! deletes it on release.

#[cfg(feature = "memcached")]
mod implementation {
    use memcache::{Client, MemcacheError};
    use std::sync::Arc;
    use std::time::Duration;

    use crate::config::CacheDriver;
    use crate::storage::cache::memcached::expiration;
    use crate::storage::lock::{LockFactory, NamedLock, owner_token};
    use crate::storage::prefixed;
    use crate::{Error, Result};

    /// Lock stored as a memcached key holding the owner token.
    pub struct MemcachedLock {
        client: Arc<Client>,
        key: String,
        storage_key: String,
        owner: String,
    }

    impl MemcachedLock {
        fn stored_owner(&self) -> Result<Option<String>> {
            self.client
                .get(&self.storage_key)
                .map_err(|e| Error::operation("memcached_lock_get", e))
        }
    }

    impl NamedLock for MemcachedLock {
        fn acquire(&self, ttl: Duration) -> Result<bool> {
            let added = self
                .client
                .add(&self.storage_key, self.owner.as_str(), expiration(ttl));
            if !stored(added)? {
                return Ok(false);
            }
            Ok(self.stored_owner()?.as_deref() == Some(self.owner.as_str()))
        }

        fn release(&self) -> Result<bool> {
            if self.stored_owner()?.as_deref() != Some(self.owner.as_str()) {
                return Ok(false);
            }
            self.client
                .delete(&self.storage_key)
                .map_err(|e| Error::operation("memcached_lock_delete", e))
        }

        fn is_held(&self) -> Result<bool> {
            Ok(self.stored_owner()?.is_some())
        }

        fn key(&self) -> &str {
            &self.key
        }
    }

    /// Maps the reply to `add`: a command refusal means the key is taken.
    fn stored(reply: std::result::Result<(), MemcacheError>) -> Result<bool> {
        match reply {
            Ok(()) => Ok(true),
            Err(MemcacheError::CommandError(_)) => Ok(false),
            Err(e) => Err(Error::operation("memcached_lock_add", e)),
        }
    }

    /// Creates memcached locks sharing one connection pool.
    pub struct MemcachedLockFactory {
        client: Arc<Client>,
        prefix: String,
    }

    impl MemcachedLockFactory {
        /// Connects to memcached (`memcache://host:port`).
        ///
        /// # Errors
        ///
        /// Returns an error if the server cannot be reached.
        pub fn new(connection_url: &str, prefix: impl Into<String>) -> Result<Self> {
            let client = Client::connect(connection_url)
                .map_err(|e| Error::operation("memcached_connect", e))?;
            Ok(Self {
                client: Arc::new(client),
                prefix: prefix.into(),
            })
        }
    }

    impl LockFactory for MemcachedLockFactory {
        fn named_lock(&self, key: &str) -> Box<dyn NamedLock> {
            Box::new(MemcachedLock {
                client: Arc::clone(&self.client),
                key: key.to_string(),
                storage_key: prefixed(&self.prefix, key).replace(char::is_whitespace, "_"),
                owner: owner_token(),
            })
        }

        fn driver(&self) -> CacheDriver {
            CacheDriver::Memcached
        }
    }

}

#[cfg(not(feature = "memcached"))]
mod stub {
    use std::time::Duration;

    use crate::config::CacheDriver;
    use crate::storage::lock::{LockFactory, NamedLock};
    use crate::{Error, Result};

    /// Stub memcached lock when the feature is not enabled.
    pub struct MemcachedLock {
        key: String,
    }

    impl NamedLock for MemcachedLock {
        fn acquire(&self, _ttl: Duration) -> Result<bool> {
            Err(Error::FeatureNotEnabled("memcached".to_string()))
        }

        fn release(&self) -> Result<bool> {
            Err(Error::FeatureNotEnabled("memcached".to_string()))
        }

        fn is_held(&self) -> Result<bool> {
            Err(Error::FeatureNotEnabled("memcached".to_string()))
        }

        fn key(&self) -> &str {
            &self.key
        }
    }

    /// Stub memcached lock factory when the feature is not enabled.
    pub struct MemcachedLockFactory;

    impl MemcachedLockFactory {
        /// Connects to memcached (stub).
        ///
        /// # Errors
        ///
        /// Always returns an error because the feature is not enabled.
        pub fn new(_connection_url: &str, _prefix: impl Into<String>) -> Result<Self> {
            Err(Error::FeatureNotEnabled("memcached".to_string()))
        }
    }

    impl LockFactory for MemcachedLockFactory {
        fn named_lock(&self, key: &str) -> Box<dyn NamedLock> {
            Box::new(MemcachedLock {
                key: key.to_string(),
            })
        }

        fn driver(&self) -> CacheDriver {
            CacheDriver::Memcached
        }
    }
}

#[cfg(feature = "memcached")]
pub use implementation::{MemcachedLock, MemcachedLockFactory};

#[cfg(not(feature = "memcached"))]
pub use stub::{MemcachedLock, MemcachedLockFactory};
