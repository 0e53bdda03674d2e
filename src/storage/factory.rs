//! Builds the cache and lock backends for a configured driver.

use std::sync::Arc;

use super::cache::{CacheStore, FileCache, MemcachedCache, RedisCache};
use super::lock::{FileLockFactory, LockFactory, MemcachedLockFactory, RedisLockFactory};
use crate::config::{CacheDriver, CacheSettings};
use crate::{Error, Result};

/// A cache and the lock factory living in the same backend.
#[derive(Clone)]
pub struct Backends {
    /// Progress slot storage.
    pub cache: Arc<dyn CacheStore>,
    /// Mutex storage.
    pub locks: Arc<dyn LockFactory>,
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends")
            .field("cache", &self.cache.driver())
            .field("locks", &self.locks.driver())
            .finish()
    }
}

/// Factory for storage backends.
pub struct BackendFactory;

impl BackendFactory {
    /// Creates the backends selected by `settings.driver`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for a driver without a lock
    /// implementation or a missing connection URL, and an operation error if
    /// the backend cannot be opened.
    pub fn create(settings: &CacheSettings) -> Result<Backends> {
        tracing::debug!(driver = settings.driver.as_str(), "Creating storage backends");
        match &settings.driver {
            CacheDriver::File => {
                let cache = FileCache::new(&settings.path)?;
                let locks = FileLockFactory::new(settings.path.join("locks"));
                Ok(Backends {
                    cache: Arc::new(cache),
                    locks: Arc::new(locks),
                })
            },
            CacheDriver::Redis => {
                let url = required_url(settings.redis_url.as_deref(), "cache.redis_url")?;
                Ok(Backends {
                    cache: Arc::new(RedisCache::new(url, settings.prefix.clone())?),
                    locks: Arc::new(RedisLockFactory::new(url, settings.prefix.clone())?),
                })
            },
            CacheDriver::Memcached => {
                let url = required_url(settings.memcached_url.as_deref(), "cache.memcached_url")?;
                Ok(Backends {
                    cache: Arc::new(MemcachedCache::new(url, settings.prefix.clone())?),
                    locks: Arc::new(MemcachedLockFactory::new(url, settings.prefix.clone())?),
                })
            },
            CacheDriver::Unsupported(name) => Err(Error::Configuration(format!(
                "Cache driver '{name}' has no lock implementation; use file, memcached or redis"
            ))),
        }
    }
}

fn required_url<'a>(url: Option<&'a str>, setting: &str) -> Result<&'a str> {
    url.filter(|u| !u.trim().is_empty())
        .ok_or_else(|| Error::Configuration(format!("{setting} must be set for this cache driver")))
}
