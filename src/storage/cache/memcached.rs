//! Memcached-backed cache.

/// Longest relative expiration memcached accepts; larger values are read
/// as absolute unix timestamps.
#[cfg_attr(not(feature = "memcached"), allow(dead_code))]
pub(crate) const MAX_RELATIVE_EXPIRATION: u64 = 60 * 60 * 24 * 30;

/// Converts a TTL to a memcached expiration value.
#[cfg_attr(not(feature = "memcached"), allow(dead_code))]
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn expiration(ttl: std::time::Duration) -> u32 {
    let seconds = ttl.as_secs().max(1);
    if seconds <= MAX_RELATIVE_EXPIRATION {
        seconds as u32
    } else {
        crate::current_timestamp().saturating_add(seconds).min(u64::from(u32::MAX)) as u32
    }
}

#[cfg(feature = "memcached")]
mod implementation {
    use memcache::Client;
    use serde_json::Value;
    use std::time::Duration;

    use super::expiration;
    use crate::config::CacheDriver;
    use crate::storage::cache::{CacheStore, decode_value};
    use crate::storage::prefixed;
    use crate::{Error, Result};

    /// Cache storing JSON strings in memcached.
    pub struct MemcachedCache {
        client: Client,
        prefix: String,
    }

    impl MemcachedCache {
        /// Connects to memcached (`memcache://host:port`).
        ///
        /// # Errors
        ///
        /// Returns an error if the server cannot be reached.
        pub fn new(connection_url: &str, prefix: impl Into<String>) -> Result<Self> {
            let client = Client::connect(connection_url)
                .map_err(|e| Error::operation("memcached_connect", e))?;
            Ok(Self {
                client,
                prefix: prefix.into(),
            })
        }

        fn key(&self, key: &str) -> String {
            prefixed(&self.prefix, key).replace(char::is_whitespace, "_")
        }
    }

    fn encode(value: &Value) -> Result<String> {
        serde_json::to_string(value).map_err(|e| Error::operation("serialize_cache_value", e))
    }

    impl CacheStore for MemcachedCache {
        fn get(&self, key: &str) -> Result<Option<Value>> {
            let raw: Option<String> = self
                .client
                .get(&self.key(key))
                .map_err(|e| Error::operation("memcached_get", e))?;
            Ok(raw.map(decode_value))
        }

        fn put(&self, key: &str, value: &Value, ttl: Duration) -> Result<()> {
            self.client
                .set(&self.key(key), encode(value)?.as_str(), expiration(ttl))
                .map_err(|e| Error::operation("memcached_set", e))
        }

        fn forever(&self, key: &str, value: &Value) -> Result<()> {
            self.client
                .set(&self.key(key), encode(value)?.as_str(), 0)
                .map_err(|e| Error::operation("memcached_set", e))
        }

        fn forget(&self, key: &str) -> Result<bool> {
            self.client
                .delete(&self.key(key))
                .map_err(|e| Error::operation("memcached_delete", e))
        }

        #[allow(clippy::cast_possible_wrap)]
        fn increment(&self, key: &str) -> Result<i64> {
            let key = self.key(key);
            if let Ok(value) = self.client.increment(&key, 1) {
                return Ok(value as i64);
            }
            // Missing key: seed it, unless another process won the race.
            if self.client.add(&key, "1", 0).is_ok() {
                let seeded: Option<String> = self
                    .client
                    .get(&key)
                    .map_err(|e| Error::operation("memcached_get", e))?;
                if seeded.as_deref() == Some("1") {
                    return Ok(1);
                }
            }
            self.client
                .increment(&key, 1)
                .map(|value| value as i64)
                .map_err(|e| Error::operation("memcached_increment", e))
        }

        fn driver(&self) -> CacheDriver {
            CacheDriver::Memcached
        }
    }
}

#[cfg(not(feature = "memcached"))]
mod stub {
    use serde_json::Value;
    use std::time::Duration;

    use crate::config::CacheDriver;
    use crate::storage::cache::CacheStore;
    use crate::{Error, Result};

    /// Stub memcached cache when the feature is not enabled.
    pub struct MemcachedCache;

    impl MemcachedCache {
        /// Connects to memcached (stub).
        ///
        /// # Errors
        ///
        /// Always returns an error because the feature is not enabled.
        pub fn new(_connection_url: &str, _prefix: impl Into<String>) -> Result<Self> {
            Err(Error::FeatureNotEnabled("memcached".to_string()))
        }
    }

    impl CacheStore for MemcachedCache {
        fn get(&self, _key: &str) -> Result<Option<Value>> {
            Err(Error::FeatureNotEnabled("memcached".to_string()))
        }

        fn put(&self, _key: &str, _value: &Value, _ttl: Duration) -> Result<()> {
            Err(Error::FeatureNotEnabled("memcached".to_string()))
        }

        fn forever(&self, _key: &str, _value: &Value) -> Result<()> {
            Err(Error::FeatureNotEnabled("memcached".to_string()))
        }

        fn forget(&self, _key: &str) -> Result<bool> {
            Err(Error::FeatureNotEnabled("memcached".to_string()))
        }

        fn increment(&self, _key: &str) -> Result<i64> {
            Err(Error::FeatureNotEnabled("memcached".to_string()))
        }

        fn driver(&self) -> CacheDriver {
            CacheDriver::Memcached
        }
    }
}

#[cfg(feature = "memcached")]
pub use implementation::MemcachedCache;

#[cfg(not(feature = "memcached"))]
pub use stub::MemcachedCache;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_expiration_is_relative_up_to_thirty_days() {
        assert_eq!(expiration(Duration::ZERO), 1);
        assert_eq!(expiration(Duration::from_secs(18_000)), 18_000);
        let absolute = expiration(Duration::from_secs(MAX_RELATIVE_EXPIRATION + 10));
        assert!(u64::from(absolute) > MAX_RELATIVE_EXPIRATION);
    }
}
