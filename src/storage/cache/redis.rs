//! Redis-backed cache.

#[cfg(feature = "redis")]
mod implementation {
    use redis::{Client, Commands, Connection};
    use serde_json::Value;
    use std::time::Duration;

    use crate::config::CacheDriver;
    use crate::storage::cache::{CacheStore, decode_value};
    use crate::storage::prefixed;
    use crate::{Error, Result};

    /// Cache storing JSON strings in Redis.
    pub struct RedisCache {
        client: Client,
        prefix: String,
    }

    impl RedisCache {
        /// Creates a new Redis cache.
        ///
        /// # Errors
        ///
        /// Returns an error if the URL is invalid.
        pub fn new(connection_url: &str, prefix: impl Into<String>) -> Result<Self> {
            let client =
                Client::open(connection_url).map_err(|e| Error::operation("redis_connect", e))?;
            Ok(Self {
                client,
                prefix: prefix.into(),
            })
        }

        /// Returns the underlying client, shared with the Redis lock.
        #[must_use]
        pub const fn client(&self) -> &Client {
            &self.client
        }

        fn connection(&self) -> Result<Connection> {
            self.client
                .get_connection()
                .map_err(|e| Error::operation("redis_get_connection", e))
        }

        fn key(&self, key: &str) -> String {
            prefixed(&self.prefix, key)
        }
    }

    fn encode(value: &Value) -> Result<String> {
        serde_json::to_string(value).map_err(|e| Error::operation("serialize_cache_value", e))
    }

    impl CacheStore for RedisCache {
        fn get(&self, key: &str) -> Result<Option<Value>> {
            let mut conn = self.connection()?;
            let raw: Option<String> = conn
                .get(self.key(key))
                .map_err(|e| Error::operation("redis_get", e))?;
            Ok(raw.map(decode_value))
        }

        fn put(&self, key: &str, value: &Value, ttl: Duration) -> Result<()> {
            let mut conn = self.connection()?;
            let seconds = ttl.as_secs().max(1);
            conn.set_ex::<_, _, ()>(self.key(key), encode(value)?, seconds)
                .map_err(|e| Error::operation("redis_set_ex", e))
        }

        fn forever(&self, key: &str, value: &Value) -> Result<()> {
            let mut conn = self.connection()?;
            conn.set::<_, _, ()>(self.key(key), encode(value)?)
                .map_err(|e| Error::operation("redis_set", e))
        }

        fn forget(&self, key: &str) -> Result<bool> {
            let mut conn = self.connection()?;
            let removed: i64 = conn
                .del(self.key(key))
                .map_err(|e| Error::operation("redis_del", e))?;
            Ok(removed > 0)
        }

        fn increment(&self, key: &str) -> Result<i64> {
            let mut conn = self.connection()?;
            conn.incr(self.key(key), 1_i64)
                .map_err(|e| Error::operation("redis_incr", e))
        }

        fn driver(&self) -> CacheDriver {
            CacheDriver::Redis
        }
    }
}

#[cfg(not(feature = "redis"))]
mod stub {
    use serde_json::Value;
    use std::time::Duration;

    use crate::config::CacheDriver;
    use crate::storage::cache::CacheStore;
    use crate::{Error, Result};

    /// Stub Redis cache when the feature is not enabled.
    pub struct RedisCache;

    impl RedisCache {
        /// Creates a new Redis cache (stub).
        ///
        /// # Errors
        ///
        /// Always returns an error because the feature is not enabled.
        pub fn new(_connection_url: &str, _prefix: impl Into<String>) -> Result<Self> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }
    }

    impl CacheStore for RedisCache {
        fn get(&self, _key: &str) -> Result<Option<Value>> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }

        fn put(&self, _key: &str, _value: &Value, _ttl: Duration) -> Result<()> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }

        fn forever(&self, _key: &str, _value: &Value) -> Result<()> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }

        fn forget(&self, _key: &str) -> Result<bool> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }

        fn increment(&self, _key: &str) -> Result<i64> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }

        fn driver(&self) -> CacheDriver {
            CacheDriver::Redis
        }
    }
}

#[cfg(feature = "redis")]
pub use implementation::RedisCache;

#[cfg(not(feature = "redis"))]
pub use stub::RedisCache;
