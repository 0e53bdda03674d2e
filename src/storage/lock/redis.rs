//! Redis locks: `SET NX PX` to acquire, compare-and-delete to release.

#[cfg(feature = "redis")]
mod implementation {
    use redis::{Client, Commands, Connection, Script};
    use std::time::Duration;

    use crate::config::CacheDriver;
    use crate::storage::lock::{LockFactory, NamedLock, owner_token};
    use crate::storage::prefixed;
    use crate::{Error, Result};

    const RELEASE_SCRIPT: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
";

    /// Lock stored as a Redis key holding the owner token.
    pub struct RedisLock {
        client: Client,
        key: String,
        storage_key: String,
        owner: String,
    }

    impl RedisLock {
        fn connection(&self) -> Result<Connection> {
            self.client
                .get_connection()
                .map_err(|e| Error::operation("redis_get_connection", e))
        }
    }

    impl NamedLock for RedisLock {
        #[allow(clippy::cast_possible_truncation)]
        fn acquire(&self, ttl: Duration) -> Result<bool> {
            let mut conn = self.connection()?;
            let millis = (ttl.as_millis() as u64).max(1);
            let reply: Option<String> = redis::cmd("SET")
                .arg(&self.storage_key)
                .arg(&self.owner)
                .arg("NX")
                .arg("PX")
                .arg(millis)
                .query(&mut conn)
                .map_err(|e| Error::operation("redis_lock_acquire", e))?;
            Ok(reply.is_some())
        }

        fn release(&self) -> Result<bool> {
            let mut conn = self.connection()?;
            let removed: i64 = Script::new(RELEASE_SCRIPT)
                .key(&self.storage_key)
                .arg(&self.owner)
                .invoke(&mut conn)
                .map_err(|e| Error::operation("redis_lock_release", e))?;
            Ok(removed > 0)
        }

        fn is_held(&self) -> Result<bool> {
            let mut conn = self.connection()?;
            conn.exists(&self.storage_key)
                .map_err(|e| Error::operation("redis_lock_exists", e))
        }

        fn key(&self) -> &str {
            &self.key
        }
    }

    /// Creates Redis locks sharing one client.
    pub struct RedisLockFactory {
        client: Client,
        prefix: String,
    }

    impl RedisLockFactory {
        /// Creates the factory.
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
    }

    impl LockFactory for RedisLockFactory {
        fn named_lock(&self, key: &str) -> Box<dyn NamedLock> {
            Box::new(RedisLock {
                client: self.client.clone(),
                key: key.to_string(),
                storage_key: prefixed(&self.prefix, key),
                owner: owner_token(),
            })
        }

        fn driver(&self) -> CacheDriver {
            CacheDriver::Redis
        }
    }
}

#[cfg(not(feature = "redis"))]
mod stub {
    use std::time::Duration;

    use crate::config::CacheDriver;
    use crate::storage::lock::{LockFactory, NamedLock};
    use crate::{Error, Result};

    /// Stub Redis lock when the feature is not enabled.
    pub struct RedisLock {
        key: String,
    }

    impl NamedLock for RedisLock {
        fn acquire(&self, _ttl: Duration) -> Result<bool> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }

        fn release(&self) -> Result<bool> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }

        fn is_held(&self) -> Result<bool> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }

        fn key(&self) -> &str {
            &self.key
        }
    }

    /// Stub Redis lock factory when the feature is not enabled.
    pub struct RedisLockFactory;

    impl RedisLockFactory {
        /// Creates the factory (stub).
        ///
        /// # Errors
        ///
        /// Always returns an error because the feature is not enabled.
        pub fn new(_connection_url: &str, _prefix: impl Into<String>) -> Result<Self> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }
    }

    impl LockFactory for RedisLockFactory {
        fn named_lock(&self, key: &str) -> Box<dyn NamedLock> {
            Box::new(RedisLock {
                key: key.to_string(),
            })
        }

        fn driver(&self) -> CacheDriver {
            CacheDriver::Redis
        }
    }
}

#[cfg(feature = "redis")]
pub use implementation::{RedisLock, RedisLockFactory};

#[cfg(not(feature = "redis"))]
pub use stub::{RedisLock, RedisLockFactory};
