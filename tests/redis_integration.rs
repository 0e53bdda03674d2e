//! Redis backend integration tests.
//!
//! Exercises the Redis cache, the Redis lock and a full import whose progress
//! and mutex live in Redis.
//!
//! These tests require a running Redis server. Set the environment variable
//! `CSV_IMPORTER_TEST_REDIS_URL` to enable them:
//!
//! ```bash
//! export CSV_IMPORTER_TEST_REDIS_URL="redis://localhost:6379"
//! cargo test --features redis redis_integration
//! ```

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::print_stderr,
    clippy::doc_markdown
)]
#![cfg(feature = "redis")]

use std::env;
use std::time::Duration;

use csv_importer::storage::{BackendFactory, CacheStore, LockFactory, RedisCache, RedisLockFactory};
use csv_importer::{CacheDriver, FieldRule, ImportDefinition, ImportEngine, ImporterConfig, RoutingImporter};
use serde_json::json;
use tempfile::TempDir;

/// Environment variable for Redis test connection URL.
const REDIS_URL_ENV: &str = "CSV_IMPORTER_TEST_REDIS_URL";

/// Returns the Redis connection URL if available, or None to skip tests.
fn get_redis_url() -> Option<String> {
    env::var(REDIS_URL_ENV).ok()
}

/// Macro to skip tests when Redis is not available.
macro_rules! require_redis {
    () => {
        match get_redis_url() {
            Some(url) => url,
            None => {
                eprintln!(
                    "Skipping test: {} not set. Set this environment variable to run Redis tests.",
                    REDIS_URL_ENV
                );
                return;
            },
        }
    };
}

fn unique_prefix() -> String {
    format!("csv_importer_test_{}", uuid::Uuid::new_v4().simple())
}

#[test]
fn test_cache_roundtrip_and_increment() {
    let url = require_redis!();
    let cache = RedisCache::new(&url, unique_prefix()).unwrap();

    cache.put("message", &json!("running"), Duration::from_secs(60)).unwrap();
    assert_eq!(cache.get("message").unwrap(), Some(json!("running")));

    assert_eq!(cache.increment("processed").unwrap(), 1);
    assert_eq!(cache.increment("processed").unwrap(), 2);
    assert_eq!(cache.get("processed").unwrap(), Some(json!(2)));

    assert!(cache.forget("message").unwrap());
    assert!(cache.forget("processed").unwrap());
    assert_eq!(cache.get("message").unwrap(), None);
}

#[test]
fn test_lock_is_exclusive_and_owner_scoped() {
    let url = require_redis!();
    let factory = RedisLockFactory::new(&url, unique_prefix()).unwrap();
    let first = factory.named_lock("guitars_lock");
    let second = factory.named_lock("guitars_lock");

    assert!(first.acquire(Duration::from_secs(60)).unwrap());
    assert!(!second.acquire(Duration::from_secs(60)).unwrap());
    assert!(second.is_held().unwrap());
    assert!(!second.release().unwrap());

    assert!(first.release().unwrap());
    assert!(!first.is_held().unwrap());
    assert!(second.acquire(Duration::from_secs(60)).unwrap());
    assert!(second.release().unwrap());
}

#[test]
fn test_lock_expires_after_ttl() {
    let url = require_redis!();
    let factory = RedisLockFactory::new(&url, unique_prefix()).unwrap();
    let first = factory.named_lock("short_lock");
    let second = factory.named_lock("short_lock");

    assert!(first.acquire(Duration::from_millis(50)).unwrap());
    std::thread::sleep(Duration::from_millis(150));
    assert!(second.acquire(Duration::from_secs(60)).unwrap());
    assert!(second.release().unwrap());
}

#[test]
fn test_import_runs_on_redis_backends() {
    let url = require_redis!();
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("guitars.csv");
    std::fs::write(&source, "serial_number,title\n1,Les Paul\nx,SG\n").unwrap();

    let mut config = ImporterConfig::default()
        .with_cache_driver(CacheDriver::Redis)
        .with_storage_root(dir.path().join("out"));
    config.cache.redis_url = Some(url);
    config.cache.prefix = unique_prefix();

    let backends = BackendFactory::create(&config.cache).unwrap();
    assert_eq!(backends.cache.driver(), CacheDriver::Redis);

    let definition = ImportDefinition::new()
        .field("serial_number", FieldRule::new().required().validate("numeric"))
        .csv_file("valid", "valid.csv")
        .csv_file("invalid", "invalid.csv");
    let importer = RoutingImporter::new(definition, "valid", "invalid");
    let mut engine = ImportEngine::from_config(importer, config).unwrap();
    engine.attach_source(&source).unwrap();

    assert!(engine.run().unwrap().payload().unwrap().meta.finished);
    assert_eq!(engine.progress_store().snapshot().unwrap().processed, 2);

    let terminal = engine.finish().unwrap();
    assert!(terminal.meta.finished);
    assert!(!engine.is_finished().unwrap());
}
