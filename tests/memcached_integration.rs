//! Memcached backend integration tests.
//!
//! These tests require a running memcached server. Set the environment
//! variable `CSV_IMPORTER_TEST_MEMCACHED_URL` to enable them:
//!
//! ```bash
//! export CSV_IMPORTER_TEST_MEMCACHED_URL="memcache://localhost:11211"
//! cargo test --features memcached memcached_integration
//! ```

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::print_stderr,
    clippy::doc_markdown
)]
#![cfg(feature = "memcached")]

use std::env;
use std::time::Duration;

use csv_importer::storage::{CacheStore, LockFactory, MemcachedCache, MemcachedLockFactory};
use csv_importer::{CacheDriver, FieldRule, ImportDefinition, ImportEngine, ImporterConfig, RoutingImporter};
use serde_json::json;
use tempfile::TempDir;

/// Environment variable for the memcached test connection URL.
const MEMCACHED_URL_ENV: &str = "CSV_IMPORTER_TEST_MEMCACHED_URL";

fn get_memcached_url() -> Option<String> {
    env::var(MEMCACHED_URL_ENV).ok()
}

/// Macro to skip tests when memcached is not available.
macro_rules! require_memcached {
    () => {
        match get_memcached_url() {
            Some(url) => url,
            None => {
                eprintln!(
                    "Skipping test: {} not set. Set this environment variable to run memcached tests.",
                    MEMCACHED_URL_ENV
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
    let url = require_memcached!();
    let cache = MemcachedCache::new(&url, unique_prefix()).unwrap();

    cache.put("quantity", &json!(10), Duration::from_secs(60)).unwrap();
    assert_eq!(cache.get("quantity").unwrap(), Some(json!(10)));

    assert_eq!(cache.increment("processed").unwrap(), 1);
    assert_eq!(cache.increment("processed").unwrap(), 2);

    cache.forever("finished", &json!(true)).unwrap();
    assert_eq!(cache.get("finished").unwrap(), Some(json!(true)));
    assert!(cache.forget("finished").unwrap());
    assert_eq!(cache.get("finished").unwrap(), None);
}

#[test]
fn test_lock_is_exclusive_and_owner_scoped() {
    let url = require_memcached!();
    let factory = MemcachedLockFactory::new(&url, unique_prefix()).unwrap();
    let first = factory.named_lock("guitars_lock");
    let second = factory.named_lock("guitars_lock");

    assert!(first.acquire(Duration::from_secs(60)).unwrap());
    assert!(!second.acquire(Duration::from_secs(60)).unwrap());
    assert!(second.is_held().unwrap());
    assert!(!second.release().unwrap());

    assert!(first.release().unwrap());
    assert!(!first.is_held().unwrap());
}

#[test]
fn test_import_runs_on_memcached_backends() {
    let url = require_memcached!();
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("guitars.csv");
    std::fs::write(&source, "serial_number,title\n1,Les Paul\nx,SG\n").unwrap();

    let mut config = ImporterConfig::default()
        .with_cache_driver(CacheDriver::Memcached)
        .with_storage_root(dir.path().join("out"));
    config.cache.memcached_url = Some(url);
    config.cache.prefix = unique_prefix();

    let definition = ImportDefinition::new()
        .field("serial_number", FieldRule::new().required().validate("numeric"))
        .csv_file("valid", "valid.csv")
        .csv_file("invalid", "invalid.csv");
    let importer = RoutingImporter::new(definition, "valid", "invalid");
    let mut engine = ImportEngine::from_config(importer, config).unwrap();
    engine.attach_source(&source).unwrap();

    assert!(engine.run().unwrap().payload().unwrap().meta.finished);
    let terminal = engine.finish().unwrap();
    assert_eq!(terminal.files.map(|f| f.len()), Some(2));
}
