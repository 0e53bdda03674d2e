//! File-backed cache.
//!
//! Each key is stored as `{dir}/{sha256(key)}.json` holding
//! `{"expires_at": <unix ms or null>, "value": <json>}`. Writes go through a
//! temporary file and a rename, so readers never see partial entries.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use super::CacheStore;
use crate::config::CacheDriver;
use crate::storage::hashed_key;
use crate::{Error, Result};

/// How long `increment` waits for the per-key guard.
const GUARD_TIMEOUT: Duration = Duration::from_secs(5);
/// Guards older than this are considered abandoned.
const STALE_GUARD: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize, Deserialize)]
struct Entry {
    expires_at: Option<u64>,
    value: Value,
}

impl Entry {
    fn is_expired(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Cache storing one JSON file per key.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    /// Creates the cache, creating `dir` if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| Error::operation("create_cache_dir", e))?;
        Ok(Self { dir })
    }

    /// Returns the cache directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", hashed_key(key)))
    }

    fn read_entry(&self, key: &str) -> Result<Option<Entry>> {
        let path = self.entry_path(key);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::operation("read_cache_entry", e)),
        };
        let Ok(entry) = serde_json::from_str::<Entry>(&content) else {
            tracing::warn!(key = %key, "Discarding corrupt cache entry");
            let _ = fs::remove_file(&path);
            return Ok(None);
        };
        if entry.is_expired(now_millis()) {
            let _ = fs::remove_file(&path);
            return Ok(None);
        }
        Ok(Some(entry))
    }

    fn write_entry(&self, key: &str, entry: &Entry) -> Result<()> {
        let path = self.entry_path(key);
        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", hashed_key(key), uuid::Uuid::new_v4()));
        let content =
            serde_json::to_vec(entry).map_err(|e| Error::operation("serialize_cache_entry", e))?;
        fs::write(&tmp, content).map_err(|e| Error::operation("write_cache_entry", e))?;
        fs::rename(&tmp, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            Error::operation("rename_cache_entry", e)
        })
    }

    /// Serialises read-modify-write cycles on one key across processes.
    fn guard(&self, key: &str) -> Result<KeyGuard> {
        let path = self.dir.join(format!("{}.guard", hashed_key(key)));
        let started = Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(KeyGuard { path }),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if is_stale(&path) {
                        let _ = fs::remove_file(&path);
                        continue;
                    }
                    if started.elapsed() > GUARD_TIMEOUT {
                        return Err(Error::operation(
                            "cache_increment",
                            format!("timed out waiting for guard on '{key}'"),
                        ));
                    }
                    std::thread::sleep(Duration::from_millis(2));
                },
                Err(e) => return Err(Error::operation("create_cache_guard", e)),
            }
        }
    }
}

struct KeyGuard {
    path: PathBuf,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn is_stale(path: &Path) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .is_some_and(|age| age > STALE_GUARD)
}

#[allow(clippy::cast_possible_truncation)]
fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[allow(clippy::cast_possible_truncation)]
fn expiry(ttl: Duration) -> u64 {
    now_millis().saturating_add(ttl.as_millis() as u64)
}

impl CacheStore for FileCache {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.read_entry(key)?.map(|entry| entry.value))
    }

    fn put(&self, key: &str, value: &Value, ttl: Duration) -> Result<()> {
        self.write_entry(
            key,
            &Entry {
                expires_at: Some(expiry(ttl)),
                value: value.clone(),
            },
        )
    }

    fn forever(&self, key: &str, value: &Value) -> Result<()> {
        self.write_entry(
            key,
            &Entry {
                expires_at: None,
                value: value.clone(),
            },
        )
    }

    fn forget(&self, key: &str) -> Result<bool> {
        match fs::remove_file(self.entry_path(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::operation("forget_cache_entry", e)),
        }
    }

    fn increment(&self, key: &str) -> Result<i64> {
        let _guard = self.guard(key)?;
        let current = self.read_entry(key)?;
        let (count, expires_at) = match current {
            Some(entry) => {
                let count = match &entry.value {
                    Value::Number(n) => n.as_i64(),
                    Value::String(s) => s.trim().parse().ok(),
                    _ => None,
                }
                .ok_or_else(|| {
                    Error::operation("cache_increment", format!("'{key}' is not an integer"))
                })?;
                (count + 1, entry.expires_at)
            },
            None => (1, None),
        };
        self.write_entry(
            key,
            &Entry {
                expires_at,
                value: Value::from(count),
            },
        )?;
        Ok(count)
    }

    fn driver(&self) -> CacheDriver {
        CacheDriver::File
    }
}
