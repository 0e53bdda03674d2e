//! Advisory file locks.
//!
//! A lock is a file holding the owner token and the expiry. The record is
//! written to a staging file first and hard-linked into place, so the lock
//! file never exists half-written and linking fails if another owner got
//! there first. Expired lock files are taken over under a separate
//! `.takeover` guard, one contender at a time.

use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::{LockFactory, NamedLock, owner_token};
use crate::config::CacheDriver;
use crate::storage::hashed_key;
use crate::{Error, Result};

/// Unparsable lock files younger than this still count as held.
const UNREADABLE_GRACE: Duration = Duration::from_secs(30);
/// Takeover guards older than this are considered abandoned.
const STALE_GUARD: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize, Deserialize)]
struct LockRecord {
    key: String,
    owner: String,
    expires_at: u64,
}

/// What a lock file currently says.
#[derive(Debug)]
enum LockState {
    Free,
    Held(LockRecord),
    Unreadable,
}

/// Lock backed by a file in a shared directory.
#[derive(Debug)]
pub struct FileLock {
    key: String,
    path: PathBuf,
    owner: String,
}

impl FileLock {
    /// Creates a lock for `key` inside `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        let key = key.into();
        let path = dir.into().join(format!("{}.lock", hashed_key(&key)));
        Self {
            key,
            path,
            owner: owner_token(),
        }
    }

    fn read_state(&self) -> Result<LockState> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(serde_json::from_str(&content)
                .map_or(LockState::Unreadable, LockState::Held)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(LockState::Free),
            Err(e) => Err(Error::operation("read_lock_file", e)),
        }
    }

    fn is_stale(&self, state: &LockState) -> bool {
        match state {
            LockState::Free => false,
            LockState::Held(record) => record.expires_at <= now_millis(),
            LockState::Unreadable => older_than(&self.path, UNREADABLE_GRACE),
        }
    }

    /// Publishes a complete record at the lock path, failing if one exists.
    fn try_create(&self, ttl: Duration) -> Result<bool> {
        let record = LockRecord {
            key: self.key.clone(),
            owner: self.owner.clone(),
            expires_at: now_millis().saturating_add(duration_millis(ttl)),
        };
        let content =
            serde_json::to_vec(&record).map_err(|e| Error::operation("serialize_lock", e))?;

        let staging = self.path.with_extension(format!("{}.tmp", self.owner));
        let written = File::create(&staging).and_then(|mut file| {
            file.write_all(&content)?;
            file.sync_all()
        });
        if let Err(e) = written {
            let _ = fs::remove_file(&staging);
            return Err(Error::operation("write_lock_file", e));
        }

        let linked = fs::hard_link(&staging, &self.path);
        let _ = fs::remove_file(&staging);
        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(Error::operation("link_lock_file", e)),
        }
    }

    /// Replaces a stale lock file while holding the takeover guard.
    fn take_over(&self, ttl: Duration) -> Result<bool> {
        let Some(_guard) = TakeoverGuard::acquire(self.path.with_extension("takeover"))? else {
            return Ok(false);
        };
        // Another contender may have replaced the file before we got the guard.
        let state = self.read_state()?;
        if matches!(state, LockState::Free) {
            return self.try_create(ttl);
        }
        if !self.is_stale(&state) {
            return Ok(false);
        }
        tracing::debug!(key = %self.key, "Taking over expired lock");
        match fs::remove_file(&self.path) {
            Ok(()) => {},
            Err(e) if e.kind() == ErrorKind::NotFound => {},
            Err(e) => return Err(Error::operation("remove_lock_file", e)),
        }
        self.try_create(ttl)
    }
}

/// Exclusive right to replace one lock file, removed on drop.
struct TakeoverGuard {
    path: PathBuf,
}

impl TakeoverGuard {
    fn acquire(path: PathBuf) -> Result<Option<Self>> {
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(Some(Self { path })),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                if older_than(&path, STALE_GUARD) {
                    let _ = fs::remove_file(&path);
                }
                Ok(None)
            },
            Err(e) => Err(Error::operation("create_takeover_guard", e)),
        }
    }
}

impl Drop for TakeoverGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn older_than(path: &Path, age: Duration) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .is_some_and(|elapsed| elapsed > age)
}

#[allow(clippy::cast_possible_truncation)]
fn duration_millis(d: Duration) -> u64 {
    d.as_millis() as u64
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(duration_millis)
        .unwrap_or(0)
}

impl NamedLock for FileLock {
    fn acquire(&self, ttl: Duration) -> Result<bool> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::operation("create_lock_dir", e))?;
        }
        if self.try_create(ttl)? {
            return Ok(true);
        }
        let state = self.read_state()?;
        match state {
            LockState::Free => self.try_create(ttl),
            _ if self.is_stale(&state) => self.take_over(ttl),
            _ => Ok(false),
        }
    }

    fn release(&self) -> Result<bool> {
        match self.read_state()? {
            LockState::Held(record) if record.owner == self.owner => {
                fs::remove_file(&self.path).map_err(|e| Error::operation("remove_lock_file", e))?;
                Ok(true)
            },
            _ => Ok(false),
        }
    }

    fn is_held(&self) -> Result<bool> {
        let state = self.read_state()?;
        Ok(!matches!(state, LockState::Free) && !self.is_stale(&state))
    }

    fn key(&self) -> &str {
        &self.key
    }
}

/// Creates file locks inside one directory.
#[derive(Debug, Clone)]
pub struct FileLockFactory {
    dir: PathBuf,
}

impl FileLockFactory {
    /// Creates a factory for locks under `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl LockFactory for FileLockFactory {
    fn named_lock(&self, key: &str) -> Box<dyn NamedLock> {
        Box::new(FileLock::new(self.dir.clone(), key))
    }

    fn driver(&self) -> CacheDriver {
        CacheDriver::File
    }
}
