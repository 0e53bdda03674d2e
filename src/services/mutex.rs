//! At-most-one run per import identifier.

use std::time::Duration;

use super::ProgressStore;
use crate::Result;
use crate::models::ImportIdentifier;
use crate::storage::lock::lock_key;
use crate::storage::{LockFactory, NamedLock};

/// Named lock of one import, tied to its progress slots.
///
/// [`ImportMutex::unlock`] always clears the progress slots before the lock
/// is released, so a later run under the same identifier never sees stale
/// state.
pub struct ImportMutex {
    lock: Box<dyn NamedLock>,
    progress: ProgressStore,
    ttl: Duration,
}

impl ImportMutex {
    /// Creates the mutex for `identifier`.
    #[must_use]
    pub fn new(
        locks: &dyn LockFactory,
        identifier: &ImportIdentifier,
        progress: ProgressStore,
        ttl: Duration,
    ) -> Self {
        Self {
            lock: locks.named_lock(&lock_key(identifier.as_str())),
            progress,
            ttl,
        }
    }

    /// Tries to take the lock without blocking.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock backend fails.
    pub fn lock(&self) -> Result<bool> {
        let acquired = self.lock.acquire(self.ttl)?;
        tracing::debug!(key = self.lock.key(), acquired, "Import lock requested");
        Ok(acquired)
    }

    /// Clears the progress slots, then releases the lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache or the lock backend fails.
    pub fn unlock(&self) -> Result<bool> {
        self.progress.clear()?;
        self.release()
    }

    /// Releases the lock and keeps the progress slots.
    ///
    /// Used after a successful run: the finished flag and final details
    /// stay readable until the client calls `finish()`.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock backend fails.
    pub fn release(&self) -> Result<bool> {
        let released = self.lock.release()?;
        tracing::debug!(key = self.lock.key(), released, "Import lock released");
        Ok(released)
    }

    /// Returns true if any run holds the lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock backend fails.
    pub fn is_locked(&self) -> Result<bool> {
        self.lock.is_held()
    }

    /// The lock TTL.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl std::fmt::Debug for ImportMutex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportMutex")
            .field("key", &self.lock.key())
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileCache, FileLockFactory};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_unlock_clears_progress_before_release() {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(FileCache::new(dir.path().join("cache")).unwrap());
        let locks = FileLockFactory::new(dir.path().join("locks"));
        let identifier = ImportIdentifier::new("GuitarsImporter");
        let ttl = Duration::from_secs(60);
        let progress = ProgressStore::new(cache, &identifier, ttl);
        let mutex = ImportMutex::new(&locks, &identifier, progress.clone(), ttl);
        let other = ImportMutex::new(&locks, &identifier, progress.clone(), ttl);

        assert!(mutex.lock().unwrap());
        assert!(!other.lock().unwrap());
        assert!(other.is_locked().unwrap());

        progress.mark_finished().unwrap();
        assert!(mutex.unlock().unwrap());
        assert!(!progress.is_finished().unwrap());
        assert!(!other.is_locked().unwrap());
    }

    #[test]
    fn test_release_keeps_progress() {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(FileCache::new(dir.path().join("cache")).unwrap());
        let locks = FileLockFactory::new(dir.path().join("locks"));
        let identifier = ImportIdentifier::new("GuitarsImporter");
        let ttl = Duration::from_secs(60);
        let progress = ProgressStore::new(cache, &identifier, ttl);
        let mutex = ImportMutex::new(&locks, &identifier, progress.clone(), ttl);

        assert!(mutex.lock().unwrap());
        progress.mark_finished().unwrap();
        assert!(mutex.release().unwrap());
        assert!(progress.is_finished().unwrap());
        assert!(!mutex.is_locked().unwrap());
    }
}
