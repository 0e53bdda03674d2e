//! Import services.
//!
//! [`ImportEngine`] orchestrates one import: the [`ImportMutex`] guards the
//! run, the [`ProgressStore`] publishes its state, and user code plugs in
//! through the [`Importer`] hooks. Collaborators are injected through
//! [`ImportServices`].

mod context;
mod engine;
mod importer;
mod mutex;
mod progress;
mod routing;

pub use context::ImportContext;
pub use engine::{Canceled, ImportEngine, RunOutcome};
pub use importer::Importer;
pub use mutex::ImportMutex;
pub use progress::ProgressStore;
pub use routing::RoutingImporter;

use std::sync::Arc;

use crate::config::ImporterConfig;
use crate::io::{BlobStore, LocalBlobStore};
use crate::rules::{DeclarativeValidator, StandardValidator};
use crate::storage::{BackendFactory, Backends, CacheStore, LockFactory};
use crate::{Error, Result};

/// Collaborators of an [`ImportEngine`].
#[derive(Clone)]
pub struct ImportServices {
    cache: Arc<dyn CacheStore>,
    locks: Arc<dyn LockFactory>,
    blobs: Arc<dyn BlobStore>,
    validator: Arc<dyn DeclarativeValidator>,
}

impl ImportServices {
    /// Assembles services from explicit parts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the lock factory does not live in
    /// the same backend as the cache.
    pub fn new(
        cache: Arc<dyn CacheStore>,
        locks: Arc<dyn LockFactory>,
        blobs: Arc<dyn BlobStore>,
        validator: Arc<dyn DeclarativeValidator>,
    ) -> Result<Self> {
        if cache.driver() != locks.driver() {
            return Err(Error::Configuration(format!(
                "lock driver '{}' does not match cache driver '{}'",
                locks.driver().as_str(),
                cache.driver().as_str()
            )));
        }
        Ok(Self {
            cache,
            locks,
            blobs,
            validator,
        })
    }

    /// Builds the configured backends, a local blob store and the standard validator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for an unsupported cache driver, or
    /// an error if a backend cannot be opened.
    pub fn from_config(config: &ImporterConfig) -> Result<Self> {
        let Backends { cache, locks } = BackendFactory::create(&config.cache)?;
        Self::new(
            cache,
            locks,
            Arc::new(LocalBlobStore::new(&config.storage_root)),
            Arc::new(StandardValidator::new()),
        )
    }

    /// Replaces the declarative validator.
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn DeclarativeValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Replaces the blob store.
    #[must_use]
    pub fn with_blob_store(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = blobs;
        self
    }

    /// The progress cache.
    #[must_use]
    pub fn cache(&self) -> Arc<dyn CacheStore> {
        Arc::clone(&self.cache)
    }

    /// The lock factory.
    #[must_use]
    pub fn locks(&self) -> &dyn LockFactory {
        self.locks.as_ref()
    }

    /// The output blob store.
    #[must_use]
    pub fn blobs(&self) -> &dyn BlobStore {
        self.blobs.as_ref()
    }

    /// The declarative validator.
    #[must_use]
    pub fn validator(&self) -> Arc<dyn DeclarativeValidator> {
        Arc::clone(&self.validator)
    }
}

impl std::fmt::Debug for ImportServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportServices")
            .field("cache", &self.cache.driver())
            .field("locks", &self.locks.driver())
            .finish_non_exhaustive()
    }
}
