//! Output file storage.

use chrono::Local;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Creates output files for sinks.
pub trait BlobStore: Send + Sync {
    /// Resolves a sink path against the store root.
    fn resolve(&self, path: &Path) -> PathBuf;

    /// Returns true if a file already exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Creates an empty file at `path`, including parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    fn create(&self, path: &Path) -> Result<File>;

    /// Returns `path`, or a timestamped variant if `path` already exists.
    ///
    /// The time token goes before the extension (`valid_14_03_59_.csv`); a
    /// counter follows it when that name is taken too.
    fn uniquify(&self, path: &Path) -> PathBuf {
        if !self.exists(path) {
            return path.to_path_buf();
        }
        let token = Local::now().format("_%H_%M_%S_").to_string();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();

        let candidate = path.with_file_name(format!("{stem}{token}{extension}"));
        if !self.exists(&candidate) {
            return candidate;
        }
        (2_u32..)
            .map(|n| path.with_file_name(format!("{stem}{token}{n}{extension}")))
            .find(|candidate| !self.exists(candidate))
            .unwrap_or(candidate)
    }
}

/// Blob store on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    /// Creates a store rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl BlobStore for LocalBlobStore {
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve(path).exists()
    }

    fn create(&self, path: &Path) -> Result<File> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::operation("create_sink_dir", e))?;
        }
        File::create(&full).map_err(|e| Error::operation("create_sink_file", e))
    }
}
