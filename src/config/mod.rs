//! Configuration management.
//!
//! [`ImporterConfig`] is the base configuration shared by every importer.
//! Importer definitions may override the date format, the delimiter and the
//! encodings per importer type.
//!
//! ```toml
//! mutex_lock_time = 300
//! csv_date_format = "Y-m-d"
//! artifacts = ["\u00a0"]
//!
//! [cache]
//! driver = "redis"
//! redis_url = "redis://localhost:6379"
//!
//! [csv]
//! delimiter = ";"
//!
//! [messages]
//! finished = "Done, press finish"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable overriding the configured cache driver.
pub const CACHE_DRIVER_ENV: &str = "CSV_IMPORTER_CACHE_DRIVER";

/// Default mutex TTL in minutes.
pub const DEFAULT_MUTEX_LOCK_TIME: u64 = 300;

/// Base configuration for the import engine.
#[derive(Debug, Clone)]
pub struct ImporterConfig {
    /// Cache backend used for progress slots and the mutex.
    pub cache: CacheSettings,
    /// Mutex TTL in minutes.
    pub mutex_lock_time: u64,
    /// Overrides the import identifier (defaults to the importer type name).
    pub mutex_lock_key: Option<String>,
    /// Encoding of source files.
    pub input_encoding: String,
    /// Encoding of processed values and output sinks.
    pub output_encoding: String,
    /// Date format for the `date` / `datetime` casts.
    pub csv_date_format: Option<String>,
    /// Field delimiter.
    pub delimiter: char,
    /// Quote character.
    pub enclosure: char,
    /// Escape character.
    pub escape: char,
    /// Record terminator of output sinks.
    pub newline: String,
    /// Substrings replaced by a space before values are trimmed.
    pub artifacts: Vec<String>,
    /// Root directory for relative output sink paths.
    pub storage_root: PathBuf,
    /// Progress phase messages.
    pub messages: ProgressMessages,
}

/// Cache backend settings.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Selected driver.
    pub driver: CacheDriver,
    /// Directory of the file cache (and file locks).
    pub path: PathBuf,
    /// Redis connection URL.
    pub redis_url: Option<String>,
    /// Memcached connection URL (`memcache://host:port`).
    pub memcached_url: Option<String>,
    /// Prefix prepended to every cache and lock key.
    pub prefix: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            driver: CacheDriver::File,
            path: PathBuf::from(".csv-importer").join("cache"),
            redis_url: None,
            memcached_url: None,
            prefix: "csv_importer".to_string(),
        }
    }
}

/// Available cache drivers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CacheDriver {
    /// Files on the local filesystem.
    #[default]
    File,
    /// Memcached server.
    Memcached,
    /// Redis server.
    Redis,
    /// A driver name with no lock implementation.
    Unsupported(String),
}

impl CacheDriver {
    /// Parses a driver name.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "file" | "filesystem" => Self::File,
            "memcached" | "memcache" => Self::Memcached,
            "redis" => Self::Redis,
            other => Self::Unsupported(other.to_string()),
        }
    }

    /// Returns the driver name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::File => "file",
            Self::Memcached => "memcached",
            Self::Redis => "redis",
            Self::Unsupported(name) => name,
        }
    }
}

/// Messages shown for each progress phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressMessages {
    /// No run is active.
    pub does_not_running: String,
    /// Lock held, progress bar not initialised.
    pub initialization: String,
    /// Default message while rows are processed.
    pub progress: String,
    /// Every row processed, `after` hook running.
    pub final_stage: String,
    /// Finished, awaiting `finish()`.
    pub finished: String,
    /// Terminal `finish()` message.
    #[serde(rename = "final")]
    pub final_message: String,
    /// The run was canceled.
    pub canceled: String,
}

impl Default for ProgressMessages {
    fn default() -> Self {
        Self {
            does_not_running: "Import process does not run".to_string(),
            initialization: "Initialization".to_string(),
            progress: "Import process is running".to_string(),
            final_stage: "Final stage".to_string(),
            finished: "Almost done, please click to the `finish` button to proceed".to_string(),
            final_message: "The import process successfully finished!".to_string(),
            canceled: "Importing has been canceled".to_string(),
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Mutex TTL in minutes.
    pub mutex_lock_time: Option<u64>,
    /// Import identifier override.
    pub mutex_lock_key: Option<String>,
    /// Source encoding.
    pub input_encoding: Option<String>,
    /// Output encoding.
    pub output_encoding: Option<String>,
    /// Date format.
    pub csv_date_format: Option<String>,
    /// Trimmed artifacts.
    pub artifacts: Option<Vec<String>>,
    /// Storage root.
    pub storage_root: Option<String>,
    /// Cache section.
    pub cache: Option<ConfigFileCache>,
    /// CSV dialect section.
    pub csv: Option<ConfigFileCsv>,
    /// Progress messages.
    pub messages: Option<ProgressMessages>,
}

/// Cache section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileCache {
    /// Driver name.
    pub driver: Option<String>,
    /// File cache directory.
    pub path: Option<String>,
    /// Redis URL.
    pub redis_url: Option<String>,
    /// Memcached URL.
    pub memcached_url: Option<String>,
    /// Key prefix.
    pub prefix: Option<String>,
}

/// CSV dialect section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileCsv {
    /// Field delimiter.
    pub delimiter: Option<char>,
    /// Quote character.
    pub enclosure: Option<char>,
    /// Escape character.
    pub escape: Option<char>,
    /// Record terminator.
    pub newline: Option<String>,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            cache: CacheSettings::default(),
            mutex_lock_time: DEFAULT_MUTEX_LOCK_TIME,
            mutex_lock_key: None,
            input_encoding: "UTF-8".to_string(),
            output_encoding: "UTF-8".to_string(),
            csv_date_format: None,
            delimiter: ',',
            enclosure: '"',
            escape: '\\',
            newline: "\n".to_string(),
            artifacts: Vec::new(),
            storage_root: PathBuf::from("."),
            messages: ProgressMessages::default(),
        }
    }
}

impl ImporterConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &std::path::Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::operation("read_config_file", e))?;

        let file: ConfigFile = toml::from_str(&contents)
            .map_err(|e| crate::Error::Configuration(format!("invalid config file: {e}")))?;

        Ok(Self::from_config_file(file).with_env_overrides())
    }

    /// Loads configuration from the default location.
    ///
    /// Reads `csv-importer/config.toml` from the platform config dir and
    /// falls back to defaults when it is missing or unreadable.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default().with_env_overrides();
        };

        let platform_config = base_dirs
            .config_dir()
            .join("csv-importer")
            .join("config.toml");
        if platform_config.exists() {
            match Self::load_from_file(&platform_config) {
                Ok(config) => return config,
                Err(e) => tracing::warn!(
                    path = %platform_config.display(),
                    error = %e,
                    "Ignoring unreadable config file"
                ),
            }
        }

        Self::default().with_env_overrides()
    }

    /// Converts a parsed config file, keeping defaults for absent keys.
    #[must_use]
    pub fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(minutes) = file.mutex_lock_time {
            config.mutex_lock_time = minutes;
        }
        config.mutex_lock_key = file.mutex_lock_key;
        if let Some(encoding) = file.input_encoding {
            config.input_encoding = encoding;
        }
        if let Some(encoding) = file.output_encoding {
            config.output_encoding = encoding;
        }
        config.csv_date_format = file.csv_date_format;
        if let Some(artifacts) = file.artifacts {
            config.artifacts = artifacts;
        }
        if let Some(root) = file.storage_root {
            config.storage_root = PathBuf::from(root);
        }
        if let Some(messages) = file.messages {
            config.messages = messages;
        }

        if let Some(cache) = file.cache {
            if let Some(driver) = cache.driver {
                config.cache.driver = CacheDriver::parse(&driver);
            }
            if let Some(path) = cache.path {
                config.cache.path = PathBuf::from(path);
            }
            config.cache.redis_url = cache.redis_url;
            config.cache.memcached_url = cache.memcached_url;
            if let Some(prefix) = cache.prefix {
                config.cache.prefix = prefix;
            }
        }

        if let Some(csv) = file.csv {
            config.delimiter = csv.delimiter.unwrap_or(config.delimiter);
            config.enclosure = csv.enclosure.unwrap_or(config.enclosure);
            config.escape = csv.escape.unwrap_or(config.escape);
            if let Some(newline) = csv.newline {
                config.newline = newline;
            }
        }

        config
    }

    /// Applies `CSV_IMPORTER_CACHE_DRIVER` if it is set.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(driver) = std::env::var(CACHE_DRIVER_ENV) {
            if !driver.trim().is_empty() {
                self.cache.driver = CacheDriver::parse(&driver);
            }
        }
        self
    }

    /// Sets the cache driver.
    #[must_use]
    pub fn with_cache_driver(mut self, driver: CacheDriver) -> Self {
        self.cache.driver = driver;
        self
    }

    /// Sets the file cache directory.
    #[must_use]
    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache.path = path.into();
        self
    }

    /// Sets the storage root for output sinks.
    #[must_use]
    pub fn with_storage_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_root = path.into();
        self
    }

    /// Sets the mutex TTL in minutes.
    #[must_use]
    pub const fn with_mutex_lock_time(mut self, minutes: u64) -> Self {
        self.mutex_lock_time = minutes;
        self
    }

    /// Sets the date format.
    #[must_use]
    pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
        self.csv_date_format = Some(format.into());
        self
    }

    /// Returns the mutex TTL as a duration.
    #[must_use]
    pub const fn lock_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.mutex_lock_time.saturating_mul(60))
    }
}
