//! Progress slots of one import, stored in the shared cache.

use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::models::{ImportIdentifier, ProgressSnapshot, SlotKeys};
use crate::storage::CacheStore;
use crate::{Error, Result};

/// Typed access to the progress slots of an import identifier.
///
/// `finished`, `final_details` and `paths` are written without expiration so
/// a client can still collect them after the lock is released. Every other
/// slot expires with the mutex TTL.
#[derive(Clone)]
pub struct ProgressStore {
    cache: Arc<dyn CacheStore>,
    keys: SlotKeys,
    ttl: Duration,
}

impl ProgressStore {
    /// Creates the store for `identifier`.
    #[must_use]
    pub fn new(cache: Arc<dyn CacheStore>, identifier: &ImportIdentifier, ttl: Duration) -> Self {
        Self {
            cache,
            keys: identifier.slot_keys(),
            ttl,
        }
    }

    /// The slot keys in use.
    #[must_use]
    pub const fn keys(&self) -> &SlotKeys {
        &self.keys
    }

    /// Resets the counter and sets the message and total.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be written.
    pub fn init(&self, message: &str, quantity: u64) -> Result<()> {
        self.drop_processed()?;
        self.set_message(message)?;
        self.cache
            .put(&self.keys.quantity, &Value::from(quantity), self.ttl)
    }

    /// Resets the processed counter to zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be written.
    pub fn drop_processed(&self) -> Result<()> {
        self.cache
            .put(&self.keys.processed, &Value::from(0_u64), self.ttl)
    }

    /// Adds one processed row and returns the new count.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache increment fails.
    pub fn increment(&self) -> Result<u64> {
        let count = self.cache.increment(&self.keys.processed)?;
        u64::try_from(count)
            .map_err(|_| Error::operation("increment_progress", format!("negative count {count}")))
    }

    /// Sets the progress message.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be written.
    pub fn set_message(&self, message: &str) -> Result<()> {
        self.cache
            .put(&self.keys.message, &Value::from(message), self.ttl)
    }

    /// Sets the live details.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be written.
    pub fn set_details(&self, details: &Value) -> Result<()> {
        self.cache.put(&self.keys.details, details, self.ttl)
    }

    /// Sets the details of the terminal payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be written.
    pub fn set_final_details(&self, details: &Value) -> Result<()> {
        self.cache.forever(&self.keys.final_details, details)
    }

    /// Records the output sink paths.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be written.
    pub fn set_paths(&self, paths: &IndexMap<String, String>) -> Result<()> {
        let value =
            serde_json::to_value(paths).map_err(|e| Error::operation("serialize_paths", e))?;
        self.cache.forever(&self.keys.paths, &value)
    }

    /// Sets the finished flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be written.
    pub fn mark_finished(&self) -> Result<()> {
        self.cache.forever(&self.keys.finished, &Value::Bool(true))
    }

    /// Returns true once the finished flag is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be read.
    pub fn is_finished(&self) -> Result<bool> {
        Ok(self.cache.get(&self.keys.finished)?.is_some_and(|v| truthy(&v)))
    }

    /// Raises the cancel flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be written.
    pub fn cancel(&self) -> Result<()> {
        self.cache.put(&self.keys.cancel, &Value::Bool(true), self.ttl)
    }

    /// Returns true if the cancel flag is raised.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be read.
    pub fn is_canceled(&self) -> Result<bool> {
        Ok(self.cache.get(&self.keys.cancel)?.is_some_and(|v| truthy(&v)))
    }

    /// Reads every slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be read.
    pub fn snapshot(&self) -> Result<ProgressSnapshot> {
        let paths = match self.cache.get(&self.keys.paths)? {
            Some(value) => serde_json::from_value(value).unwrap_or_default(),
            None => IndexMap::new(),
        };
        Ok(ProgressSnapshot {
            processed: self
                .cache
                .get(&self.keys.processed)?
                .and_then(|v| as_u64(&v))
                .unwrap_or(0),
            quantity: self.cache.get(&self.keys.quantity)?.and_then(|v| as_u64(&v)),
            message: self.cache.get(&self.keys.message)?.and_then(|v| match v {
                Value::String(s) => Some(s),
                Value::Null => None,
                other => Some(other.to_string()),
            }),
            finished: self.is_finished()?,
            details: self.cache.get(&self.keys.details)?,
            final_details: self.cache.get(&self.keys.final_details)?,
            paths,
        })
    }

    /// Deletes every slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be written.
    pub fn clear(&self) -> Result<()> {
        for key in self.keys.all() {
            self.cache.forget(key)?;
        }
        tracing::debug!(key = %self.keys.finished, "Cleared progress slots");
        Ok(())
    }
}

impl std::fmt::Debug for ProgressStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressStore")
            .field("driver", &self.cache.driver())
            .field("keys", &self.keys)
            .field("ttl", &self.ttl)
            .finish()
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
