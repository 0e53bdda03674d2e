//! Import identifiers and the cache slot keys derived from them.

use std::fmt;

/// Namespacing key for all cache and mutex state of one logical import.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImportIdentifier(String);

impl ImportIdentifier {
    /// Creates an identifier from any string.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Derives the default identifier from a Rust type name.
    ///
    /// Uses the short name (last path segment, generics stripped).
    #[must_use]
    pub fn for_type_name(type_name: &str) -> Self {
        let without_generics = type_name.split('<').next().unwrap_or(type_name);
        let short = without_generics
            .rsplit("::")
            .next()
            .unwrap_or(without_generics);
        Self(short.to_string())
    }

    /// Returns a new identifier with the suffix appended.
    #[must_use]
    pub fn concat(&self, suffix: &str) -> Self {
        Self(format!("{}{suffix}", self.0))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derives every progress slot key for this identifier.
    #[must_use]
    pub fn slot_keys(&self) -> SlotKeys {
        SlotKeys::derive(self)
    }
}

impl fmt::Display for ImportIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cache keys of every progress slot of one import.
///
/// Always derived in one go from an identifier; never patched field by field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotKeys {
    /// Output sink paths (forever).
    pub paths: String,
    /// Total row count.
    pub quantity: String,
    /// Processed row counter.
    pub processed: String,
    /// Progress message.
    pub message: String,
    /// Cancel flag.
    pub cancel: String,
    /// Live progress details.
    pub details: String,
    /// Final details (forever).
    pub final_details: String,
    /// Finished flag (forever).
    pub finished: String,
}

impl SlotKeys {
    fn derive(identifier: &ImportIdentifier) -> Self {
        let key = |suffix: &str| format!("{}_{suffix}", identifier.as_str());
        Self {
            paths: key("paths"),
            quantity: key("quantity"),
            processed: key("processed"),
            message: key("message"),
            cancel: key("cancel"),
            details: key("details"),
            final_details: key("final_details"),
            finished: key("finished"),
        }
    }

    /// Returns all keys, for bulk deletion.
    #[must_use]
    pub fn all(&self) -> [&str; 8] {
        [
            &self.paths,
            &self.quantity,
            &self.processed,
            &self.message,
            &self.cancel,
            &self.details,
            &self.final_details,
            &self.finished,
        ]
    }
}
