//! Progress snapshots and the payload returned to polling clients.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ProgressMessages;

/// Read-only view over the progress slots at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Rows routed so far.
    pub processed: u64,
    /// Total data rows; `None` until the progress bar is initialised.
    pub quantity: Option<u64>,
    /// Current progress message.
    pub message: Option<String>,
    /// Finished flag.
    pub finished: bool,
    /// Live details set by the importer.
    pub details: Option<Value>,
    /// Details shown once the import is finished.
    pub final_details: Option<Value>,
    /// Output sink paths keyed by sink name.
    pub paths: IndexMap<String, String>,
}

impl ProgressSnapshot {
    /// Returns the quantity, treating `0` the same as unset.
    #[must_use]
    pub fn effective_quantity(&self) -> Option<u64> {
        self.quantity.filter(|q| *q > 0)
    }

    /// Rows left to process.
    #[must_use]
    pub fn remains(&self) -> u64 {
        self.quantity.unwrap_or(0).saturating_sub(self.processed)
    }

    /// `floor(processed / (quantity / 100))`, or `None` without a quantity.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percentage(&self) -> Option<f64> {
        self.effective_quantity()
            .map(|quantity| (self.processed as f64 / (quantity as f64 / 100.0)).floor())
    }
}

/// The four mutually exclusive phases a polling client can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
    /// The finished flag is set.
    Finished,
    /// No quantity and no lock holder.
    NotRunning,
    /// Lock held but the progress bar is not initialised yet.
    Initializing,
    /// Every row processed while the lock is still held.
    FinalStage,
    /// Rows are being processed.
    Running,
}

impl ProgressPhase {
    /// Selects the phase from a snapshot and the current lock state.
    #[must_use]
    pub fn select(snapshot: &ProgressSnapshot, locked: bool) -> Self {
        if snapshot.finished {
            return Self::Finished;
        }
        match snapshot.effective_quantity() {
            None if locked => Self::Initializing,
            None => Self::NotRunning,
            Some(quantity) if quantity == snapshot.processed && locked => Self::FinalStage,
            Some(_) => Self::Running,
        }
    }
}

/// Message and optional details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressData {
    /// Human-readable progress message.
    pub message: String,
    /// Importer supplied details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Phase flags and counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressMeta {
    /// The import finished and awaits `finish()`.
    pub finished: bool,
    /// The import is initialising.
    pub init: bool,
    /// A run holds the lock.
    pub running: bool,
    /// Rows routed so far.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed: Option<u64>,
    /// Rows left.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remains: Option<u64>,
    /// Completion percentage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
}

/// JSON payload returned by `run`, `progress` and `finish`.
///
/// ```json
/// { "data": { "message": "...", "details": {} },
///   "meta": { "finished": false, "init": false, "running": true,
///             "processed": 5, "remains": 5, "percentage": 50.0 },
///   "files": { "valid_entities": "/tmp/valid.csv" } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressPayload {
    /// Message and details.
    pub data: ProgressData,
    /// Phase flags and counters.
    pub meta: ProgressMeta,
    /// Output files, only present on the terminal `finish()` payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<IndexMap<String, String>>,
}

impl ProgressPayload {
    /// Builds the payload for a polling client.
    ///
    /// `details` are only attached in the running phase.
    #[must_use]
    pub fn for_phase(
        phase: ProgressPhase,
        snapshot: &ProgressSnapshot,
        messages: &ProgressMessages,
        details: Option<Value>,
    ) -> Self {
        let flags = |finished, init, running| ProgressMeta {
            finished,
            init,
            running,
            ..ProgressMeta::default()
        };
        match phase {
            ProgressPhase::Finished => Self::plain(&messages.finished, flags(true, false, false)),
            ProgressPhase::NotRunning => {
                Self::plain(&messages.does_not_running, flags(false, false, false))
            },
            ProgressPhase::Initializing => {
                Self::plain(&messages.initialization, flags(false, true, true))
            },
            ProgressPhase::FinalStage => {
                Self::plain(&messages.final_stage, flags(false, false, true))
            },
            ProgressPhase::Running => Self {
                data: ProgressData {
                    message: snapshot
                        .message
                        .clone()
                        .unwrap_or_else(|| messages.progress.clone()),
                    details: details.filter(|d| !d.is_null()),
                },
                meta: ProgressMeta {
                    finished: false,
                    init: false,
                    running: true,
                    processed: Some(snapshot.processed),
                    remains: Some(snapshot.remains()),
                    percentage: snapshot.percentage(),
                },
                files: None,
            },
        }
    }

    /// Builds the terminal payload returned by `finish()`.
    #[must_use]
    pub fn terminal(snapshot: &ProgressSnapshot, messages: &ProgressMessages) -> Self {
        Self {
            data: ProgressData {
                message: messages.final_message.clone(),
                details: snapshot.final_details.clone().filter(|d| !d.is_null()),
            },
            meta: ProgressMeta {
                finished: true,
                ..ProgressMeta::default()
            },
            files: (!snapshot.paths.is_empty()).then(|| snapshot.paths.clone()),
        }
    }

    /// Builds the payload returned when a run was canceled.
    #[must_use]
    pub fn canceled(messages: &ProgressMessages) -> Self {
        Self::plain(&messages.canceled, ProgressMeta::default())
    }

    fn plain(message: &str, meta: ProgressMeta) -> Self {
        Self {
            data: ProgressData {
                message: message.to_string(),
                details: None,
            },
            meta,
            files: None,
        }
    }

    /// Returns true if the payload reports an active run.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.meta.running
    }
}
