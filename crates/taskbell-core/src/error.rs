//! Core error types for taskbell-core.
//!
//! The engine has no fatal errors: every failure mode degrades to "fewer
//! notifications". The types here exist so callers and logs can tell the
//! degradation modes apart.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Top-level error type for taskbell-core.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Task snapshot validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Notification channel errors
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Errors raised while normalizing a task snapshot at the ingestion
/// boundary. A task that fails validation is skipped, never retried.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Inverted or empty time range
    #[error("Invalid time range for task '{task_id}': end ({end}) must be greater than start ({start})")]
    InvalidTimeRange {
        task_id: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// Required field absent from the snapshot
    #[error("Missing required field '{field}' for task '{task_id}'")]
    MissingField {
        task_id: String,
        field: &'static str,
    },

    /// Timestamp present but not parseable
    #[error("Unparseable timestamp '{value}' for task '{task_id}'")]
    UnparseableTimestamp { task_id: String, value: String },

    /// Task id must be non-empty and stable across snapshots
    #[error("Task id must not be empty")]
    EmptyId,
}

/// Per-channel delivery errors. Each sink fails independently; a failure in
/// one channel never prevents delivery through the others.
#[derive(Error, Debug)]
pub enum SinkError {
    /// The receiving side of the in-app channel went away
    #[error("Notification channel closed")]
    Closed,

    /// Channel exists but the environment cannot service it
    #[error("Notification channel '{name}' unavailable: {message}")]
    Unavailable { name: String, message: String },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for EngineError
pub type Result<T, E = EngineError> = std::result::Result<T, E>;
