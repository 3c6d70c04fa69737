//! Task snapshot normalization.
//!
//! Upstream snapshots arrive with loosely-typed timestamps -- RFC 3339 text
//! from some stores, epoch milliseconds from others, and occasionally absent
//! altogether. Everything is coerced into [`Task`] at this boundary; the
//! scheduling logic never sees a malformed value.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Task priority. Governs reminder cadence and which actions a
/// notification carries.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Normal,
    Medium,
    High,
}

/// A timestamp as it appears in an upstream snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    /// Milliseconds since the Unix epoch.
    Millis(i64),
    /// RFC 3339 text.
    Text(String),
}

impl RawTimestamp {
    fn resolve(&self, task_id: &str) -> Result<DateTime<Utc>, ValidationError> {
        match self {
            RawTimestamp::Millis(ms) => Utc.timestamp_millis_opt(*ms).single().ok_or_else(|| {
                ValidationError::UnparseableTimestamp {
                    task_id: task_id.to_string(),
                    value: ms.to_string(),
                }
            }),
            RawTimestamp::Text(text) => DateTime::parse_from_rfc3339(text)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| ValidationError::UnparseableTimestamp {
                    task_id: task_id.to_string(),
                    value: text.clone(),
                }),
        }
    }
}

/// A task as pushed by the task store. The store owns the data of record;
/// the engine only reads a snapshot of it per scheduling cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInput {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub start: Option<RawTimestamp>,
    #[serde(default)]
    pub end: Option<RawTimestamp>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub completed: bool,
}

impl TaskInput {
    /// Coerce the snapshot entry into a validated [`Task`].
    ///
    /// Rejects empty ids, missing or unparseable timestamps, and inverted
    /// ranges. Rejected tasks are skipped by the orchestrator; rejection is
    /// never fatal and never retried.
    pub fn normalize(&self) -> Result<Task, ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::EmptyId);
        }
        let start = self
            .start
            .as_ref()
            .ok_or_else(|| ValidationError::MissingField {
                task_id: self.id.clone(),
                field: "start",
            })?
            .resolve(&self.id)?;
        let end = self
            .end
            .as_ref()
            .ok_or_else(|| ValidationError::MissingField {
                task_id: self.id.clone(),
                field: "end",
            })?
            .resolve(&self.id)?;
        if start >= end {
            return Err(ValidationError::InvalidTimeRange {
                task_id: self.id.clone(),
                start,
                end,
            });
        }
        Ok(Task {
            id: self.id.clone(),
            title: self.title.clone(),
            start,
            end,
            priority: self.priority,
            completed: self.completed,
        })
    }
}

/// Validated internal task value. `start < end` is guaranteed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub priority: Priority,
    pub completed: bool,
}

impl Task {
    /// Within `[start, end)` right now.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now < self.end
    }

    /// Already ended.
    pub fn is_over(&self, now: DateTime<Utc>) -> bool {
        self.end <= now
    }

    /// Starts in the future, within the given look-ahead window.
    pub fn starts_within(&self, now: DateTime<Utc>, window: chrono::Duration) -> bool {
        self.start > now && self.start - now <= window
    }
}
