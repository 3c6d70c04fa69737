//! # Taskbell Core Library
//!
//! This library provides the notification scheduling and rate-limiting
//! engine for the Taskbell personal task scheduler. The engine receives
//! task snapshots and settings from external collaborators and emits
//! notification events; it owns no task data of record.
//!
//! ## Architecture
//!
//! - **RateGuard**: a circuit breaker protecting the scheduling entry point
//!   from snapshot churn and re-entrant feedback loops
//! - **TaskTimerRegistry**: one generation-stamped tokio timer per task id
//! - **NotificationDispatcher**: due-now decisions with per-task
//!   de-duplication
//! - **SchedulingEngine**: the orchestrator tying the three together behind
//!   a single mutex
//!
//! ## Key Components
//!
//! - [`SchedulingEngine`]: externally-visible entry point
//! - [`TaskInput`]/[`Task`]: snapshot normalization at the boundary
//! - [`NotificationSink`]: pluggable delivery channels, all best-effort
//! - [`Clock`]: injectable time source for deterministic tests

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod sink;
pub mod task;

pub use clock::{Clock, SimClock, SystemClock};
pub use config::{EngineConfig, NotificationSettings};
pub use engine::rate_guard::{Decision, RateGuard};
pub use engine::{ScheduleOutcome, SchedulingEngine};
pub use error::{EngineError, Result, SinkError, ValidationError};
pub use events::{ActionKind, AudioCue, Notification, NotificationAction, NotificationKind};
pub use sink::{InAppSink, NotificationSink};
pub use task::{Priority, RawTimestamp, Task, TaskInput};
