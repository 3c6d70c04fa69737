//! Scheduling engine orchestration.
//!
//! [`SchedulingEngine`] is the single externally-visible entry point. It
//! owns the engine-wide state behind one mutex and drives the rate guard,
//! the per-task timer registry and the notification dispatcher. Timer
//! bodies run as tokio tasks and re-enter the state through the same mutex;
//! the lock is never held across an await point, and notifications are
//! delivered to sinks outside the lock.
//!
//! Per task the conceptual lifecycle is:
//!
//! ```text
//! Unscheduled -> PendingStart -> Active -> Finished
//! ```
//!
//! with suppression driven by the focus-timer flag and cancellation
//! possible from any state (completion, deletion, teardown).

pub mod rate_guard;

mod dispatcher;
mod registry;

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::{EngineConfig, NotificationSettings};
use crate::events::NotificationKind;
use crate::sink::{deliver_all, NotificationSink};
use crate::task::{Task, TaskInput};

use dispatcher::{NotificationDispatcher, SuppressionView};
use rate_guard::{Decision, RateGuard};
use registry::{TaskTimerRegistry, TimerKind};

/// Outcome of a [`SchedulingEngine::schedule`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// Admitted. `timers` are live after the pass, `purged` stale entries
    /// were removed.
    Scheduled { timers: usize, purged: usize },
    /// Rejected by the rate guard; no side effects.
    Rejected(Decision),
    /// Notifications are disabled in settings; no side effects.
    Disabled,
}

/// Engine-wide mutable state. Single-writer: every mutation goes through
/// the mutex in [`EngineCore`]. Callers never touch this directly; the
/// setter operations on [`SchedulingEngine`] are the only doors in.
struct EngineState {
    guard: RateGuard,
    registry: TaskTimerRegistry,
    dispatcher: NotificationDispatcher,
    settings: NotificationSettings,
    /// A focus timer is running; reminders are withheld until it stops.
    focus_active: bool,
    /// Task the focus timer was started for, if any. Diagnostic only.
    focus_task: Option<String>,
    /// While set and in the future, no emissions are accepted. Raised by
    /// every bulk teardown to cover the cancel/re-schedule overlap.
    blocked_until: Option<DateTime<Utc>>,
}

impl EngineState {
    fn suppression(&self, now: DateTime<Utc>) -> SuppressionView {
        SuppressionView {
            lockout: self.guard.is_locked_out(now),
            blocked: self.blocked_until.is_some_and(|until| now < until),
            focus_active: self.focus_active,
        }
    }

    /// Cancel every live timer and open the transient blocked window.
    fn teardown(&mut self, now: DateTime<Utc>, blocked: chrono::Duration, reason: &str) {
        let cancelled = self.registry.len();
        self.registry.cancel_all();
        self.blocked_until = Some(now + blocked);
        info!(cancelled, reason, "tore down all live timers");
    }
}

struct EngineCore {
    state: Mutex<EngineState>,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl EngineCore {
    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The notification scheduling engine.
///
/// Constructible multiple times; each instance owns its state outright, so
/// tests can run engines side by side without interference.
pub struct SchedulingEngine {
    core: Arc<EngineCore>,
}

impl SchedulingEngine {
    pub fn new(
        config: EngineConfig,
        settings: NotificationSettings,
        clock: Arc<dyn Clock>,
        sinks: Vec<Arc<dyn NotificationSink>>,
    ) -> Self {
        let guard = RateGuard::new(&config);
        Self {
            core: Arc::new(EngineCore {
                state: Mutex::new(EngineState {
                    guard,
                    registry: TaskTimerRegistry::default(),
                    dispatcher: NotificationDispatcher::new(),
                    settings,
                    focus_active: false,
                    focus_task: None,
                    blocked_until: None,
                }),
                config,
                clock,
                sinks,
            }),
        }
    }

    /// Process a full task snapshot.
    ///
    /// Called whenever the task store's snapshot changes or settings
    /// change. Must run within a tokio runtime: admitted passes spawn one
    /// timer task per newly relevant task.
    pub fn schedule(&self, inputs: &[TaskInput], now: DateTime<Utc>) -> ScheduleOutcome {
        let core = &self.core;
        let mut state = core.lock();

        if !state.settings.enabled {
            debug!("scheduling skipped: notifications disabled");
            return ScheduleOutcome::Disabled;
        }

        let decision = state.guard.admit(now);
        if state.guard.take_trip() {
            warn!("call-frequency threshold exceeded, tripping lockout");
            state.teardown(now, core.config.blocked(), "rate guard trip");
        }
        if decision != Decision::Proceed {
            debug!(?decision, "scheduling call rejected");
            return ScheduleOutcome::Rejected(decision);
        }

        let mut kept: HashSet<String> = HashSet::new();
        for input in inputs {
            let task = match input.normalize() {
                Ok(task) => task,
                Err(e) => {
                    warn!(error = %e, "skipping malformed task");
                    continue;
                }
            };
            if task.completed || task.is_over(now) {
                continue;
            }
            if !task.is_active(now) && !task.starts_within(now, core.config.lookahead()) {
                // Not relevant yet; a later pass closer to its start picks
                // it up, keeping the live timer count bounded.
                continue;
            }
            kept.insert(task.id.clone());
            if state.registry.contains(&task.id) {
                // Leave registered timers untouched so dispatcher records
                // stay meaningful across overlapping snapshots.
                continue;
            }
            self.spawn_timer(&mut state, task, now);
        }

        let purged = state.registry.purge_except(&kept);
        state.dispatcher.prune_stale(now, core.config.dedup_gap());
        let timers = state.registry.len();
        debug!(timers, purged, "scheduling pass complete");
        ScheduleOutcome::Scheduled { timers, purged }
    }

    /// Focus-timer signal from the timer UI.
    ///
    /// Starting a focus session tears down every live reminder outright
    /// (not merely mutes them) and suppresses emissions until the session
    /// ends; the next snapshot pass re-schedules what is still relevant.
    pub fn set_focus_timer_active(&self, active: bool, task_id: Option<String>) {
        let now = self.core.clock.now();
        let mut state = self.core.lock();
        state.focus_active = active;
        state.focus_task = if active { task_id } else { None };
        if active {
            state.teardown(now, self.core.config.blocked(), "focus timer started");
            info!(task_id = ?state.focus_task, "focus timer active, notifications suppressed");
        } else {
            info!("focus timer stopped, notifications resume on next pass");
        }
    }

    /// Replace the user notification settings.
    pub fn update_settings(&self, settings: NotificationSettings) {
        let now = self.core.clock.now();
        let mut state = self.core.lock();
        let disabling = state.settings.enabled && !settings.enabled;
        state.settings = settings;
        if disabling {
            state.teardown(now, self.core.config.blocked(), "notifications disabled");
        }
    }

    /// Cancel the timer for one task (completed, deleted or snoozed).
    pub fn cancel_task(&self, task_id: &str) -> bool {
        let mut state = self.core.lock();
        let cancelled = state.registry.cancel(task_id);
        debug!(task_id, cancelled, "explicit task cancellation");
        cancelled
    }

    /// Manual override: cancel everything and block emissions briefly.
    pub fn emergency_stop(&self) {
        let now = self.core.clock.now();
        let mut state = self.core.lock();
        state.teardown(now, self.core.config.blocked(), "emergency stop");
    }

    /// Number of live timers. Diagnostic.
    pub fn live_timers(&self) -> usize {
        self.core.lock().registry.len()
    }

    /// Whether a timer is registered for the task id. Diagnostic.
    pub fn has_timer(&self, task_id: &str) -> bool {
        self.core.lock().registry.contains(task_id)
    }

    /// Whether the breaker currently rejects admissions.
    pub fn is_locked_out(&self, now: DateTime<Utc>) -> bool {
        self.core.lock().guard.is_locked_out(now)
    }

    fn spawn_timer(&self, state: &mut EngineState, task: Task, now: DateTime<Utc>) {
        let generation = state.registry.next_generation();
        let core = Arc::clone(&self.core);
        let task_id = task.id.clone();
        if task.is_active(now) {
            debug!(task_id = %task_id, "task already active, starting reminders");
            let handle = tokio::spawn(run_reminder_ticks(core, task, generation));
            state
                .registry
                .insert(task_id, TimerKind::ReminderTick, generation, handle);
        } else {
            debug!(task_id = %task_id, start = %task.start, "waiting for task start");
            let handle = tokio::spawn(run_pending_start(core, task, generation));
            state
                .registry
                .insert(task_id, TimerKind::PendingStart, generation, handle);
        }
    }
}

impl Drop for SchedulingEngine {
    fn drop(&mut self) {
        self.core.lock().registry.cancel_all();
    }
}

/// One-shot wait for a task's start.
///
/// Sleeps to the lead-reminder point (when one applies), then to
/// `task.start`, then promotes itself to the recurring reminder tick under
/// a fresh generation. Suppression is re-checked at the start instant: a
/// suppressed activation drops the timer and a later pass re-creates it.
async fn run_pending_start(core: Arc<EngineCore>, task: Task, generation: u64) {
    let lead = core.lock().settings.lead();
    let now = core.clock.now();
    let remind_at = task.start - lead;
    if lead > chrono::Duration::zero() && remind_at > now {
        sleep_for(remind_at - now).await;
        let note = {
            let mut state = core.lock();
            if !state.registry.is_current(&task.id, generation) {
                return;
            }
            let at = core.clock.now();
            let suppression = state.suppression(at);
            let settings = state.settings.clone();
            state.dispatcher.maybe_notify(
                &task,
                at,
                NotificationKind::Upcoming,
                suppression,
                &core.config,
                &settings,
            )
        };
        if let Some(note) = note {
            deliver_all(&core.sinks, &note);
        }
    }

    let now = core.clock.now();
    if task.start > now {
        sleep_for(task.start - now).await;
    }

    let mut state = core.lock();
    if !state.registry.is_current(&task.id, generation) {
        // Logically cancelled while we slept; the abort may not have
        // landed yet, so observe the generation and no-op.
        return;
    }
    let at = core.clock.now();
    if task.is_over(at) {
        state.registry.remove_if_current(&task.id, generation);
        return;
    }
    if state.suppression(at).any() {
        debug!(task_id = %task.id, "activation suppressed, dropping timer");
        state.registry.remove_if_current(&task.id, generation);
        return;
    }
    let next_generation = state.registry.next_generation();
    let handle = tokio::spawn(run_reminder_ticks(
        Arc::clone(&core),
        task.clone(),
        next_generation,
    ));
    state.registry.remove_if_current(&task.id, generation);
    state
        .registry
        .insert(task.id.clone(), TimerKind::ReminderTick, next_generation, handle);
}

/// Recurring reminder loop for an active task.
///
/// The first tick fires immediately and carries the "task started"
/// notification; subsequent ticks re-validate the `[start, end)` window and
/// emit in-progress reminders. The loop retires itself once the task ends.
async fn run_reminder_ticks(core: Arc<EngineCore>, task: Task, generation: u64) {
    let mut interval = tokio::time::interval(core.config.tick_period(task.priority));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut first = true;
    loop {
        interval.tick().await;
        let now = core.clock.now();
        let note = {
            let mut state = core.lock();
            if !state.registry.is_current(&task.id, generation) {
                return;
            }
            if task.is_over(now) {
                state.registry.remove_if_current(&task.id, generation);
                return;
            }
            let kind = if first {
                NotificationKind::TaskStarted
            } else {
                NotificationKind::StillInProgress
            };
            let suppression = state.suppression(now);
            let settings = state.settings.clone();
            state
                .dispatcher
                .maybe_notify(&task, now, kind, suppression, &core.config, &settings)
        };
        if let Some(note) = note {
            debug!(task_id = %task.id, kind = ?note.kind, "emitting notification");
            deliver_all(&core.sinks, &note);
        }
        first = false;
    }
}

async fn sleep_for(duration: chrono::Duration) {
    if let Ok(duration) = duration.to_std() {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::sink::InAppSink;
    use crate::task::{Priority, RawTimestamp};
    use chrono::Duration;

    fn engine_with_defaults() -> (SchedulingEngine, tokio::sync::mpsc::UnboundedReceiver<crate::events::Notification>) {
        let (sink, rx) = InAppSink::channel();
        let engine = SchedulingEngine::new(
            EngineConfig::default(),
            NotificationSettings::default(),
            Arc::new(SystemClock),
            vec![sink],
        );
        (engine, rx)
    }

    fn input(id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> TaskInput {
        TaskInput {
            id: id.to_string(),
            title: format!("Task {id}"),
            start: Some(RawTimestamp::Text(start.to_rfc3339())),
            end: Some(RawTimestamp::Text(end.to_rfc3339())),
            priority: Priority::Normal,
            completed: false,
        }
    }

    #[tokio::test]
    async fn disabled_settings_short_circuit() {
        let (sink, _rx) = InAppSink::channel();
        let engine = SchedulingEngine::new(
            EngineConfig::default(),
            NotificationSettings {
                enabled: false,
                ..NotificationSettings::default()
            },
            Arc::new(SystemClock),
            vec![sink],
        );
        let now = Utc::now();
        let outcome = engine.schedule(&[input("t1", now, now + Duration::hours(1))], now);
        assert_eq!(outcome, ScheduleOutcome::Disabled);
        assert_eq!(engine.live_timers(), 0);
    }

    #[tokio::test]
    async fn malformed_and_completed_tasks_are_filtered() {
        let (engine, _rx) = engine_with_defaults();
        let now = Utc::now();
        let mut completed = input("done", now, now + Duration::hours(1));
        completed.completed = true;
        let missing_end = TaskInput {
            end: None,
            ..input("bad", now, now + Duration::hours(1))
        };
        let over = input("over", now - Duration::hours(2), now - Duration::hours(1));

        let outcome = engine.schedule(&[completed, missing_end, over], now);
        assert_eq!(outcome, ScheduleOutcome::Scheduled { timers: 0, purged: 0 });
    }

    #[tokio::test]
    async fn cancel_task_removes_its_timer() {
        let (engine, _rx) = engine_with_defaults();
        let now = Utc::now();
        engine.schedule(
            &[input("t1", now + Duration::minutes(5), now + Duration::minutes(40))],
            now,
        );
        assert!(engine.has_timer("t1"));
        assert!(engine.cancel_task("t1"));
        assert!(!engine.has_timer("t1"));
        assert!(!engine.cancel_task("t1"));
    }

    #[tokio::test]
    async fn disabling_settings_tears_down_timers() {
        let (engine, _rx) = engine_with_defaults();
        let now = Utc::now();
        engine.schedule(
            &[input("t1", now + Duration::minutes(5), now + Duration::minutes(40))],
            now,
        );
        assert_eq!(engine.live_timers(), 1);
        engine.update_settings(NotificationSettings {
            enabled: false,
            ..NotificationSettings::default()
        });
        assert_eq!(engine.live_timers(), 0);
        assert_eq!(engine.schedule(&[], now), ScheduleOutcome::Disabled);
    }
}
