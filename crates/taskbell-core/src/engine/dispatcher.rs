//! Emission decisions and per-task de-duplication.
//!
//! `maybe_notify` is the single gate every would-be emission passes through,
//! no matter which timer or code path asked. Because the dispatcher lives
//! behind the engine mutex, the record update and the emission decision are
//! one atomic step: two racing callers can never both clear the gap check.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::{EngineConfig, NotificationSettings};
use crate::events::{Notification, NotificationKind};
use crate::task::Task;

/// Engine-wide suppression flags, read under the engine lock at decision
/// time.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SuppressionView {
    /// Circuit breaker is open.
    pub lockout: bool,
    /// Within the post-teardown blocked window.
    pub blocked: bool,
    /// A focus timer is running.
    pub focus_active: bool,
}

impl SuppressionView {
    pub fn any(&self) -> bool {
        self.lockout || self.blocked || self.focus_active
    }

    #[cfg(test)]
    pub fn none() -> Self {
        Self {
            lockout: false,
            blocked: false,
            focus_active: false,
        }
    }
}

/// Decides whether a notification is due and builds it.
#[derive(Debug, Default)]
pub(crate) struct NotificationDispatcher {
    /// Task id -> timestamp of the last emission for that id.
    records: HashMap<String, DateTime<Utc>>,
}

impl NotificationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit a notification for `task` unless suppressed or inside the
    /// minimum inter-notification gap. Recording and deciding happen in one
    /// step; the caller delivers the returned value outside the lock.
    pub fn maybe_notify(
        &mut self,
        task: &Task,
        now: DateTime<Utc>,
        kind: NotificationKind,
        suppression: SuppressionView,
        config: &EngineConfig,
        settings: &NotificationSettings,
    ) -> Option<Notification> {
        if suppression.any() {
            debug!(
                task_id = %task.id,
                ?kind,
                lockout = suppression.lockout,
                blocked = suppression.blocked,
                focus = suppression.focus_active,
                "notification suppressed"
            );
            return None;
        }
        if let Some(last) = self.records.get(&task.id) {
            if now - *last < config.dedup_gap() {
                debug!(task_id = %task.id, ?kind, "within dedup gap, skipping");
                return None;
            }
        }
        self.records.insert(task.id.clone(), now);

        let mut notification = match kind {
            NotificationKind::Upcoming => {
                Notification::upcoming(task, settings.reminder_lead_minutes, now)
            }
            NotificationKind::TaskStarted => Notification::started(task, now),
            NotificationKind::StillInProgress => Notification::in_progress(task, now),
        };
        if !settings.sound {
            notification.cue = None;
        }
        Some(notification)
    }

    /// Drop records old enough that they can no longer affect a gap check.
    /// Keeps the map bounded by recent churn without ever weakening the
    /// dedup guarantee.
    pub fn prune_stale(&mut self, now: DateTime<Utc>, gap: chrono::Duration) {
        self.records.retain(|_, last| now - *last < gap);
    }

    #[cfg(test)]
    pub fn last_emitted(&self, task_id: &str) -> Option<DateTime<Utc>> {
        self.records.get(task_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Priority;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap()
    }

    fn task(id: &str) -> Task {
        Task {
            id: id.to_string(),
            title: format!("Task {id}"),
            start: base(),
            end: base() + Duration::hours(2),
            priority: Priority::High,
            completed: false,
        }
    }

    fn dispatch(
        dispatcher: &mut NotificationDispatcher,
        task: &Task,
        now: DateTime<Utc>,
        suppression: SuppressionView,
    ) -> Option<Notification> {
        dispatcher.maybe_notify(
            task,
            now,
            NotificationKind::StillInProgress,
            suppression,
            &EngineConfig::default(),
            &NotificationSettings::default(),
        )
    }

    #[test]
    fn emissions_inside_gap_are_dropped() {
        let mut dispatcher = NotificationDispatcher::new();
        let task = task("t1");
        assert!(dispatch(&mut dispatcher, &task, base(), SuppressionView::none()).is_some());
        assert!(dispatch(
            &mut dispatcher,
            &task,
            base() + Duration::seconds(44),
            SuppressionView::none()
        )
        .is_none());
        assert!(dispatch(
            &mut dispatcher,
            &task,
            base() + Duration::seconds(45),
            SuppressionView::none()
        )
        .is_some());
    }

    #[test]
    fn rejected_emission_does_not_touch_the_record() {
        let mut dispatcher = NotificationDispatcher::new();
        let task = task("t1");
        assert!(dispatch(&mut dispatcher, &task, base(), SuppressionView::none()).is_some());
        let recorded = dispatcher.last_emitted("t1");
        // Suppressed call must not move the record forward.
        let suppressed = SuppressionView {
            lockout: false,
            blocked: true,
            focus_active: false,
        };
        assert!(dispatch(&mut dispatcher, &task, base() + Duration::seconds(50), suppressed).is_none());
        assert_eq!(dispatcher.last_emitted("t1"), recorded);
    }

    #[test]
    fn suppression_flags_each_block_emission() {
        let mut dispatcher = NotificationDispatcher::new();
        let task = task("t1");
        for suppression in [
            SuppressionView {
                lockout: true,
                blocked: false,
                focus_active: false,
            },
            SuppressionView {
                lockout: false,
                blocked: true,
                focus_active: false,
            },
            SuppressionView {
                lockout: false,
                blocked: false,
                focus_active: true,
            },
        ] {
            assert!(dispatch(&mut dispatcher, &task, base(), suppression).is_none());
        }
    }

    #[test]
    fn distinct_task_ids_do_not_share_the_gap() {
        let mut dispatcher = NotificationDispatcher::new();
        assert!(dispatch(&mut dispatcher, &task("t1"), base(), SuppressionView::none()).is_some());
        assert!(dispatch(&mut dispatcher, &task("t2"), base(), SuppressionView::none()).is_some());
    }

    #[test]
    fn sound_toggle_strips_the_cue() {
        let mut dispatcher = NotificationDispatcher::new();
        let settings = NotificationSettings {
            sound: false,
            ..NotificationSettings::default()
        };
        let note = dispatcher
            .maybe_notify(
                &task("t1"),
                base(),
                NotificationKind::TaskStarted,
                SuppressionView::none(),
                &EngineConfig::default(),
                &settings,
            )
            .unwrap();
        assert!(note.cue.is_none());
    }

    #[test]
    fn prune_keeps_records_that_still_matter() {
        let mut dispatcher = NotificationDispatcher::new();
        let gap = EngineConfig::default().dedup_gap();
        dispatch(&mut dispatcher, &task("t1"), base(), SuppressionView::none());
        dispatcher.prune_stale(base() + Duration::seconds(10), gap);
        assert!(dispatcher.last_emitted("t1").is_some());
        dispatcher.prune_stale(base() + Duration::seconds(45), gap);
        assert!(dispatcher.last_emitted("t1").is_none());
    }

    proptest! {
        /// The dedup contract: for any call pattern, two consecutive
        /// emissions for the same id are at least the configured gap apart.
        #[test]
        fn consecutive_emissions_respect_the_gap(
            offsets in proptest::collection::vec(0u32..3600, 1..64)
        ) {
            let mut sorted = offsets;
            sorted.sort_unstable();

            let config = EngineConfig::default();
            let settings = NotificationSettings::default();
            let mut dispatcher = NotificationDispatcher::new();
            let task = task("t1");

            let mut emitted = Vec::new();
            for offset in sorted {
                let now = base() + Duration::seconds(i64::from(offset));
                if dispatcher
                    .maybe_notify(
                        &task,
                        now,
                        NotificationKind::StillInProgress,
                        SuppressionView::none(),
                        &config,
                        &settings,
                    )
                    .is_some()
                {
                    emitted.push(now);
                }
            }
            for pair in emitted.windows(2) {
                prop_assert!(pair[1] - pair[0] >= config.dedup_gap());
            }
        }
    }
}
