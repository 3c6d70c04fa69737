//! Notification values emitted by the engine.
//!
//! A [`Notification`] is the engine's only output: a self-contained value
//! pushed to every registered sink. Sinks that can render actions, play
//! audio or vibrate read the respective fields; the others ignore them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::{Priority, Task};

/// Vibration pattern for urgent task-start notifications.
const VIBRATE_URGENT: &[u64] = &[200, 100, 200, 100, 200];
/// Vibration pattern for high priority reminders.
const VIBRATE_HIGH: &[u64] = &[200, 100, 200];

/// Action a notification offers the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    StartTimer,
    StopReminders,
    CompleteTask,
    Snooze,
    ViewTask,
}

/// A labelled action button.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationAction {
    pub label: String,
    pub action: ActionKind,
}

impl NotificationAction {
    fn new(label: &str, action: ActionKind) -> Self {
        Self {
            label: label.to_string(),
            action,
        }
    }
}

/// Which scheduling moment produced the notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    /// Lead reminder ahead of the task's start.
    Upcoming,
    /// Emitted once when the task becomes active.
    TaskStarted,
    /// Recurring reminder while the task stays active.
    StillInProgress,
}

/// Audio cue urgency. Sinks with audio support map these to tones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCue {
    Gentle,
    Urgent,
}

/// A notification ready for delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub task_id: String,
    pub title: String,
    pub body: String,
    pub priority: Priority,
    pub kind: NotificationKind,
    pub actions: Vec<NotificationAction>,
    /// Persistent notifications should stay visible until acted on.
    pub persistent: bool,
    /// None when sound is disabled in settings.
    pub cue: Option<AudioCue>,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    /// Lead reminder before the task starts.
    pub(crate) fn upcoming(task: &Task, lead_minutes: i64, now: DateTime<Utc>) -> Self {
        let title = match task.priority {
            Priority::High => "Upcoming high priority task".to_string(),
            _ => "Upcoming task".to_string(),
        };
        Self::assemble(
            task,
            NotificationKind::Upcoming,
            title,
            format!("\"{}\" starts in {} minutes", task.title, lead_minutes),
            vec![
                NotificationAction::new("Start Timer", ActionKind::StartTimer),
                NotificationAction::new("View Task", ActionKind::ViewTask),
            ],
            false,
            Some(AudioCue::Gentle),
            now,
        )
    }

    /// One-time notification at the task's start.
    pub(crate) fn started(task: &Task, now: DateTime<Utc>) -> Self {
        let title = match task.priority {
            Priority::High => "High priority task started".to_string(),
            Priority::Medium => "Medium priority task started".to_string(),
            Priority::Normal => "Task started".to_string(),
        };
        Self::assemble(
            task,
            NotificationKind::TaskStarted,
            title,
            format!(
                "Time for \"{}\". Start a focus timer to stop these reminders.",
                task.title
            ),
            Self::standard_actions(task.priority),
            true,
            Some(AudioCue::Urgent),
            now,
        )
    }

    /// Recurring reminder while the task is active.
    pub(crate) fn in_progress(task: &Task, now: DateTime<Utc>) -> Self {
        Self::assemble(
            task,
            NotificationKind::StillInProgress,
            "Task still in progress".to_string(),
            format!(
                "\"{}\" is ongoing. Start a focus timer to focus and stop these reminders.",
                task.title
            ),
            Self::standard_actions(task.priority),
            false,
            Some(AudioCue::Urgent),
            now,
        )
    }

    /// `start-timer` and `stop-reminders` always; high priority adds
    /// complete/snooze.
    fn standard_actions(priority: Priority) -> Vec<NotificationAction> {
        let mut actions = vec![
            NotificationAction::new("Start Timer", ActionKind::StartTimer),
            NotificationAction::new("Stop Reminders", ActionKind::StopReminders),
        ];
        if priority == Priority::High {
            actions.push(NotificationAction::new("Mark Complete", ActionKind::CompleteTask));
            actions.push(NotificationAction::new("Snooze 5min", ActionKind::Snooze));
        }
        actions
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        task: &Task,
        kind: NotificationKind,
        title: String,
        body: String,
        actions: Vec<NotificationAction>,
        persistent: bool,
        cue: Option<AudioCue>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            task_id: task.id.clone(),
            title,
            body,
            priority: task.priority,
            kind,
            actions,
            persistent,
            cue,
            timestamp: now,
        }
    }

    /// Coalescing tag for OS-level notification channels.
    pub fn tag(&self) -> &str {
        &self.task_id
    }

    /// Vibration pattern for haptic-capable sinks. Empty means no haptics.
    pub fn vibration_pattern(&self) -> &'static [u64] {
        match (self.kind, self.priority) {
            (NotificationKind::TaskStarted, _) => VIBRATE_URGENT,
            (_, Priority::High) => VIBRATE_HIGH,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn task(priority: Priority) -> Task {
        let start = Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap();
        Task {
            id: "t1".to_string(),
            title: "Write report".to_string(),
            start,
            end: start + chrono::Duration::hours(1),
            priority,
            completed: false,
        }
    }

    #[test]
    fn high_priority_carries_complete_and_snooze() {
        let note = Notification::started(&task(Priority::High), Utc::now());
        let kinds: Vec<ActionKind> = note.actions.iter().map(|a| a.action).collect();
        assert_eq!(
            kinds,
            vec![
                ActionKind::StartTimer,
                ActionKind::StopReminders,
                ActionKind::CompleteTask,
                ActionKind::Snooze,
            ]
        );
        assert!(note.persistent);
    }

    #[test]
    fn normal_priority_keeps_the_minimal_action_set() {
        let note = Notification::in_progress(&task(Priority::Normal), Utc::now());
        let kinds: Vec<ActionKind> = note.actions.iter().map(|a| a.action).collect();
        assert_eq!(kinds, vec![ActionKind::StartTimer, ActionKind::StopReminders]);
        assert!(!note.persistent);
    }

    #[test]
    fn vibration_pattern_by_kind_and_priority() {
        let started = Notification::started(&task(Priority::Normal), Utc::now());
        assert_eq!(started.vibration_pattern(), VIBRATE_URGENT);

        let tick = Notification::in_progress(&task(Priority::High), Utc::now());
        assert_eq!(tick.vibration_pattern(), VIBRATE_HIGH);

        let quiet = Notification::in_progress(&task(Priority::Normal), Utc::now());
        assert!(quiet.vibration_pattern().is_empty());
    }

    #[test]
    fn actions_serialize_kebab_case() {
        let json = serde_json::to_string(&ActionKind::StartTimer).unwrap();
        assert_eq!(json, "\"start-timer\"");
        let json = serde_json::to_string(&ActionKind::StopReminders).unwrap();
        assert_eq!(json, "\"stop-reminders\"");
    }

    #[test]
    fn tag_coalesces_by_task_id() {
        let note = Notification::upcoming(&task(Priority::High), 10, Utc::now());
        assert_eq!(note.tag(), "t1");
        assert!(note.body.contains("starts in 10 minutes"));
    }
}
