//! Engine configuration.
//!
//! Two layers: [`EngineConfig`] holds the rate-limiting and cadence policy
//! constants (tunable, but with defaults that match the shipped behavior),
//! and [`NotificationSettings`] holds the user-facing preferences pushed in
//! by the settings screen.

use serde::{Deserialize, Serialize};

use crate::task::Priority;

/// Policy constants for the rate guard, timer registry and dispatcher.
///
/// All thresholds are plain fields so deployments can tune them; the
/// defaults are the ones the engine ships with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Calls per rolling window above which the breaker trips.
    #[serde(default = "default_max_calls_per_minute")]
    pub max_calls_per_minute: usize,
    /// Length of the rolling call window in seconds.
    #[serde(default = "default_rate_window_secs")]
    pub rate_window_secs: u64,
    /// Minimum spacing between admitted scheduling calls.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// How long the breaker stays open after a trip.
    #[serde(default = "default_lockout_secs")]
    pub lockout_secs: u64,
    /// Emission block applied after a bulk teardown.
    #[serde(default = "default_blocked_secs")]
    pub blocked_secs: u64,
    /// Minimum spacing between two notifications for the same task id.
    #[serde(default = "default_dedup_gap_secs")]
    pub dedup_gap_secs: u64,
    /// Tasks starting further out than this are left for a later pass.
    #[serde(default = "default_lookahead_minutes")]
    pub lookahead_minutes: i64,
    /// Reminder cadence for high priority tasks.
    #[serde(default = "default_high_tick_minutes")]
    pub high_priority_tick_minutes: i64,
    /// Reminder cadence for everything else.
    #[serde(default = "default_normal_tick_minutes")]
    pub normal_tick_minutes: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_calls_per_minute: default_max_calls_per_minute(),
            rate_window_secs: default_rate_window_secs(),
            cooldown_secs: default_cooldown_secs(),
            lockout_secs: default_lockout_secs(),
            blocked_secs: default_blocked_secs(),
            dedup_gap_secs: default_dedup_gap_secs(),
            lookahead_minutes: default_lookahead_minutes(),
            high_priority_tick_minutes: default_high_tick_minutes(),
            normal_tick_minutes: default_normal_tick_minutes(),
        }
    }
}

impl EngineConfig {
    pub fn rate_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.rate_window_secs as i64)
    }

    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cooldown_secs as i64)
    }

    pub fn lockout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.lockout_secs as i64)
    }

    pub fn blocked(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.blocked_secs as i64)
    }

    pub fn dedup_gap(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.dedup_gap_secs as i64)
    }

    pub fn lookahead(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.lookahead_minutes)
    }

    /// Reminder interval for a task of the given priority.
    pub fn tick_period(&self, priority: Priority) -> std::time::Duration {
        let minutes = match priority {
            Priority::High => self.high_priority_tick_minutes,
            _ => self.normal_tick_minutes,
        };
        std::time::Duration::from_secs(minutes.max(1) as u64 * 60)
    }
}

/// User notification preferences, pushed by the settings collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSettings {
    /// Master switch. When false, scheduling calls are no-ops.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// How many minutes before a task's start the upcoming reminder fires.
    #[serde(default = "default_lead_minutes")]
    pub reminder_lead_minutes: i64,
    /// Whether emitted notifications carry an audio cue.
    #[serde(default = "default_true")]
    pub sound: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            reminder_lead_minutes: default_lead_minutes(),
            sound: default_true(),
        }
    }
}

impl NotificationSettings {
    pub fn lead(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.reminder_lead_minutes.max(0))
    }
}

fn default_max_calls_per_minute() -> usize {
    3
}

fn default_rate_window_secs() -> u64 {
    60
}

fn default_cooldown_secs() -> u64 {
    10
}

fn default_lockout_secs() -> u64 {
    30
}

fn default_blocked_secs() -> u64 {
    5
}

fn default_dedup_gap_secs() -> u64 {
    45
}

fn default_lookahead_minutes() -> i64 {
    30
}

fn default_high_tick_minutes() -> i64 {
    5
}

fn default_normal_tick_minutes() -> i64 {
    15
}

fn default_true() -> bool {
    true
}

fn default_lead_minutes() -> i64 {
    10
}
