//! Per-task timer ownership.
//!
//! The registry holds at most one live timer per task id. Entries carry a
//! generation from a monotonic counter; a timer body re-checks its captured
//! generation under the engine lock before acting, so cancel-then-replace
//! stays atomic even when the replaced timer fires concurrently. Aborting
//! the tokio task is an optimization, never the correctness mechanism.

use std::collections::{HashMap, HashSet};

use tokio::task::JoinHandle;

/// What a registered timer is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerKind {
    /// One-shot wait for the task's start (plus an optional lead reminder).
    PendingStart,
    /// Recurring reminder tick while the task is active.
    ReminderTick,
}

#[derive(Debug)]
struct TimerEntry {
    generation: u64,
    kind: TimerKind,
    handle: JoinHandle<()>,
}

#[derive(Debug, Default)]
pub(crate) struct TaskTimerRegistry {
    entries: HashMap<String, TimerEntry>,
    next_generation: u64,
}

impl TaskTimerRegistry {
    /// Allocate a fresh generation for a timer about to be registered.
    pub fn next_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    /// Register a timer, replacing (and aborting) any previous one for the
    /// same task id.
    pub fn insert(&mut self, task_id: String, kind: TimerKind, generation: u64, handle: JoinHandle<()>) {
        if let Some(old) = self.entries.insert(
            task_id,
            TimerEntry {
                generation,
                kind,
                handle,
            },
        ) {
            old.handle.abort();
        }
    }

    /// Whether the given generation is still the live timer for the id.
    pub fn is_current(&self, task_id: &str, generation: u64) -> bool {
        self.entries
            .get(task_id)
            .is_some_and(|e| e.generation == generation)
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.entries.contains_key(task_id)
    }

    #[cfg(test)]
    pub fn kind(&self, task_id: &str) -> Option<TimerKind> {
        self.entries.get(task_id).map(|e| e.kind)
    }

    /// Cancel and remove the timer for one task id. No-op when absent.
    pub fn cancel(&mut self, task_id: &str) -> bool {
        match self.entries.remove(task_id) {
            Some(entry) => {
                entry.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Remove the entry without aborting; used by a timer body retiring or
    /// promoting itself. Removes only if the generation still matches.
    pub fn remove_if_current(&mut self, task_id: &str, generation: u64) -> bool {
        if self.is_current(task_id, generation) {
            self.entries.remove(task_id);
            true
        } else {
            false
        }
    }

    /// Cancel every registered timer and clear the registry.
    pub fn cancel_all(&mut self) {
        for (_, entry) in self.entries.drain() {
            entry.handle.abort();
        }
    }

    /// Drop entries whose task id is not in `keep`. Returns how many were
    /// purged.
    pub fn purge_except(&mut self, keep: &HashSet<String>) -> usize {
        let stale: Vec<String> = self
            .entries
            .keys()
            .filter(|id| !keep.contains(*id))
            .cloned()
            .collect();
        for id in &stale {
            self.cancel(id);
        }
        stale.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_handle() -> JoinHandle<()> {
        tokio::spawn(std::future::pending::<()>())
    }

    #[tokio::test]
    async fn insert_replaces_previous_timer() {
        let mut registry = TaskTimerRegistry::default();
        let first = registry.next_generation();
        registry.insert("t1".to_string(), TimerKind::PendingStart, first, dummy_handle());
        assert!(registry.is_current("t1", first));

        let second = registry.next_generation();
        registry.insert("t1".to_string(), TimerKind::ReminderTick, second, dummy_handle());
        assert_eq!(registry.len(), 1);
        assert!(!registry.is_current("t1", first));
        assert!(registry.is_current("t1", second));
        assert_eq!(registry.kind("t1"), Some(TimerKind::ReminderTick));
    }

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let mut registry = TaskTimerRegistry::default();
        let generation = registry.next_generation();
        registry.insert("t1".to_string(), TimerKind::PendingStart, generation, dummy_handle());
        assert!(registry.cancel("t1"));
        assert!(!registry.cancel("t1"));
        assert!(!registry.contains("t1"));
    }

    #[tokio::test]
    async fn stale_generation_cannot_remove_replacement() {
        let mut registry = TaskTimerRegistry::default();
        let stale = registry.next_generation();
        registry.insert("t1".to_string(), TimerKind::PendingStart, stale, dummy_handle());
        let live = registry.next_generation();
        registry.insert("t1".to_string(), TimerKind::ReminderTick, live, dummy_handle());

        // A callback captured before the replacement must observe the
        // mismatch and no-op.
        assert!(!registry.remove_if_current("t1", stale));
        assert!(registry.contains("t1"));
        assert!(registry.remove_if_current("t1", live));
        assert!(!registry.contains("t1"));
    }

    #[tokio::test]
    async fn purge_drops_ids_absent_from_snapshot() {
        let mut registry = TaskTimerRegistry::default();
        for id in ["t1", "t2", "t3"] {
            let generation = registry.next_generation();
            registry.insert(id.to_string(), TimerKind::PendingStart, generation, dummy_handle());
        }
        let keep: HashSet<String> = ["t2".to_string()].into_iter().collect();
        assert_eq!(registry.purge_except(&keep), 2);
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("t2"));
    }

    #[tokio::test]
    async fn cancel_all_empties_the_registry() {
        let mut registry = TaskTimerRegistry::default();
        for id in ["t1", "t2"] {
            let generation = registry.next_generation();
            registry.insert(id.to_string(), TimerKind::ReminderTick, generation, dummy_handle());
        }
        registry.cancel_all();
        assert_eq!(registry.len(), 0);
    }
}
