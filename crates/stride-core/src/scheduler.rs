//! # Notification Scheduler
//!
//! Holds deferred badge unlocks until they are due.
//!
//! The scheduler itself never sleeps. It records `{task, badge, threshold,
//! due_at}` and arms an injected [`TimerHook`]. Whoever drives the hook (a
//! tokio task in the server, nothing at all in tests) later calls back into
//! the owning service with the task id; `tick(now)` drains everything due for
//! callers that drive time by hand.

use crate::BadgeId;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

// =============================================================================
// TASKS
// =============================================================================

/// Handle of a scheduled deferred unlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// A badge waiting to be unlocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingUnlock {
    pub task: TaskId,
    pub badge: BadgeId,
    /// Level the profile must still hold when the task fires.
    pub threshold: u32,
    pub due_at: DateTime<Utc>,
}

// =============================================================================
// TIMER HOOK
// =============================================================================

/// Arms and disarms wall-clock timers for scheduled tasks.
pub trait TimerHook: Debug + Send + Sync {
    /// Fire `task` after `delay`.
    fn arm(&self, task: TaskId, delay: std::time::Duration);
    /// Forget `task`. Disarming an unknown or already fired task is a no-op.
    fn disarm(&self, task: TaskId);
}

/// Hook that arms nothing. Tasks only fire through `tick`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualTimer;

impl TimerHook for ManualTimer {
    fn arm(&self, _task: TaskId, _delay: std::time::Duration) {}
    fn disarm(&self, _task: TaskId) {}
}

// =============================================================================
// SCHEDULER
// =============================================================================

/// Pending deferred unlocks, keyed by task id.
#[derive(Debug)]
pub struct NotificationScheduler {
    delay: Duration,
    next_task: u64,
    pending: BTreeMap<TaskId, PendingUnlock>,
    hook: Arc<dyn TimerHook>,
    closed: bool,
}

impl NotificationScheduler {
    /// Scheduler with the given delay, ticked by hand.
    #[must_use]
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay: Duration::milliseconds(i64::try_from(delay_ms).unwrap_or(i64::MAX)),
            next_task: 1,
            pending: BTreeMap::new(),
            hook: Arc::new(ManualTimer),
            closed: false,
        }
    }

    /// Replace the timer hook. Tasks already pending stay unarmed.
    pub fn set_hook(&mut self, hook: Arc<dyn TimerHook>) {
        self.hook = hook;
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Queue an unlock of `badge` at `now + delay`.
    ///
    /// Returns `None` if the scheduler is closed or the badge is already
    /// pending.
    pub fn schedule(
        &mut self,
        badge: BadgeId,
        threshold: u32,
        now: DateTime<Utc>,
    ) -> Option<TaskId> {
        if self.closed || self.is_pending(&badge) {
            return None;
        }
        let task = TaskId(self.next_task);
        self.next_task = self.next_task.saturating_add(1);

        let due_at = now.checked_add_signed(self.delay).unwrap_or(now);
        self.pending.insert(
            task,
            PendingUnlock {
                task,
                badge,
                threshold,
                due_at,
            },
        );
        self.hook
            .arm(task, self.delay.to_std().unwrap_or_default());
        Some(task)
    }

    /// Cancel one task and disarm its timer.
    pub fn cancel(&mut self, task: TaskId) -> Option<PendingUnlock> {
        let removed = self.pending.remove(&task);
        if removed.is_some() {
            self.hook.disarm(task);
        }
        removed
    }

    /// Cancel every task.
    pub fn cancel_all(&mut self) -> usize {
        let tasks: Vec<TaskId> = self.pending.keys().copied().collect();
        for task in &tasks {
            self.hook.disarm(*task);
        }
        self.pending.clear();
        tasks.len()
    }

    /// Remove a task that is firing. Its timer has already elapsed.
    pub fn take(&mut self, task: TaskId) -> Option<PendingUnlock> {
        if self.closed {
            return None;
        }
        self.pending.remove(&task)
    }

    /// Remove and return every task due at or before `now`, oldest first.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Vec<PendingUnlock> {
        if self.closed {
            return Vec::new();
        }
        let due: Vec<TaskId> = self
            .pending
            .values()
            .filter(|p| p.due_at <= now)
            .map(|p| p.task)
            .collect();
        let mut taken: Vec<PendingUnlock> = due
            .into_iter()
            .filter_map(|task| {
                self.hook.disarm(task);
                self.pending.remove(&task)
            })
            .collect();
        taken.sort_by_key(|p| (p.due_at, p.task));
        taken
    }

    /// Cancel everything and refuse further scheduling.
    pub fn close(&mut self) -> usize {
        let cancelled = self.cancel_all();
        self.closed = true;
        cancelled
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    #[must_use]
    pub fn is_pending(&self, badge: &BadgeId) -> bool {
        self.pending.values().any(|p| &p.badge == badge)
    }

    /// Pending tasks in task order.
    pub fn pending(&self) -> impl Iterator<Item = &PendingUnlock> {
        self.pending.values()
    }

    /// Earliest due time among pending tasks.
    #[must_use]
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.pending.values().map(|p| p.due_at).min()
    }
}

// =============================================================================
// TESTS
// =============================================================================
