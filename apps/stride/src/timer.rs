//! # Tokio Timer
//!
//! Wall-clock driver for deferred badge unlocks.
//!
//! A [`TokioTimer`] is installed as the service's timer hook. Each armed task
//! sleeps on the runtime, then locks the service and calls `fire`. The timer
//! only holds a weak reference, so dropping the service drops its timers.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use stride_core::{
    BadgeCatalog, ProfileId, ProgressionService, ServiceOptions, SnapshotStore, TaskId, TimerHook,
};
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;

/// A service shared between request handlers and timer tasks.
pub type SharedService = Arc<Mutex<ProgressionService>>;

// =============================================================================
// TIMER HOOK
// =============================================================================

/// Timer hook that fires deferred unlocks from tokio tasks.
#[derive(Debug)]
pub struct TokioTimer {
    service: Weak<Mutex<ProgressionService>>,
    tasks: std::sync::Mutex<BTreeMap<TaskId, AbortHandle>>,
    runtime: Option<Handle>,
}

impl TokioTimer {
    /// Timer for `service`, spawning on the current runtime if there is one.
    #[must_use]
    pub fn new(service: Weak<Mutex<ProgressionService>>) -> Self {
        Self {
            service,
            tasks: std::sync::Mutex::new(BTreeMap::new()),
            runtime: Handle::try_current().ok(),
        }
    }

    /// Number of timers still sleeping.
    #[must_use]
    pub fn armed(&self) -> usize {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.retain(|_, handle| !handle.is_finished());
        tasks.len()
    }
}

impl TimerHook for TokioTimer {
    fn arm(&self, task: TaskId, delay: Duration) {
        let Some(runtime) = &self.runtime else {
            tracing::warn!(%task, "no async runtime; deferred unlock waits for a tick");
            return;
        };

        let service = self.service.clone();
        let join = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(service) = service.upgrade() else {
                return;
            };
            let mut service = service.lock().await;
            if let Some(badge) = service.fire(task) {
                tracing::info!(profile = %service.profile_id(), %badge, "deferred badge unlocked");
            }
        });

        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.retain(|_, handle| !handle.is_finished());
        tasks.insert(task, join.abort_handle());
    }

    fn disarm(&self, task: TaskId) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = tasks.remove(&task) {
            handle.abort();
        }
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut().unwrap_or_else(|e| e.into_inner());
        for handle in tasks.values() {
            handle.abort();
        }
    }
}

// =============================================================================
// SHARED SERVICES
// =============================================================================

/// Open a shared service for `profile` with a [`TokioTimer`] installed.
pub fn open_shared(
    profile: ProfileId,
    store: Arc<dyn SnapshotStore>,
    catalog: Arc<BadgeCatalog>,
    options: ServiceOptions,
) -> SharedService {
    Arc::new_cyclic(|weak| {
        let timer = Arc::new(TokioTimer::new(weak.clone()));
        Mutex::new(
            ProgressionService::open(profile, store, options)
                .with_catalog(catalog)
                .with_timer(timer),
        )
    })
}

/// Wait until no deferred unlock is pending.
///
/// Used by one-shot commands so the saved snapshot includes milestones
/// earned during the command.
pub async fn settle(service: &SharedService) {
    loop {
        let wait = {
            let guard = service.lock().await;
            let Some(due) = guard.next_due() else {
                return;
            };
            (due - guard.now()).to_std().unwrap_or_default()
        };
        tokio::time::sleep(wait).await;

        let mut guard = service.lock().await;
        let now = guard.now();
        guard.tick(now);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use stride_core::{BadgeId, MemoryStore};

    fn shared(delay_ms: u64) -> SharedService {
        open_shared(
            ProfileId::new("ada").expect("id"),
            Arc::new(MemoryStore::new()),
            Arc::new(BadgeCatalog::standard()),
            ServiceOptions {
                deferred_unlock_delay_ms: delay_ms,
                ..ServiceOptions::default()
            },
        )
    }

    #[tokio::test]
    async fn timer_fires_deferred_unlock() {
        let service = shared(20);
        service.lock().await.add_xp(812);
        assert!(!service.lock().await.state().is_unlocked(&BadgeId::new("level-5")));

        tokio::time::sleep(Duration::from_millis(200)).await;

        let guard = service.lock().await;
        assert!(guard.state().is_unlocked(&BadgeId::new("level-5")));
        assert!(guard.pending_unlocks().is_empty());
    }

    #[tokio::test]
    async fn shutdown_aborts_timers() {
        let service = shared(20);
        service.lock().await.add_xp(812);
        assert_eq!(service.lock().await.shutdown(), 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!service.lock().await.state().is_unlocked(&BadgeId::new("level-5")));
    }

    #[tokio::test]
    async fn settle_waits_for_pending_unlocks() {
        let service = shared(30);
        service.lock().await.add_xp(7_486);
        assert_eq!(service.lock().await.pending_unlocks().len(), 2);

        settle(&service).await;

        let guard = service.lock().await;
        assert!(guard.pending_unlocks().is_empty());
        assert!(guard.state().is_unlocked(&BadgeId::new("level-5")));
        assert!(guard.state().is_unlocked(&BadgeId::new("level-10")));
    }

    #[tokio::test]
    async fn settle_without_pending_work_returns() {
        let service = shared(1_000_000);
        settle(&service).await;
        assert!(service.lock().await.next_due().is_none());
    }

    #[tokio::test]
    async fn dropped_service_leaves_no_live_timer() {
        let service = shared(10);
        service.lock().await.add_xp(812);
        let weak = Arc::downgrade(&service);
        drop(service);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn arm_without_runtime_is_inert() {
        let timer = TokioTimer::new(Weak::new());
        timer.arm(TaskId(0), Duration::from_millis(1));
        assert_eq!(timer.armed(), 0);
        timer.disarm(TaskId(0));
    }
}
