//! # Progression Service
//!
//! The command surface of the engine. One service owns the state of one
//! profile; every command takes `&mut self` and runs to completion (XP
//! commit, level re-derivation, badge evaluation, flag updates) before the
//! next one can start.
//!
//! ## Command Flow
//!
//! ```text
//! command -> mutate state -> commit XP (level re-derived)
//!         -> evaluate badges on the post-action state
//!         -> schedule level milestones (deferred)
//!         -> persist snapshot
//! ```
//!
//! Persistence failures are logged and never roll back the in-memory state.

use crate::achievement::{AchievementEngine, BadgeProgress};
use crate::catalog::{BadgeCatalog, Trigger};
use crate::clock::{Clock, SystemClock};
use crate::level::LevelCurve;
use crate::primitives::{
    DEFAULT_DEFERRED_UNLOCK_DELAY_MS, RECENT_BADGE_COUNT, STREAK_BONUS_CAP, XP_APPLY,
    XP_COMPLETE, XP_ONBOARDING, XP_PER_STREAK_DAY, XP_PROFILE_COMPLETE, XP_SAVE,
};
use crate::scheduler::{NotificationScheduler, PendingUnlock, TaskId, TimerHook};
use crate::state::{ProgressionSnapshot, ProgressionState};
use crate::storage::{MemoryStore, SnapshotStore};
use crate::streak::{CheckInOutcome, StreakTracker};
use crate::{
    BadgeId, OpportunityId, PresentationFlags, Profile, ProfileId, StrideError, Streak,
    UnlockedBadge,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

// =============================================================================
// OPTIONS
// =============================================================================

/// Runtime tunables of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceOptions {
    /// Delay before a level-milestone badge unlocks.
    pub deferred_unlock_delay_ms: u64,
    /// Minutes east of UTC that define the check-in calendar day.
    pub utc_offset_minutes: i32,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            deferred_unlock_delay_ms: DEFAULT_DEFERRED_UNLOCK_DELAY_MS,
            utc_offset_minutes: 0,
        }
    }
}

// =============================================================================
// REPORTS
// =============================================================================

/// What an XP grant was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XpSource {
    Onboarding,
    Profile,
    Save,
    Apply,
    Complete,
    CheckIn,
    Manual,
}

/// Result of adding XP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct XpGrant {
    pub source: XpSource,
    pub amount: u64,
    /// Level after the grant.
    pub level: u32,
    pub leveled_up: bool,
}

/// Everything a command changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandReport {
    /// False when the command was a no-op.
    pub changed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant: Option<XpGrant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_in: Option<CheckInOutcome>,
    /// Badges unlocked by this command, in unlock order.
    #[serde(default)]
    pub unlocked: Vec<BadgeId>,
    /// Level milestones queued for a deferred unlock.
    #[serde(default)]
    pub deferred: Vec<BadgeId>,
}

impl CommandReport {
    fn unchanged() -> Self {
        Self::default()
    }
}

// =============================================================================
// VIEWS
// =============================================================================

/// Serializable projection of the full observable state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionView {
    pub profile_id: ProfileId,
    pub profile: Option<Profile>,
    pub is_onboarded: bool,
    pub xp: u64,
    pub level: u32,
    pub xp_to_next_level: u64,
    pub xp_in_current_level: u64,
    pub streak: Streak,
    pub unlocked_badges: Vec<UnlockedBadge>,
    pub saved: BTreeSet<OpportunityId>,
    pub applied: BTreeSet<OpportunityId>,
    pub completed: BTreeSet<OpportunityId>,
    pub flags: PresentationFlags,
    pub pending_unlocks: Vec<PendingUnlock>,
}

/// Compact progress overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionSummary {
    pub xp: u64,
    pub level: u32,
    pub xp_to_next_level: u64,
    pub xp_in_current_level: u64,
    pub progress_percent: u8,
    pub badge_count: usize,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub streak_active: bool,
    /// Most recent unlocks, newest first.
    pub recent_badges: Vec<UnlockedBadge>,
}

// =============================================================================
// SERVICE
// =============================================================================

/// Progression engine for one profile.
#[derive(Debug)]
pub struct ProgressionService {
    profile_id: ProfileId,
    state: ProgressionState,
    catalog: Arc<BadgeCatalog>,
    tracker: StreakTracker,
    scheduler: NotificationScheduler,
    clock: Arc<dyn Clock>,
    store: Arc<dyn SnapshotStore>,
    /// Set when the stored document could not be read or moved aside.
    persist_blocked: bool,
}

impl ProgressionService {
    /// A fresh in-memory service with default options.
    #[must_use]
    pub fn new(profile_id: ProfileId) -> Self {
        Self::open(
            profile_id,
            Arc::new(MemoryStore::new()),
            ServiceOptions::default(),
        )
    }

    /// Hydrate a service from `store`.
    ///
    /// Never fails: a missing snapshot yields a zeroed state. A snapshot that
    /// cannot be decoded is quarantined in the store and the service starts
    /// from a zeroed state. If the snapshot can be neither read nor moved
    /// aside, the service still starts empty but never writes to the store,
    /// so the stored document is left untouched.
    #[must_use]
    pub fn open(
        profile_id: ProfileId,
        store: Arc<dyn SnapshotStore>,
        options: ServiceOptions,
    ) -> Self {
        let (state, persist_blocked) = match store.load(&profile_id) {
            Ok(Some(snapshot)) => (ProgressionState::from(snapshot), false),
            Ok(None) => (ProgressionState::new(), false),
            Err(e @ StrideError::Deserialization(_)) => match store.quarantine(&profile_id) {
                Ok(true) => {
                    tracing::warn!(profile = %profile_id, error = %e, "undecodable snapshot moved aside, starting empty");
                    (ProgressionState::new(), false)
                }
                Ok(false) | Err(_) => {
                    tracing::warn!(profile = %profile_id, error = %e, "undecodable snapshot kept in place, persistence disabled");
                    (ProgressionState::new(), true)
                }
            },
            Err(e) => {
                tracing::warn!(profile = %profile_id, error = %e, "snapshot could not be read, persistence disabled");
                (ProgressionState::new(), true)
            }
        };

        Self {
            profile_id,
            state,
            catalog: Arc::new(BadgeCatalog::standard()),
            tracker: StreakTracker::with_offset_minutes(options.utc_offset_minutes),
            scheduler: NotificationScheduler::new(options.deferred_unlock_delay_ms),
            clock: Arc::new(SystemClock),
            store,
            persist_blocked,
        }
    }

    /// Use `clock` as the source of "now".
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Evaluate against `catalog` instead of the built-in one.
    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<BadgeCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Arm deferred unlocks on `hook`.
    #[must_use]
    pub fn with_timer(mut self, hook: Arc<dyn TimerHook>) -> Self {
        self.scheduler.set_hook(hook);
        self
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn profile_id(&self) -> &ProfileId {
        &self.profile_id
    }

    #[must_use]
    pub fn state(&self) -> &ProgressionState {
        &self.state
    }

    #[must_use]
    pub fn catalog(&self) -> &BadgeCatalog {
        &self.catalog
    }

    /// Current instant according to the injected clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Pending deferred unlocks in task order.
    #[must_use]
    pub fn pending_unlocks(&self) -> Vec<PendingUnlock> {
        self.scheduler.pending().cloned().collect()
    }

    /// Earliest due time among pending deferred unlocks.
    #[must_use]
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.scheduler.next_due()
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.scheduler.is_closed()
    }

    /// Whether commands are written to the store.
    ///
    /// False after `shutdown`, and when the stored snapshot could not be
    /// read or quarantined.
    #[must_use]
    pub fn is_persisting(&self) -> bool {
        !self.persist_blocked && !self.is_shut_down()
    }

    /// The persisted projection of the current state.
    #[must_use]
    pub fn snapshot(&self) -> ProgressionSnapshot {
        ProgressionSnapshot::from(&self.state)
    }

    // -------------------------------------------------------------------------
    // Commands: profile and onboarding
    // -------------------------------------------------------------------------

    /// Store the profile. Ignored if a profile is already set.
    pub fn set_profile(&mut self, profile: Profile) -> CommandReport {
        if !self.state.set_profile_once(profile) {
            return CommandReport::unchanged();
        }
        let now = self.clock.now();
        let mut report = self.grant(XpSource::Profile, XP_PROFILE_COMPLETE, now);
        self.evaluate(Trigger::Profile, now, &mut report);
        self.persist();
        report
    }

    /// Mark onboarding complete. Only the first call has any effect.
    pub fn complete_onboarding(&mut self) -> CommandReport {
        if !self.state.mark_onboarded() {
            return CommandReport::unchanged();
        }
        let now = self.clock.now();
        let mut report = self.grant(XpSource::Onboarding, XP_ONBOARDING, now);
        self.evaluate(Trigger::Onboarding, now, &mut report);
        self.persist();
        report
    }

    // -------------------------------------------------------------------------
    // Commands: XP and streak
    // -------------------------------------------------------------------------

    /// Add `amount` XP from an external source.
    pub fn add_xp(&mut self, amount: u64) -> XpGrant {
        let now = self.clock.now();
        let report = self.grant(XpSource::Manual, amount, now);
        if report.changed {
            self.persist();
        }
        // `grant` always reports a grant.
        report.grant.unwrap_or(XpGrant {
            source: XpSource::Manual,
            amount,
            level: self.state.level(),
            leveled_up: false,
        })
    }

    /// Record a daily check-in at `now`.
    ///
    /// A second check-in on the same calendar day is a no-op. Otherwise the
    /// streak advances (or restarts at 1) and `10 * min(streak, 7)` XP is
    /// granted.
    pub fn check_in(&mut self, now: DateTime<Utc>) -> CommandReport {
        let outcome = self.tracker.check_in(self.state.streak_mut(), now);
        let Some(new_streak) = outcome.new_streak() else {
            return CommandReport {
                check_in: Some(outcome),
                ..CommandReport::unchanged()
            };
        };

        let bonus = XP_PER_STREAK_DAY * u64::from(new_streak.min(STREAK_BONUS_CAP));
        let mut report = self.grant(XpSource::CheckIn, bonus, now);
        report.changed = true;
        report.check_in = Some(outcome);
        self.evaluate(Trigger::CheckIn, now, &mut report);

        tracing::debug!(profile = %self.profile_id, streak = new_streak, "check-in recorded");
        self.persist();
        report
    }

    // -------------------------------------------------------------------------
    // Commands: badges
    // -------------------------------------------------------------------------

    /// Unlock a badge directly (quiz results, community actions, ...).
    ///
    /// Unknown or already unlocked ids are ignored.
    pub fn unlock_badge(&mut self, id: &BadgeId) -> CommandReport {
        let now = self.clock.now();
        let engine = AchievementEngine::new(&self.catalog);
        if !engine.unlock_badge(&mut self.state, id, now) {
            return CommandReport::unchanged();
        }
        self.persist();
        CommandReport {
            changed: true,
            unlocked: vec![id.clone()],
            ..CommandReport::default()
        }
    }

    // -------------------------------------------------------------------------
    // Commands: interaction sets
    // -------------------------------------------------------------------------

    /// Save an opportunity. Grants XP only on a new insert.
    pub fn save(&mut self, id: &str) -> Result<CommandReport, StrideError> {
        let id = OpportunityId::new(id)?;
        if !self.state.interactions_mut().saved.insert(id) {
            return Ok(CommandReport::unchanged());
        }
        let now = self.clock.now();
        let mut report = self.grant(XpSource::Save, XP_SAVE, now);
        self.evaluate(Trigger::Save, now, &mut report);
        self.persist();
        Ok(report)
    }

    /// Remove a saved opportunity. No XP is taken back.
    pub fn unsave(&mut self, id: &str) -> Result<CommandReport, StrideError> {
        let id = OpportunityId::new(id)?;
        if !self.state.interactions_mut().saved.remove(&id) {
            return Ok(CommandReport::unchanged());
        }
        self.persist();
        Ok(CommandReport {
            changed: true,
            ..CommandReport::default()
        })
    }

    /// Record an application. Permanent; repeats are no-ops.
    pub fn apply(&mut self, id: &str) -> Result<CommandReport, StrideError> {
        let id = OpportunityId::new(id)?;
        if !self.state.interactions_mut().applied.insert(id) {
            return Ok(CommandReport::unchanged());
        }
        let now = self.clock.now();
        let mut report = self.grant(XpSource::Apply, XP_APPLY, now);
        self.evaluate(Trigger::Apply, now, &mut report);
        self.persist();
        Ok(report)
    }

    /// Record a completion. Permanent; repeats are no-ops.
    ///
    /// A new completion always raises confetti, level-up or not.
    pub fn complete(&mut self, id: &str) -> Result<CommandReport, StrideError> {
        let id = OpportunityId::new(id)?;
        if !self.state.interactions_mut().completed.insert(id) {
            return Ok(CommandReport::unchanged());
        }
        let now = self.clock.now();
        let mut report = self.grant(XpSource::Complete, XP_COMPLETE, now);
        self.state.flags_mut().show_confetti = true;
        self.evaluate(Trigger::Complete, now, &mut report);
        self.persist();
        Ok(report)
    }

    // -------------------------------------------------------------------------
    // Commands: acknowledgements
    // -------------------------------------------------------------------------

    /// Clear the level-up modal. Returns whether it was raised.
    pub fn acknowledge_level_up(&mut self) -> bool {
        std::mem::take(&mut self.state.flags_mut().show_level_up_modal)
    }

    /// Clear the achievement toast and its payload.
    pub fn acknowledge_achievement_toast(&mut self) -> bool {
        let flags = self.state.flags_mut();
        flags.latest_achievement = None;
        std::mem::take(&mut flags.show_achievement_toast)
    }

    /// Clear the confetti flag.
    pub fn acknowledge_confetti(&mut self) -> bool {
        std::mem::take(&mut self.state.flags_mut().show_confetti)
    }

    // -------------------------------------------------------------------------
    // Deferred unlocks
    // -------------------------------------------------------------------------

    /// Fire one deferred unlock, typically from a timer.
    ///
    /// Returns the badge if it was unlocked. Unknown tasks, tasks fired after
    /// `shutdown`, and tasks whose preconditions no longer hold are no-ops.
    pub fn fire(&mut self, task: TaskId) -> Option<BadgeId> {
        let pending = self.scheduler.take(task)?;
        let now = self.clock.now();
        let unlocked = self.fire_pending(pending, now);
        if unlocked.is_some() {
            self.persist();
        }
        unlocked
    }

    /// Fire every deferred unlock due at or before `now`.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<BadgeId> {
        let due = self.scheduler.take_due(now);
        let unlocked: Vec<BadgeId> = due
            .into_iter()
            .filter_map(|pending| self.fire_pending(pending, now))
            .collect();
        if !unlocked.is_empty() {
            self.persist();
        }
        unlocked
    }

    /// Cancel pending deferred work and release the stored snapshot.
    ///
    /// Later firings are no-ops and later commands are not persisted, so a
    /// successor session for the same profile owns the store from here on.
    /// Returns the number of cancelled tasks.
    pub fn shutdown(&mut self) -> usize {
        let cancelled = self.scheduler.close();
        tracing::debug!(profile = %self.profile_id, cancelled, "service shut down");
        cancelled
    }

    fn fire_pending(&mut self, pending: PendingUnlock, now: DateTime<Utc>) -> Option<BadgeId> {
        if self.state.is_unlocked(&pending.badge) || self.state.level() < pending.threshold {
            tracing::debug!(
                profile = %self.profile_id,
                badge = %pending.badge,
                "deferred unlock no longer applies"
            );
            return None;
        }
        let engine = AchievementEngine::new(&self.catalog);
        engine
            .unlock_badge(&mut self.state, &pending.badge, now)
            .then_some(pending.badge)
    }

    // -------------------------------------------------------------------------
    // Views
    // -------------------------------------------------------------------------

    /// Full observable state.
    #[must_use]
    pub fn view(&self) -> ProgressionView {
        let info = self.state.level_info();
        let interactions = self.state.interactions();
        ProgressionView {
            profile_id: self.profile_id.clone(),
            profile: self.state.profile().cloned(),
            is_onboarded: self.state.is_onboarded(),
            xp: self.state.xp(),
            level: info.level,
            xp_to_next_level: info.xp_to_next_level,
            xp_in_current_level: info.xp_in_current_level,
            streak: self.state.streak().clone(),
            unlocked_badges: self.state.unlocked_badges().to_vec(),
            saved: interactions.saved.clone(),
            applied: interactions.applied.clone(),
            completed: interactions.completed.clone(),
            flags: self.state.flags().clone(),
            pending_unlocks: self.pending_unlocks(),
        }
    }

    /// Progress overview as of the clock's current instant.
    #[must_use]
    pub fn summary(&self) -> ProgressionSummary {
        let info = self.state.level_info();
        let streak = self.state.streak();
        ProgressionSummary {
            xp: self.state.xp(),
            level: info.level,
            xp_to_next_level: info.xp_to_next_level,
            xp_in_current_level: info.xp_in_current_level,
            progress_percent: LevelCurve::progress_percent(self.state.xp()),
            badge_count: self.state.unlocked_badges().len(),
            current_streak: streak.current,
            longest_streak: streak.longest,
            streak_active: self.tracker.is_active(streak, self.clock.now()),
            recent_badges: self
                .state
                .unlocked_badges()
                .iter()
                .rev()
                .take(RECENT_BADGE_COUNT)
                .cloned()
                .collect(),
        }
    }

    /// Progress towards every badge not yet unlocked.
    #[must_use]
    pub fn badge_progress(&self) -> Vec<BadgeProgress> {
        AchievementEngine::new(&self.catalog).badge_progress(&self.state)
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    /// Commit XP, raise level-up flags and queue level milestones.
    fn grant(&mut self, source: XpSource, amount: u64, now: DateTime<Utc>) -> CommandReport {
        let commit = self.state.commit_xp(amount);
        let leveled_up = commit.leveled_up();
        let mut report = CommandReport {
            changed: amount > 0,
            grant: Some(XpGrant {
                source,
                amount,
                level: commit.after.level,
                leveled_up,
            }),
            ..CommandReport::default()
        };

        if leveled_up {
            let flags = self.state.flags_mut();
            flags.show_level_up_modal = true;
            flags.show_confetti = true;
            tracing::debug!(
                profile = %self.profile_id,
                level = commit.after.level,
                "level up"
            );
            self.schedule_milestones(now, &mut report);
        }
        report
    }

    fn schedule_milestones(&mut self, now: DateTime<Utc>, report: &mut CommandReport) {
        let level = self.state.level();
        let due: Vec<(BadgeId, u32)> = self
            .catalog
            .level_milestones()
            .filter(|(_, threshold)| level >= *threshold)
            .map(|(badge, threshold)| (badge.badge_id(), threshold))
            .filter(|(id, _)| !self.state.is_unlocked(id) && !self.scheduler.is_pending(id))
            .collect();

        for (id, threshold) in due {
            if self.scheduler.schedule(id.clone(), threshold, now).is_some() {
                tracing::debug!(profile = %self.profile_id, badge = %id, "milestone deferred");
                report.deferred.push(id);
            }
        }
    }

    fn evaluate(&mut self, trigger: Trigger, now: DateTime<Utc>, report: &mut CommandReport) {
        let engine = AchievementEngine::new(&self.catalog);
        let unlocked = engine.evaluate(&mut self.state, trigger, now);
        for id in &unlocked {
            tracing::debug!(profile = %self.profile_id, badge = %id, "badge unlocked");
        }
        report.unlocked.extend(unlocked);
    }

    fn persist(&self) {
        if !self.is_persisting() {
            tracing::debug!(profile = %self.profile_id, "persistence disabled, snapshot not written");
            return;
        }
        if let Err(e) = self.store.save(&self.profile_id, &self.snapshot()) {
            tracing::warn!(profile = %self.profile_id, error = %e, "failed to persist snapshot");
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 1, 10, 0, 0)
            .single()
            .expect("valid instant")
    }

    fn service() -> (ProgressionService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start()));
        let service = ProgressionService::new(ProfileId::new("ada").expect("id"))
            .with_clock(clock.clone());
        (service, clock)
    }

    #[test]
    fn onboarding_grants_once() {
        let (mut svc, _) = service();

        let first = svc.complete_onboarding();
        let second = svc.complete_onboarding();

        assert!(first.changed);
        assert_eq!(first.unlocked, vec![BadgeId::new("first-login")]);
        assert!(!second.changed);
        assert_eq!(svc.state().xp(), XP_ONBOARDING);
    }

    #[test]
    fn second_profile_is_ignored() {
        let (mut svc, _) = service();
        svc.set_profile(Profile::new("Ada", 10).with_interest("robotics"));
        let report = svc.set_profile(Profile::new("Grace", 12));

        assert!(!report.changed);
        assert_eq!(svc.state().xp(), XP_PROFILE_COMPLETE);
        assert_eq!(svc.state().profile().map(|p| p.grade), Some(10));
        assert!(svc.state().is_unlocked(&BadgeId::new("profile-complete")));
    }

    #[test]
    fn add_xp_level_up_raises_flags() {
        let (mut svc, _) = service();

        let grant = svc.add_xp(100);

        assert!(grant.leveled_up);
        assert_eq!(grant.level, 2);
        assert!(svc.state().flags().show_level_up_modal);
        assert!(svc.state().flags().show_confetti);
    }

    #[test]
    fn invalid_opportunity_never_reaches_state() {
        let (mut svc, _) = service();
        assert!(matches!(
            svc.save(""),
            Err(StrideError::InvalidOpportunityId(_))
        ));
        assert!(svc.apply(&"x".repeat(257)).is_err());
        assert!(svc.state().saved().is_empty());
        assert_eq!(svc.state().xp(), 0);
    }

    #[test]
    fn unsave_then_resave_grants_again() {
        let (mut svc, _) = service();
        svc.save("camp").expect("save");
        svc.unsave("camp").expect("unsave");
        let again = svc.save("camp").expect("save");

        assert!(again.changed);
        assert_eq!(svc.state().xp(), 2 * XP_SAVE);
        // first-save is not unlocked a second time.
        assert!(again.unlocked.is_empty());
    }

    #[test]
    fn unsave_missing_is_noop() {
        let (mut svc, _) = service();
        assert!(!svc.unsave("never-saved").expect("unsave").changed);
    }

    #[test]
    fn complete_raises_confetti_without_level_up() {
        let (mut svc, _) = service();
        svc.add_xp(120);
        svc.acknowledge_confetti();
        svc.acknowledge_level_up();

        let report = svc.complete("hackathon").expect("complete");
        assert_eq!(report.grant.map(|g| g.leveled_up), Some(false));
        assert!(svc.state().flags().show_confetti);
        assert!(!svc.state().flags().show_level_up_modal);

        let dup = svc.complete("hackathon").expect("complete");
        assert!(!dup.changed);
        assert_eq!(svc.state().xp(), 220);
    }

    #[test]
    fn acknowledgements_clear_flags() {
        let (mut svc, _) = service();
        svc.complete_onboarding();
        assert!(svc.state().flags().show_achievement_toast);

        assert!(svc.acknowledge_achievement_toast());
        assert!(!svc.acknowledge_achievement_toast());
        assert!(svc.state().flags().latest_achievement.is_none());
    }

    #[test]
    fn check_in_bonus_caps_after_a_week() {
        let (mut svc, _) = service();
        let mut grants = Vec::new();
        for day in 0..9 {
            let report = svc.check_in(start() + Duration::days(day));
            grants.push(report.grant.map(|g| g.amount).unwrap_or(0));
        }
        assert_eq!(grants, vec![10, 20, 30, 40, 50, 60, 70, 70, 70]);
        assert_eq!(svc.state().streak().current, 9);
        assert!(svc.state().is_unlocked(&BadgeId::new("streak-7")));
    }

    #[test]
    fn deferred_unlock_revalidates_on_fire() {
        let (mut svc, clock) = service();
        svc.add_xp(812);
        let pending = svc.pending_unlocks();
        assert_eq!(pending.len(), 1);
        svc.unlock_badge(&BadgeId::new("level-5"));

        clock.advance(Duration::milliseconds(1500));
        assert_eq!(svc.fire(pending[0].task), None);
        assert_eq!(svc.state().unlocked_badges().len(), 1);
    }

    #[test]
    fn shutdown_cancels_and_blocks_firing() {
        let (mut svc, clock) = service();
        svc.add_xp(812);
        let task = svc.pending_unlocks()[0].task;

        assert_eq!(svc.shutdown(), 1);
        clock.advance(Duration::seconds(5));
        assert_eq!(svc.fire(task), None);
        assert!(svc.tick(clock.now()).is_empty());
        assert!(!svc.state().is_unlocked(&BadgeId::new("level-5")));
    }

    #[test]
    fn shutdown_stops_persisting() {
        let store: Arc<dyn SnapshotStore> = Arc::new(MemoryStore::new());
        let id = ProfileId::new("ada").expect("id");
        let mut svc = ProgressionService::open(id.clone(), store.clone(), ServiceOptions::default());
        svc.save("camp").expect("save");
        svc.shutdown();
        assert!(!svc.is_persisting());

        svc.save("late").expect("save");

        let stored = store.load(&id).expect("load").expect("snapshot");
        assert_eq!(stored.saved.len(), 1);
        assert_eq!(stored.xp, 5);
    }

    /// Store whose snapshot can never be read, counting writes.
    #[derive(Debug)]
    struct UnreadableStore {
        decode_failure: bool,
        saves: std::sync::atomic::AtomicUsize,
    }

    impl SnapshotStore for UnreadableStore {
        fn load(&self, _: &ProfileId) -> Result<Option<ProgressionSnapshot>, StrideError> {
            if self.decode_failure {
                Err(StrideError::Deserialization("bad payload".to_string()))
            } else {
                Err(StrideError::Io("permission denied".to_string()))
            }
        }

        fn save(&self, _: &ProfileId, _: &ProgressionSnapshot) -> Result<(), StrideError> {
            self.saves.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }

        fn remove(&self, _: &ProfileId) -> Result<bool, StrideError> {
            Ok(false)
        }

        fn profiles(&self) -> Result<Vec<ProfileId>, StrideError> {
            Ok(Vec::new())
        }

        fn quarantine(&self, _: &ProfileId) -> Result<bool, StrideError> {
            Err(StrideError::Io("read-only".to_string()))
        }
    }

    #[test]
    fn unreadable_snapshot_is_never_overwritten() {
        for decode_failure in [false, true] {
            let store = Arc::new(UnreadableStore {
                decode_failure,
                saves: std::sync::atomic::AtomicUsize::new(0),
            });
            let mut svc = ProgressionService::open(
                ProfileId::new("ada").expect("id"),
                store.clone(),
                ServiceOptions::default(),
            );
            assert!(!svc.is_persisting());

            svc.save("camp").expect("save");
            svc.add_xp(100);

            assert_eq!(svc.state().xp(), 105);
            assert_eq!(store.saves.load(std::sync::atomic::Ordering::SeqCst), 0);
        }
    }

    #[test]
    fn summary_lists_recent_badges_newest_first() {
        let (mut svc, clock) = service();
        for id in ["early-bird", "quiz-whiz", "helping-hand", "first-login"] {
            svc.unlock_badge(&BadgeId::new(id));
            clock.advance(Duration::minutes(1));
        }
        svc.check_in(clock.now());

        let summary = svc.summary();
        let recent: Vec<_> = summary
            .recent_badges
            .iter()
            .map(|b| b.id.as_str().to_string())
            .collect();
        assert_eq!(recent, vec!["first-login", "helping-hand", "quiz-whiz"]);
        assert_eq!(summary.badge_count, 4);
        assert!(summary.streak_active);
    }

    #[test]
    fn persists_after_each_change() {
        let store: Arc<dyn SnapshotStore> = Arc::new(MemoryStore::new());
        let id = ProfileId::new("ada").expect("id");
        {
            let mut svc =
                ProgressionService::open(id.clone(), store.clone(), ServiceOptions::default());
            svc.save("camp").expect("save");
            svc.add_xp(40);
        }
        let svc = ProgressionService::open(id, store, ServiceOptions::default());
        assert_eq!(svc.state().xp(), 45);
        assert_eq!(svc.state().saved().len(), 1);
        assert!(svc.state().is_unlocked(&BadgeId::new("first-save")));
        assert!(!svc.state().flags().any_raised());
    }
}
