//! # Progression State
//!
//! The mutable record owned by one `ProgressionService`.
//!
//! Fields are private. Readers get accessors; writers inside the crate go
//! through narrow mutators so that:
//! - `level` is only ever written together with `xp` (see [`ProgressionState::commit_xp`])
//! - unlocked badges are append-only with unique ids
//! - presentation flags never reach a snapshot
//!
//! [`ProgressionSnapshot`] is the persisted projection. Converting a snapshot
//! back into a state re-derives every computed field.

use crate::level::{LevelCurve, LevelInfo};
use crate::{
    BadgeId, InteractionSets, OpportunityId, PresentationFlags, Profile, Streak, UnlockedBadge,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// STATE
// =============================================================================

/// Live progression record for one profile.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgressionState {
    profile: Option<Profile>,
    is_onboarded: bool,
    xp: u64,
    level: LevelInfo,
    streak: Streak,
    unlocked: Vec<UnlockedBadge>,
    interactions: InteractionSets,
    flags: PresentationFlags,
}

/// Level before and after an XP commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct XpCommit {
    pub(crate) before: LevelInfo,
    pub(crate) after: LevelInfo,
}

impl XpCommit {
    pub(crate) fn leveled_up(&self) -> bool {
        self.after.level > self.before.level
    }
}

impl ProgressionState {
    /// A zeroed state at level 1.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    #[must_use]
    pub fn is_onboarded(&self) -> bool {
        self.is_onboarded
    }

    #[must_use]
    pub fn xp(&self) -> u64 {
        self.xp
    }

    #[must_use]
    pub fn level(&self) -> u32 {
        self.level.level
    }

    #[must_use]
    pub fn xp_to_next_level(&self) -> u64 {
        self.level.xp_to_next_level
    }

    #[must_use]
    pub fn level_info(&self) -> LevelInfo {
        self.level
    }

    #[must_use]
    pub fn streak(&self) -> &Streak {
        &self.streak
    }

    /// Unlocked badges in unlock order.
    #[must_use]
    pub fn unlocked_badges(&self) -> &[UnlockedBadge] {
        &self.unlocked
    }

    #[must_use]
    pub fn is_unlocked(&self, id: &BadgeId) -> bool {
        self.unlocked.iter().any(|b| &b.id == id)
    }

    #[must_use]
    pub fn interactions(&self) -> &InteractionSets {
        &self.interactions
    }

    #[must_use]
    pub fn saved(&self) -> &BTreeSet<OpportunityId> {
        &self.interactions.saved
    }

    #[must_use]
    pub fn applied(&self) -> &BTreeSet<OpportunityId> {
        &self.interactions.applied
    }

    #[must_use]
    pub fn completed(&self) -> &BTreeSet<OpportunityId> {
        &self.interactions.completed
    }

    #[must_use]
    pub fn flags(&self) -> &PresentationFlags {
        &self.flags
    }

    // -------------------------------------------------------------------------
    // Mutators (crate-internal)
    // -------------------------------------------------------------------------

    /// Add XP and re-derive the level in the same step.
    pub(crate) fn commit_xp(&mut self, amount: u64) -> XpCommit {
        let before = self.level;
        self.xp = self.xp.saturating_add(amount);
        self.level = LevelCurve::resolve(self.xp);
        XpCommit {
            before,
            after: self.level,
        }
    }

    /// Store the profile unless one is already set.
    pub(crate) fn set_profile_once(&mut self, profile: Profile) -> bool {
        if self.profile.is_some() {
            return false;
        }
        self.profile = Some(profile);
        true
    }

    /// Mark onboarding complete. Returns false if it already was.
    pub(crate) fn mark_onboarded(&mut self) -> bool {
        !std::mem::replace(&mut self.is_onboarded, true)
    }

    pub(crate) fn streak_mut(&mut self) -> &mut Streak {
        &mut self.streak
    }

    pub(crate) fn interactions_mut(&mut self) -> &mut InteractionSets {
        &mut self.interactions
    }

    pub(crate) fn flags_mut(&mut self) -> &mut PresentationFlags {
        &mut self.flags
    }

    /// Append an unlock record. Returns false if the id is already present.
    pub(crate) fn record_unlock(&mut self, badge: UnlockedBadge) -> bool {
        if self.is_unlocked(&badge.id) {
            return false;
        }
        self.unlocked.push(badge);
        true
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Persisted projection of a [`ProgressionState`].
///
/// Every field defaults, so partial or older JSON documents hydrate with
/// zero values. `level` and `xp_to_next_level` are informational: they are
/// recomputed from `xp` on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionSnapshot {
    pub profile: Option<Profile>,
    pub is_onboarded: bool,
    pub xp: u64,
    pub level: u32,
    pub xp_to_next_level: u64,
    pub streak: Streak,
    pub unlocked_badges: Vec<UnlockedBadge>,
    pub saved: BTreeSet<OpportunityId>,
    pub applied: BTreeSet<OpportunityId>,
    pub completed: BTreeSet<OpportunityId>,
}

impl Default for ProgressionSnapshot {
    fn default() -> Self {
        Self::from(&ProgressionState::default())
    }
}

impl From<&ProgressionState> for ProgressionSnapshot {
    fn from(state: &ProgressionState) -> Self {
        Self {
            profile: state.profile.clone(),
            is_onboarded: state.is_onboarded,
            xp: state.xp,
            level: state.level.level,
            xp_to_next_level: state.level.xp_to_next_level,
            streak: state.streak.clone(),
            unlocked_badges: state.unlocked.clone(),
            saved: state.interactions.saved.clone(),
            applied: state.interactions.applied.clone(),
            completed: state.interactions.completed.clone(),
        }
    }
}

impl From<ProgressionSnapshot> for ProgressionState {
    fn from(snapshot: ProgressionSnapshot) -> Self {
        let mut streak = snapshot.streak;
        streak.longest = streak.longest.max(streak.current);

        let mut state = Self {
            profile: snapshot.profile,
            is_onboarded: snapshot.is_onboarded,
            xp: snapshot.xp,
            level: LevelCurve::resolve(snapshot.xp),
            streak,
            unlocked: Vec::with_capacity(snapshot.unlocked_badges.len()),
            interactions: InteractionSets {
                saved: snapshot.saved,
                applied: snapshot.applied,
                completed: snapshot.completed,
            },
            flags: PresentationFlags::default(),
        };
        // First occurrence wins if a hand-edited snapshot repeats an id.
        for badge in snapshot.unlocked_badges {
            state.record_unlock(badge);
        }
        state
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn new_state_is_level_one() {
        let state = ProgressionState::new();
        assert_eq!(state.xp(), 0);
        assert_eq!(state.level(), 1);
        assert_eq!(state.xp_to_next_level(), 100);
        assert!(state.unlocked_badges().is_empty());
    }

    #[test]
    fn commit_xp_rederives_level() {
        let mut state = ProgressionState::new();
        let commit = state.commit_xp(250);
        assert!(commit.leveled_up());
        assert_eq!(commit.before.level, 1);
        assert_eq!(state.level(), 3);
        assert_eq!(state.xp_to_next_level(), 225);
    }

    #[test]
    fn profile_is_set_once() {
        let mut state = ProgressionState::new();
        assert!(state.set_profile_once(Profile::new("Ada", 10)));
        assert!(!state.set_profile_once(Profile::new("Grace", 11)));
        assert_eq!(state.profile().map(|p| p.name.as_str()), Some("Ada"));
    }

    #[test]
    fn snapshot_load_recomputes_level_and_longest() {
        let snapshot = ProgressionSnapshot {
            xp: 812,
            level: 99,
            xp_to_next_level: 1,
            streak: Streak {
                current: 6,
                longest: 2,
                last_check_in: None,
            },
            ..ProgressionSnapshot::default()
        };

        let state = ProgressionState::from(snapshot);

        assert_eq!(state.level(), 5);
        assert_eq!(state.xp_to_next_level(), 506);
        assert_eq!(state.streak().longest, 6);
    }

    #[test]
    fn snapshot_load_drops_duplicate_unlocks() {
        let at = Utc
            .with_ymd_and_hms(2026, 2, 1, 12, 0, 0)
            .single()
            .expect("valid instant");
        let badge = UnlockedBadge {
            id: BadgeId::new("first-save"),
            unlocked_at: at,
        };
        let snapshot = ProgressionSnapshot {
            unlocked_badges: vec![badge.clone(), badge],
            ..ProgressionSnapshot::default()
        };

        let state = ProgressionState::from(snapshot);
        assert_eq!(state.unlocked_badges().len(), 1);
    }

    #[test]
    fn flags_are_not_persisted() {
        let mut state = ProgressionState::new();
        state.flags_mut().show_confetti = true;

        let restored = ProgressionState::from(ProgressionSnapshot::from(&state));
        assert!(!restored.flags().any_raised());
    }
}
