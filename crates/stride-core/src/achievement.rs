//! # Achievement Engine
//!
//! Evaluates badge requirements against a [`ProgressionState`].
//!
//! Unlocking is at-most-once per id and never grants XP by itself. Level
//! milestones are never unlocked here: the service routes them through the
//! deferred path so the toast does not land on top of the level-up modal.

use crate::catalog::{Badge, BadgeCatalog, Requirement, Trigger};
use crate::state::ProgressionState;
use crate::{BadgeId, LatestAchievement, UnlockedBadge};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Reverse;

// =============================================================================
// BADGE PROGRESS
// =============================================================================

/// How close a locked badge is to unlocking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    /// No progress yet.
    Locked,
    /// Some progress, requirement not met.
    InProgress,
    /// Requirement met, unlock still pending (deferred or externally awarded).
    Eligible,
}

/// Progress towards one locked badge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BadgeProgress {
    pub badge: Badge,
    pub current: u64,
    pub required: u64,
    pub percent: u8,
    pub status: ProgressStatus,
}

// =============================================================================
// ENGINE
// =============================================================================

/// Requirement evaluation over a borrowed catalog.
#[derive(Debug, Clone, Copy)]
pub struct AchievementEngine<'a> {
    catalog: &'a BadgeCatalog,
}

impl<'a> AchievementEngine<'a> {
    #[must_use]
    pub fn new(catalog: &'a BadgeCatalog) -> Self {
        Self { catalog }
    }

    /// Unlock `id` at `now`.
    ///
    /// Returns false if the badge is unknown or already unlocked. On success
    /// the achievement toast is raised with the badge's display fields.
    pub fn unlock_badge(
        &self,
        state: &mut ProgressionState,
        id: &BadgeId,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(badge) = self.catalog.get(id) else {
            tracing::debug!(badge = %id, "ignoring unlock of unknown badge");
            return false;
        };
        let recorded = state.record_unlock(UnlockedBadge {
            id: id.clone(),
            unlocked_at: now,
        });
        if !recorded {
            return false;
        }

        let flags = state.flags_mut();
        flags.latest_achievement = Some(LatestAchievement {
            id: id.clone(),
            name: badge.name.to_string(),
            description: badge.description.to_string(),
            icon: badge.icon.to_string(),
            category: badge.category,
            unlocked_at: now,
        });
        flags.show_achievement_toast = true;

        tracing::debug!(badge = %id, category = badge.category.as_str(), "badge unlocked");
        true
    }

    /// Unlock every satisfied badge of the trigger family, in catalog order.
    ///
    /// Returns the ids that were newly unlocked.
    pub fn evaluate(
        &self,
        state: &mut ProgressionState,
        trigger: Trigger,
        now: DateTime<Utc>,
    ) -> Vec<BadgeId> {
        let satisfied: Vec<BadgeId> = self
            .catalog
            .for_trigger(trigger)
            .filter(|b| is_satisfied(&b.requirement, state))
            .map(Badge::badge_id)
            .collect();

        satisfied
            .into_iter()
            .filter(|id| self.unlock_badge(state, id, now))
            .collect()
    }

    /// Progress towards every badge not yet unlocked.
    ///
    /// Sorted by percent (highest first), then catalog order.
    #[must_use]
    pub fn badge_progress(&self, state: &ProgressionState) -> Vec<BadgeProgress> {
        let mut progress: Vec<BadgeProgress> = self
            .catalog
            .iter()
            .filter(|b| !state.is_unlocked(&b.badge_id()))
            .map(|b| {
                let required = b.requirement.required().max(1);
                let current = current_value(&b.requirement, state);
                let percent = (u128::from(current) * 100 / u128::from(required)).min(100) as u8;
                let status = if current >= required {
                    ProgressStatus::Eligible
                } else if current > 0 {
                    ProgressStatus::InProgress
                } else {
                    ProgressStatus::Locked
                };
                BadgeProgress {
                    badge: b.clone(),
                    current,
                    required,
                    percent,
                    status,
                }
            })
            .collect();

        // Stable sort keeps catalog order within equal percentages.
        progress.sort_by_key(|p| Reverse(p.percent));
        progress
    }
}

/// Observed value for a requirement.
fn current_value(requirement: &Requirement, state: &ProgressionState) -> u64 {
    match requirement {
        Requirement::Onboarded => u64::from(state.is_onboarded()),
        Requirement::ProfileSet => u64::from(state.profile().is_some()),
        Requirement::Saved(_) => state.saved().len() as u64,
        Requirement::Applied(_) => state.applied().len() as u64,
        Requirement::Completed(_) => state.completed().len() as u64,
        Requirement::Streak(_) => u64::from(state.streak().current),
        Requirement::Level(_) => u64::from(state.level()),
        Requirement::Manual => 0,
    }
}

fn is_satisfied(requirement: &Requirement, state: &ProgressionState) -> bool {
    current_value(requirement, state) >= requirement.required()
}

// =============================================================================
// TESTS
// =============================================================================
