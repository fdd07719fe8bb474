//! # Core Type Definitions
//!
//! This module contains the shared vocabulary of the progression engine:
//! - Identifiers (`ProfileId`, `OpportunityId`, `BadgeId`)
//! - The learner profile (`Profile`)
//! - Streak and interaction records (`Streak`, `InteractionSets`)
//! - Unlock records and presentation payloads (`UnlockedBadge`, `LatestAchievement`, `PresentationFlags`)
//! - Error types (`StrideError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (no floating-point)
//! - Implement `Ord` where they are stored in `BTreeMap`/`BTreeSet`
//! - Use saturating arithmetic for counters to prevent overflow

use crate::primitives::{MAX_OPPORTUNITY_ID_LENGTH, MAX_PROFILE_ID_LENGTH};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identifier of the profile that owns a progression record.
///
/// Profile ids double as storage keys (and as file names for the file store),
/// so they are restricted to ASCII alphanumerics, `-` and `_`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(String);

impl ProfileId {
    /// Validate and wrap a profile id.
    pub fn new(id: impl Into<String>) -> Result<Self, StrideError> {
        let id = id.into();
        let valid_chars = id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if id.is_empty() || id.len() > MAX_PROFILE_ID_LENGTH || !valid_chars {
            return Err(StrideError::InvalidProfileId(id));
        }
        Ok(Self(id))
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProfileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of an opportunity in the external catalog.
///
/// The engine never interprets these; it only records set membership.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpportunityId(String);

impl OpportunityId {
    /// Validate and wrap an opportunity id.
    pub fn new(id: impl Into<String>) -> Result<Self, StrideError> {
        let id = id.into();
        if id.trim().is_empty() || id.len() > MAX_OPPORTUNITY_ID_LENGTH {
            return Err(StrideError::InvalidOpportunityId(id));
        }
        Ok(Self(id))
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OpportunityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable string key of a badge.
///
/// Any string is accepted: ids that the current catalog does not know
/// (written by an older or newer catalog) are carried as inert data.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BadgeId(String);

impl BadgeId {
    /// Wrap a badge key.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BadgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BadgeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// =============================================================================
// PROFILE
// =============================================================================

/// The learner profile captured during onboarding.
///
/// Set once; the engine exposes no edit command.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub name: String,
    pub grade: u8,
    pub interests: BTreeSet<String>,
    pub goals: BTreeSet<String>,
}

impl Profile {
    /// Create a profile with no interests or goals.
    #[must_use]
    pub fn new(name: impl Into<String>, grade: u8) -> Self {
        Self {
            name: name.into(),
            grade,
            ..Self::default()
        }
    }

    /// Add an interest tag.
    #[must_use]
    pub fn with_interest(mut self, tag: impl Into<String>) -> Self {
        self.interests.insert(tag.into());
        self
    }

    /// Add a goal tag.
    #[must_use]
    pub fn with_goal(mut self, tag: impl Into<String>) -> Self {
        self.goals.insert(tag.into());
        self
    }
}

// =============================================================================
// BADGE CLASSIFICATION
// =============================================================================

/// Display grouping of a badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeCategory {
    Milestone,
    Exploration,
    Streak,
    Achievement,
}

impl BadgeCategory {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            BadgeCategory::Milestone => "milestone",
            BadgeCategory::Exploration => "exploration",
            BadgeCategory::Streak => "streak",
            BadgeCategory::Achievement => "achievement",
        }
    }
}

/// How rare a badge is, used only for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

// =============================================================================
// UNLOCK RECORDS
// =============================================================================

/// A badge the profile has earned. Never removed once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockedBadge {
    pub id: BadgeId,
    pub unlocked_at: DateTime<Utc>,
}

/// Display payload for the most recent unlock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestAchievement {
    pub id: BadgeId,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub category: BadgeCategory,
    pub unlocked_at: DateTime<Utc>,
}

// =============================================================================
// STREAK
// =============================================================================

/// Daily check-in streak.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Streak {
    /// Consecutive calendar days ending at the last check-in.
    pub current: u32,
    /// Highest value `current` has ever reached.
    pub longest: u32,
    pub last_check_in: Option<DateTime<Utc>>,
}

// =============================================================================
// INTERACTION SETS
// =============================================================================

/// Opportunity ids the profile has interacted with.
///
/// `saved` supports removal; `applied` and `completed` are permanent records.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionSets {
    pub saved: BTreeSet<OpportunityId>,
    pub applied: BTreeSet<OpportunityId>,
    pub completed: BTreeSet<OpportunityId>,
}

// =============================================================================
// PRESENTATION FLAGS
// =============================================================================

/// Ephemeral signals for the presentation layer.
///
/// - VOLATILE: never serialized into a snapshot
/// - Raised by mutations, cleared only by the acknowledge commands
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PresentationFlags {
    pub show_level_up_modal: bool,
    pub show_achievement_toast: bool,
    pub latest_achievement: Option<LatestAchievement>,
    pub show_confetti: bool,
}

impl PresentationFlags {
    /// Check whether any celebration is waiting to be acknowledged.
    #[must_use]
    pub fn any_raised(&self) -> bool {
        self.show_level_up_modal || self.show_achievement_toast || self.show_confetti
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Stride engine.
///
/// Commands over valid state are total; errors only arise at the boundary
/// (identifier validation) and in storage or configuration I/O.
#[derive(Debug, Error)]
pub enum StrideError {
    /// The opportunity id is empty or too long.
    #[error("Invalid opportunity id: {0:?}")]
    InvalidOpportunityId(String),

    /// The profile id is empty, too long, or contains unsupported characters.
    #[error("Invalid profile id: {0:?}")]
    InvalidProfileId(String),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),

    /// Configuration could not be read or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_id_rejects_path_characters() {
        assert!(ProfileId::new("ada-lovelace_1").is_ok());
        assert!(ProfileId::new("").is_err());
        assert!(ProfileId::new("../etc").is_err());
        assert!(ProfileId::new("a b").is_err());
        assert!(ProfileId::new("x".repeat(MAX_PROFILE_ID_LENGTH + 1)).is_err());
    }

    #[test]
    fn opportunity_id_bounds() {
        assert!(OpportunityId::new("olympiad-2026").is_ok());
        assert!(OpportunityId::new("   ").is_err());
        assert!(OpportunityId::new("o".repeat(MAX_OPPORTUNITY_ID_LENGTH + 1)).is_err());
    }

    #[test]
    fn interaction_sets_are_ordered() {
        let mut sets = InteractionSets::default();
        for id in ["c", "a", "b"] {
            sets.saved.insert(OpportunityId::new(id).expect("id"));
        }
        let ids: Vec<_> = sets.saved.iter().map(OpportunityId::as_str).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn flags_any_raised() {
        let mut flags = PresentationFlags::default();
        assert!(!flags.any_raised());
        flags.show_confetti = true;
        assert!(flags.any_raised());
    }

    #[test]
    fn category_serializes_lowercase() {
        let json = serde_json::to_string(&BadgeCategory::Milestone).expect("serialize");
        assert_eq!(json, "\"milestone\"");
        assert_eq!(BadgeCategory::Streak.as_str(), "streak");
    }
}
