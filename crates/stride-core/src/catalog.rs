//! # Badge Catalog
//!
//! Static, versioned registry of achievement definitions.
//!
//! | Id | Category | Requirement |
//! |----|----------|-------------|
//! | `first-login` | milestone | onboarding completed |
//! | `profile-complete` | milestone | profile set |
//! | `first-save` / `five-saves` | exploration | 1 / 5 saved |
//! | `first-apply` | achievement | 1 applied |
//! | `first-complete` | achievement | 1 completed |
//! | `streak-3` / `streak-7` / `streak-30` | streak | streak length |
//! | `level-5` / `level-10` | milestone | level (deferred unlock) |
//! | `early-bird` / `quiz-whiz` / `helping-hand` | achievement | awarded externally |
//!
//! Ids are stable across catalog versions. A snapshot may contain ids this
//! catalog does not know; lookups for them return `None`.

use crate::{BadgeCategory, BadgeId, Rarity};
use serde::Serialize;

/// Version of the built-in catalog table.
pub const CATALOG_VERSION: u32 = 1;

// =============================================================================
// REQUIREMENTS
// =============================================================================

/// Event family that can satisfy a requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Onboarding,
    Profile,
    Save,
    Apply,
    Complete,
    CheckIn,
}

/// Unlock condition of a badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Requirement {
    Onboarded,
    ProfileSet,
    Saved(usize),
    Applied(usize),
    Completed(usize),
    Streak(u32),
    /// Level milestones are unlocked only through the deferred path.
    Level(u32),
    /// Awarded by an external collaborator through `unlock_badge`.
    Manual,
}

impl Requirement {
    /// The trigger family that evaluates this requirement, if any.
    #[must_use]
    pub fn trigger(&self) -> Option<Trigger> {
        match self {
            Requirement::Onboarded => Some(Trigger::Onboarding),
            Requirement::ProfileSet => Some(Trigger::Profile),
            Requirement::Saved(_) => Some(Trigger::Save),
            Requirement::Applied(_) => Some(Trigger::Apply),
            Requirement::Completed(_) => Some(Trigger::Complete),
            Requirement::Streak(_) => Some(Trigger::CheckIn),
            Requirement::Level(_) | Requirement::Manual => None,
        }
    }

    /// Target value for progress reporting.
    #[must_use]
    pub fn required(&self) -> u64 {
        match self {
            Requirement::Saved(n) | Requirement::Applied(n) | Requirement::Completed(n) => {
                *n as u64
            }
            Requirement::Streak(n) | Requirement::Level(n) => u64::from(*n),
            Requirement::Onboarded | Requirement::ProfileSet | Requirement::Manual => 1,
        }
    }
}

// =============================================================================
// BADGE
// =============================================================================

/// A catalog entry. Immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Badge {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub category: BadgeCategory,
    pub rarity: Rarity,
    pub requirement: Requirement,
}

impl Badge {
    /// The badge key as an owned id.
    #[must_use]
    pub fn badge_id(&self) -> BadgeId {
        BadgeId::new(self.id)
    }

    /// Icon and name, for one-line display.
    #[must_use]
    pub fn display(&self) -> String {
        format!("{} {}", self.icon, self.name)
    }
}

const STANDARD_BADGES: &[Badge] = &[
    Badge {
        id: "first-login",
        name: "First Steps",
        description: "Completed onboarding",
        icon: "👋",
        category: BadgeCategory::Milestone,
        rarity: Rarity::Common,
        requirement: Requirement::Onboarded,
    },
    Badge {
        id: "profile-complete",
        name: "Profile Pro",
        description: "Filled in your profile",
        icon: "🪪",
        category: BadgeCategory::Milestone,
        rarity: Rarity::Common,
        requirement: Requirement::ProfileSet,
    },
    Badge {
        id: "first-save",
        name: "Bookmarked",
        description: "Saved your first opportunity",
        icon: "🔖",
        category: BadgeCategory::Exploration,
        rarity: Rarity::Common,
        requirement: Requirement::Saved(1),
    },
    Badge {
        id: "five-saves",
        name: "Collector",
        description: "Saved five opportunities",
        icon: "📚",
        category: BadgeCategory::Exploration,
        rarity: Rarity::Uncommon,
        requirement: Requirement::Saved(5),
    },
    Badge {
        id: "first-apply",
        name: "Go-Getter",
        description: "Applied to your first opportunity",
        icon: "🚀",
        category: BadgeCategory::Achievement,
        rarity: Rarity::Uncommon,
        requirement: Requirement::Applied(1),
    },
    Badge {
        id: "first-complete",
        name: "Finisher",
        description: "Completed your first opportunity",
        icon: "🏁",
        category: BadgeCategory::Achievement,
        rarity: Rarity::Rare,
        requirement: Requirement::Completed(1),
    },
    Badge {
        id: "streak-3",
        name: "On Fire",
        description: "Checked in three days in a row",
        icon: "🔥",
        category: BadgeCategory::Streak,
        rarity: Rarity::Common,
        requirement: Requirement::Streak(3),
    },
    Badge {
        id: "streak-7",
        name: "Week Warrior",
        description: "Checked in seven days in a row",
        icon: "📅",
        category: BadgeCategory::Streak,
        rarity: Rarity::Rare,
        requirement: Requirement::Streak(7),
    },
    Badge {
        id: "streak-30",
        name: "Monthly Master",
        description: "Checked in thirty days in a row",
        icon: "🏆",
        category: BadgeCategory::Streak,
        rarity: Rarity::Legendary,
        requirement: Requirement::Streak(30),
    },
    Badge {
        id: "level-5",
        name: "Rising Star",
        description: "Reached level 5",
        icon: "⭐",
        category: BadgeCategory::Milestone,
        rarity: Rarity::Uncommon,
        requirement: Requirement::Level(5),
    },
    Badge {
        id: "level-10",
        name: "Trailblazer",
        description: "Reached level 10",
        icon: "🌟",
        category: BadgeCategory::Milestone,
        rarity: Rarity::Epic,
        requirement: Requirement::Level(10),
    },
    Badge {
        id: "early-bird",
        name: "Early Bird",
        description: "Applied before the early deadline",
        icon: "🐦",
        category: BadgeCategory::Achievement,
        rarity: Rarity::Rare,
        requirement: Requirement::Manual,
    },
    Badge {
        id: "quiz-whiz",
        name: "Quiz Whiz",
        description: "Aced a practice quiz",
        icon: "🧠",
        category: BadgeCategory::Achievement,
        rarity: Rarity::Uncommon,
        requirement: Requirement::Manual,
    },
    Badge {
        id: "helping-hand",
        name: "Helping Hand",
        description: "Answered a question in the community",
        icon: "🤝",
        category: BadgeCategory::Achievement,
        rarity: Rarity::Uncommon,
        requirement: Requirement::Manual,
    },
];

// =============================================================================
// CATALOG
// =============================================================================

/// Registry of badges, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BadgeCatalog {
    version: u32,
    badges: Vec<Badge>,
}

impl Default for BadgeCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl BadgeCatalog {
    /// The built-in catalog.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            version: CATALOG_VERSION,
            badges: STANDARD_BADGES.to_vec(),
        }
    }

    /// A custom catalog. Later duplicates of an id are dropped.
    #[must_use]
    pub fn new(version: u32, badges: Vec<Badge>) -> Self {
        let mut unique: Vec<Badge> = Vec::with_capacity(badges.len());
        for badge in badges {
            if !unique.iter().any(|b| b.id == badge.id) {
                unique.push(badge);
            }
        }
        Self {
            version,
            badges: unique,
        }
    }

    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Look up a badge by id.
    #[must_use]
    pub fn get(&self, id: &BadgeId) -> Option<&Badge> {
        self.badges.iter().find(|b| b.id == id.as_str())
    }

    #[must_use]
    pub fn contains(&self, id: &BadgeId) -> bool {
        self.get(id).is_some()
    }

    /// Iterate badges in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &Badge> {
        self.badges.iter()
    }

    /// Badges evaluated by the given trigger family, in catalog order.
    pub fn for_trigger(&self, trigger: Trigger) -> impl Iterator<Item = &Badge> {
        self.badges
            .iter()
            .filter(move |b| b.requirement.trigger() == Some(trigger))
    }

    /// Level-milestone badges as `(badge, level)` pairs, in catalog order.
    pub fn level_milestones(&self) -> impl Iterator<Item = (&Badge, u32)> {
        self.badges.iter().filter_map(|b| match b.requirement {
            Requirement::Level(level) => Some((b, level)),
            _ => None,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.badges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.badges.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn standard_catalog_has_unique_ids() {
        let catalog = BadgeCatalog::standard();
        let ids: BTreeSet<_> = catalog.iter().map(|b| b.id).collect();
        assert!(catalog.len() >= 12);
        assert_eq!(ids.len(), catalog.len());
    }

    #[test]
    fn lookup_known_and_unknown() {
        let catalog = BadgeCatalog::standard();
        assert_eq!(
            catalog.get(&BadgeId::new("five-saves")).map(|b| b.name),
            Some("Collector")
        );
        assert!(!catalog.contains(&BadgeId::new("from-the-future")));
    }

    #[test]
    fn save_trigger_covers_both_save_badges() {
        let catalog = BadgeCatalog::standard();
        let ids: Vec<_> = catalog.for_trigger(Trigger::Save).map(|b| b.id).collect();
        assert_eq!(ids, vec!["first-save", "five-saves"]);
    }

    #[test]
    fn level_milestones_are_deferred_only() {
        let catalog = BadgeCatalog::standard();
        let levels: Vec<_> = catalog
            .level_milestones()
            .map(|(b, level)| (b.id, level))
            .collect();
        assert_eq!(levels, vec![("level-5", 5), ("level-10", 10)]);
        assert_eq!(Requirement::Level(5).trigger(), None);
        assert_eq!(Requirement::Manual.trigger(), None);
    }

    #[test]
    fn custom_catalog_drops_duplicate_ids() {
        let badge = STANDARD_BADGES[0].clone();
        let catalog = BadgeCatalog::new(7, vec![badge.clone(), badge]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.version(), 7);
    }
}
