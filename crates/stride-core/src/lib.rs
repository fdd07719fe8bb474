//! # stride-core
//!
//! The deterministic progression engine for Stride.
//!
//! This crate turns learner actions (onboarding, saving, applying, completing
//! opportunities, daily check-ins) into XP, levels, streaks and badges, and
//! decides when the presentation layer should celebrate.
//!
//! ## Architectural Constraints
//!
//! - One [`ProgressionService`] owns one profile's state; every command is
//!   `&mut self` and atomic
//! - `level` is always re-derived from `xp`, never stored independently
//! - Integer arithmetic only: the level curve is exact, not floating point
//! - Time comes from an injected [`Clock`]; deferred unlocks fire only when
//!   the host calls `fire` or `tick`
//! - NO async, NO network dependencies

// =============================================================================
// MODULES
// =============================================================================

pub mod achievement;
pub mod catalog;
pub mod clock;
pub mod formats;
pub mod level;
pub mod primitives;
pub mod scheduler;
pub mod service;
pub mod state;
pub mod storage;
pub mod streak;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    BadgeCategory, BadgeId, InteractionSets, LatestAchievement, OpportunityId,
    PresentationFlags, Profile, ProfileId, Rarity, Streak, StrideError, UnlockedBadge,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use achievement::{AchievementEngine, BadgeProgress, ProgressStatus};
pub use catalog::{Badge, BadgeCatalog, CATALOG_VERSION, Requirement, Trigger};
pub use clock::{Clock, ManualClock, SystemClock};
pub use level::{LevelCurve, LevelInfo};
pub use scheduler::{ManualTimer, NotificationScheduler, PendingUnlock, TaskId, TimerHook};
pub use service::{
    CommandReport, ProgressionService, ProgressionSummary, ProgressionView, ServiceOptions,
    XpGrant, XpSource,
};
pub use state::{ProgressionSnapshot, ProgressionState};
pub use streak::{CheckInOutcome, StreakTracker};

// =============================================================================
// RE-EXPORTS: Formats and Storage
// =============================================================================

pub use formats::{
    PersistenceHeader, snapshot_from_bytes, snapshot_from_json, snapshot_from_json_lossy,
    snapshot_to_bytes, snapshot_to_json,
};
pub use storage::{FileStore, MemoryStore, RedbStore, SnapshotStore};
