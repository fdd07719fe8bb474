//! # Engine Constants
//!
//! Hardcoded reward amounts, thresholds and format constants.
//!
//! These are compiled into the binary and are immutable at runtime. The only
//! tunables (deferred unlock delay, calendar offset) are passed to the
//! service at construction.

// =============================================================================
// LEVEL CURVE
// =============================================================================

/// XP cost of clearing level 1. Every later level costs 1.5x the previous.
pub const BASE_LEVEL_XP: u64 = 100;

/// Fractional bits the level curve may carry before it saturates.
///
/// Level costs pass `u64::MAX` long before this many halvings, so no
/// reachable XP total is affected by saturation.
pub const LEVEL_CURVE_MAX_FRACTION_BITS: u32 = 120;

// =============================================================================
// XP REWARDS
// =============================================================================

/// Granted once, when onboarding completes.
pub const XP_ONBOARDING: u64 = 25;

/// Granted once, when the profile is first set.
pub const XP_PROFILE_COMPLETE: u64 = 50;

/// Granted on every new saved opportunity.
pub const XP_SAVE: u64 = 5;

/// Granted on every new applied opportunity.
pub const XP_APPLY: u64 = 25;

/// Granted on every new completed opportunity.
pub const XP_COMPLETE: u64 = 100;

/// XP per streak day granted by a check-in.
pub const XP_PER_STREAK_DAY: u64 = 10;

/// Streak length after which the check-in bonus stops growing.
///
/// Past a week every check-in grants a flat `XP_PER_STREAK_DAY * STREAK_BONUS_CAP`.
pub const STREAK_BONUS_CAP: u32 = 7;

// =============================================================================
// DEFERRED UNLOCKS
// =============================================================================

/// Default delay before a level-milestone badge is unlocked, in milliseconds.
///
/// Keeps the achievement toast from landing on top of the level-up modal.
pub const DEFAULT_DEFERRED_UNLOCK_DELAY_MS: u64 = 1500;

// =============================================================================
// PERSISTENCE FORMAT
// =============================================================================

/// Magic bytes for the Stride binary snapshot header.
///
/// - Header = Magic Bytes ("STRD") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"STRD";

/// Current binary snapshot format version.
///
/// Increment this when making breaking changes to the snapshot layout.
pub const FORMAT_VERSION: u8 = 1;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for opportunity ids.
pub const MAX_OPPORTUNITY_ID_LENGTH: usize = 256;

/// Maximum length for profile ids.
pub const MAX_PROFILE_ID_LENGTH: usize = 128;

/// Number of badges listed in a summary's `recent_badges`.
pub const RECENT_BADGE_COUNT: usize = 3;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streak_bonus_flattens_at_seventy() {
        assert_eq!(XP_PER_STREAK_DAY * u64::from(STREAK_BONUS_CAP), 70);
    }

    #[test]
    fn magic_bytes_correct() {
        assert_eq!(MAGIC_BYTES, b"STRD");
    }
}
