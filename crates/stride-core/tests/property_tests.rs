//! # Property-Based Tests
//!
//! Invariants of the progression engine, checked with proptest.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::collection::vec;
use proptest::prelude::*;
use stride_core::{
    BadgeId, LevelCurve, ManualClock, ProfileId, ProgressionService, StreakTracker,
};
use std::sync::Arc;

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
        .single()
        .expect("valid instant")
}

fn service() -> ProgressionService {
    ProgressionService::new(ProfileId::new("prop").expect("id"))
        .with_clock(Arc::new(ManualClock::new(epoch())))
}

// =============================================================================
// LEVEL CURVE
// =============================================================================

proptest! {
    /// Every XP total falls in exactly one level band.
    #[test]
    fn level_is_unique_band(xp in any::<u64>()) {
        let level = LevelCurve::resolve(xp).level;
        let xp = u128::from(xp);

        prop_assert!(LevelCurve::threshold(level) <= xp);
        prop_assert!(xp < LevelCurve::threshold(level + 1));
    }

    /// Small totals, where most real profiles live.
    #[test]
    fn level_band_small_totals(xp in 0u64..100_000) {
        let info = LevelCurve::resolve(xp);
        prop_assert_eq!(
            LevelCurve::threshold(info.level) + u128::from(info.xp_in_current_level),
            u128::from(xp)
        );
        prop_assert!(info.xp_in_current_level < info.xp_to_next_level);
    }

    /// More XP never means a lower level.
    #[test]
    fn level_is_monotonic(a in any::<u64>(), b in any::<u64>()) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(LevelCurve::resolve(lo).level <= LevelCurve::resolve(hi).level);
    }
}

// =============================================================================
// ADD XP
// =============================================================================

proptest! {
    /// Two grants land on the same (xp, level) as their sum.
    #[test]
    fn add_xp_is_additive(a in 0u64..1_000_000_000, b in 0u64..1_000_000_000) {
        let mut split = service();
        split.add_xp(a);
        split.add_xp(b);

        let mut joined = service();
        joined.add_xp(a + b);

        prop_assert_eq!(split.state().xp(), joined.state().xp());
        prop_assert_eq!(split.state().level(), joined.state().level());
        prop_assert_eq!(split.state().xp_to_next_level(), joined.state().xp_to_next_level());
    }

    /// XP never decreases and level always matches it.
    #[test]
    fn xp_monotonic_level_derived(grants in vec(0u64..5_000, 1..40)) {
        let mut svc = service();
        let mut previous = 0;
        for amount in grants {
            svc.add_xp(amount);
            prop_assert!(svc.state().xp() >= previous);
            prop_assert_eq!(svc.state().level(), LevelCurve::resolve(svc.state().xp()).level);
            previous = svc.state().xp();
        }
    }
}

// =============================================================================
// STREAKS
// =============================================================================

proptest! {
    /// A second check-in on the same calendar day changes nothing.
    #[test]
    fn same_day_check_in_is_idempotent(
        day in 0i64..365,
        first_minute in 0i64..1440,
        second_minute in 0i64..1440,
    ) {
        let midnight = epoch() + Duration::days(day);
        let mut svc = service();
        svc.check_in(midnight + Duration::minutes(first_minute));
        let before = svc.state().clone();

        let report = svc.check_in(midnight + Duration::minutes(second_minute));

        prop_assert!(!report.changed);
        prop_assert_eq!(svc.state(), &before);
    }

    /// `longest` never decreases and always bounds `current`.
    #[test]
    fn longest_is_monotonic(gaps in vec(0i64..96, 1..60)) {
        let tracker = StreakTracker::utc();
        let mut streak = stride_core::Streak::default();
        let mut now = epoch();
        let mut longest = 0;

        for gap in gaps {
            now += Duration::hours(gap);
            tracker.check_in(&mut streak, now);
            prop_assert!(streak.longest >= longest);
            prop_assert!(streak.current <= streak.longest);
            longest = streak.longest;
        }
    }
}

// =============================================================================
// BADGES
// =============================================================================

proptest! {
    /// Repeated unlocks of one badge record a single entry.
    #[test]
    fn unlock_is_at_most_once(
        repeats in 1usize..20,
        badge in prop::sample::select(vec!["early-bird", "quiz-whiz", "streak-30", "level-10"]),
    ) {
        let mut svc = service();
        let id = BadgeId::new(badge);
        for _ in 0..repeats {
            svc.unlock_badge(&id);
        }

        let count = svc
            .state()
            .unlocked_badges()
            .iter()
            .filter(|b| b.id == id)
            .count();
        prop_assert_eq!(count, 1);
    }
}
