//! # Streak Tracker
//!
//! Calendar-day logic for daily check-ins.
//!
//! A "day" is a calendar date in the tracker's UTC offset. Two check-ins on
//! the same local date are one check-in; the second is a no-op.
//!
//! | Outcome | When | New `current` |
//! |---------|------|---------------|
//! | `NoOp` | last check-in is on today's local date | unchanged |
//! | `Continue` | last check-in present, less than two full days ago | `current + 1` |
//! | `FreshStart` | no prior check-in, or two or more full days elapsed | `1` |

use crate::Streak;
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};

/// Result of applying a check-in to a streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckInOutcome {
    /// Already checked in today; nothing changed.
    NoOp,
    /// Streak extended to the contained length.
    Continue(u32),
    /// Streak (re)started at 1.
    FreshStart,
}

impl CheckInOutcome {
    /// Streak length after the check-in, if the check-in counted.
    #[must_use]
    pub fn new_streak(&self) -> Option<u32> {
        match self {
            CheckInOutcome::NoOp => None,
            CheckInOutcome::Continue(n) => Some(*n),
            CheckInOutcome::FreshStart => Some(1),
        }
    }
}

/// Pure day-boundary functions, parameterised by the local UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakTracker {
    offset: FixedOffset,
}

impl Default for StreakTracker {
    fn default() -> Self {
        Self::utc()
    }
}

impl StreakTracker {
    /// Tracker whose calendar days are UTC days.
    #[must_use]
    pub fn utc() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }

    /// Tracker whose calendar days are local to `offset`.
    #[must_use]
    pub fn with_offset(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Tracker from an offset in minutes east of UTC.
    ///
    /// Offsets outside +/-24h fall back to UTC.
    #[must_use]
    pub fn with_offset_minutes(minutes: i32) -> Self {
        FixedOffset::east_opt(minutes.saturating_mul(60))
            .map(Self::with_offset)
            .unwrap_or_else(Self::utc)
    }

    /// The offset that defines calendar days.
    #[must_use]
    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Local calendar date of an instant.
    #[must_use]
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    /// True if there is no prior check-in or it falls on another local date.
    #[must_use]
    pub fn is_new_day(&self, last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last {
            None => true,
            Some(last) => self.local_date(last) != self.local_date(now),
        }
    }

    /// True if two or more whole days elapsed since the last check-in.
    #[must_use]
    pub fn is_streak_broken(&self, last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last {
            None => false,
            Some(last) => (now - last).num_days() > 1,
        }
    }

    /// Decide what a check-in at `now` does to `streak`.
    #[must_use]
    pub fn classify(&self, streak: &Streak, now: DateTime<Utc>) -> CheckInOutcome {
        if !self.is_new_day(streak.last_check_in, now) {
            return CheckInOutcome::NoOp;
        }
        if streak.last_check_in.is_some() && !self.is_streak_broken(streak.last_check_in, now) {
            CheckInOutcome::Continue(streak.current.saturating_add(1))
        } else {
            CheckInOutcome::FreshStart
        }
    }

    /// Apply a check-in to `streak` in place.
    pub fn check_in(&self, streak: &mut Streak, now: DateTime<Utc>) -> CheckInOutcome {
        let outcome = self.classify(streak, now);
        if let Some(new_streak) = outcome.new_streak() {
            streak.last_check_in = Some(now);
            streak.current = new_streak;
            streak.longest = streak.longest.max(new_streak);
        }
        outcome
    }

    /// A streak is active when the last check-in was today or yesterday.
    #[must_use]
    pub fn is_active(&self, streak: &Streak, now: DateTime<Utc>) -> bool {
        let Some(last) = streak.last_check_in else {
            return false;
        };
        let days = (self.local_date(now) - self.local_date(last)).num_days();
        (0..=1).contains(&days) && streak.current > 0
    }
}

// =============================================================================
// TESTS
// =============================================================================
