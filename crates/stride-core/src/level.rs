//! # Level Curve
//!
//! Maps cumulative XP to a level.
//!
//! ## Curve Definition
//!
//! | Level | Cost to clear | Reached at (cumulative XP) |
//! |-------|---------------|----------------------------|
//! | 1 | 100 | 0 |
//! | 2 | 150 | 100 |
//! | 3 | 225 | 250 |
//! | 4 | 337 | 475 |
//! | 5 | 506 | 812 |
//!
//! `cost(n) = floor(100 * 1.5^(n-1))`. The cost is computed exactly with
//! integer arithmetic: `100 * 3^k / 2^k` is carried as an integer part plus a
//! binary fraction, so no float rounding can move a level boundary.

use crate::primitives::{BASE_LEVEL_XP, LEVEL_CURVE_MAX_FRACTION_BITS};
use serde::{Deserialize, Serialize};

// =============================================================================
// LEVEL COSTS
// =============================================================================

/// Successive level costs, starting at level 1.
///
/// Invariant: the exact cost is `whole + fraction / 2^bits` with
/// `fraction < 2^bits`.
#[derive(Debug, Clone)]
struct LevelCosts {
    whole: u128,
    fraction: u128,
    bits: u32,
    saturated: bool,
}

impl LevelCosts {
    fn new() -> Self {
        Self {
            whole: u128::from(BASE_LEVEL_XP),
            fraction: 0,
            bits: 0,
            saturated: false,
        }
    }

    /// The floor of the current cost.
    fn current(&self) -> u128 {
        if self.saturated { u128::MAX } else { self.whole }
    }

    /// Multiply the exact cost by 3/2.
    fn advance(&mut self) {
        if self.saturated {
            return;
        }
        if self.bits >= LEVEL_CURVE_MAX_FRACTION_BITS {
            self.saturated = true;
            return;
        }
        let Some(tripled) = self.whole.checked_mul(3) else {
            self.saturated = true;
            return;
        };

        // 3 * (w + f/2^b) / 2 = (3w >> 1) + ((3w & 1) * 2^b + 3f) / 2^(b+1)
        let odd = tripled & 1;
        let numerator = (odd << self.bits) + self.fraction * 3;
        let next_bits = self.bits + 1;
        let carry = numerator >> next_bits;

        self.whole = (tripled >> 1) + carry;
        self.fraction = numerator & ((1u128 << next_bits) - 1);
        self.bits = next_bits;
    }
}

// =============================================================================
// LEVEL INFO
// =============================================================================

/// Level position derived from a cumulative XP total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelInfo {
    /// Current level, starting at 1.
    pub level: u32,
    /// XP earned inside the current level.
    pub xp_in_current_level: u64,
    /// Full cost of the current level (saturates at `u64::MAX`).
    pub xp_to_next_level: u64,
}

impl Default for LevelInfo {
    fn default() -> Self {
        LevelCurve::resolve(0)
    }
}

// =============================================================================
// LEVEL CURVE
// =============================================================================

/// Pure functions over the level curve.
pub struct LevelCurve;

impl LevelCurve {
    /// XP needed to clear `level` (levels start at 1; level 0 is treated as 1).
    #[must_use]
    pub fn xp_for_level(level: u32) -> u128 {
        let mut costs = LevelCosts::new();
        for _ in 1..level.max(1) {
            costs.advance();
        }
        costs.current()
    }

    /// Resolve a cumulative XP total into its level.
    #[must_use]
    pub fn resolve(total_xp: u64) -> LevelInfo {
        let mut remaining = u128::from(total_xp);
        let mut level: u32 = 1;
        let mut costs = LevelCosts::new();

        while remaining >= costs.current() {
            remaining -= costs.current();
            level = level.saturating_add(1);
            costs.advance();
        }

        LevelInfo {
            level,
            xp_in_current_level: u64::try_from(remaining).unwrap_or(u64::MAX),
            xp_to_next_level: u64::try_from(costs.current()).unwrap_or(u64::MAX),
        }
    }

    /// Cumulative XP at which `level` is reached.
    #[must_use]
    pub fn threshold(level: u32) -> u128 {
        let mut total: u128 = 0;
        let mut costs = LevelCosts::new();
        for _ in 1..level.max(1) {
            total = total.saturating_add(costs.current());
            costs.advance();
        }
        total
    }

    /// Percentage of the current level already cleared (0-100).
    #[must_use]
    pub fn progress_percent(total_xp: u64) -> u8 {
        let info = Self::resolve(total_xp);
        if info.xp_to_next_level == 0 {
            return 100;
        }
        let percent = u128::from(info.xp_in_current_level).saturating_mul(100)
            / u128::from(info.xp_to_next_level);
        percent.min(100) as u8
    }
}

// =============================================================================
// TESTS
// =============================================================================
