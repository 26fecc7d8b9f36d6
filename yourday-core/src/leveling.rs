//! XP curve and level-gated plot capacity.
use serde::{Deserialize, Serialize};

use crate::constants::{
    PLOTS_AT_FIRST_LEVEL, PLOTS_PER_LEVEL, XP_EXPONENTIAL_BASE, XP_EXPONENTIAL_FROM_LEVEL,
    XP_REQUIREMENTS_EARLY,
};
use crate::numbers::round_f64_to_u64;

/// XP needed to advance past `level`.
///
/// Levels 1–4 use a fixed table (100, 300, 400, 500). From level 5 the curve
/// restarts at 300 and doubles every level.
#[must_use]
pub fn xp_required_for_next_level(level: u32) -> u64 {
    let level = level.max(1);
    if level < XP_EXPONENTIAL_FROM_LEVEL {
        let index = usize::try_from(level - 1).unwrap_or(0);
        return XP_REQUIREMENTS_EARLY
            .get(index)
            .copied()
            .unwrap_or(XP_REQUIREMENTS_EARLY[0]);
    }
    let exponent = i32::try_from(level - XP_EXPONENTIAL_FROM_LEVEL).unwrap_or(i32::MAX);
    round_f64_to_u64(XP_EXPONENTIAL_BASE * 2f64.powi(exponent))
}

#[must_use]
pub const fn max_plots_for_level(level: u32) -> u32 {
    if level <= 1 {
        PLOTS_AT_FIRST_LEVEL
    } else {
        level.saturating_mul(PLOTS_PER_LEVEL)
    }
}

/// Result of granting XP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelProgress {
    pub leveled_up: bool,
    pub levels_gained: u32,
    pub level: u32,
    pub current_xp: u64,
}

/// Add `points` XP to a (level, xp) pair and carry over every full level.
/// Zero points leave the pair untouched.
#[must_use]
pub fn apply_xp(level: u32, current_xp: u64, points: u64) -> LevelProgress {
    if points == 0 {
        return LevelProgress {
            leveled_up: false,
            levels_gained: 0,
            level,
            current_xp,
        };
    }
    let mut level = level.max(1);
    let mut xp = current_xp.saturating_add(points);
    let mut levels_gained = 0u32;
    loop {
        let requirement = xp_required_for_next_level(level);
        if xp < requirement {
            break;
        }
        xp -= requirement;
        level = level.saturating_add(1);
        levels_gained = levels_gained.saturating_add(1);
    }
    LevelProgress {
        leveled_up: levels_gained > 0,
        levels_gained,
        level,
        current_xp: xp,
    }
}
