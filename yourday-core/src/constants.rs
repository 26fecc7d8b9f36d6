//! Centralized rule constants for the YourDay economy.
//!
//! These values define the deterministic math for gacha pulls, garden value,
//! plot purchases, leveling, and daily scoring. Starting balances and the
//! purchasable pull offers are tunables and live in
//! [`EconomyConfig`](crate::config::EconomyConfig) instead.

// Gacha rarity thresholds (cumulative, on a 0..100 roll) ---------------------
pub const GACHA_ROLL_SPAN: f64 = 100.0;
pub const COMMON_CEILING: f64 = 60.0;
pub const UNCOMMON_CEILING: f64 = 85.0;
pub const RARE_CEILING: f64 = 95.0;
pub const EPIC_CEILING: f64 = 99.0;

// Guaranteed slot thresholds; common and uncommon are skipped entirely.
pub const GUARANTEED_RARE_CEILING: f64 = 60.0;
pub const GUARANTEED_EPIC_CEILING: f64 = 90.0;
/// Only a batch of exactly this many pulls gets the guaranteed final slot.
pub const GUARANTEE_BATCH_SIZE: u32 = 10;

// Garden -----------------------------------------------------------------------
pub const GARDEN_VALUE_BASELINE: u64 = 100;
pub const SEASONAL_BONUS_MULTIPLIER: f64 = 1.5;
pub const SALE_MULTIPLIER: f64 = 1.5;
pub const FERTILIZER_CONVERSION_RATIO: u32 = 10;
pub const PLOT_COST_PER_LEVEL: u64 = 20;

// Leveling ---------------------------------------------------------------------
/// XP requirements for levels 1 through 4.
pub const XP_REQUIREMENTS_EARLY: [u64; 4] = [100, 300, 400, 500];
pub const XP_EXPONENTIAL_BASE: f64 = 300.0;
pub const XP_EXPONENTIAL_FROM_LEVEL: u32 = 5;
pub const PLOTS_AT_FIRST_LEVEL: u32 = 3;
pub const PLOTS_PER_LEVEL: u32 = 3;

// Daily scoring ----------------------------------------------------------------
pub const TASK_SHARE_OF_GARDEN_VALUE: f64 = 0.20;
pub const MIN_EFFECTIVE_GARDEN_VALUE: f64 = 1.0;
