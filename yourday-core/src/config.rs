//! Tunable economy configuration.
//!
//! Rules that define the economy live in [`crate::constants`]; this struct
//! carries the values a deployment may reasonably adjust: starting balances,
//! the pull offers sold in the shop, the XP granted for awarded points, and the
//! player's day-boundary offset.
use serde::{Deserialize, Serialize};

use crate::clock::GrowthClock;
use crate::constants::GUARANTEE_BATCH_SIZE;

/// A purchasable batch of gacha pulls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullOffer {
    pub id: String,
    pub label: String,
    pub pulls: u32,
    pub cost: u64,
}

impl PullOffer {
    #[must_use]
    pub fn new(id: &str, label: &str, pulls: u32, cost: u64) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            pulls,
            cost,
        }
    }

    /// Whether the final slot of this offer is guaranteed rare or better.
    #[must_use]
    pub const fn guarantees_rare_last_slot(&self) -> bool {
        self.pulls == GUARANTEE_BATCH_SIZE
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomyConfig {
    #[serde(default)]
    pub starting_points: u64,
    #[serde(default = "EconomyConfig::default_starting_plots")]
    pub starting_plots: u32,
    #[serde(default)]
    pub starting_fertilizer: u32,
    #[serde(default = "EconomyConfig::default_pull_offers")]
    pub pull_offers: Vec<PullOffer>,
    /// XP granted per awarded task point.
    #[serde(default = "EconomyConfig::default_xp_per_point")]
    pub xp_per_point: u64,
    /// Player's offset east of UTC, in seconds.
    #[serde(default)]
    pub utc_offset_seconds: i32,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            starting_points: 0,
            starting_plots: Self::default_starting_plots(),
            starting_fertilizer: 0,
            pull_offers: Self::default_pull_offers(),
            xp_per_point: Self::default_xp_per_point(),
            utc_offset_seconds: 0,
        }
    }
}

impl EconomyConfig {
    #[must_use]
    pub const fn default_starting_plots() -> u32 {
        2
    }

    #[must_use]
    pub const fn default_xp_per_point() -> u64 {
        1
    }

    #[must_use]
    pub fn default_pull_offers() -> Vec<PullOffer> {
        vec![
            PullOffer::new("single", "Single pull", 1, 50),
            PullOffer::new("ten", "Ten pull", GUARANTEE_BATCH_SIZE, 450),
        ]
    }

    /// Get default configuration
    #[must_use]
    pub fn default_config() -> Self {
        Self::default()
    }

    /// Load configuration from JSON; omitted fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn offer(&self, id: &str) -> Option<&PullOffer> {
        self.pull_offers.iter().find(|offer| offer.id == id)
    }

    /// Day-boundary clock for this configuration; out-of-range offsets fall back to UTC.
    #[must_use]
    pub fn growth_clock(&self) -> GrowthClock {
        GrowthClock::with_offset_seconds(self.utc_offset_seconds).unwrap_or_else(|| {
            log::warn!(
                "utc offset {}s out of range, using UTC",
                self.utc_offset_seconds
            );
            GrowthClock::utc()
        })
    }
}
