//! Publishable ranking projection of a ledger.
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::identity::Identity;
use crate::ledger::PlayerStats;

/// Field a leaderboard query orders by, descending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardField {
    #[default]
    GardenValue,
    PlayerLevel,
}

impl LeaderboardField {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GardenValue => "gardenValue",
            Self::PlayerLevel => "playerLevel",
        }
    }
}

/// One row per identity; upserted on every sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub identity: Identity,
    pub display_name: String,
    pub player_level: u32,
    pub garden_value: u64,
    /// Assigned by the store when ranking; never authoritative.
    #[serde(default)]
    pub rank: Option<u32>,
}

impl LeaderboardEntry {
    #[must_use]
    pub fn value_of(&self, field: LeaderboardField) -> u64 {
        match field {
            LeaderboardField::GardenValue => self.garden_value,
            LeaderboardField::PlayerLevel => u64::from(self.player_level),
        }
    }
}

/// Project a ledger into its leaderboard row.
#[must_use]
pub fn project(identity: &Identity, display_name: &str, stats: &PlayerStats) -> LeaderboardEntry {
    LeaderboardEntry {
        identity: identity.clone(),
        display_name: display_name.to_string(),
        player_level: stats.player_level,
        garden_value: stats.garden_value,
        rank: None,
    }
}

/// Sort by `field` descending, ties by identity, and assign 1-based ranks.
pub fn rank_entries_by(entries: &mut [LeaderboardEntry], field: LeaderboardField) {
    entries.sort_by(|a, b| match b.value_of(field).cmp(&a.value_of(field)) {
        Ordering::Equal => a.identity.cmp(&b.identity),
        other => other,
    });
    for (index, entry) in entries.iter_mut().enumerate() {
        entry.rank = Some(u32::try_from(index + 1).unwrap_or(u32::MAX));
    }
}

pub fn rank_entries(entries: &mut [LeaderboardEntry]) {
    rank_entries_by(entries, LeaderboardField::GardenValue);
}
