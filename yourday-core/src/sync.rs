//! Remote mirror of ledgers and the leaderboard.
//!
//! The remote store speaks in camelCase documents with integer fields and
//! epoch-second timestamps. Documents are mapped to and from the domain types
//! explicitly, and anything that does not fit (negative counts, unknown
//! rarities, overlapping positions) is rejected as malformed rather than
//! patched up.
//!
//! Local state is authoritative. A session captures an [`EpochToken`] when it
//! opens; any async completion re-checks the token before its result is used,
//! so results that arrive after a sign-out or identity switch are dropped.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::catalog::{PlantAssets, Rarity, Theme};
use crate::error::SyncError;
use crate::identity::Identity;
use crate::leaderboard::{LeaderboardEntry, LeaderboardField, rank_entries_by};
use crate::ledger::{GridPosition, PlacedPlant, PlantId, PlayerStats};

#[async_trait]
pub trait RemoteSync: Send + Sync {
    async fn push_ledger(
        &self,
        identity: &Identity,
        document: &LedgerDocument,
    ) -> Result<(), SyncError>;

    async fn pull_ledger(&self, identity: &Identity) -> Result<Option<LedgerDocument>, SyncError>;

    async fn upsert_leaderboard_entry(&self, entry: &LeaderboardDocument) -> Result<(), SyncError>;

    /// Top `limit` entries ordered by `field` descending, with ranks filled in.
    async fn query_leaderboard(
        &self,
        field: LeaderboardField,
        limit: usize,
    ) -> Result<Vec<LeaderboardDocument>, SyncError>;
}

// Documents ---------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedPlantDocument {
    pub id: i64,
    pub blueprint_id: String,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub planted_date: i64,
    pub days_left_till_fully_grown: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_watered_on_day: Option<i64>,
    pub rarity: String,
    pub theme: String,
    pub base_value: i64,
    pub initial_days_to_grow: i64,
    #[serde(default)]
    pub icon_asset: String,
    #[serde(default)]
    pub growth_stage_assets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerDocument {
    pub total_points: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_evaluated: Option<i64>,
    pub player_level: i64,
    #[serde(rename = "currentXP")]
    pub current_xp: i64,
    pub garden_value: i64,
    #[serde(default)]
    pub unplaced_plants_inventory: BTreeMap<String, i64>,
    #[serde(default)]
    pub placed_plants: Vec<PlacedPlantDocument>,
    pub number_of_owned_plots: i64,
    #[serde(default)]
    pub fertilizer_count: i64,
    #[serde(default)]
    pub next_plant_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardDocument {
    pub user_id: String,
    pub display_name: String,
    pub player_level: i64,
    pub garden_value: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<i64>,
}

fn wire_int<T>(value: T) -> i64
where
    i64: TryFrom<T>,
{
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn field<T>(name: &str, value: i64) -> Result<T, SyncError>
where
    T: TryFrom<i64>,
{
    T::try_from(value)
        .map_err(|_| SyncError::MalformedDocument(format!("{name} out of range: {value}")))
}

fn timestamp(name: &str, seconds: i64) -> Result<DateTime<Utc>, SyncError> {
    DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| SyncError::MalformedDocument(format!("{name} is not a valid time")))
}

fn parse_label<T: FromStr>(name: &str, value: &str) -> Result<T, SyncError> {
    value
        .parse()
        .map_err(|_| SyncError::MalformedDocument(format!("unknown {name} '{value}'")))
}

impl From<&PlacedPlant> for PlacedPlantDocument {
    fn from(plant: &PlacedPlant) -> Self {
        Self {
            id: wire_int(plant.id.0),
            blueprint_id: plant.blueprint_id.clone(),
            name: plant.name.clone(),
            x: plant.position.x,
            y: plant.position.y,
            planted_date: plant.planted_date.timestamp(),
            days_left_till_fully_grown: i64::from(plant.days_left_till_fully_grown),
            last_watered_on_day: plant.last_watered_on_day.map(|at| at.timestamp()),
            rarity: plant.rarity.as_str().to_string(),
            theme: plant.theme.as_str().to_string(),
            base_value: i64::from(plant.base_value),
            initial_days_to_grow: i64::from(plant.initial_days_to_grow),
            icon_asset: plant.assets.icon.clone(),
            growth_stage_assets: plant.assets.growth_stages.clone(),
        }
    }
}

impl TryFrom<PlacedPlantDocument> for PlacedPlant {
    type Error = SyncError;

    fn try_from(doc: PlacedPlantDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: PlantId(field("plant id", doc.id)?),
            position: GridPosition::new(doc.x, doc.y),
            planted_date: timestamp("plantedDate", doc.planted_date)?,
            days_left_till_fully_grown: field(
                "daysLeftTillFullyGrown",
                doc.days_left_till_fully_grown,
            )?,
            last_watered_on_day: doc
                .last_watered_on_day
                .map(|seconds| timestamp("lastWateredOnDay", seconds))
                .transpose()?,
            rarity: parse_label::<Rarity>("rarity", &doc.rarity)?,
            theme: parse_label::<Theme>("theme", &doc.theme)?,
            base_value: field("baseValue", doc.base_value)?,
            initial_days_to_grow: field("initialDaysToGrow", doc.initial_days_to_grow)?,
            assets: PlantAssets {
                icon: doc.icon_asset,
                growth_stages: doc.growth_stage_assets,
            },
            blueprint_id: doc.blueprint_id,
            name: doc.name,
        })
    }
}

impl From<&PlayerStats> for LedgerDocument {
    fn from(stats: &PlayerStats) -> Self {
        Self {
            total_points: wire_int(stats.total_points),
            last_evaluated: stats.last_evaluated.map(|at| at.timestamp()),
            player_level: i64::from(stats.player_level),
            current_xp: wire_int(stats.current_xp),
            garden_value: wire_int(stats.garden_value),
            unplaced_plants_inventory: stats
                .unplaced_plants_inventory
                .iter()
                .map(|(id, count)| (id.clone(), i64::from(*count)))
                .collect(),
            placed_plants: stats
                .placed_plants
                .iter()
                .map(PlacedPlantDocument::from)
                .collect(),
            number_of_owned_plots: i64::from(stats.number_of_owned_plots),
            fertilizer_count: i64::from(stats.fertilizer_count),
            next_plant_id: wire_int(stats.next_plant_id),
        }
    }
}

impl TryFrom<LedgerDocument> for PlayerStats {
    type Error = SyncError;

    fn try_from(doc: LedgerDocument) -> Result<Self, Self::Error> {
        let player_level: u32 = field("playerLevel", doc.player_level)?;
        if player_level == 0 {
            return Err(SyncError::MalformedDocument(
                "playerLevel must be at least 1".to_string(),
            ));
        }

        let mut inventory = BTreeMap::new();
        for (blueprint_id, count) in doc.unplaced_plants_inventory {
            let count: u32 = field("inventory count", count)?;
            if count > 0 {
                inventory.insert(blueprint_id, count);
            }
        }

        let mut positions = HashSet::new();
        let mut ids = HashSet::new();
        let mut placed_plants = Vec::with_capacity(doc.placed_plants.len());
        for plant_doc in doc.placed_plants {
            let plant = PlacedPlant::try_from(plant_doc)?;
            if !positions.insert(plant.position) {
                return Err(SyncError::MalformedDocument(format!(
                    "two plants at ({}, {})",
                    plant.position.x, plant.position.y
                )));
            }
            if !ids.insert(plant.id) {
                return Err(SyncError::MalformedDocument(format!(
                    "duplicate plant id {}",
                    plant.id
                )));
            }
            placed_plants.push(plant);
        }

        // Older documents may lack the counter; never hand out a used id.
        let next_free = placed_plants
            .iter()
            .map(|plant| plant.id.0.saturating_add(1))
            .max()
            .unwrap_or(0);
        let next_plant_id = field::<u64>("nextPlantId", doc.next_plant_id)?.max(next_free);

        Ok(Self {
            total_points: field("totalPoints", doc.total_points)?,
            last_evaluated: doc
                .last_evaluated
                .map(|seconds| timestamp("lastEvaluated", seconds))
                .transpose()?,
            player_level,
            current_xp: field("currentXP", doc.current_xp)?,
            garden_value: field("gardenValue", doc.garden_value)?,
            unplaced_plants_inventory: inventory,
            placed_plants,
            number_of_owned_plots: field("numberOfOwnedPlots", doc.number_of_owned_plots)?,
            fertilizer_count: field("fertilizerCount", doc.fertilizer_count)?,
            next_plant_id,
        })
    }
}

impl From<&LeaderboardEntry> for LeaderboardDocument {
    fn from(entry: &LeaderboardEntry) -> Self {
        Self {
            user_id: entry.identity.as_str().to_string(),
            display_name: entry.display_name.clone(),
            player_level: i64::from(entry.player_level),
            garden_value: wire_int(entry.garden_value),
            rank: entry.rank.map(i64::from),
        }
    }
}

impl TryFrom<LeaderboardDocument> for LeaderboardEntry {
    type Error = SyncError;

    fn try_from(doc: LeaderboardDocument) -> Result<Self, Self::Error> {
        let identity = Identity::new(&doc.user_id);
        if identity.is_empty() {
            return Err(SyncError::MalformedDocument(
                "leaderboard entry without userId".to_string(),
            ));
        }
        Ok(Self {
            identity,
            display_name: doc.display_name,
            player_level: field("playerLevel", doc.player_level)?,
            garden_value: field("gardenValue", doc.garden_value)?,
            rank: doc.rank.map(|rank| field("rank", rank)).transpose()?,
        })
    }
}

// Session epoch ------------------------------------------------------------

/// Shared generation counter; advancing it invalidates every outstanding token.
#[derive(Debug, Clone, Default)]
pub struct SessionEpoch {
    generation: Arc<AtomicU64>,
}

impl SessionEpoch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn current(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Start a new generation and return a token bound to it.
    pub fn advance(&self) -> EpochToken {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        EpochToken {
            epoch: self.clone(),
            generation,
        }
    }

    /// Token for the current generation without advancing it.
    #[must_use]
    pub fn token(&self) -> EpochToken {
        EpochToken {
            epoch: self.clone(),
            generation: self.current(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EpochToken {
    epoch: SessionEpoch,
    generation: u64,
}

impl EpochToken {
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn is_current(&self) -> bool {
        self.epoch.current() == self.generation
    }

    /// # Errors
    ///
    /// Returns `StaleSession` once the epoch has moved past this token.
    pub fn ensure_current(&self) -> Result<(), SyncError> {
        if self.is_current() {
            Ok(())
        } else {
            Err(SyncError::StaleSession)
        }
    }
}

// In-memory remote ---------------------------------------------------------

#[derive(Debug, Default)]
struct RemoteState {
    ledgers: HashMap<String, LedgerDocument>,
    leaderboard: HashMap<String, LeaderboardDocument>,
    offline: bool,
    pushes: u64,
}

/// Remote store held in process memory. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryRemote {
    state: Arc<Mutex<RemoteState>>,
}

impl MemoryRemote {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, RemoteState>, SyncError> {
        self.state
            .lock()
            .map_err(|_| SyncError::Transport("remote state lock poisoned".to_string()))
    }

    fn online(&self) -> Result<MutexGuard<'_, RemoteState>, SyncError> {
        let state = self.lock()?;
        if state.offline {
            return Err(SyncError::Transport("remote store is offline".to_string()));
        }
        Ok(state)
    }

    /// Simulate losing or regaining connectivity.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote lock is poisoned.
    pub fn set_offline(&self, offline: bool) -> Result<(), SyncError> {
        self.lock()?.offline = offline;
        Ok(())
    }

    /// Number of accepted ledger pushes.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote lock is poisoned.
    pub fn push_count(&self) -> Result<u64, SyncError> {
        Ok(self.lock()?.pushes)
    }

    /// Store a document as-is, bypassing validation.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote lock is poisoned.
    pub fn insert_ledger_document(
        &self,
        identity: &Identity,
        document: LedgerDocument,
    ) -> Result<(), SyncError> {
        self.lock()?
            .ledgers
            .insert(identity.as_str().to_string(), document);
        Ok(())
    }
}

#[async_trait]
impl RemoteSync for MemoryRemote {
    async fn push_ledger(
        &self,
        identity: &Identity,
        document: &LedgerDocument,
    ) -> Result<(), SyncError> {
        let mut state = self.online()?;
        state
            .ledgers
            .insert(identity.as_str().to_string(), document.clone());
        state.pushes = state.pushes.saturating_add(1);
        Ok(())
    }

    async fn pull_ledger(&self, identity: &Identity) -> Result<Option<LedgerDocument>, SyncError> {
        Ok(self.online()?.ledgers.get(identity.as_str()).cloned())
    }

    async fn upsert_leaderboard_entry(&self, entry: &LeaderboardDocument) -> Result<(), SyncError> {
        let mut stored = entry.clone();
        stored.rank = None;
        self.online()?
            .leaderboard
            .insert(entry.user_id.clone(), stored);
        Ok(())
    }

    async fn query_leaderboard(
        &self,
        field: LeaderboardField,
        limit: usize,
    ) -> Result<Vec<LeaderboardDocument>, SyncError> {
        let documents: Vec<LeaderboardDocument> =
            self.online()?.leaderboard.values().cloned().collect();
        let mut entries = documents
            .into_iter()
            .map(LeaderboardEntry::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        rank_entries_by(&mut entries, field);
        Ok(entries
            .iter()
            .take(limit)
            .map(LeaderboardDocument::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::builtin;
    use crate::clock::Today;
    use chrono::TimeZone;

    fn grown_garden() -> PlayerStats {
        let today = Today::utc(Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap());
        let mut stats = PlayerStats::default();
        stats.add_to_inventory("holly", 2);
        stats.add_to_inventory("snowdrop", 1);
        let id = stats
            .plant_from_inventory(builtin(), "holly", GridPosition::new(0, 0), today)
            .unwrap();
        stats.water_plant(id, today);
        stats.last_evaluated = Some(today.yesterday());
        stats.total_points = 77;
        stats
    }

    #[test]
    fn ledger_document_uses_camel_case() {
        let doc = LedgerDocument::from(&grown_garden());
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["totalPoints"], 77);
        assert_eq!(json["currentXP"], 0);
        assert_eq!(json["unplacedPlantsInventory"]["holly"], 1);
        assert_eq!(json["placedPlants"][0]["daysLeftTillFullyGrown"], 1);
        assert_eq!(json["placedPlants"][0]["theme"], "winter");
    }

    #[test]
    fn ledger_maps_back_to_the_same_aggregate() {
        let stats = grown_garden();
        let restored = PlayerStats::try_from(LedgerDocument::from(&stats)).unwrap();
        assert_eq!(restored, stats);
    }

    #[test]
    fn malformed_documents_are_rejected() {
        let base = LedgerDocument::from(&grown_garden());

        let mut negative = base.clone();
        negative.total_points = -5;
        assert!(matches!(
            PlayerStats::try_from(negative),
            Err(SyncError::MalformedDocument(_))
        ));

        let mut bad_rarity = base.clone();
        bad_rarity.placed_plants[0].rarity = "mythic".into();
        assert!(matches!(
            PlayerStats::try_from(bad_rarity),
            Err(SyncError::MalformedDocument(msg)) if msg.contains("mythic")
        ));

        let mut overlapping = base.clone();
        let mut twin = overlapping.placed_plants[0].clone();
        twin.id = 9;
        overlapping.placed_plants.push(twin);
        assert!(PlayerStats::try_from(overlapping).is_err());

        let mut level_zero = base;
        level_zero.player_level = 0;
        assert!(PlayerStats::try_from(level_zero).is_err());
    }

    #[test]
    fn missing_id_counter_skips_used_ids() {
        let mut doc = LedgerDocument::from(&grown_garden());
        doc.placed_plants[0].id = 4;
        doc.next_plant_id = 0;
        let stats = PlayerStats::try_from(doc).unwrap();
        assert_eq!(stats.next_plant_id, 5);
    }

    #[test]
    fn epoch_tokens_go_stale_on_advance() {
        let epoch = SessionEpoch::new();
        let first = epoch.advance();
        assert!(first.is_current());
        let second = epoch.advance();
        assert!(!first.is_current());
        assert_eq!(first.ensure_current(), Err(SyncError::StaleSession));
        assert!(second.ensure_current().is_ok());
        assert_eq!(epoch.token().generation(), second.generation());
    }

    #[tokio::test]
    async fn memory_remote_ranks_and_limits() {
        let remote = MemoryRemote::new();
        for (id, value) in [("a", 120), ("b", 400), ("c", 250)] {
            let entry = LeaderboardEntry {
                identity: Identity::new(id),
                display_name: id.to_string(),
                player_level: 1,
                garden_value: value,
                rank: None,
            };
            remote
                .upsert_leaderboard_entry(&LeaderboardDocument::from(&entry))
                .await
                .unwrap();
        }
        let top = remote
            .query_leaderboard(LeaderboardField::GardenValue, 2)
            .await
            .unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].user_id, "b");
        assert_eq!(top[0].rank, Some(1));
        assert_eq!(top[1].user_id, "c");
    }

    #[tokio::test]
    async fn offline_remote_reports_transport_errors() {
        let remote = MemoryRemote::new();
        remote.set_offline(true).unwrap();
        let id = Identity::new("z");
        let doc = LedgerDocument::from(&PlayerStats::default());
        assert!(matches!(
            remote.push_ledger(&id, &doc).await,
            Err(SyncError::Transport(_))
        ));
        remote.set_offline(false).unwrap();
        remote.push_ledger(&id, &doc).await.unwrap();
        assert_eq!(remote.pull_ledger(&id).await.unwrap(), Some(doc));
        assert_eq!(remote.push_count().unwrap(), 1);
    }
}
