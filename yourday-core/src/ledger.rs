//! Player garden ledger: currency, inventory, placed plants, plots, and XP.
//!
//! [`PlayerStats`] is the single per-identity aggregate. Every operation either
//! applies completely or returns an error and leaves the ledger untouched.
//! `garden_value` is derived state: it is recomputed from `placed_plants`
//! after every change to them, never patched incrementally.
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::catalog::{PlantAssets, PlantCatalog, Rarity, Theme};
use crate::clock::Today;
use crate::config::EconomyConfig;
use crate::constants::{
    FERTILIZER_CONVERSION_RATIO, GARDEN_VALUE_BASELINE, GUARANTEE_BATCH_SIZE, PLOT_COST_PER_LEVEL,
    SALE_MULTIPLIER, SEASONAL_BONUS_MULTIPLIER,
};
use crate::error::LedgerError;
use crate::gacha::{self, DrawSource};
use crate::leveling::{self, LevelProgress};
use crate::numbers::{floor_f64_to_u64, round_f64_to_u64};

/// Generated identity of a placed plant, unique within one ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlantId(pub u64);

impl fmt::Display for PlantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: i32,
    pub y: i32,
}

impl GridPosition {
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A blueprint instantiated at a garden position with a growth countdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedPlant {
    pub id: PlantId,
    pub blueprint_id: String,
    pub name: String,
    pub position: GridPosition,
    pub planted_date: DateTime<Utc>,
    pub days_left_till_fully_grown: u32,
    #[serde(default)]
    pub last_watered_on_day: Option<DateTime<Utc>>,
    pub rarity: Rarity,
    pub theme: Theme,
    pub base_value: u32,
    pub initial_days_to_grow: u32,
    #[serde(default)]
    pub assets: PlantAssets,
}

impl PlacedPlant {
    #[must_use]
    pub const fn is_fully_grown(&self) -> bool {
        self.days_left_till_fully_grown == 0
    }

    /// The seasonal bonus applies to grown plants whose theme matches the season.
    #[must_use]
    pub fn seasonal_bonus_active(&self, season: Theme) -> bool {
        self.is_fully_grown() && self.theme == season
    }

    /// Contribution to garden value. Growing plants count at base value; grown
    /// in-season plants get the seasonal multiplier.
    ///
    /// This is independent of the sale price, which is always
    /// `base_value * 1.5` regardless of season.
    #[must_use]
    pub fn dynamic_value(&self, season: Theme) -> u64 {
        let base = u64::from(self.base_value);
        if !self.is_fully_grown() {
            return base;
        }
        let multiplier = if self.seasonal_bonus_active(season) {
            SEASONAL_BONUS_MULTIPLIER
        } else {
            1.0
        };
        round_f64_to_u64(f64::from(self.base_value) * multiplier)
    }

    /// Points awarded for selling this plant once grown.
    #[must_use]
    pub fn sale_price(&self) -> u64 {
        floor_f64_to_u64(f64::from(self.base_value) * SALE_MULTIPLIER)
    }
}

/// Garden value for a set of plants in a given season.
#[must_use]
pub fn garden_value_of(plants: &[PlacedPlant], season: Theme) -> u64 {
    plants.iter().fold(GARDEN_VALUE_BASELINE, |total, plant| {
        total.saturating_add(plant.dynamic_value(season))
    })
}

/// Outcome of watering; watering never fails, it just may not do anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaterOutcome {
    Watered { days_left: u32 },
    AlreadyWateredToday,
    AlreadyGrown,
    PlantNotFound,
}

impl WaterOutcome {
    #[must_use]
    pub const fn changed(self) -> bool {
        matches!(self, Self::Watered { .. })
    }
}

/// One plant handed out by a pull, as recorded on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PulledPlant {
    pub blueprint_id: String,
    pub rarity: Rarity,
    /// Whether the catalog fallback had to substitute the rolled rarity.
    pub fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullReceipt {
    pub theme: Theme,
    pub cost: u64,
    pub plants: Vec<PulledPlant>,
}

/// The per-identity economy aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    /// Spendable currency.
    pub total_points: u64,
    /// Day whose task completions were last converted to points.
    #[serde(default)]
    pub last_evaluated: Option<DateTime<Utc>>,
    pub player_level: u32,
    pub current_xp: u64,
    /// Derived; see [`PlayerStats::update_garden_value`].
    pub garden_value: u64,
    /// Blueprint id to count; keys are removed when they reach zero.
    #[serde(default)]
    pub unplaced_plants_inventory: BTreeMap<String, u32>,
    #[serde(default)]
    pub placed_plants: Vec<PlacedPlant>,
    pub number_of_owned_plots: u32,
    #[serde(default)]
    pub fertilizer_count: u32,
    #[serde(default)]
    pub next_plant_id: u64,
}

impl Default for PlayerStats {
    fn default() -> Self {
        Self::new(&EconomyConfig::default())
    }
}

impl PlayerStats {
    /// Fresh ledger for a first-time player.
    #[must_use]
    pub fn new(config: &EconomyConfig) -> Self {
        Self {
            total_points: config.starting_points,
            last_evaluated: None,
            player_level: 1,
            current_xp: 0,
            garden_value: GARDEN_VALUE_BASELINE,
            unplaced_plants_inventory: BTreeMap::new(),
            placed_plants: Vec::new(),
            number_of_owned_plots: config.starting_plots,
            fertilizer_count: config.starting_fertilizer,
            next_plant_id: 0,
        }
    }

    #[must_use]
    pub fn plant(&self, id: PlantId) -> Option<&PlacedPlant> {
        self.placed_plants.iter().find(|plant| plant.id == id)
    }

    #[must_use]
    pub fn plant_at(&self, position: GridPosition) -> Option<&PlacedPlant> {
        self.placed_plants
            .iter()
            .find(|plant| plant.position == position)
    }

    fn plant_index(&self, id: PlantId) -> Option<usize> {
        self.placed_plants.iter().position(|plant| plant.id == id)
    }

    #[must_use]
    pub fn inventory_count(&self, blueprint_id: &str) -> u32 {
        self.unplaced_plants_inventory
            .get(blueprint_id)
            .copied()
            .unwrap_or(0)
    }

    /// Total unplaced plants across all blueprints.
    #[must_use]
    pub fn inventory_size(&self) -> u64 {
        self.unplaced_plants_inventory
            .values()
            .map(|count| u64::from(*count))
            .sum()
    }

    pub fn add_to_inventory(&mut self, blueprint_id: &str, count: u32) {
        if count == 0 {
            return;
        }
        let entry = self
            .unplaced_plants_inventory
            .entry(blueprint_id.to_string())
            .or_insert(0);
        *entry = entry.saturating_add(count);
    }

    fn remove_from_inventory(&mut self, blueprint_id: &str, count: u32) {
        if let Some(entry) = self.unplaced_plants_inventory.get_mut(blueprint_id) {
            *entry = entry.saturating_sub(count);
            if *entry == 0 {
                self.unplaced_plants_inventory.remove(blueprint_id);
            }
        }
    }

    /// Recompute `garden_value` from the placed plants for today's season.
    pub fn update_garden_value(&mut self, today: Today) -> u64 {
        self.garden_value = garden_value_of(&self.placed_plants, today.season());
        self.garden_value
    }

    pub fn award_points(&mut self, points: u64) {
        self.total_points = self.total_points.saturating_add(points);
    }

    fn ensure_points(&self, required: u64) -> Result<(), LedgerError> {
        if self.total_points < required {
            return Err(LedgerError::InsufficientPoints {
                required,
                available: self.total_points,
            });
        }
        Ok(())
    }

    /// Take one growth day off a plant, at most once per calendar day.
    pub fn water_plant(&mut self, id: PlantId, today: Today) -> WaterOutcome {
        let Some(index) = self.plant_index(id) else {
            return WaterOutcome::PlantNotFound;
        };
        let plant = &mut self.placed_plants[index];
        if plant.is_fully_grown() {
            return WaterOutcome::AlreadyGrown;
        }
        if plant
            .last_watered_on_day
            .is_some_and(|watered| today.is_same_day(watered))
        {
            log::debug!("plant {id} already watered today");
            return WaterOutcome::AlreadyWateredToday;
        }
        plant.days_left_till_fully_grown = plant.days_left_till_fully_grown.saturating_sub(1);
        plant.last_watered_on_day = Some(today.now);
        let days_left = plant.days_left_till_fully_grown;
        self.update_garden_value(today);
        WaterOutcome::Watered { days_left }
    }

    /// Spend one fertilizer to grow a plant instantly.
    ///
    /// # Errors
    ///
    /// `NoFertilizer`, `PlantNotFound`, or `AlreadyGrown`.
    pub fn use_fertilizer(&mut self, id: PlantId, today: Today) -> Result<(), LedgerError> {
        if self.fertilizer_count == 0 {
            return Err(LedgerError::NoFertilizer);
        }
        let index = self.plant_index(id).ok_or(LedgerError::PlantNotFound(id))?;
        let plant = &mut self.placed_plants[index];
        if plant.is_fully_grown() {
            return Err(LedgerError::AlreadyGrown(id));
        }
        plant.days_left_till_fully_grown = 0;
        self.fertilizer_count -= 1;
        self.update_garden_value(today);
        Ok(())
    }

    /// Sell a grown plant for `base_value * 1.5` points.
    ///
    /// # Errors
    ///
    /// `PlantNotFound` or `NotFullyGrown`.
    pub fn sell_plant(&mut self, id: PlantId, today: Today) -> Result<u64, LedgerError> {
        let index = self.plant_index(id).ok_or(LedgerError::PlantNotFound(id))?;
        if !self.placed_plants[index].is_fully_grown() {
            return Err(LedgerError::NotFullyGrown(id));
        }
        let plant = self.placed_plants.remove(index);
        let price = plant.sale_price();
        self.award_points(price);
        self.update_garden_value(today);
        log::info!("sold {} {id} for {price} points", plant.name);
        Ok(price)
    }

    /// Move one plant from inventory onto an empty position.
    ///
    /// # Errors
    ///
    /// `InsufficientInventory`, `PositionOccupied`, `PlotCapReached`, or
    /// `UnknownBlueprint`.
    pub fn plant_from_inventory(
        &mut self,
        catalog: &PlantCatalog,
        blueprint_id: &str,
        position: GridPosition,
        today: Today,
    ) -> Result<PlantId, LedgerError> {
        let available = self.inventory_count(blueprint_id);
        if available == 0 {
            return Err(LedgerError::InsufficientInventory {
                blueprint_id: blueprint_id.to_string(),
                required: 1,
                available,
            });
        }
        if self.plant_at(position).is_some() {
            return Err(LedgerError::PositionOccupied(position));
        }
        let placed = u32::try_from(self.placed_plants.len()).unwrap_or(u32::MAX);
        if placed >= self.number_of_owned_plots {
            return Err(LedgerError::PlotCapReached {
                owned: self.number_of_owned_plots,
            });
        }
        let blueprint = catalog
            .blueprint(blueprint_id)
            .ok_or_else(|| LedgerError::UnknownBlueprint(blueprint_id.to_string()))?;

        let id = PlantId(self.next_plant_id);
        self.next_plant_id = self.next_plant_id.saturating_add(1);
        self.placed_plants.push(PlacedPlant {
            id,
            blueprint_id: blueprint.id.clone(),
            name: blueprint.name.clone(),
            position,
            planted_date: today.now,
            days_left_till_fully_grown: blueprint.initial_days_to_grow,
            last_watered_on_day: None,
            rarity: blueprint.rarity,
            theme: blueprint.theme,
            base_value: blueprint.base_value,
            initial_days_to_grow: blueprint.initial_days_to_grow,
            assets: blueprint.assets.clone(),
        });
        self.remove_from_inventory(blueprint_id, 1);
        self.update_garden_value(today);
        Ok(id)
    }

    /// Spend `total_cost` points on `number_of_pulls` gacha draws of `theme`.
    /// A batch of exactly ten gets a rare-or-better final slot.
    ///
    /// # Errors
    ///
    /// `InvalidQuantity` for zero pulls, `InsufficientPoints`, or
    /// `EmptyCatalogForTheme` when the theme has no plants.
    pub fn pull_plants<R>(
        &mut self,
        catalog: &PlantCatalog,
        theme: Theme,
        number_of_pulls: u32,
        total_cost: u64,
        rng: &mut R,
    ) -> Result<PullReceipt, LedgerError>
    where
        R: Rng + ?Sized,
    {
        if number_of_pulls == 0 {
            return Err(LedgerError::InvalidQuantity {
                quantity: 0,
                reason: "at least one pull is required",
            });
        }
        self.ensure_points(total_cost)?;
        if !catalog.has_theme(theme) {
            log::warn!("catalog gap: pull requested for {theme} but the theme has no plants");
            return Err(LedgerError::EmptyCatalogForTheme(theme));
        }

        let batch = gacha::pull(
            catalog,
            theme,
            number_of_pulls,
            number_of_pulls == GUARANTEE_BATCH_SIZE,
            rng,
        );
        self.total_points -= total_cost;
        let mut plants = Vec::with_capacity(batch.len());
        for draw in &batch {
            self.add_to_inventory(&draw.blueprint.id, 1);
            plants.push(PulledPlant {
                blueprint_id: draw.blueprint.id.clone(),
                rarity: draw.blueprint.rarity,
                fallback: draw.source != DrawSource::Rolled,
            });
        }
        log::info!(
            "pulled {} {theme} plants for {total_cost} points",
            plants.len()
        );
        Ok(PullReceipt {
            theme,
            cost: total_cost,
            plants,
        })
    }

    /// Turn unplaced plants into fertilizer at ten plants per unit.
    ///
    /// # Errors
    ///
    /// `InvalidQuantity` unless `quantity` is a positive multiple of ten, or
    /// `InsufficientInventory`.
    pub fn convert_to_fertilizer(
        &mut self,
        blueprint_id: &str,
        quantity: u32,
    ) -> Result<u32, LedgerError> {
        if quantity == 0 {
            return Err(LedgerError::InvalidQuantity {
                quantity,
                reason: "quantity must be positive",
            });
        }
        if quantity % FERTILIZER_CONVERSION_RATIO != 0 {
            return Err(LedgerError::InvalidQuantity {
                quantity,
                reason: "quantity must be a multiple of 10",
            });
        }
        let available = self.inventory_count(blueprint_id);
        if available < quantity {
            return Err(LedgerError::InsufficientInventory {
                blueprint_id: blueprint_id.to_string(),
                required: quantity,
                available,
            });
        }
        let produced = quantity / FERTILIZER_CONVERSION_RATIO;
        self.remove_from_inventory(blueprint_id, quantity);
        self.fertilizer_count = self.fertilizer_count.saturating_add(produced);
        Ok(produced)
    }

    #[must_use]
    pub fn cost_to_buy_next_plot(&self) -> u64 {
        PLOT_COST_PER_LEVEL.saturating_mul(u64::from(self.player_level))
    }

    #[must_use]
    pub const fn max_plots_for_current_level(&self) -> u32 {
        leveling::max_plots_for_level(self.player_level)
    }

    /// Buy one more plot, returning the price paid.
    ///
    /// # Errors
    ///
    /// `PlotCapReached` at the level's plot limit, or `InsufficientPoints`.
    pub fn buy_next_plot(&mut self) -> Result<u64, LedgerError> {
        if self.number_of_owned_plots >= self.max_plots_for_current_level() {
            return Err(LedgerError::PlotCapReached {
                owned: self.number_of_owned_plots,
            });
        }
        let cost = self.cost_to_buy_next_plot();
        self.ensure_points(cost)?;
        self.total_points -= cost;
        self.number_of_owned_plots += 1;
        log::info!(
            "bought plot {} for {cost} points",
            self.number_of_owned_plots
        );
        Ok(cost)
    }

    #[must_use]
    pub fn xp_required_for_next_level(&self) -> u64 {
        leveling::xp_required_for_next_level(self.player_level)
    }

    pub fn add_xp(&mut self, points: u64) -> LevelProgress {
        let progress = leveling::apply_xp(self.player_level, self.current_xp, points);
        self.player_level = progress.level;
        self.current_xp = progress.current_xp;
        if progress.leveled_up {
            log::info!("reached level {}", progress.level);
        }
        progress
    }
}
