use std::fmt;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use yourday_core::{EconomyConfig, GridPosition, PlantId, PlayerStats, Theme};

/// Largest grid edge the policies will scan for free cells.
const GRID_EDGE: i32 = 8;

/// A single ledger operation requested by a policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GardenAction {
    BuyOffer { offer: String, theme: Theme },
    BuyPlot,
    Convert { blueprint_id: String, quantity: u32 },
    Plant { blueprint_id: String, position: GridPosition },
    Water(PlantId),
    Fertilize(PlantId),
    Sell(PlantId),
}

impl fmt::Display for GardenAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BuyOffer { offer, theme } => write!(f, "buy {offer} ({theme})"),
            Self::BuyPlot => f.write_str("buy plot"),
            Self::Convert {
                blueprint_id,
                quantity,
            } => write!(f, "convert {quantity}x {blueprint_id}"),
            Self::Plant {
                blueprint_id,
                position,
            } => write!(f, "plant {blueprint_id} at ({}, {})", position.x, position.y),
            Self::Water(id) => write!(f, "water {id}"),
            Self::Fertilize(id) => write!(f, "fertilize {id}"),
            Self::Sell(id) => write!(f, "sell {id}"),
        }
    }
}

/// Policy interface for automated players.
///
/// A day runs in two phases: purchases against the morning ledger, then
/// tending against the ledger after purchases landed.
pub trait GardenPolicy {
    fn name(&self) -> &'static str;

    fn plan_purchases(
        &mut self,
        stats: &PlayerStats,
        season: Theme,
        config: &EconomyConfig,
    ) -> Vec<GardenAction>;

    fn plan_tending(&mut self, stats: &PlayerStats) -> Vec<GardenAction>;
}

/// Built-in spending strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpendingStrategy {
    /// Hoards points; pulls only with a large buffer.
    Saver,
    /// Steady single pulls in season, replants and sells.
    Gardener,
    /// Ten-pulls across random themes, burns duplicates into fertilizer.
    Whale,
}

impl SpendingStrategy {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Saver => "Saver",
            Self::Gardener => "Gardener",
            Self::Whale => "Whale",
        }
    }

    #[must_use]
    pub fn create_policy(self, seed: u64) -> Box<dyn GardenPolicy + Send> {
        match self {
            Self::Saver => Box::new(SaverPolicy),
            Self::Gardener => Box::new(GardenerPolicy),
            Self::Whale => Box::new(WhalePolicy::new(seed)),
        }
    }
}

impl fmt::Display for SpendingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

struct SaverPolicy;
struct GardenerPolicy;

struct WhalePolicy {
    rng: ChaCha20Rng,
}

impl WhalePolicy {
    fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }
}

fn offer_cost(config: &EconomyConfig, id: &str) -> Option<u64> {
    config.offer(id).map(|offer| offer.cost)
}

fn free_positions(stats: &PlayerStats) -> impl Iterator<Item = GridPosition> + '_ {
    (0..GRID_EDGE)
        .flat_map(|y| (0..GRID_EDGE).map(move |x| GridPosition::new(x, y)))
        .filter(|pos| stats.plant_at(*pos).is_none())
}

fn open_plots(stats: &PlayerStats) -> usize {
    let owned = usize::try_from(stats.number_of_owned_plots).unwrap_or(usize::MAX);
    owned.saturating_sub(stats.placed_plants.len())
}

/// Fill open plots from inventory, largest stacks first.
fn plan_planting(stats: &PlayerStats) -> Vec<GardenAction> {
    let mut stock: Vec<(&String, u32)> = stats
        .unplaced_plants_inventory
        .iter()
        .map(|(id, count)| (id, *count))
        .collect();
    stock.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    let seeds = stock.into_iter().flat_map(|(id, count)| {
        std::iter::repeat_n(id.clone(), usize::try_from(count).unwrap_or(0))
    });
    free_positions(stats)
        .zip(seeds)
        .take(open_plots(stats))
        .map(|(position, blueprint_id)| GardenAction::Plant {
            blueprint_id,
            position,
        })
        .collect()
}

fn plan_watering(stats: &PlayerStats) -> Vec<GardenAction> {
    stats
        .placed_plants
        .iter()
        .filter(|plant| !plant.is_fully_grown())
        .map(|plant| GardenAction::Water(plant.id))
        .collect()
}

fn plan_sales(stats: &PlayerStats) -> Vec<GardenAction> {
    stats
        .placed_plants
        .iter()
        .filter(|plant| plant.is_fully_grown())
        .map(|plant| GardenAction::Sell(plant.id))
        .collect()
}

fn wants_plot(stats: &PlayerStats, headroom: u64) -> bool {
    stats.number_of_owned_plots < stats.max_plots_for_current_level()
        && stats.total_points >= stats.cost_to_buy_next_plot().saturating_mul(headroom)
}

impl GardenPolicy for SaverPolicy {
    fn name(&self) -> &'static str {
        "Saver"
    }

    fn plan_purchases(
        &mut self,
        stats: &PlayerStats,
        season: Theme,
        config: &EconomyConfig,
    ) -> Vec<GardenAction> {
        let mut actions = Vec::new();
        if wants_plot(stats, 4) {
            actions.push(GardenAction::BuyPlot);
        }
        if let Some(cost) = offer_cost(config, "single")
            && stats.total_points >= cost.saturating_mul(5)
            && open_plots(stats) > 0
        {
            actions.push(GardenAction::BuyOffer {
                offer: "single".to_string(),
                theme: season,
            });
        }
        actions
    }

    fn plan_tending(&mut self, stats: &PlayerStats) -> Vec<GardenAction> {
        let mut actions = plan_planting(stats);
        actions.extend(plan_watering(stats));
        actions
    }
}

impl GardenPolicy for GardenerPolicy {
    fn name(&self) -> &'static str {
        "Gardener"
    }

    fn plan_purchases(
        &mut self,
        stats: &PlayerStats,
        season: Theme,
        config: &EconomyConfig,
    ) -> Vec<GardenAction> {
        let mut actions = plan_sales(stats);
        let empty_after_sales = open_plots(stats) + actions.len();
        if wants_plot(stats, 2) {
            actions.push(GardenAction::BuyPlot);
        }
        if empty_after_sales > 0
            && offer_cost(config, "single").is_some_and(|cost| stats.total_points >= cost)
        {
            actions.push(GardenAction::BuyOffer {
                offer: "single".to_string(),
                theme: season,
            });
        }
        actions
    }

    fn plan_tending(&mut self, stats: &PlayerStats) -> Vec<GardenAction> {
        let mut actions = plan_planting(stats);
        actions.extend(plan_watering(stats));
        actions
    }
}

impl GardenPolicy for WhalePolicy {
    fn name(&self) -> &'static str {
        "Whale"
    }

    fn plan_purchases(
        &mut self,
        stats: &PlayerStats,
        season: Theme,
        config: &EconomyConfig,
    ) -> Vec<GardenAction> {
        let mut actions = plan_sales(stats);
        let theme = if self.rng.gen_bool(0.5) {
            season
        } else {
            Theme::ALL.choose(&mut self.rng).copied().unwrap_or(season)
        };
        if offer_cost(config, "ten").is_some_and(|cost| stats.total_points >= cost) {
            actions.push(GardenAction::BuyOffer {
                offer: "ten".to_string(),
                theme,
            });
        } else if offer_cost(config, "single").is_some_and(|cost| stats.total_points >= cost) {
            actions.push(GardenAction::BuyOffer {
                offer: "single".to_string(),
                theme,
            });
        }
        if wants_plot(stats, 1) {
            actions.push(GardenAction::BuyPlot);
        }
        for (blueprint_id, count) in &stats.unplaced_plants_inventory {
            let quantity = (count / 10) * 10;
            if quantity > 0 {
                actions.push(GardenAction::Convert {
                    blueprint_id: blueprint_id.clone(),
                    quantity,
                });
            }
        }
        actions
    }

    fn plan_tending(&mut self, stats: &PlayerStats) -> Vec<GardenAction> {
        let mut actions = plan_planting(stats);
        let mut growing: Vec<_> = stats
            .placed_plants
            .iter()
            .filter(|plant| !plant.is_fully_grown())
            .collect();
        growing.sort_by_key(|plant| std::cmp::Reverse(plant.base_value));
        let budget = usize::try_from(stats.fertilizer_count).unwrap_or(usize::MAX);
        let fertilized: Vec<PlantId> = growing.iter().take(budget).map(|p| p.id).collect();
        actions.extend(fertilized.iter().map(|id| GardenAction::Fertilize(*id)));
        actions.extend(
            plan_watering(stats)
                .into_iter()
                .filter(|action| !matches!(action, GardenAction::Water(id) if fertilized.contains(id))),
        );
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use yourday_core::{Today, builtin};

    fn today() -> Today {
        Today::utc(Utc.with_ymd_and_hms(2024, 4, 2, 9, 0, 0).unwrap())
    }

    fn rich_stats() -> PlayerStats {
        PlayerStats {
            total_points: 1_000,
            ..PlayerStats::default()
        }
    }

    #[test]
    fn strategy_labels_and_policy_names_agree() {
        for strategy in [
            SpendingStrategy::Saver,
            SpendingStrategy::Gardener,
            SpendingStrategy::Whale,
        ] {
            let policy = strategy.create_policy(1);
            assert_eq!(policy.name(), strategy.label());
            assert_eq!(strategy.to_string(), strategy.label());
        }
    }

    #[test]
    fn planting_fills_only_open_plots() {
        let mut stats = rich_stats();
        stats.add_to_inventory("daisy", 5);
        let actions = plan_planting(&stats);
        assert_eq!(actions.len(), 2);
        let positions: Vec<_> = actions
            .iter()
            .filter_map(|action| match action {
                GardenAction::Plant { position, .. } => Some(*position),
                _ => None,
            })
            .collect();
        assert_eq!(positions, [GridPosition::new(0, 0), GridPosition::new(1, 0)]);
    }

    #[test]
    fn planting_skips_occupied_cells() {
        let mut stats = rich_stats();
        stats.add_to_inventory("daisy", 2);
        stats
            .plant_from_inventory(builtin(), "daisy", GridPosition::new(0, 0), today())
            .unwrap();
        let actions = plan_planting(&stats);
        assert_eq!(
            actions,
            [GardenAction::Plant {
                blueprint_id: "daisy".to_string(),
                position: GridPosition::new(1, 0),
            }]
        );
    }

    #[test]
    fn whale_prefers_ten_pulls_and_converts_stacks() {
        let mut stats = rich_stats();
        stats.add_to_inventory("aster", 23);
        let mut policy = SpendingStrategy::Whale.create_policy(9);
        let actions = policy.plan_purchases(&stats, Theme::Spring, &EconomyConfig::default());
        assert!(
            actions
                .iter()
                .any(|a| matches!(a, GardenAction::BuyOffer { offer, .. } if offer == "ten"))
        );
        assert!(actions.contains(&GardenAction::Convert {
            blueprint_id: "aster".to_string(),
            quantity: 20,
        }));
    }

    #[test]
    fn saver_keeps_a_buffer() {
        let stats = PlayerStats {
            total_points: 60,
            ..PlayerStats::default()
        };
        let mut policy = SpendingStrategy::Saver.create_policy(1);
        let actions = policy.plan_purchases(&stats, Theme::Fall, &EconomyConfig::default());
        assert!(actions.is_empty(), "{actions:?}");
    }

    #[test]
    fn whale_fertilizes_most_valuable_growing_plant() {
        let mut stats = rich_stats();
        stats.fertilizer_count = 1;
        stats.add_to_inventory("daisy", 1);
        stats.add_to_inventory("golden_lotus", 1);
        let cheap = stats
            .plant_from_inventory(builtin(), "daisy", GridPosition::new(0, 0), today())
            .unwrap();
        let rich = stats
            .plant_from_inventory(builtin(), "golden_lotus", GridPosition::new(1, 0), today())
            .unwrap();
        let mut policy = SpendingStrategy::Whale.create_policy(2);
        let actions = policy.plan_tending(&stats);
        assert!(actions.contains(&GardenAction::Fertilize(rich)));
        assert!(actions.contains(&GardenAction::Water(cheap)));
        assert!(!actions.contains(&GardenAction::Water(rich)));
    }
}
