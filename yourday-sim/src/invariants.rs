//! Ledger invariants checked after every simulated action.
use std::collections::HashSet;

use yourday_core::evaluation::max_points_per_task;
use yourday_core::{Evaluation, PlantCatalog, PlayerStats, PullReceipt, Today, garden_value_of};

/// Every structural rule a persisted ledger must satisfy.
#[must_use]
pub fn check_ledger(stats: &PlayerStats, today: Today, catalog: &PlantCatalog) -> Vec<String> {
    let mut violations = Vec::new();

    let expected = garden_value_of(&stats.placed_plants, today.season());
    if stats.garden_value != expected {
        violations.push(format!(
            "garden value {} does not match placed plants ({expected})",
            stats.garden_value
        ));
    }

    if let Some((id, _)) = stats
        .unplaced_plants_inventory
        .iter()
        .find(|(_, count)| **count == 0)
    {
        violations.push(format!("inventory keeps an empty stack for {id}"));
    }

    let placed = stats.placed_plants.len();
    let owned = usize::try_from(stats.number_of_owned_plots).unwrap_or(usize::MAX);
    if placed > owned {
        violations.push(format!("{placed} plants placed on {owned} plots"));
    }

    let mut positions = HashSet::new();
    let mut ids = HashSet::new();
    for plant in &stats.placed_plants {
        if !positions.insert(plant.position) {
            violations.push(format!(
                "two plants share ({}, {})",
                plant.position.x, plant.position.y
            ));
        }
        if !ids.insert(plant.id) || plant.id.0 >= stats.next_plant_id {
            violations.push(format!("plant id {} is not unique", plant.id));
        }
        if plant.days_left_till_fully_grown > plant.initial_days_to_grow {
            violations.push(format!(
                "{} has {} days left of {}",
                plant.id, plant.days_left_till_fully_grown, plant.initial_days_to_grow
            ));
        }
        if catalog.blueprint(&plant.blueprint_id).is_none() {
            violations.push(format!("{} uses unknown blueprint {}", plant.id, plant.blueprint_id));
        }
    }

    if stats.player_level == 0 {
        violations.push("player level dropped to zero".to_string());
    }
    if stats.current_xp >= stats.xp_required_for_next_level() {
        violations.push(format!(
            "{} XP was not carried into a level (needs {})",
            stats.current_xp,
            stats.xp_required_for_next_level()
        ));
    }

    violations
}

/// A refused operation must leave the ledger exactly as it was.
#[must_use]
pub fn check_refusal(action: &str, before: &PlayerStats, after: &PlayerStats) -> Option<String> {
    (before != after).then(|| format!("refused '{action}' still changed the ledger"))
}

/// No plant that survived the day may have more growth days left than before.
#[must_use]
pub fn check_growth(before: &PlayerStats, after: &PlayerStats) -> Vec<String> {
    after
        .placed_plants
        .iter()
        .filter_map(|plant| {
            let earlier = before.plant(plant.id)?;
            (plant.days_left_till_fully_grown > earlier.days_left_till_fully_grown).then(|| {
                format!(
                    "{} regrew from {} to {} days left",
                    plant.id, earlier.days_left_till_fully_grown, plant.days_left_till_fully_grown
                )
            })
        })
        .collect()
}

/// A ten-pull always ends on a rare-or-better plant.
#[must_use]
pub fn check_receipt(receipt: &PullReceipt) -> Option<String> {
    if receipt.plants.len() != 10 {
        return None;
    }
    let last = receipt.plants.last()?;
    (!last.rarity.is_rare_or_better()).then(|| {
        format!(
            "ten-pull in {} ended on {} {}",
            receipt.theme, last.rarity, last.blueprint_id
        )
    })
}

/// An award never exceeds each task's full share of the garden value.
#[must_use]
pub fn check_award(
    evaluation: &Evaluation,
    garden_value: u64,
    completed_tasks: usize,
) -> Option<String> {
    let tasks = u32::try_from(completed_tasks).unwrap_or(u32::MAX);
    let ceiling = max_points_per_task(garden_value) * f64::from(tasks);
    let awarded = u32::try_from(evaluation.total_awarded).map_or(f64::MAX, f64::from);
    if awarded > ceiling.round() {
        return Some(format!(
            "awarded {} for {completed_tasks} tasks, ceiling {ceiling:.1}",
            evaluation.total_awarded
        ));
    }
    if evaluation
        .breakdown
        .iter()
        .any(|summary| summary.total_earned <= 0.0)
    {
        return Some("breakdown lists a task that earned nothing".to_string());
    }
    None
}
