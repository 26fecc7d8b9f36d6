//! Weighted random plant selection.
//!
//! A pull rolls a rarity from fixed cumulative thresholds, then picks a
//! blueprint uniformly from the matching (theme, rarity) cell of the catalog.
//! When a cell is empty the draw cascades to a common of the theme, then to any
//! blueprint of the theme. A theme with no blueprints produces nothing.
//!
//! The cascade is deliberately not renormalized: a catalog with gaps hands out
//! commons more often than the advertised odds say. Content tests keep the
//! builtin catalog free of gaps.
use rand::Rng;
use rand::seq::SliceRandom;
use smallvec::SmallVec;

use crate::catalog::{PlantBlueprint, PlantCatalog, Rarity, Theme};
use crate::constants::{
    COMMON_CEILING, EPIC_CEILING, GACHA_ROLL_SPAN, GUARANTEE_BATCH_SIZE, GUARANTEED_EPIC_CEILING,
    GUARANTEED_RARE_CEILING, RARE_CEILING, UNCOMMON_CEILING,
};

/// Which step of the fallback cascade produced a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawSource {
    /// The rolled (theme, rarity) cell had candidates.
    Rolled,
    /// Rolled cell was empty; a common of the theme was used.
    CommonFallback,
    /// Rolled cell and commons were empty; any plant of the theme was used.
    ThemeFallback,
}

/// One plant handed out by a pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Draw<'a> {
    pub blueprint: &'a PlantBlueprint,
    /// Rarity the roll asked for, before any fallback.
    pub rolled: Rarity,
    pub source: DrawSource,
}

/// Results of a batch; ten pulls fit inline.
pub type PullBatch<'a> = SmallVec<[Draw<'a>; 10]>;

/// Map a standard roll in `[0, 100)` to a rarity.
#[must_use]
pub fn rarity_for_roll(roll: f64) -> Rarity {
    if roll < COMMON_CEILING {
        Rarity::Common
    } else if roll < UNCOMMON_CEILING {
        Rarity::Uncommon
    } else if roll < RARE_CEILING {
        Rarity::Rare
    } else if roll < EPIC_CEILING {
        Rarity::Epic
    } else {
        Rarity::Legendary
    }
}

/// Map a guaranteed-slot roll in `[0, 100)` to a rarity; never below rare.
#[must_use]
pub fn guaranteed_rarity_for_roll(roll: f64) -> Rarity {
    if roll < GUARANTEED_RARE_CEILING {
        Rarity::Rare
    } else if roll < GUARANTEED_EPIC_CEILING {
        Rarity::Epic
    } else {
        Rarity::Legendary
    }
}

pub fn roll_rarity<R>(rng: &mut R, guaranteed: bool) -> Rarity
where
    R: Rng + ?Sized,
{
    let roll = rng.gen_range(0.0..GACHA_ROLL_SPAN);
    if guaranteed {
        guaranteed_rarity_for_roll(roll)
    } else {
        rarity_for_roll(roll)
    }
}

/// Pick a blueprint of `theme` for an already rolled rarity, applying the
/// fallback cascade. Returns `None` only when the theme has no blueprints.
pub fn draw_blueprint<'a, R>(
    catalog: &'a PlantCatalog,
    theme: Theme,
    rolled: Rarity,
    rng: &mut R,
) -> Option<Draw<'a>>
where
    R: Rng + ?Sized,
{
    let attempts = [
        (catalog.blueprints_for(theme, rolled), DrawSource::Rolled),
        (
            catalog.blueprints_for(theme, Rarity::Common),
            DrawSource::CommonFallback,
        ),
        (catalog.blueprints_for_theme(theme), DrawSource::ThemeFallback),
    ];
    for (candidates, source) in attempts {
        if let Some(blueprint) = candidates.choose(rng).copied() {
            if source != DrawSource::Rolled {
                log::warn!(
                    "catalog gap: no {rolled} plants for {theme}, fell back to '{}'",
                    blueprint.id
                );
            }
            return Some(Draw {
                blueprint,
                rolled,
                source,
            });
        }
    }
    log::warn!("catalog gap: no plants at all for {theme}");
    None
}

/// Run `count` draws for `theme`.
///
/// When `guarantee_last_slot_rare_or_better` is set and `count` is exactly
/// ten, the final draw uses the guaranteed table. Draws that produce nothing
/// are skipped, so the batch is shorter than `count` only for an empty theme.
pub fn pull<'a, R>(
    catalog: &'a PlantCatalog,
    theme: Theme,
    count: u32,
    guarantee_last_slot_rare_or_better: bool,
    rng: &mut R,
) -> PullBatch<'a>
where
    R: Rng + ?Sized,
{
    let guarantee_applies =
        guarantee_last_slot_rare_or_better && count == GUARANTEE_BATCH_SIZE;
    let mut batch = PullBatch::new();
    for index in 0..count {
        let guaranteed = guarantee_applies && index + 1 == count;
        let rolled = roll_rarity(rng, guaranteed);
        if let Some(draw) = draw_blueprint(catalog, theme, rolled, rng) {
            batch.push(draw);
        }
    }
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{PlantAssets, builtin};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn blueprint(id: &str, theme: Theme, rarity: Rarity) -> PlantBlueprint {
        PlantBlueprint {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            rarity,
            theme,
            initial_days_to_grow: 1,
            base_value: 10,
            assets: PlantAssets::default(),
        }
    }

    #[test]
    fn thresholds_match_documented_table() {
        assert_eq!(rarity_for_roll(0.0), Rarity::Common);
        assert_eq!(rarity_for_roll(59.999), Rarity::Common);
        assert_eq!(rarity_for_roll(60.0), Rarity::Uncommon);
        assert_eq!(rarity_for_roll(85.0), Rarity::Rare);
        assert_eq!(rarity_for_roll(95.0), Rarity::Epic);
        assert_eq!(rarity_for_roll(99.0), Rarity::Legendary);
        assert_eq!(guaranteed_rarity_for_roll(0.0), Rarity::Rare);
        assert_eq!(guaranteed_rarity_for_roll(60.0), Rarity::Epic);
        assert_eq!(guaranteed_rarity_for_roll(90.0), Rarity::Legendary);
    }

    #[test]
    fn guarantee_only_applies_to_ten_pull_final_slot() {
        let catalog = builtin();
        for seed in 0..500 {
            let mut rng = SmallRng::seed_from_u64(seed);
            let batch = pull(catalog, Theme::Summer, 10, true, &mut rng);
            assert_eq!(batch.len(), 10);
            let last = batch.last().unwrap();
            assert!(last.rolled.is_rare_or_better(), "seed {seed}");
            assert!(last.blueprint.rarity.is_rare_or_better(), "seed {seed}");
        }
    }

    #[test]
    fn nine_pulls_get_no_guarantee() {
        let catalog = builtin();
        let mut commons_in_last_slot = 0;
        for seed in 0..500 {
            let mut rng = SmallRng::seed_from_u64(seed);
            let batch = pull(catalog, Theme::Fall, 9, true, &mut rng);
            if batch.last().unwrap().rolled == Rarity::Common {
                commons_in_last_slot += 1;
            }
        }
        assert!(commons_in_last_slot > 0);
    }

    #[test]
    fn empty_cell_falls_back_to_common_then_theme() {
        let catalog = PlantCatalog::new(vec![
            blueprint("spring_common", Theme::Spring, Rarity::Common),
            blueprint("winter_epic", Theme::Winter, Rarity::Epic),
        ])
        .unwrap();
        let mut rng = SmallRng::seed_from_u64(1);

        let draw = draw_blueprint(&catalog, Theme::Spring, Rarity::Legendary, &mut rng).unwrap();
        assert_eq!(draw.blueprint.id, "spring_common");
        assert_eq!(draw.source, DrawSource::CommonFallback);

        let draw = draw_blueprint(&catalog, Theme::Winter, Rarity::Rare, &mut rng).unwrap();
        assert_eq!(draw.blueprint.id, "winter_epic");
        assert_eq!(draw.source, DrawSource::ThemeFallback);

        assert!(draw_blueprint(&catalog, Theme::Fall, Rarity::Common, &mut rng).is_none());
        assert!(pull(&catalog, Theme::Fall, 10, true, &mut rng).is_empty());
    }

    #[test]
    fn same_seed_same_batch() {
        let catalog = builtin();
        let mut a = SmallRng::seed_from_u64(77);
        let mut b = SmallRng::seed_from_u64(77);
        let ids = |batch: PullBatch<'_>| {
            batch
                .iter()
                .map(|draw| draw.blueprint.id.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(
            ids(pull(catalog, Theme::Winter, 10, true, &mut a)),
            ids(pull(catalog, Theme::Winter, 10, true, &mut b))
        );
    }
}
