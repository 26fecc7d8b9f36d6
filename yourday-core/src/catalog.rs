//! Plant blueprint registry.
//!
//! The catalog is immutable content: every plant the gacha can hand out is a
//! [`PlantBlueprint`] looked up by its stable string id. The builtin catalog is
//! compiled in from `assets/plants.json`; custom catalogs can be parsed with
//! [`PlantCatalog::from_json`].
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::error::CatalogError;

const BUILTIN_PLANTS_JSON: &str = include_str!("../assets/plants.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    pub const ALL: [Self; 5] = [
        Self::Common,
        Self::Uncommon,
        Self::Rare,
        Self::Epic,
        Self::Legendary,
    ];

    #[must_use]
    pub const fn is_rare_or_better(self) -> bool {
        matches!(self, Self::Rare | Self::Epic | Self::Legendary)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Uncommon => "uncommon",
            Self::Rare => "rare",
            Self::Epic => "epic",
            Self::Legendary => "legendary",
        }
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rarity {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|rarity| rarity.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CatalogError::UnknownRarity(s.to_string()))
    }
}

/// Seasonal theme, used both to filter gacha pulls and for the seasonal value bonus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Spring,
    Summer,
    Fall,
    Winter,
}

impl Theme {
    pub const ALL: [Self; 4] = [Self::Spring, Self::Summer, Self::Fall, Self::Winter];

    /// Spring is March–May, summer June–August, fall September–November,
    /// and winter December–February. `month` is 1-based.
    #[must_use]
    pub const fn for_month(month: u32) -> Self {
        match month {
            3..=5 => Self::Spring,
            6..=8 => Self::Summer,
            9..=11 => Self::Fall,
            _ => Self::Winter,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Spring => "spring",
            Self::Summer => "summer",
            Self::Fall => "fall",
            Self::Winter => "winter",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|theme| theme.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CatalogError::UnknownTheme(s.to_string()))
    }
}

/// Display asset references for a plant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlantAssets {
    #[serde(default)]
    pub icon: String,
    /// Sprite per growth stage, seedling first.
    #[serde(default)]
    pub growth_stages: Vec<String>,
}

/// Immutable template describing a plant type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlantBlueprint {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub rarity: Rarity,
    pub theme: Theme,
    pub initial_days_to_grow: u32,
    pub base_value: u32,
    #[serde(default)]
    pub assets: PlantAssets,
}

/// Static registry of plant blueprints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlantCatalog {
    pub plants: Vec<PlantBlueprint>,
}

/// Builtin catalog shipped with the crate, parsed once.
#[must_use]
pub fn builtin() -> &'static PlantCatalog {
    static CATALOG: OnceLock<PlantCatalog> = OnceLock::new();
    CATALOG.get_or_init(PlantCatalog::load_from_static)
}

impl PlantCatalog {
    /// Build a catalog from blueprints, rejecting duplicate ids and
    /// non-positive growth times or values.
    ///
    /// # Errors
    ///
    /// Returns an error when a blueprint is invalid or an id repeats.
    pub fn new(plants: Vec<PlantBlueprint>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for plant in &plants {
            if plant.id.trim().is_empty() {
                return Err(CatalogError::InvalidBlueprint {
                    id: plant.id.clone(),
                    reason: "id must not be empty",
                });
            }
            if plant.initial_days_to_grow == 0 {
                return Err(CatalogError::InvalidBlueprint {
                    id: plant.id.clone(),
                    reason: "initial_days_to_grow must be positive",
                });
            }
            if plant.base_value == 0 {
                return Err(CatalogError::InvalidBlueprint {
                    id: plant.id.clone(),
                    reason: "base_value must be positive",
                });
            }
            if !seen.insert(plant.id.as_str()) {
                return Err(CatalogError::DuplicateId(plant.id.clone()));
            }
        }
        Ok(Self { plants })
    }

    /// Parse and validate a catalog from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed or a blueprint is invalid.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let parsed: Self = serde_json::from_str(json)?;
        Self::new(parsed.plants)
    }

    /// Load the compiled-in catalog, falling back to an empty catalog if the
    /// asset is broken. The gacha treats an empty catalog as a content gap.
    #[must_use]
    pub fn load_from_static() -> Self {
        Self::from_json(BUILTIN_PLANTS_JSON).unwrap_or_else(|err| {
            log::error!("builtin plant catalog is invalid: {err}");
            Self::default()
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.plants.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plants.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlantBlueprint> {
        self.plants.iter()
    }

    #[must_use]
    pub fn blueprint(&self, id: &str) -> Option<&PlantBlueprint> {
        self.plants.iter().find(|plant| plant.id == id)
    }

    #[must_use]
    pub fn blueprints_by_rarity(&self, rarity: Rarity) -> Vec<&PlantBlueprint> {
        self.plants
            .iter()
            .filter(|plant| plant.rarity == rarity)
            .collect()
    }

    #[must_use]
    pub fn blueprints_for(&self, theme: Theme, rarity: Rarity) -> Vec<&PlantBlueprint> {
        self.plants
            .iter()
            .filter(|plant| plant.theme == theme && plant.rarity == rarity)
            .collect()
    }

    #[must_use]
    pub fn blueprints_for_theme(&self, theme: Theme) -> Vec<&PlantBlueprint> {
        self.plants
            .iter()
            .filter(|plant| plant.theme == theme)
            .collect()
    }

    #[must_use]
    pub fn has_theme(&self, theme: Theme) -> bool {
        self.plants.iter().any(|plant| plant.theme == theme)
    }

    /// Every (theme, rarity) pair with no blueprint. Pulls landing in one of
    /// these cells go through the gacha fallback and skew the advertised odds.
    #[must_use]
    pub fn missing_cells(&self) -> Vec<(Theme, Rarity)> {
        let mut missing = Vec::new();
        for theme in Theme::ALL {
            for rarity in Rarity::ALL {
                if !self
                    .plants
                    .iter()
                    .any(|plant| plant.theme == theme && plant.rarity == rarity)
                {
                    missing.push((theme, rarity));
                }
            }
        }
        missing
    }

    /// Content-integrity check: every theme must offer every rarity.
    ///
    /// # Errors
    ///
    /// Returns the first missing (theme, rarity) cell.
    pub fn ensure_complete(&self) -> Result<(), CatalogError> {
        match self.missing_cells().first() {
            Some(&(theme, rarity)) => Err(CatalogError::MissingCell { theme, rarity }),
            None => Ok(()),
        }
    }
}
