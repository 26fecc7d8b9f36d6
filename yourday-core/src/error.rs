//! Error types for the garden economy.
//!
//! Every failure in the engine is recoverable and reported as a value. The
//! [`ErrorKind`] of an error says which category it belongs to so callers can
//! decide whether to show a validation message, a "not found" message, flag a
//! content problem, or offer a retry for sync.

use thiserror::Error;

use crate::catalog::{Rarity, Theme};
use crate::ledger::{GridPosition, PlantId};

/// Broad failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request is well-formed but the ledger cannot satisfy it.
    Validation,
    /// A plant or blueprint id does not resolve.
    NotFound,
    /// Catalog content is missing for a theme.
    CatalogGap,
    /// Remote push/pull failed; local state is still authoritative.
    Sync,
}

/// Failures of ledger operations. The ledger is never mutated when one of
/// these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("not enough points: {required} required, {available} available")]
    InsufficientPoints { required: u64, available: u64 },

    #[error("not enough '{blueprint_id}' in inventory: {required} required, {available} available")]
    InsufficientInventory {
        blueprint_id: String,
        required: u32,
        available: u32,
    },

    #[error("invalid quantity {quantity}: {reason}")]
    InvalidQuantity { quantity: u32, reason: &'static str },

    #[error("position ({}, {}) is already occupied", .0.x, .0.y)]
    PositionOccupied(GridPosition),

    #[error("all {owned} plots are in use or no more plots are available at this level")]
    PlotCapReached { owned: u32 },

    #[error("plant {0} is not fully grown yet")]
    NotFullyGrown(PlantId),

    #[error("plant {0} is already fully grown")]
    AlreadyGrown(PlantId),

    #[error("no fertilizer available")]
    NoFertilizer,

    #[error("no placed plant with id {0}")]
    PlantNotFound(PlantId),

    #[error("unknown plant blueprint '{0}'")]
    UnknownBlueprint(String),

    #[error("the catalog has no plants for the {0} theme")]
    EmptyCatalogForTheme(Theme),
}

impl LedgerError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InsufficientPoints { .. }
            | Self::InsufficientInventory { .. }
            | Self::InvalidQuantity { .. }
            | Self::PositionOccupied(_)
            | Self::PlotCapReached { .. }
            | Self::NotFullyGrown(_)
            | Self::AlreadyGrown(_)
            | Self::NoFertilizer => ErrorKind::Validation,
            Self::PlantNotFound(_) | Self::UnknownBlueprint(_) => ErrorKind::NotFound,
            Self::EmptyCatalogForTheme(_) => ErrorKind::CatalogGap,
        }
    }
}

/// Failures while loading or validating plant catalog content.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to parse plant catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("duplicate blueprint id '{0}'")]
    DuplicateId(String),

    #[error("blueprint '{id}' is invalid: {reason}")]
    InvalidBlueprint { id: String, reason: &'static str },

    #[error("unknown rarity '{0}'")]
    UnknownRarity(String),

    #[error("unknown theme '{0}'")]
    UnknownTheme(String),

    #[error("catalog has no blueprints for {theme} / {rarity}")]
    MissingCell { theme: Theme, rarity: Rarity },
}

/// Failures talking to the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("remote store unavailable: {0}")]
    Transport(String),

    #[error("malformed remote document: {0}")]
    MalformedDocument(String),

    /// The session that started the request has since been replaced.
    #[error("session changed while the request was in flight")]
    StaleSession,
}

impl SyncError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::Sync
    }
}

/// Failures of the in-memory persistence collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to encode or decode ledger: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("store is not accepting writes")]
    Unavailable,
}

/// Failures surfaced by [`GardenSession`](crate::session::GardenSession).
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("unknown pull offer '{0}'")]
    UnknownOffer(String),

    #[error(transparent)]
    Sync(#[from] SyncError),

    /// The mutation was applied locally but could not be persisted.
    #[error("failed to persist ledger: {0}")]
    Persistence(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl SessionError {
    #[must_use]
    pub const fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Ledger(err) => Some(err.kind()),
            Self::UnknownOffer(_) => Some(ErrorKind::NotFound),
            Self::Sync(err) => Some(err.kind()),
            Self::Persistence(_) => None,
        }
    }
}
