//! YourDay Garden Engine
//!
//! Economy and scoring core for YourDay's garden: completed tasks earn points,
//! points buy gacha pulls of seasonal plants, plants grow in a level-gated
//! garden, and the garden's value feeds back into how much tasks are worth.
//! This crate has no UI or platform dependencies; persistence and the remote
//! mirror are collaborator traits.

pub mod catalog;
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod evaluation;
pub mod gacha;
pub mod identity;
pub mod leaderboard;
pub mod ledger;
pub mod leveling;
pub mod numbers;
pub mod seed;
pub mod session;
pub mod storage;
pub mod sync;
pub mod tasks;

// Re-export commonly used types
pub use catalog::{PlantAssets, PlantBlueprint, PlantCatalog, Rarity, Theme, builtin};
pub use clock::{Clock, FixedClock, GrowthClock, SystemClock, Today};
pub use config::{EconomyConfig, PullOffer};
pub use error::{CatalogError, ErrorKind, LedgerError, SessionError, StoreError, SyncError};
pub use evaluation::{
    DailySummary, Evaluation, SubtaskPoints, TaskPointResult, apply_evaluation, evaluate,
};
pub use gacha::{Draw, DrawSource, PullBatch};
pub use identity::Identity;
pub use leaderboard::{LeaderboardEntry, LeaderboardField, project, rank_entries};
pub use ledger::{
    GridPosition, PlacedPlant, PlantId, PlayerStats, PullReceipt, PulledPlant, WaterOutcome,
    garden_value_of,
};
pub use leveling::{LevelProgress, max_plots_for_level, xp_required_for_next_level};
pub use seed::{CountingRng, GachaRng, derive_stream_seed};
pub use session::{DailyEvaluationGuard, DailyOutcome, GardenEngine, GardenSession};
pub use storage::{LedgerStore, MemoryStore};
pub use sync::{
    EpochToken, LeaderboardDocument, LedgerDocument, MemoryRemote, PlacedPlantDocument,
    RemoteSync, SessionEpoch,
};
pub use tasks::{Subtask, Task};
