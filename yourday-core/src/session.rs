//! Signed-in session layer.
//!
//! [`GardenEngine`] owns the collaborators (local store, remote mirror,
//! catalog, clock) and hands out one [`GardenSession`] per sign-in. A session
//! owns the identity's ledger: every economy operation runs against it,
//! commits locally, and is persisted before returning. Remote sync is
//! explicit and never rolls back local state.
use chrono::NaiveDate;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::catalog::{PlantCatalog, Theme};
use crate::clock::{Clock, SystemClock, Today};
use crate::config::EconomyConfig;
use crate::error::{LedgerError, SessionError, SyncError};
use crate::evaluation::{Evaluation, apply_evaluation, evaluate};
use crate::identity::Identity;
use crate::leaderboard::{LeaderboardEntry, LeaderboardField, project};
use crate::ledger::{GridPosition, PlantId, PlayerStats, PullReceipt, WaterOutcome};
use crate::leveling::LevelProgress;
use crate::seed::{GachaRng, gacha_seed};
use crate::storage::LedgerStore;
use crate::sync::{EpochToken, LeaderboardDocument, LedgerDocument, RemoteSync, SessionEpoch};

/// Records which day each identity was last evaluated for in this process.
/// Clones share state.
#[derive(Debug, Clone, Default)]
pub struct DailyEvaluationGuard {
    claims: Arc<Mutex<HashMap<Identity, NaiveDate>>>,
}

impl DailyEvaluationGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `day` for `identity`. Returns `false` when that day (or a later
    /// one) was already claimed.
    pub fn try_claim(&self, identity: &Identity, day: NaiveDate) -> bool {
        let mut claims = self.claims.lock().unwrap_or_else(PoisonError::into_inner);
        match claims.get(identity) {
            Some(claimed) if *claimed >= day => false,
            _ => {
                claims.insert(identity.clone(), day);
                true
            }
        }
    }

    /// Give back a claim after a failed evaluation so it can be retried.
    pub fn release(&self, identity: &Identity, day: NaiveDate) {
        let mut claims = self.claims.lock().unwrap_or_else(PoisonError::into_inner);
        if claims.get(identity) == Some(&day) {
            claims.remove(identity);
        }
    }

    pub fn forget(&self, identity: &Identity) {
        self.claims
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(identity);
    }
}

/// Result of a daily evaluation attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum DailyOutcome {
    /// Yesterday was already converted to points.
    AlreadyEvaluated,
    /// Nothing was completed yesterday.
    NothingEarned { day: NaiveDate },
    Awarded {
        evaluation: Evaluation,
        progress: LevelProgress,
    },
}

/// Main engine for managing garden sessions
pub struct GardenEngine<S>
where
    S: LedgerStore,
{
    store: S,
    remote: Arc<dyn RemoteSync>,
    catalog: Arc<PlantCatalog>,
    config: EconomyConfig,
    clock: Arc<dyn Clock>,
    epoch: SessionEpoch,
    evaluations: DailyEvaluationGuard,
}

impl<S> GardenEngine<S>
where
    S: LedgerStore,
{
    /// Create an engine with default configuration and the system clock.
    /// Catalog gaps are logged here, once, so content problems surface at
    /// startup rather than at the first pull.
    pub fn new(store: S, remote: Arc<dyn RemoteSync>, catalog: Arc<PlantCatalog>) -> Self {
        for (theme, rarity) in catalog.missing_cells() {
            log::warn!("catalog gap: no {rarity} plants for {theme}; pulls will fall back");
        }
        Self {
            store,
            remote,
            catalog,
            config: EconomyConfig::default_config(),
            clock: Arc::new(SystemClock),
            epoch: SessionEpoch::new(),
            evaluations: DailyEvaluationGuard::new(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: EconomyConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn catalog(&self) -> &PlantCatalog {
        &self.catalog
    }

    pub const fn config(&self) -> &EconomyConfig {
        &self.config
    }

    pub const fn epoch(&self) -> &SessionEpoch {
        &self.epoch
    }

    #[must_use]
    pub fn today(&self) -> Today {
        Today::new(self.clock.now(), self.config.growth_clock())
    }

    /// Sign in with a fresh random gacha stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity is empty or the ledger cannot be
    /// loaded or created.
    pub fn open_session(
        &self,
        identity: Identity,
        display_name: &str,
    ) -> anyhow::Result<GardenSession<'_, S>> {
        self.open_session_with_seed(identity, display_name, rand::thread_rng().next_u64())
    }

    /// Sign in, loading the identity's ledger or creating a fresh one.
    /// Any previously opened session becomes stale.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity is empty or the ledger cannot be
    /// loaded or created.
    pub fn open_session_with_seed(
        &self,
        identity: Identity,
        display_name: &str,
        seed: u64,
    ) -> anyhow::Result<GardenSession<'_, S>> {
        anyhow::ensure!(!identity.is_empty(), "identity must not be empty");
        let today = self.today();
        let stats = if let Some(mut stats) = self.store.load_ledger(&identity)? {
            stats.update_garden_value(today);
            stats
        } else {
            log::info!("creating garden for {identity}");
            let stats = PlayerStats::new(&self.config);
            self.store.save_ledger(&identity, &stats)?;
            stats
        };
        let token = self.epoch.advance();
        let rng = GachaRng::new(gacha_seed(&identity, seed));
        Ok(GardenSession {
            engine: self,
            identity,
            display_name: display_name.to_string(),
            stats,
            rng,
            token,
        })
    }
}

/// One signed-in identity and its ledger.
pub struct GardenSession<'e, S>
where
    S: LedgerStore,
{
    engine: &'e GardenEngine<S>,
    identity: Identity,
    display_name: String,
    stats: PlayerStats,
    rng: GachaRng,
    token: EpochToken,
}

fn persistence<E>(err: E) -> SessionError
where
    E: std::error::Error + Send + Sync + 'static,
{
    SessionError::Persistence(Box::new(err))
}

impl<S> GardenSession<'_, S>
where
    S: LedgerStore,
{
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub const fn stats(&self) -> &PlayerStats {
        &self.stats
    }

    /// Whether this is still the engine's current session.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.token.is_current()
    }

    /// Gacha draws consumed so far.
    #[must_use]
    pub const fn rng_draws(&self) -> u64 {
        self.rng.draws()
    }

    #[must_use]
    pub fn today(&self) -> Today {
        self.engine.today()
    }

    /// Refuse to touch the ledger once another session has replaced this one.
    fn ensure_current(&self) -> Result<(), SessionError> {
        self.token.ensure_current().map_err(|err| {
            log::debug!("refusing ledger write from stale session of {}", self.identity);
            SessionError::from(err)
        })
    }

    fn persist(&self) -> Result<(), SessionError> {
        self.ensure_current()?;
        self.engine
            .store
            .save_ledger(&self.identity, &self.stats)
            .map_err(persistence)
    }

    /// Run a ledger operation and persist on success.
    fn commit<T>(
        &mut self,
        op: impl FnOnce(
            &mut PlayerStats,
            &PlantCatalog,
            &mut GachaRng,
            Today,
        ) -> Result<T, LedgerError>,
    ) -> Result<T, SessionError> {
        self.ensure_current()?;
        let today = self.today();
        let engine = self.engine;
        let value = op(&mut self.stats, engine.catalog.as_ref(), &mut self.rng, today)?;
        self.persist()?;
        Ok(value)
    }

    /// # Errors
    ///
    /// `StaleSession` if the session was replaced, or a failure to persist
    /// the watered ledger.
    pub fn water(&mut self, id: PlantId) -> Result<WaterOutcome, SessionError> {
        self.ensure_current()?;
        let outcome = self.stats.water_plant(id, self.today());
        if outcome.changed() {
            self.persist()?;
        }
        Ok(outcome)
    }

    /// # Errors
    ///
    /// Returns the ledger's refusal or a persistence failure.
    pub fn fertilize(&mut self, id: PlantId) -> Result<(), SessionError> {
        self.commit(|stats, _, _, today| stats.use_fertilizer(id, today))
    }

    /// # Errors
    ///
    /// Returns the ledger's refusal or a persistence failure.
    pub fn sell(&mut self, id: PlantId) -> Result<u64, SessionError> {
        self.commit(|stats, _, _, today| stats.sell_plant(id, today))
    }

    /// # Errors
    ///
    /// Returns the ledger's refusal or a persistence failure.
    pub fn plant(
        &mut self,
        blueprint_id: &str,
        position: GridPosition,
    ) -> Result<PlantId, SessionError> {
        self.commit(|stats, catalog, _, today| {
            stats.plant_from_inventory(catalog, blueprint_id, position, today)
        })
    }

    /// # Errors
    ///
    /// Returns the ledger's refusal or a persistence failure.
    pub fn pull(
        &mut self,
        theme: Theme,
        number_of_pulls: u32,
        total_cost: u64,
    ) -> Result<PullReceipt, SessionError> {
        self.commit(|stats, catalog, rng, today| {
            let receipt = stats.pull_plants(catalog, theme, number_of_pulls, total_cost, rng)?;
            log::debug!("pull on {} used {} draws", today.date(), rng.draws());
            Ok(receipt)
        })
    }

    /// Buy one of the configured pull offers.
    ///
    /// # Errors
    ///
    /// `UnknownOffer`, the ledger's refusal, or a persistence failure.
    pub fn buy_offer(&mut self, offer_id: &str, theme: Theme) -> Result<PullReceipt, SessionError> {
        let offer = self
            .engine
            .config
            .offer(offer_id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownOffer(offer_id.to_string()))?;
        self.pull(theme, offer.pulls, offer.cost)
    }

    /// # Errors
    ///
    /// Returns the ledger's refusal or a persistence failure.
    pub fn convert_to_fertilizer(
        &mut self,
        blueprint_id: &str,
        quantity: u32,
    ) -> Result<u32, SessionError> {
        self.commit(|stats, _, _, _| stats.convert_to_fertilizer(blueprint_id, quantity))
    }

    /// # Errors
    ///
    /// Returns the ledger's refusal or a persistence failure.
    pub fn buy_plot(&mut self) -> Result<u64, SessionError> {
        self.commit(|stats, _, _, _| stats.buy_next_plot())
    }

    /// Recompute garden value for today's season, e.g. after a month change.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be persisted.
    pub fn refresh_garden_value(&mut self) -> Result<u64, SessionError> {
        self.commit(|stats, _, _, today| Ok(stats.update_garden_value(today)))
    }

    /// Convert yesterday's completed tasks into points and XP.
    ///
    /// Runs at most once per identity and day within the process. If the
    /// award or its receipts cannot be persisted the ledger is restored and
    /// the day can be retried.
    ///
    /// # Errors
    ///
    /// `StaleSession` if the session was replaced, or a persistence failure
    /// from loading tasks, saving the ledger, or writing receipts.
    pub fn evaluate_yesterday(&mut self) -> Result<DailyOutcome, SessionError> {
        self.ensure_current()?;
        let today = self.today();
        let day = today.clock.day_of(today.yesterday());
        let engine = self.engine;
        let guard = &engine.evaluations;
        if !guard.try_claim(&self.identity, day) {
            log::debug!("evaluation for {day} already claimed by {}", self.identity);
            return Ok(DailyOutcome::AlreadyEvaluated);
        }
        if self
            .stats
            .last_evaluated
            .is_some_and(|last| today.clock.day_of(last) == day)
        {
            return Ok(DailyOutcome::AlreadyEvaluated);
        }

        let tasks = match engine.store.load_tasks(&self.identity) {
            Ok(tasks) => tasks,
            Err(err) => {
                guard.release(&self.identity, day);
                return Err(persistence(err));
            }
        };
        let evaluation = evaluate(
            &tasks,
            self.stats.garden_value,
            self.stats.last_evaluated,
            today,
        );
        if evaluation.is_empty() {
            return Ok(DailyOutcome::NothingEarned { day });
        }

        let snapshot = self.stats.clone();
        apply_evaluation(&mut self.stats, &evaluation);
        let xp = evaluation
            .total_awarded
            .saturating_mul(engine.config.xp_per_point);
        let progress = self.stats.add_xp(xp);
        if let Err(err) = self.persist() {
            self.stats = snapshot;
            guard.release(&self.identity, day);
            return Err(err);
        }
        if let Err(err) = engine
            .store
            .append_daily_summaries(&self.identity, &evaluation.breakdown)
        {
            log::warn!("could not record receipts for {day}, rolling back award: {err}");
            self.stats = snapshot;
            if let Err(restore) = self.persist() {
                log::warn!("could not restore ledger for {}: {restore}", self.identity);
            }
            guard.release(&self.identity, day);
            return Err(persistence(err));
        }
        Ok(DailyOutcome::Awarded {
            evaluation,
            progress,
        })
    }

    #[must_use]
    pub fn leaderboard_entry(&self) -> LeaderboardEntry {
        project(&self.identity, &self.display_name, &self.stats)
    }

    /// Mirror the ledger and leaderboard entry to the remote store.
    ///
    /// # Errors
    ///
    /// `StaleSession` if the session was replaced, or the remote's failure.
    /// Local state is unaffected either way.
    pub async fn push(&self) -> Result<(), SyncError> {
        self.token.ensure_current()?;
        let document = LedgerDocument::from(&self.stats);
        let entry = LeaderboardDocument::from(&self.leaderboard_entry());
        let result = async {
            self.engine
                .remote
                .push_ledger(&self.identity, &document)
                .await?;
            self.engine.remote.upsert_leaderboard_entry(&entry).await
        }
        .await;
        if let Err(err) = &result {
            log::warn!("sync push for {} failed: {err}", self.identity);
        }
        result?;
        self.token.ensure_current()
    }

    /// Replace the local ledger with the remote copy, if there is one.
    /// Returns whether anything was applied.
    ///
    /// # Errors
    ///
    /// `StaleSession`, a transport or malformed-document failure (local
    /// state untouched), or a persistence failure after applying.
    pub async fn pull_remote(&mut self) -> Result<bool, SessionError> {
        self.token.ensure_current()?;
        let fetched = self.engine.remote.pull_ledger(&self.identity).await;
        self.token.ensure_current()?;
        let document = match fetched {
            Ok(Some(document)) => document,
            Ok(None) => return Ok(false),
            Err(err) => {
                log::warn!("sync pull for {} failed: {err}", self.identity);
                return Err(err.into());
            }
        };
        let mut stats = PlayerStats::try_from(document)?;
        stats.update_garden_value(self.today());
        self.stats = stats;
        self.persist()?;
        Ok(true)
    }

    /// Top `limit` leaderboard rows by `field`.
    ///
    /// # Errors
    ///
    /// `StaleSession`, a transport failure, or a malformed row.
    pub async fn leaderboard(
        &self,
        field: LeaderboardField,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>, SyncError> {
        self.token.ensure_current()?;
        let rows = self.engine.remote.query_leaderboard(field, limit).await?;
        self.token.ensure_current()?;
        rows.into_iter().map(LeaderboardEntry::try_from).collect()
    }

    /// End the session. In-flight sync results for it will be discarded.
    pub fn sign_out(self) {
        if self.token.is_current() {
            self.engine.epoch.advance();
        }
        log::info!("{} signed out", self.identity);
    }

    /// Sign out and remove the identity's local ledger and receipts.
    ///
    /// # Errors
    ///
    /// `StaleSession` if the session was replaced, or the store's refusal.
    pub fn delete_account(self) -> Result<(), SessionError> {
        self.ensure_current()?;
        self.engine
            .store
            .delete_ledger(&self.identity)
            .map_err(persistence)?;
        self.engine.evaluations.forget(&self.identity);
        log::info!("deleted garden for {}", self.identity);
        self.sign_out();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_claims_each_day_once() {
        let guard = DailyEvaluationGuard::new();
        let id = Identity::new("ana");
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let next = day.succ_opt().unwrap();
        assert!(guard.try_claim(&id, day));
        assert!(!guard.try_claim(&id, day));
        assert!(guard.try_claim(&Identity::new("bo"), day));

        guard.release(&id, day);
        assert!(guard.try_claim(&id, day));
        assert!(guard.try_claim(&id, next));
        assert!(!guard.try_claim(&id, day));
    }

    #[test]
    fn concurrent_claims_have_one_winner() {
        let guard = DailyEvaluationGuard::new();
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let winners: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let guard = guard.clone();
                    scope.spawn(move || guard.try_claim(&Identity::new("ana"), day))
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| usize::from(handle.join().unwrap()))
                .sum()
        });
        assert_eq!(winners, 1);
    }
}
