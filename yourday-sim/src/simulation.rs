use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, TimeDelta, TimeZone, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use yourday_core::{
    DailyOutcome, EconomyConfig, FixedClock, GardenEngine, GardenSession, Identity, MemoryRemote,
    MemoryStore, PlayerStats, SessionError, Subtask, Task, builtin, derive_stream_seed,
};

use crate::invariants::{check_award, check_growth, check_ledger, check_receipt, check_refusal};
use crate::policy::{GardenAction, GardenPolicy, SpendingStrategy};

const TASK_STREAM_DOMAIN: &[u8] = b"yourday-sim-tasks";

/// Configuration for a simulated player.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub seed: u64,
    pub strategy: SpendingStrategy,
    pub days: u32,
    pub tasks_per_day: u32,
    /// Chance that any one task (or subtask) gets done.
    pub completion_rate: f64,
    /// Sign out and back in every this many days; zero never does.
    pub resign_every: u32,
    pub start: DateTime<Utc>,
    pub economy: EconomyConfig,
}

impl SimulationConfig {
    #[must_use]
    pub fn new(strategy: SpendingStrategy, seed: u64) -> Self {
        Self {
            seed,
            strategy,
            days: 60,
            tasks_per_day: 5,
            completion_rate: 0.7,
            resign_every: 0,
            start: default_start(),
            economy: EconomyConfig::default(),
        }
    }

    #[must_use]
    pub const fn with_days(mut self, days: u32) -> Self {
        self.days = days;
        self
    }

    #[must_use]
    pub const fn with_tasks(mut self, tasks_per_day: u32, completion_rate: f64) -> Self {
        self.tasks_per_day = tasks_per_day;
        self.completion_rate = completion_rate;
        self
    }

    #[must_use]
    pub const fn with_resign_every(mut self, days: u32) -> Self {
        self.resign_every = days;
        self
    }
}

/// Late winter, so a default run crosses into spring.
fn default_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 2, 20, 8, 0, 0)
        .single()
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Everything one simulated player did, plus any broken invariants.
#[derive(Debug, Clone, Default)]
pub struct SimulationSummary {
    pub days_run: u32,
    pub total_awarded: u64,
    pub evaluated_days: u32,
    pub pulls: u32,
    pub plants_pulled: u64,
    pub plants_planted: u64,
    pub waterings: u64,
    pub fertilized: u64,
    pub plants_sold: u64,
    pub sale_income: u64,
    pub plots_bought: u32,
    pub fertilizer_made: u64,
    pub refused_actions: u64,
    pub peak_garden_value: u64,
    pub rng_draws: u64,
    pub final_stats: PlayerStats,
    pub violations: Vec<String>,
}

impl SimulationSummary {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    fn violation(&mut self, day: NaiveDate, message: impl Into<String>) {
        let message = message.into();
        log::warn!("day {day}: {message}");
        self.violations.push(format!("day {day}: {message}"));
    }
}

/// Build yesterday's task list. Returns the tasks and how many of them
/// carry at least one completion dated yesterday.
fn generate_tasks(
    rng: &mut ChaCha20Rng,
    config: &SimulationConfig,
    yesterday: DateTime<Utc>,
) -> (Vec<Task>, usize) {
    let mut completed_tasks = 0;
    let mut tasks = Vec::new();
    let stamp =
        |rng: &mut ChaCha20Rng| yesterday + TimeDelta::minutes(rng.gen_range(0..24 * 60));
    for index in 0..config.tasks_per_day {
        let title = format!("Task {}", index + 1);
        let mut task = Task::new(&title);
        let mut counted = false;
        if rng.gen_bool(0.35) {
            for step in 0..rng.gen_range(1..=3) {
                let name = format!("{title}.{}", step + 1);
                if rng.gen_bool(config.completion_rate) {
                    task = task.with_subtask(Subtask::completed(&name, stamp(rng)));
                    counted = true;
                } else {
                    task = task.with_subtask(Subtask::new(&name));
                }
            }
        } else if rng.gen_bool(config.completion_rate) {
            task = task.completed_at(stamp(rng));
            counted = true;
        } else if rng.gen_bool(0.1) {
            // Stale completions must not score.
            task = task.completed_at(yesterday - TimeDelta::days(2));
        }
        if counted {
            completed_tasks += 1;
        }
        tasks.push(task);
    }
    (tasks, completed_tasks)
}

/// Apply one policy action, treating refusals as expected outcomes.
fn execute(
    session: &mut GardenSession<'_, MemoryStore>,
    action: &GardenAction,
    summary: &mut SimulationSummary,
) -> Result<()> {
    let day = session.today().date();
    let before = session.stats().clone();
    let result = match action {
        GardenAction::BuyOffer { offer, theme } => {
            session.buy_offer(offer, *theme).map(|receipt| {
                summary.pulls += 1;
                summary.plants_pulled += u64::try_from(receipt.plants.len()).unwrap_or(0);
                if let Some(violation) = check_receipt(&receipt) {
                    summary.violation(day, violation);
                }
            })
        }
        GardenAction::BuyPlot => session.buy_plot().map(|_| summary.plots_bought += 1),
        GardenAction::Convert {
            blueprint_id,
            quantity,
        } => session
            .convert_to_fertilizer(blueprint_id, *quantity)
            .map(|made| summary.fertilizer_made += u64::from(made)),
        GardenAction::Plant {
            blueprint_id,
            position,
        } => session
            .plant(blueprint_id, *position)
            .map(|_| summary.plants_planted += 1),
        GardenAction::Water(id) => session.water(*id).map(|outcome| {
            if outcome.changed() {
                summary.waterings += 1;
            }
        }),
        GardenAction::Fertilize(id) => session.fertilize(*id).map(|()| summary.fertilized += 1),
        GardenAction::Sell(id) => session.sell(*id).map(|paid| {
            summary.plants_sold += 1;
            summary.sale_income += paid;
        }),
    };
    match result {
        Ok(()) => Ok(()),
        Err(err @ (SessionError::Ledger(_) | SessionError::UnknownOffer(_))) => {
            log::debug!("{action} refused: {err}");
            summary.refused_actions += 1;
            if let Some(violation) = check_refusal(&action.to_string(), &before, session.stats()) {
                summary.violation(day, violation);
            }
            Ok(())
        }
        Err(err) => Err(err).with_context(|| format!("{action} failed")),
    }
}

fn run_plan(
    session: &mut GardenSession<'_, MemoryStore>,
    plan: &[GardenAction],
    summary: &mut SimulationSummary,
) -> Result<()> {
    for action in plan {
        execute(session, action, summary)?;
    }
    Ok(())
}

/// Evaluate yesterday, then make sure a second attempt awards nothing.
fn run_evaluation(
    session: &mut GardenSession<'_, MemoryStore>,
    completed_tasks: usize,
    summary: &mut SimulationSummary,
) -> Result<()> {
    let day = session.today().date();
    let garden_value = session.stats().garden_value;
    match session.evaluate_yesterday()? {
        DailyOutcome::Awarded {
            evaluation,
            progress,
        } => {
            summary.evaluated_days += 1;
            summary.total_awarded += evaluation.total_awarded;
            if progress.leveled_up {
                log::info!("day {day}: reached level {}", progress.level);
            }
            if let Some(violation) = check_award(&evaluation, garden_value, completed_tasks) {
                summary.violation(day, violation);
            }
        }
        DailyOutcome::NothingEarned { .. } => {
            if completed_tasks > 0 {
                summary.violation(day, format!("{completed_tasks} completed tasks earned nothing"));
            }
        }
        DailyOutcome::AlreadyEvaluated => {
            summary.violation(day, "first evaluation of the day was refused");
        }
    }
    if session.evaluate_yesterday()? != DailyOutcome::AlreadyEvaluated {
        summary.violation(day, "yesterday was evaluated twice");
    }
    Ok(())
}

/// Run one simulated player from first sign-in through `config.days` days.
///
/// # Errors
///
/// Returns an error when the engine fails for reasons other than a refused
/// ledger operation, e.g. a persistence or sync failure.
pub async fn run_simulation(config: &SimulationConfig) -> Result<SimulationSummary> {
    let store = MemoryStore::new();
    let remote = MemoryRemote::new();
    let clock = Arc::new(FixedClock::new(config.start));
    let engine = GardenEngine::new(
        store.clone(),
        Arc::new(remote.clone()),
        Arc::new(builtin().clone()),
    )
    .with_config(config.economy.clone())
    .with_clock(clock.clone());

    let identity = Identity::new(&format!("sim-{}-{}", config.strategy.label(), config.seed));
    let display_name = format!("{} #{}", config.strategy, config.seed);
    let mut session = engine.open_session_with_seed(identity.clone(), &display_name, config.seed)?;
    let mut policy: Box<dyn GardenPolicy + Send> = config.strategy.create_policy(config.seed);
    let mut task_rng =
        ChaCha20Rng::seed_from_u64(derive_stream_seed(config.seed, TASK_STREAM_DOMAIN));
    let mut summary = SimulationSummary::default();
    let mut rng_draws = 0;

    for day_index in 1..=config.days {
        clock.advance_days(1);
        let today = session.today();
        let day = today.date();
        session.refresh_garden_value()?;
        let morning = session.stats().clone();

        let (tasks, completed_tasks) = generate_tasks(&mut task_rng, config, today.yesterday());
        store.set_tasks(&identity, tasks)?;
        run_evaluation(&mut session, completed_tasks, &mut summary)?;

        let purchases = policy.plan_purchases(session.stats(), today.season(), engine.config());
        run_plan(&mut session, &purchases, &mut summary)?;
        let tending = policy.plan_tending(session.stats());
        run_plan(&mut session, &tending, &mut summary)?;

        let mut violations = check_ledger(session.stats(), today, engine.catalog());
        violations.extend(check_growth(&morning, session.stats()));
        for violation in violations {
            summary.violation(day, violation);
        }
        summary.peak_garden_value = summary.peak_garden_value.max(session.stats().garden_value);
        session.push().await?;
        summary.days_run = day_index;

        if config.resign_every > 0 && day_index % config.resign_every == 0 {
            let expected = session.stats().clone();
            rng_draws += session.rng_draws();
            session.sign_out();
            session = engine.open_session_with_seed(
                identity.clone(),
                &display_name,
                config.seed.wrapping_add(u64::from(day_index)),
            )?;
            if session.stats() != &expected {
                summary.violation(day, "ledger changed across sign-out and sign-in");
            }
        }
    }

    let local = session.stats().clone();
    if !session.pull_remote().await? {
        summary.violation(session.today().date(), "remote mirror is missing");
    } else if session.stats() != &local {
        summary.violation(session.today().date(), "remote mirror diverged from local ledger");
    }

    summary.rng_draws = rng_draws + session.rng_draws();
    summary.final_stats = session.stats().clone();
    log::debug!(
        "{} seed {} finished: {} points, level {}, {} draws over {} pushes",
        policy.name(),
        config.seed,
        summary.final_stats.total_points,
        summary.final_stats.player_level,
        summary.rng_draws,
        remote.push_count()?
    );
    Ok(summary)
}
