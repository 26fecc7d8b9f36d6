use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;

use yourday_core::{
    DailyOutcome, EconomyConfig, FixedClock, GardenEngine, GridPosition, Identity,
    LeaderboardField, LedgerDocument, LedgerStore, MemoryRemote, MemoryStore, RemoteSync,
    SessionError, Subtask, SyncError, Task, Theme, WaterOutcome, builtin,
};

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, day, hour, 0, 0).unwrap()
}

struct Fixture {
    store: MemoryStore,
    remote: MemoryRemote,
    clock: Arc<FixedClock>,
    engine: GardenEngine<MemoryStore>,
}

fn fixture_with(config: EconomyConfig, remote: MemoryRemote) -> Fixture {
    let store = MemoryStore::new();
    let clock = Arc::new(FixedClock::new(at(15, 10)));
    let engine = GardenEngine::new(
        store.clone(),
        Arc::new(remote.clone()),
        Arc::new(builtin().clone()),
    )
    .with_config(config)
    .with_clock(clock.clone());
    Fixture {
        store,
        remote,
        clock,
        engine,
    }
}

fn fixture() -> Fixture {
    fixture_with(EconomyConfig::default(), MemoryRemote::new())
}

fn rich_config() -> EconomyConfig {
    EconomyConfig {
        starting_points: 1_000,
        ..EconomyConfig::default()
    }
}

fn yesterdays_tasks() -> Vec<Task> {
    vec![
        Task::new("Run").completed_at(at(14, 7)),
        Task::new("Read")
            .with_subtask(Subtask::completed("Chapter 1", at(14, 21)))
            .with_subtask(Subtask::new("Chapter 2")),
        Task::new("Old").completed_at(at(12, 9)),
    ]
}

#[test]
fn first_sign_in_creates_default_ledger() {
    let fx = fixture();
    let ana = Identity::new("ana");
    let session = fx.engine.open_session_with_seed(ana.clone(), "Ana", 1).unwrap();
    assert_eq!(session.stats().garden_value, 100);
    assert_eq!(session.stats().number_of_owned_plots, 2);
    assert!(fx.store.load_ledger(&ana).unwrap().is_some());
    assert!(fx.engine.open_session(Identity::new("   "), "nobody").is_err());
}

#[test]
fn daily_evaluation_awards_once() {
    let fx = fixture();
    let ana = Identity::new("ana");
    fx.store.set_tasks(&ana, yesterdays_tasks()).unwrap();
    let mut session = fx.engine.open_session_with_seed(ana.clone(), "Ana", 1).unwrap();

    let DailyOutcome::Awarded {
        evaluation,
        progress,
    } = session.evaluate_yesterday().unwrap()
    else {
        panic!("expected an award");
    };
    // 20% of 100 per task: Run earns 20, Read earns half of 20.
    assert_eq!(evaluation.total_awarded, 30);
    assert_eq!(evaluation.breakdown.len(), 2);
    assert_eq!(progress.current_xp, 30);
    assert_eq!(session.stats().total_points, 30);
    assert_eq!(session.stats().last_evaluated, Some(at(14, 0)));
    assert_eq!(fx.store.summaries(&ana).unwrap().len(), 2);

    assert_eq!(
        session.evaluate_yesterday().unwrap(),
        DailyOutcome::AlreadyEvaluated
    );
    session.sign_out();

    // A second sign-in on the same day cannot award again.
    let mut again = fx.engine.open_session_with_seed(ana.clone(), "Ana", 2).unwrap();
    assert_eq!(again.stats().total_points, 30);
    assert_eq!(
        again.evaluate_yesterday().unwrap(),
        DailyOutcome::AlreadyEvaluated
    );

    fx.clock.advance_days(1);
    assert!(matches!(
        again.evaluate_yesterday().unwrap(),
        DailyOutcome::NothingEarned { .. }
    ));
    assert_eq!(again.stats().total_points, 30);
    assert_eq!(fx.store.summaries(&ana).unwrap().len(), 2);
}

#[test]
fn failed_persist_restores_ledger_and_allows_retry() {
    let fx = fixture();
    let ana = Identity::new("ana");
    fx.store.set_tasks(&ana, yesterdays_tasks()).unwrap();
    let mut session = fx.engine.open_session_with_seed(ana.clone(), "Ana", 1).unwrap();

    fx.store.set_fail_writes(true).unwrap();
    let err = session.evaluate_yesterday().unwrap_err();
    assert!(matches!(err, SessionError::Persistence(_)));
    assert_eq!(session.stats().total_points, 0);
    assert!(session.stats().last_evaluated.is_none());

    fx.store.set_fail_writes(false).unwrap();
    assert!(matches!(
        session.evaluate_yesterday().unwrap(),
        DailyOutcome::Awarded { .. }
    ));
    assert_eq!(fx.store.load_ledger(&ana).unwrap().unwrap().total_points, 30);
}

#[test]
fn receipt_failure_rolls_back_award_and_allows_retry() {
    let fx = fixture();
    let ana = Identity::new("ana");
    fx.store.set_tasks(&ana, yesterdays_tasks()).unwrap();
    let mut session = fx.engine.open_session_with_seed(ana.clone(), "Ana", 1).unwrap();

    fx.store.set_fail_summary_writes(true).unwrap();
    let err = session.evaluate_yesterday().unwrap_err();
    assert!(matches!(err, SessionError::Persistence(_)));
    assert_eq!(session.stats().total_points, 0);
    assert_eq!(session.stats().current_xp, 0);
    assert!(session.stats().last_evaluated.is_none());
    let stored = fx.store.load_ledger(&ana).unwrap().unwrap();
    assert_eq!(stored.total_points, 0);
    assert!(stored.last_evaluated.is_none());
    assert!(fx.store.summaries(&ana).unwrap().is_empty());

    fx.store.set_fail_summary_writes(false).unwrap();
    assert!(matches!(
        session.evaluate_yesterday().unwrap(),
        DailyOutcome::Awarded { .. }
    ));
    assert_eq!(fx.store.load_ledger(&ana).unwrap().unwrap().total_points, 30);
    assert_eq!(fx.store.summaries(&ana).unwrap().len(), 2);
}

#[test]
fn replaced_session_cannot_overwrite_saved_ledger() {
    let fx = fixture_with(rich_config(), MemoryRemote::new());
    let ana = Identity::new("ana");
    fx.store.set_tasks(&ana, yesterdays_tasks()).unwrap();
    let mut old = fx.engine.open_session_with_seed(ana.clone(), "Ana", 1).unwrap();
    let mut new = fx.engine.open_session_with_seed(ana.clone(), "Ana", 2).unwrap();

    let receipt = new.pull(Theme::Summer, 1, 50).unwrap();
    let blueprint = receipt.plants[0].blueprint_id.clone();
    let saved = fx.store.raw_ledger(&ana).unwrap();

    let stale = |result: Result<_, SessionError>| {
        matches!(result, Err(SessionError::Sync(SyncError::StaleSession)))
    };
    assert!(stale(old.buy_plot().map(drop)));
    assert!(stale(old.pull(Theme::Summer, 1, 50).map(drop)));
    assert!(stale(old.water(yourday_core::PlantId(0)).map(drop)));
    assert!(stale(old.refresh_garden_value().map(drop)));
    assert!(stale(old.evaluate_yesterday().map(drop)));
    assert_eq!(old.stats().total_points, 1_000);
    assert_eq!(old.stats().number_of_owned_plots, 2);

    let stored = fx.store.load_ledger(&ana).unwrap().unwrap();
    assert_eq!(stored.total_points, 950);
    assert_eq!(stored.unplaced_plants_inventory.get(&blueprint), Some(&1));
    assert_eq!(fx.store.raw_ledger(&ana).unwrap(), saved);
    assert!(old.delete_account().is_err());
    assert!(fx.store.load_ledger(&ana).unwrap().is_some());

    // The stale session did not take the current session's evaluation day.
    assert!(matches!(
        new.evaluate_yesterday().unwrap(),
        DailyOutcome::Awarded { .. }
    ));
    assert_eq!(fx.store.load_ledger(&ana).unwrap().unwrap().total_points, 980);
}

#[test]
fn garden_loop_from_pull_to_sale() {
    let fx = fixture_with(rich_config(), MemoryRemote::new());
    let mut session = fx
        .engine
        .open_session_with_seed(Identity::new("bo"), "Bo", 42)
        .unwrap();

    let receipt = session.buy_offer("ten", Theme::Summer).unwrap();
    assert_eq!(receipt.plants.len(), 10);
    assert_eq!(session.stats().total_points, 550);
    assert!(session.rng_draws() >= 10);
    assert!(matches!(
        session.buy_offer("hundred", Theme::Summer),
        Err(SessionError::UnknownOffer(_))
    ));

    let first = receipt.plants[0].blueprint_id.clone();
    let id = session.plant(&first, GridPosition::new(0, 0)).unwrap();
    let days = session.stats().plant(id).unwrap().initial_days_to_grow;
    for _ in 0..days {
        assert!(matches!(session.water(id).unwrap(), WaterOutcome::Watered { .. }));
        assert!(!session.water(id).unwrap().changed());
        fx.clock.advance_days(1);
    }
    assert_eq!(session.water(id).unwrap(), WaterOutcome::AlreadyGrown);

    let points_before = session.stats().total_points;
    let paid = session.sell(id).unwrap();
    assert_eq!(session.stats().total_points, points_before + paid);
    assert!(session.stats().placed_plants.is_empty());

    assert_eq!(session.buy_plot().unwrap(), 20);
    let persisted = fx.store.load_ledger(session.identity()).unwrap().unwrap();
    assert_eq!(&persisted, session.stats());
}

#[tokio::test]
async fn push_and_pull_mirror_the_ledger() {
    let fx = fixture_with(rich_config(), MemoryRemote::new());
    let ana = Identity::new("ana");
    let mut session = fx.engine.open_session_with_seed(ana.clone(), "Ana", 7).unwrap();
    session.buy_plot().unwrap();
    session.push().await.unwrap();
    assert_eq!(fx.remote.push_count().unwrap(), 1);

    let mut remote_doc = fx.remote.pull_ledger(&ana).await.unwrap().unwrap();
    assert_eq!(remote_doc.number_of_owned_plots, 3);
    remote_doc.total_points = 4_321;
    fx.remote.insert_ledger_document(&ana, remote_doc).unwrap();

    assert!(session.pull_remote().await.unwrap());
    assert_eq!(session.stats().total_points, 4_321);
    assert_eq!(
        fx.store.load_ledger(&ana).unwrap().unwrap().total_points,
        4_321
    );
}

#[tokio::test]
async fn sync_failures_leave_local_state_alone() {
    let fx = fixture_with(rich_config(), MemoryRemote::new());
    let ana = Identity::new("ana");
    let mut session = fx.engine.open_session_with_seed(ana.clone(), "Ana", 7).unwrap();
    session.buy_plot().unwrap();

    fx.remote.set_offline(true).unwrap();
    assert!(matches!(session.push().await, Err(SyncError::Transport(_))));
    assert_eq!(session.stats().number_of_owned_plots, 3);
    // Local mutations keep working while offline.
    session.buy_offer("single", Theme::Fall).unwrap();
    assert_eq!(session.stats().total_points, 930);
    fx.remote.set_offline(false).unwrap();

    let mut broken = LedgerDocument::from(session.stats());
    broken.player_level = -1;
    fx.remote.insert_ledger_document(&ana, broken).unwrap();
    let before = session.stats().clone();
    assert!(matches!(
        session.pull_remote().await,
        Err(SessionError::Sync(SyncError::MalformedDocument(_)))
    ));
    assert_eq!(session.stats(), &before);
}

#[tokio::test]
async fn replaced_session_drops_sync_results() {
    let fx = fixture();
    let mut old = fx
        .engine
        .open_session_with_seed(Identity::new("ana"), "Ana", 1)
        .unwrap();
    let new = fx
        .engine
        .open_session_with_seed(Identity::new("bo"), "Bo", 1)
        .unwrap();
    assert!(!old.is_current());
    assert_eq!(old.push().await, Err(SyncError::StaleSession));
    assert!(matches!(
        old.pull_remote().await,
        Err(SessionError::Sync(SyncError::StaleSession))
    ));
    assert_eq!(fx.remote.push_count().unwrap(), 0);

    // Signing out a stale session must not invalidate the current one.
    old.sign_out();
    assert!(new.is_current());
    new.push().await.unwrap();
}

#[tokio::test]
async fn leaderboard_ranks_shared_remote() {
    let remote = MemoryRemote::new();
    for (name, gardens) in [("ana", false), ("bo", true), ("cy", false)] {
        let fx = fixture_with(rich_config(), remote.clone());
        let mut session = fx
            .engine
            .open_session_with_seed(Identity::new(name), name, 3)
            .unwrap();
        if gardens {
            session.buy_offer("ten", Theme::Summer).unwrap();
            let blueprint = session
                .stats()
                .unplaced_plants_inventory
                .keys()
                .next()
                .cloned()
                .unwrap();
            session.plant(&blueprint, GridPosition::new(0, 0)).unwrap();
        }
        session.push().await.unwrap();
    }

    let fx = fixture_with(EconomyConfig::default(), remote);
    let viewer = fx
        .engine
        .open_session_with_seed(Identity::new("dee"), "Dee", 3)
        .unwrap();
    let rows = viewer
        .leaderboard(LeaderboardField::GardenValue, 10)
        .await
        .unwrap();
    let order: Vec<&str> = rows.iter().map(|row| row.identity.as_str()).collect();
    assert_eq!(order, ["bo", "ana", "cy"]);
    assert_eq!(rows[0].rank, Some(1));
    assert!(rows[0].garden_value > 100);
}

#[test]
fn delete_account_clears_local_ledger() {
    let fx = fixture_with(rich_config(), MemoryRemote::new());
    let ana = Identity::new("ana");
    let mut session = fx.engine.open_session_with_seed(ana.clone(), "Ana", 5).unwrap();
    session.buy_plot().unwrap();
    session.delete_account().unwrap();
    assert!(fx.store.load_ledger(&ana).unwrap().is_none());

    let fresh = fx.engine.open_session_with_seed(ana, "Ana", 5).unwrap();
    assert_eq!(fresh.stats().total_points, 1_000);
    assert_eq!(fresh.stats().number_of_owned_plots, 2);
}
