//! Daily conversion of task completions into points.
//!
//! Evaluation always targets the previous calendar day. A task is worth 20% of
//! the current garden value; tasks with subtasks split that share evenly and
//! pay for each subtask finished on the target day. Evaluating the same day
//! twice returns an empty result.
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Today;
use crate::constants::{MIN_EFFECTIVE_GARDEN_VALUE, TASK_SHARE_OF_GARDEN_VALUE};
use crate::ledger::PlayerStats;
use crate::numbers::{round_f64_to_u64, u64_to_f64, usize_to_f64};
use crate::tasks::Task;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtaskPoints {
    pub title: String,
    pub earned_points: f64,
}

/// Receipt for one task that earned points during an evaluation pass.
/// Written once and never changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub task_title: String,
    pub target_date: NaiveDate,
    pub max_potential_points: f64,
    #[serde(default)]
    pub subtask_points: Vec<SubtaskPoints>,
    pub total_earned: f64,
    pub main_task_completed: bool,
}

pub type TaskPointResult = DailySummary;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub total_awarded: u64,
    pub breakdown: Vec<DailySummary>,
    /// Start of the day that was evaluated.
    pub evaluated_day: DateTime<Utc>,
}

impl Evaluation {
    fn nothing(evaluated_day: DateTime<Utc>) -> Self {
        Self {
            total_awarded: 0,
            breakdown: Vec::new(),
            evaluated_day,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total_awarded == 0 && self.breakdown.is_empty()
    }
}

/// Points one task can earn at a given garden value.
#[must_use]
pub fn max_points_per_task(garden_value: u64) -> f64 {
    u64_to_f64(garden_value).max(MIN_EFFECTIVE_GARDEN_VALUE) * TASK_SHARE_OF_GARDEN_VALUE
}

fn score_task(task: &Task, max_per_task: f64, today: Today) -> DailySummary {
    let yesterday = today.yesterday();
    let on_target_day =
        |at: Option<DateTime<Utc>>| at.is_some_and(|at| today.clock.is_same_day(at, yesterday));
    let main_task_completed = on_target_day(task.completed_at);

    let mut subtask_points = Vec::new();
    let total_earned = if task.has_subtasks() {
        let per_subtask = max_per_task / usize_to_f64(task.subtasks.len());
        for subtask in &task.subtasks {
            if on_target_day(subtask.completed_at) {
                subtask_points.push(SubtaskPoints {
                    title: subtask.title.clone(),
                    earned_points: per_subtask,
                });
            }
        }
        subtask_points.iter().map(|s| s.earned_points).sum()
    } else if main_task_completed {
        max_per_task
    } else {
        0.0
    };

    DailySummary {
        task_title: task.title.clone(),
        target_date: today.clock.day_of(yesterday),
        max_potential_points: max_per_task,
        subtask_points,
        total_earned,
        main_task_completed,
    }
}

/// Score yesterday's completions.
///
/// Returns an empty evaluation when `last_evaluated` already falls on
/// yesterday. Tasks that earned nothing are left out of the breakdown.
#[must_use]
pub fn evaluate(
    tasks: &[Task],
    garden_value: u64,
    last_evaluated: Option<DateTime<Utc>>,
    today: Today,
) -> Evaluation {
    let yesterday = today.yesterday();
    if last_evaluated.is_some_and(|last| today.clock.is_same_day(last, yesterday)) {
        log::debug!("{} already evaluated", today.clock.day_of(yesterday));
        return Evaluation::nothing(yesterday);
    }

    let max_per_task = max_points_per_task(garden_value);
    let breakdown: Vec<DailySummary> = tasks
        .iter()
        .map(|task| score_task(task, max_per_task, today))
        .filter(|summary| summary.total_earned > 0.0)
        .collect();
    let earned: f64 = breakdown.iter().map(|summary| summary.total_earned).sum();

    Evaluation {
        total_awarded: round_f64_to_u64(earned),
        breakdown,
        evaluated_day: yesterday,
    }
}

/// Credit an evaluation to the ledger. Returns whether anything changed.
pub fn apply_evaluation(stats: &mut PlayerStats, evaluation: &Evaluation) -> bool {
    if evaluation.total_awarded == 0 {
        return false;
    }
    stats.award_points(evaluation.total_awarded);
    stats.last_evaluated = Some(evaluation.evaluated_day);
    log::info!(
        "awarded {} points for {} tasks",
        evaluation.total_awarded,
        evaluation.breakdown.len()
    );
    true
}
