use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::scenarios::Scenario;
use crate::simulation::{SimulationSummary, run_simulation};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub seed: u64,
    pub passed: bool,
    pub iterations_run: usize,
    pub successful_iterations: usize,
    pub failures: Vec<String>,
    #[serde(with = "duration_serde")]
    pub average_duration: Duration,
    #[serde(with = "duration_vec_serde")]
    pub performance_data: Vec<Duration>,
    pub metrics: EconomyMetrics,
}

/// Per-iteration averages of the final ledgers and activity counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EconomyMetrics {
    pub mean_points: f64,
    pub mean_level: f64,
    pub max_level: u32,
    pub mean_garden_value: f64,
    pub mean_peak_garden_value: f64,
    pub mean_awarded: f64,
    pub mean_evaluated_days: f64,
    pub mean_pulls: f64,
    pub mean_plants_pulled: f64,
    pub mean_planted: f64,
    pub mean_waterings: f64,
    pub mean_fertilized: f64,
    pub mean_sold: f64,
    pub mean_sale_income: f64,
    pub mean_plots_bought: f64,
    pub mean_fertilizer_made: f64,
    pub mean_refusals: f64,
    pub mean_rng_draws: f64,
}

fn to_f64(value: u64) -> f64 {
    u32::try_from(value).map_or(f64::from(u32::MAX), f64::from)
}

impl EconomyMetrics {
    #[must_use]
    pub fn from_summaries(summaries: &[SimulationSummary]) -> Self {
        if summaries.is_empty() {
            return Self::default();
        }
        let count = to_f64(u64::try_from(summaries.len()).unwrap_or(u64::MAX));
        let mean = |f: fn(&SimulationSummary) -> u64| {
            summaries.iter().map(|s| to_f64(f(s))).sum::<f64>() / count
        };
        Self {
            mean_points: mean(|s| s.final_stats.total_points),
            mean_level: mean(|s| u64::from(s.final_stats.player_level)),
            max_level: summaries
                .iter()
                .map(|s| s.final_stats.player_level)
                .max()
                .unwrap_or(1),
            mean_garden_value: mean(|s| s.final_stats.garden_value),
            mean_peak_garden_value: mean(|s| s.peak_garden_value),
            mean_awarded: mean(|s| s.total_awarded),
            mean_evaluated_days: mean(|s| u64::from(s.evaluated_days)),
            mean_pulls: mean(|s| u64::from(s.pulls)),
            mean_plants_pulled: mean(|s| s.plants_pulled),
            mean_planted: mean(|s| s.plants_planted),
            mean_waterings: mean(|s| s.waterings),
            mean_fertilized: mean(|s| s.fertilized),
            mean_sold: mean(|s| s.plants_sold),
            mean_sale_income: mean(|s| s.sale_income),
            mean_plots_bought: mean(|s| u64::from(s.plots_bought)),
            mean_fertilizer_made: mean(|s| s.fertilizer_made),
            mean_refusals: mean(|s| s.refused_actions),
            mean_rng_draws: mean(|s| s.rng_draws),
        }
    }
}

pub struct ScenarioRunner {
    verbose: bool,
    days_override: Option<u32>,
}

impl ScenarioRunner {
    pub const fn new(verbose: bool, days_override: Option<u32>) -> Self {
        Self {
            verbose,
            days_override,
        }
    }

    pub async fn run_scenario(
        &self,
        scenario: &Scenario,
        seeds: &[u64],
        iterations: usize,
    ) -> Vec<ScenarioResult> {
        let mut results = Vec::new();

        for &seed in seeds {
            if self.verbose {
                println!(
                    "🌱 Simulating scenario: {} (strategy: {} seed: {})",
                    scenario.name.bright_white(),
                    scenario.strategy,
                    seed
                );
            }
            results.push(self.run_single_scenario(scenario, seed, iterations).await);
        }

        results
    }

    async fn run_single_scenario(
        &self,
        scenario: &Scenario,
        seed: u64,
        iterations: usize,
    ) -> ScenarioResult {
        let mut summaries = Vec::new();
        let mut failures = Vec::new();
        let mut performance_data = Vec::new();

        for i in 0..iterations {
            let start_time = Instant::now();
            let iteration_seed = seed.wrapping_add(u64::try_from(i).unwrap_or(u64::MAX));
            let config = scenario.config(iteration_seed, self.days_override);

            match run_simulation(&config).await {
                Ok(summary) if summary.passed() => summaries.push(summary),
                Ok(summary) => {
                    failures.push(format!(
                        "Iteration {} (seed {}, {} days, {} points, level {}): {}",
                        i + 1,
                        iteration_seed,
                        summary.days_run,
                        summary.final_stats.total_points,
                        summary.final_stats.player_level,
                        summary.violations.join("; ")
                    ));
                    if self.verbose {
                        println!(
                            "  ❌ Iteration {}/{} broke {} invariant(s)",
                            i + 1,
                            iterations,
                            summary.violations.len()
                        );
                    }
                    summaries.push(summary);
                }
                Err(err) => {
                    failures.push(format!(
                        "Iteration {} (seed {iteration_seed}) aborted: {err:#}",
                        i + 1
                    ));
                    if self.verbose {
                        println!("  ❌ Iteration {}/{} aborted: {}", i + 1, iterations, err);
                    }
                }
            }

            performance_data.push(start_time.elapsed());
        }

        let average_duration = if performance_data.is_empty() {
            Duration::ZERO
        } else {
            performance_data.iter().sum::<Duration>()
                / u32::try_from(performance_data.len()).unwrap_or(1)
        };

        ScenarioResult {
            scenario_name: scenario.name.to_string(),
            seed,
            passed: failures.is_empty(),
            iterations_run: iterations,
            successful_iterations: iterations.saturating_sub(failures.len()),
            failures,
            average_duration,
            performance_data,
            metrics: EconomyMetrics::from_summaries(&summaries),
        }
    }
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u128::deserialize(deserializer)?;
        Ok(Duration::from_millis(u64::try_from(millis).unwrap_or(0)))
    }
}

mod duration_vec_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(durations: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis: Vec<u128> = durations.iter().map(Duration::as_millis).collect();
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis_vec = Vec::<u128>::deserialize(deserializer)?;
        Ok(millis_vec
            .into_iter()
            .map(|m| Duration::from_millis(u64::try_from(m).unwrap_or(0)))
            .collect())
    }
}
