use crate::policy::SpendingStrategy;
use crate::simulation::SimulationConfig;

/// A named simulation setup runnable from the CLI.
#[derive(Debug, Clone, Copy)]
pub struct Scenario {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub strategy: SpendingStrategy,
    pub days: u32,
    pub tasks_per_day: u32,
    pub completion_rate: f64,
    pub resign_every: u32,
}

impl Scenario {
    #[must_use]
    pub fn config(&self, seed: u64, days_override: Option<u32>) -> SimulationConfig {
        SimulationConfig::new(self.strategy, seed)
            .with_days(days_override.unwrap_or(self.days))
            .with_tasks(self.tasks_per_day, self.completion_rate)
            .with_resign_every(self.resign_every)
    }
}

const SCENARIOS: &[Scenario] = &[
    Scenario {
        key: "smoke",
        name: "Smoke",
        description: "Two weeks of steady gardening",
        strategy: SpendingStrategy::Gardener,
        days: 14,
        tasks_per_day: 4,
        completion_rate: 0.8,
        resign_every: 0,
    },
    Scenario {
        key: "saver",
        name: "Saver",
        description: "Hoards points, buys plots, pulls rarely",
        strategy: SpendingStrategy::Saver,
        days: 90,
        tasks_per_day: 5,
        completion_rate: 0.7,
        resign_every: 30,
    },
    Scenario {
        key: "gardener",
        name: "Gardener",
        description: "Single pulls in season across a full year",
        strategy: SpendingStrategy::Gardener,
        days: 365,
        tasks_per_day: 5,
        completion_rate: 0.7,
        resign_every: 0,
    },
    Scenario {
        key: "whale",
        name: "Whale",
        description: "Ten-pulls, fertilizer and fast turnover",
        strategy: SpendingStrategy::Whale,
        days: 120,
        tasks_per_day: 8,
        completion_rate: 0.9,
        resign_every: 0,
    },
    Scenario {
        key: "slacker",
        name: "Slacker",
        description: "Rarely finishes tasks; garden must not stall the ledger",
        strategy: SpendingStrategy::Gardener,
        days: 60,
        tasks_per_day: 6,
        completion_rate: 0.15,
        resign_every: 0,
    },
    Scenario {
        key: "relog",
        name: "Relog",
        description: "Signs out and back in every few days",
        strategy: SpendingStrategy::Whale,
        days: 45,
        tasks_per_day: 5,
        completion_rate: 0.7,
        resign_every: 3,
    },
];

#[must_use]
pub fn get_scenario(key: &str) -> Option<&'static Scenario> {
    SCENARIOS
        .iter()
        .find(|scenario| scenario.key.eq_ignore_ascii_case(key))
}

#[must_use]
pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    SCENARIOS
        .iter()
        .map(|scenario| (scenario.key, scenario.description))
        .collect()
}

/// Expand the `all` keyword into every scenario key, keeping order.
#[must_use]
pub fn expand_scenarios(requested: &[String]) -> Vec<String> {
    let mut expanded = Vec::new();
    for key in requested {
        if key.eq_ignore_ascii_case("all") {
            expanded.extend(SCENARIOS.iter().map(|s| s.key.to_string()));
        } else {
            expanded.push(key.clone());
        }
    }
    expanded.dedup();
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_keys_are_unique_and_resolvable() {
        let keys: Vec<&str> = list_scenarios().into_iter().map(|(key, _)| key).collect();
        for key in &keys {
            assert_eq!(get_scenario(key).map(|s| s.key), Some(*key));
        }
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), keys.len());
        assert!(get_scenario("SMOKE").is_some());
        assert!(get_scenario("nope").is_none());
    }

    #[test]
    fn expands_all_keyword() {
        let expanded = expand_scenarios(&["all".to_string()]);
        assert_eq!(expanded.len(), SCENARIOS.len());
        let kept = expand_scenarios(&["whale".to_string(), "smoke".to_string()]);
        assert_eq!(kept, vec!["whale", "smoke"]);
    }

    #[test]
    fn config_honors_day_override() {
        let smoke = get_scenario("smoke").unwrap();
        assert_eq!(smoke.config(1, None).days, 14);
        assert_eq!(smoke.config(1, Some(3)).days, 3);
        assert_eq!(smoke.config(9, None).seed, 9);
    }
}
