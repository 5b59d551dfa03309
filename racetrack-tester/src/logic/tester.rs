use colored::Colorize;
use racetrack_env::{EnvConfig, EpisodeLedger, MapKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::logic::policy::DriverKind;
use crate::logic::simulation::{SessionSummary, run_session};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub map: String,
    pub driver: String,
    pub seed: u64,
    pub passed: bool,
    pub episodes_run: usize,
    pub successful_episodes: usize,
    pub failures: Vec<String>,
    pub mean_reward: f64,
    pub best_reward: Option<f64>,
    pub mean_steps: f64,
    pub checkpoints_reached: usize,
    pub end_reasons: BTreeMap<String, usize>,
    /// Hex digest of the first run; absent when the run errored.
    pub digest: Option<String>,
    #[serde(with = "duration_serde")]
    pub duration: Duration,
}

/// Runs (map, driver, seed) scenarios twice and checks they replay identically.
pub struct LogicTester {
    base: EnvConfig,
    episodes: usize,
    verbose: bool,
}

impl LogicTester {
    pub const fn new(base: EnvConfig, episodes: usize, verbose: bool) -> Self {
        Self {
            base,
            episodes,
            verbose,
        }
    }

    pub fn run_matrix(
        &self,
        maps: &[MapKind],
        drivers: &[DriverKind],
        seeds: &[u64],
    ) -> Vec<ScenarioResult> {
        let mut results = Vec::new();
        for &map in maps {
            for &driver in drivers {
                for &seed in seeds {
                    if self.verbose {
                        println!(
                            "🧪 Testing scenario: {} (seed: {seed})",
                            format!("{map}/{driver}").bright_white()
                        );
                    }
                    results.push(self.run_scenario(map, driver, seed));
                }
            }
        }
        results
    }

    pub fn run_scenario(&self, map: MapKind, driver: DriverKind, seed: u64) -> ScenarioResult {
        let config = EnvConfig {
            map,
            seed,
            ..self.base.clone()
        };
        let start = Instant::now();
        let first = run_session(config.clone(), driver, self.episodes);
        let second = run_session(config, driver, self.episodes);
        let duration = start.elapsed();

        let mut failures = Vec::new();
        let summary = match (first, second) {
            (Ok(first), Ok(second)) => {
                if first.digest != second.digest {
                    failures.push(format!(
                        "replay diverged: digest {:016x} vs {:016x}",
                        first.digest, second.digest
                    ));
                }
                Some(first)
            }
            (Err(err), _) | (_, Err(err)) => {
                failures.push(format!("environment error: {err}"));
                None
            }
        };
        if let Some(summary) = &summary {
            for (index, record) in summary.records.iter().enumerate() {
                if !record.reward.is_finite() {
                    failures.push(format!(
                        "episode {} produced non-finite reward {}",
                        index + 1,
                        record.reward
                    ));
                }
            }
        }

        if self.verbose {
            for failure in &failures {
                println!("  ❌ {}", failure.red());
            }
        }

        build_result(map, driver, seed, summary.as_ref(), failures, duration)
    }
}

fn build_result(
    map: MapKind,
    driver: DriverKind,
    seed: u64,
    summary: Option<&SessionSummary>,
    failures: Vec<String>,
    duration: Duration,
) -> ScenarioResult {
    let records = summary.map_or(&[][..], |s| s.records.as_slice());
    let mut ledger = EpisodeLedger::new(records.len().max(1));
    let mut end_reasons = BTreeMap::new();
    for record in records {
        ledger.push(record.clone());
        let reason = record.end.map_or("unfinished", |end| end.as_str());
        *end_reasons.entry(reason.to_string()).or_insert(0) += 1;
    }
    let episodes_run = records.len();
    #[allow(clippy::cast_precision_loss)]
    let mean_steps = if episodes_run == 0 {
        0.0
    } else {
        records.iter().map(|r| f64::from(r.steps)).sum::<f64>() / episodes_run as f64
    };

    ScenarioResult {
        scenario_name: format!("{map}/{driver}"),
        map: map.to_string(),
        driver: driver.to_string(),
        seed,
        passed: failures.is_empty(),
        episodes_run,
        successful_episodes: records.iter().filter(|r| r.success).count(),
        failures,
        mean_reward: ledger.mean_reward(),
        best_reward: ledger.best_reward(),
        mean_steps,
        checkpoints_reached: records.iter().map(|r| r.checkpoints).sum(),
        end_reasons,
        digest: summary.map(|s| format!("{:016x}", s.digest)),
        duration,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_covers_every_combination() {
        let tester = LogicTester::new(EnvConfig::default(), 1, false);
        let results = tester.run_matrix(
            &[MapKind::Corridor, MapKind::Open],
            &[DriverKind::Throttle, DriverKind::Spinner],
            &[1, 2],
        );
        assert_eq!(results.len(), 8);
        assert!(results.iter().all(|r| r.passed), "{results:#?}");
        assert!(results.iter().all(|r| r.digest.is_some()));
        assert_eq!(results[0].scenario_name, "corridor/throttle");
    }

    #[test]
    fn end_reasons_are_tallied() {
        let tester = LogicTester::new(EnvConfig::default(), 3, false);
        let result = tester.run_scenario(MapKind::Open, DriverKind::Random, 5);
        assert!(result.passed);
        assert_eq!(result.episodes_run, 3);
        assert_eq!(result.end_reasons.values().sum::<usize>(), 3);
        assert!(result.best_reward.is_some());
    }

    #[test]
    fn environment_errors_fail_the_scenario() {
        let mut base = EnvConfig::default();
        base.spawn.position_jitter = 1e6;
        let tester = LogicTester::new(base, 1, false);
        let result = tester.run_scenario(MapKind::Circle, DriverKind::Throttle, 1);
        assert!(!result.passed);
        assert!(result.failures[0].contains("environment error"));
        assert!(result.digest.is_none());
        assert_eq!(result.episodes_run, 0);
    }

    #[test]
    fn result_serializes_duration_as_millis() {
        let tester = LogicTester::new(EnvConfig::default(), 1, false);
        let result = tester.run_scenario(MapKind::Corridor, DriverKind::Seeker, 3);
        let json = serde_json::to_value(&result).unwrap();
        assert!(json["duration"].is_u64());
        assert_eq!(json["driver"], "seeker");
    }
}
