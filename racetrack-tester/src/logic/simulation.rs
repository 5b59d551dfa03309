use std::hash::Hasher;

use log::debug;
use racetrack_env::{EnvConfig, EnvError, EpisodeRecord, EpisodeTally, Observation, RaceEnv};
use twox_hash::XxHash64;

use crate::logic::policy::{DriverKind, DriverPolicy};

/// Episodes driven by one policy on one environment instance.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub records: Vec<EpisodeRecord>,
    /// XxHash64 over every action, observation and reward of the session.
    pub digest: u64,
}

impl SessionSummary {
    #[must_use]
    pub fn total_steps(&self) -> u64 {
        self.records.iter().map(|r| u64::from(r.steps)).sum()
    }
}

/// Build an environment from `config` and drive `episodes` episodes with
/// the given driver. The driver is seeded with the environment seed.
///
/// # Errors
///
/// Returns the first construction, reset, or step error.
pub fn run_session(
    config: EnvConfig,
    driver: DriverKind,
    episodes: usize,
) -> Result<SessionSummary, EnvError> {
    let seed = config.seed;
    let map = config.map;
    let mut env = RaceEnv::new(config)?;
    let mut policy = driver.create_policy(seed);
    let mut hasher = XxHash64::with_seed(seed);
    let mut records = Vec::with_capacity(episodes);
    for episode in 0..episodes {
        let record = drive_episode(&mut env, policy.as_mut(), &mut hasher)?;
        debug!(
            "{map}/{driver} seed {seed} episode {}: reward {:.2}, {} steps, end {:?}",
            episode + 1,
            record.reward,
            record.steps,
            record.end
        );
        records.push(record);
    }
    Ok(SessionSummary {
        records,
        digest: hasher.finish(),
    })
}

/// Reset `env` (with randomized checkpoints) and drive until the episode ends.
///
/// # Errors
///
/// Propagates reset and step errors from the environment.
pub fn drive_episode<H: Hasher>(
    env: &mut RaceEnv,
    policy: &mut dyn DriverPolicy,
    hasher: &mut H,
) -> Result<EpisodeRecord, EnvError> {
    let (observation, _) = env.reset(true)?;
    policy.reset();
    hash_observation(hasher, &observation);
    let mut tally = EpisodeTally::new();
    loop {
        let action = policy.act(env);
        let outcome = env.step_action(action)?;
        hasher.write_i64(action.index());
        hash_observation(hasher, &outcome.observation);
        hasher.write_u64(outcome.reward.to_bits());
        tally.observe(&outcome);
        if outcome.done() {
            return Ok(tally.finish());
        }
    }
}

fn hash_observation<H: Hasher>(hasher: &mut H, observation: &Observation) {
    for value in observation.iter() {
        hasher.write_u32(value.to_bits());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use racetrack_env::{EpisodeEnd, MapKind};

    #[test]
    fn throttle_episodes_always_end() {
        let mut config = EnvConfig::for_map(MapKind::Corridor);
        config.spawn.randomize = false;
        let summary = run_session(config, DriverKind::Throttle, 2).unwrap();
        assert_eq!(summary.records.len(), 2);
        for record in &summary.records {
            // Straight ahead either claims the checkpoint or hits the far wall.
            assert!(matches!(
                record.end,
                Some(EpisodeEnd::Completed | EpisodeEnd::LeftTrack)
            ));
            assert!(record.steps > 0);
        }
        let steps: u64 = summary.records.iter().map(|r| u64::from(r.steps)).sum();
        assert_eq!(summary.total_steps(), steps);
    }

    #[test]
    fn sessions_replay_bit_for_bit() {
        let config = EnvConfig {
            seed: 77,
            ..EnvConfig::for_map(MapKind::Curve)
        };
        let first = run_session(config.clone(), DriverKind::Random, 3).unwrap();
        let second = run_session(config, DriverKind::Random, 3).unwrap();
        assert_eq!(first.digest, second.digest);
        assert_eq!(first.records, second.records);
    }

    #[test]
    fn zero_episodes_is_an_empty_session() {
        let summary = run_session(EnvConfig::default(), DriverKind::Seeker, 0).unwrap();
        assert!(summary.records.is_empty());
        assert_eq!(summary.total_steps(), 0);
    }
}
