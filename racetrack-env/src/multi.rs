//! Several independent environments stepped in lockstep.
use serde::{Deserialize, Serialize};

use crate::config::EnvConfig;
use crate::env::{EnvPhase, Observation, RaceEnv, StepInfo};
use crate::error::EnvError;
use crate::kinematics::{Action, CarProfile};

/// Per-slot results of [`MultiEnv::step_all`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiStep {
    pub observations: Vec<Observation>,
    pub rewards: Vec<f64>,
    pub dones: Vec<bool>,
    /// `None` for slots that had already finished before this call.
    pub infos: Vec<Option<StepInfo>>,
}

/// Owns one [`RaceEnv`] per agent. Slots that finish sit idle until the next
/// [`MultiEnv::reset_all`].
#[derive(Debug)]
pub struct MultiEnv {
    envs: Vec<RaceEnv>,
    observations: Vec<Observation>,
    done: Vec<bool>,
}

impl MultiEnv {
    /// One environment per profile, all sharing `base` apart from the car.
    /// Slot `i` is seeded with `base.seed + i`.
    ///
    /// # Errors
    ///
    /// Returns the first construction error.
    pub fn new(base: &EnvConfig, profiles: &[CarProfile]) -> Result<Self, EnvError> {
        let configs = profiles
            .iter()
            .zip(0_u64..)
            .map(|(profile, offset)| EnvConfig {
                car: *profile,
                seed: base.seed.wrapping_add(offset),
                ..base.clone()
            })
            .collect();
        Self::from_configs(configs)
    }

    /// One environment per configuration.
    ///
    /// # Errors
    ///
    /// Returns the first construction error.
    pub fn from_configs(configs: Vec<EnvConfig>) -> Result<Self, EnvError> {
        let envs = configs
            .into_iter()
            .map(RaceEnv::new)
            .collect::<Result<Vec<_>, _>>()?;
        let count = envs.len();
        Ok(Self {
            envs,
            observations: vec![Observation::default(); count],
            done: vec![false; count],
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.envs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.envs.is_empty()
    }

    #[must_use]
    pub fn envs(&self) -> &[RaceEnv] {
        &self.envs
    }

    #[must_use]
    pub fn dones(&self) -> &[bool] {
        &self.done
    }

    /// Reset every slot.
    ///
    /// # Errors
    ///
    /// Returns the first reset error.
    pub fn reset_all(&mut self, randomize_checkpoints: bool) -> Result<Vec<Observation>, EnvError> {
        for (slot, env) in self.envs.iter_mut().enumerate() {
            let (observation, _) = env.reset(randomize_checkpoints)?;
            self.observations[slot] = observation;
            self.done[slot] = false;
        }
        Ok(self.observations.clone())
    }

    /// Step every unfinished slot with its action.
    ///
    /// All-or-nothing: every action and every unfinished slot is checked
    /// before any slot moves, so an error leaves the whole batch untouched.
    ///
    /// # Errors
    ///
    /// Returns `EnvError::ActionCount` when `actions` does not match the slot
    /// count, `EnvError::Action` for an invalid action index, or
    /// `EnvError::NotReset` when an unfinished slot was never reset.
    pub fn step_all(&mut self, actions: &[i64]) -> Result<MultiStep, EnvError> {
        if actions.len() != self.envs.len() {
            return Err(EnvError::ActionCount {
                expected: self.envs.len(),
                actual: actions.len(),
            });
        }
        let actions = actions
            .iter()
            .copied()
            .map(Action::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        for (env, done) in self.envs.iter().zip(&self.done) {
            match env.phase() {
                EnvPhase::Ready => {}
                EnvPhase::Finished if *done => {}
                EnvPhase::Uninitialized => return Err(EnvError::NotReset),
                EnvPhase::Finished => return Err(EnvError::EpisodeFinished),
            }
        }

        let mut rewards = Vec::with_capacity(actions.len());
        let mut infos = Vec::with_capacity(actions.len());
        for (slot, (env, action)) in self.envs.iter_mut().zip(actions).enumerate() {
            if self.done[slot] {
                rewards.push(0.0);
                infos.push(None);
                continue;
            }
            let outcome = env.step_action(action)?;
            self.done[slot] = outcome.done();
            rewards.push(outcome.reward);
            infos.push(Some(outcome.info));
            self.observations[slot] = outcome.observation;
        }
        Ok(MultiStep {
            observations: self.observations.clone(),
            rewards,
            dones: self.done.clone(),
            infos,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::MapKind;

    fn base() -> EnvConfig {
        let mut config = EnvConfig::for_map(MapKind::Corridor);
        config.spawn.randomize = false;
        config.observation_noise = 0.0;
        config
    }

    #[test]
    fn heterogeneous_profiles_drive_differently() {
        let profiles = [
            CarProfile::default(),
            CarProfile {
                acceleration: 1.5,
                ..CarProfile::default()
            },
        ];
        let mut multi = MultiEnv::new(&base(), &profiles).unwrap();
        assert_eq!(multi.len(), 2);
        multi.reset_all(false).unwrap();
        multi.step_all(&[0, 0]).unwrap();
        let xs: Vec<f64> = multi.envs().iter().map(|e| e.car().position.x).collect();
        assert!(xs[1] > xs[0]);
    }

    #[test]
    fn finished_slots_idle_until_reset() {
        let mut multi = MultiEnv::new(&base(), &[CarProfile::default(); 2]).unwrap();
        multi.reset_all(false).unwrap();
        // Slot 0 reverses into the barrier, slot 1 turns in place.
        let mut finished = None;
        for _ in 0..60 {
            let step = multi.step_all(&[1, 2]).unwrap();
            if step.dones[0] {
                finished = Some(step);
                break;
            }
        }
        let step = finished.unwrap();
        assert!(step.infos[0].is_some());
        let frozen = step.observations[0].clone();

        let next = multi.step_all(&[1, 2]).unwrap();
        assert!(next.dones[0]);
        assert!(next.rewards[0].abs() < f64::EPSILON);
        assert!(next.infos[0].is_none());
        assert_eq!(next.observations[0], frozen);

        multi.reset_all(false).unwrap();
        assert!(multi.dones().iter().all(|d| !d));
    }

    #[test]
    fn invalid_action_leaves_every_slot_untouched() {
        let mut multi = MultiEnv::new(&base(), &[CarProfile::default(); 3]).unwrap();
        let start = multi.reset_all(false).unwrap();
        assert!(matches!(multi.step_all(&[0, 7, 0]), Err(EnvError::Action(_))));
        assert!(multi.envs().iter().all(|env| env.progress().step == 0));
        assert!(multi.dones().iter().all(|d| !d));
        let step = multi.step_all(&[0, 0, 0]).unwrap();
        assert_ne!(step.observations[0], start[0]);
        assert!(multi.envs().iter().all(|env| env.progress().step == 1));
    }

    #[test]
    fn stepping_before_reset_is_rejected_up_front() {
        let mut multi = MultiEnv::new(&base(), &[CarProfile::default(); 2]).unwrap();
        assert!(matches!(multi.step_all(&[0, 0]), Err(EnvError::NotReset)));
        assert!(multi.envs().iter().all(|env| env.phase() == EnvPhase::Uninitialized));
    }

    #[test]
    fn action_count_must_match() {
        let mut multi = MultiEnv::new(&base(), &[CarProfile::default(); 3]).unwrap();
        multi.reset_all(false).unwrap();
        assert!(matches!(
            multi.step_all(&[0, 0]),
            Err(EnvError::ActionCount {
                expected: 3,
                actual: 2
            })
        ));
    }
}
