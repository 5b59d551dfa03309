use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::{CheckpointLedger, ConfigurableShaper, ExploitPenalties, NamedWeights, RewardShaper, Transition};

/// Weights for [`SpeedShaper`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpeedWeights {
    #[serde(default = "SpeedWeights::default_speed_reward_factor")]
    pub speed_reward_factor: f64,
    #[serde(default = "SpeedWeights::default_collision_penalty")]
    pub collision_penalty: f64,
    #[serde(default = "SpeedWeights::default_checkpoint_bonus")]
    pub checkpoint_bonus: f64,
    #[serde(default = "SpeedWeights::default_out_of_bounds_penalty")]
    pub out_of_bounds_penalty: f64,
    #[serde(default)]
    pub exploits: ExploitPenalties,
}

impl SpeedWeights {
    const fn default_speed_reward_factor() -> f64 {
        2.0
    }

    const fn default_collision_penalty() -> f64 {
        -100.0
    }

    const fn default_checkpoint_bonus() -> f64 {
        50.0
    }

    const fn default_out_of_bounds_penalty() -> f64 {
        -50.0
    }
}

impl Default for SpeedWeights {
    fn default() -> Self {
        Self {
            speed_reward_factor: Self::default_speed_reward_factor(),
            collision_penalty: Self::default_collision_penalty(),
            checkpoint_bonus: Self::default_checkpoint_bonus(),
            out_of_bounds_penalty: Self::default_out_of_bounds_penalty(),
            exploits: ExploitPenalties::default(),
        }
    }
}

impl NamedWeights for SpeedWeights {
    fn named_weights(&self) -> SmallVec<[(&'static str, f64); 12]> {
        let mut out = SmallVec::new();
        out.push(("speed_reward_factor", self.speed_reward_factor));
        out.push(("collision_penalty", self.collision_penalty));
        out.push(("checkpoint_bonus", self.checkpoint_bonus));
        out.push(("out_of_bounds_penalty", self.out_of_bounds_penalty));
        self.exploits.push_named(&mut out);
        out
    }
}

/// Pure racing: reward is dominated by raw signed speed.
#[derive(Debug, Clone, Default)]
pub struct SpeedShaper {
    weights: SpeedWeights,
    checkpoints: CheckpointLedger,
}

impl SpeedShaper {
    #[must_use]
    pub fn new(weights: SpeedWeights) -> Self {
        Self {
            weights,
            checkpoints: CheckpointLedger::default(),
        }
    }

    #[must_use]
    pub const fn weights(&self) -> &SpeedWeights {
        &self.weights
    }
}

impl RewardShaper for SpeedShaper {
    fn name(&self) -> &str {
        "speed"
    }

    fn compute_reward(&mut self, t: &Transition) -> f64 {
        let w = &self.weights;
        let mut reward = w.speed_reward_factor * t.velocity;
        if t.collision {
            reward += w.collision_penalty;
        }
        reward += self.checkpoints.bonus(t.checkpoint_index, w.checkpoint_bonus);
        if t.out_of_bounds {
            reward += w.out_of_bounds_penalty;
        }
        reward + w.exploits.apply(t)
    }

    fn reset(&mut self) {
        self.checkpoints.reset();
    }
}

impl ConfigurableShaper for SpeedShaper {
    type Weights = SpeedWeights;

    fn from_weights(weights: Self::Weights) -> Self {
        Self::new(weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faster_is_strictly_better() {
        let mut shaper = SpeedShaper::default();
        let slow = shaper.compute_reward(&Transition {
            velocity: 1.0,
            ..Transition::default()
        });
        let fast = shaper.compute_reward(&Transition {
            velocity: 20.0,
            ..Transition::default()
        });
        assert!(fast > slow);
        assert!((fast - 40.0).abs() < 1e-12);
    }

    #[test]
    fn reversing_is_negative() {
        let mut shaper = SpeedShaper::default();
        let reward = shaper.compute_reward(&Transition {
            velocity: -3.0,
            ..Transition::default()
        });
        assert!((reward + 6.0).abs() < 1e-12);
    }

    #[test]
    fn penalties_and_bonus() {
        let mut shaper = SpeedShaper::default();
        let reward = shaper.compute_reward(&Transition {
            collision: true,
            out_of_bounds: true,
            checkpoint_index: 1,
            total_checkpoints: 1,
            ..Transition::default()
        });
        assert!((reward - (-100.0 + 50.0 - 50.0)).abs() < 1e-12);
    }
}
