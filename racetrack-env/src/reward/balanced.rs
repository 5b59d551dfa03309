use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::{CheckpointLedger, ConfigurableShaper, ExploitPenalties, NamedWeights, RewardShaper, Transition};
use crate::constants::SPEED_NORMALIZER;

/// Weights for [`BalancedShaper`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BalancedWeights {
    #[serde(default = "BalancedWeights::default_checkpoint_reward")]
    pub checkpoint_reward: f64,
    #[serde(default = "BalancedWeights::default_collision_penalty")]
    pub collision_penalty: f64,
    #[serde(default = "BalancedWeights::default_speed_reward_factor")]
    pub speed_reward_factor: f64,
    #[serde(default = "BalancedWeights::default_progress_reward_factor")]
    pub progress_reward_factor: f64,
    #[serde(default = "BalancedWeights::default_out_of_bounds_penalty")]
    pub out_of_bounds_penalty: f64,
    #[serde(default = "BalancedWeights::default_stability_reward")]
    pub stability_reward: f64,
    #[serde(default)]
    pub exploits: ExploitPenalties,
}

impl BalancedWeights {
    const fn default_checkpoint_reward() -> f64 {
        100.0
    }

    const fn default_collision_penalty() -> f64 {
        -50.0
    }

    const fn default_speed_reward_factor() -> f64 {
        0.5
    }

    const fn default_progress_reward_factor() -> f64 {
        1.0
    }

    const fn default_out_of_bounds_penalty() -> f64 {
        -100.0
    }

    const fn default_stability_reward() -> f64 {
        1.0
    }
}

impl Default for BalancedWeights {
    fn default() -> Self {
        Self {
            checkpoint_reward: Self::default_checkpoint_reward(),
            collision_penalty: Self::default_collision_penalty(),
            speed_reward_factor: Self::default_speed_reward_factor(),
            progress_reward_factor: Self::default_progress_reward_factor(),
            out_of_bounds_penalty: Self::default_out_of_bounds_penalty(),
            stability_reward: Self::default_stability_reward(),
            exploits: ExploitPenalties::default(),
        }
    }
}

impl NamedWeights for BalancedWeights {
    fn named_weights(&self) -> SmallVec<[(&'static str, f64); 12]> {
        let mut out = SmallVec::new();
        out.push(("checkpoint_reward", self.checkpoint_reward));
        out.push(("collision_penalty", self.collision_penalty));
        out.push(("speed_reward_factor", self.speed_reward_factor));
        out.push(("progress_reward_factor", self.progress_reward_factor));
        out.push(("out_of_bounds_penalty", self.out_of_bounds_penalty));
        out.push(("stability_reward", self.stability_reward));
        self.exploits.push_named(&mut out);
        out
    }
}

/// Checkpoint bonus, collision and out-of-bounds penalties, capped speed
/// bonus, progress bonus, and a stability term rewarding steady speed.
#[derive(Debug, Clone, Default)]
pub struct BalancedShaper {
    weights: BalancedWeights,
    checkpoints: CheckpointLedger,
}

impl BalancedShaper {
    #[must_use]
    pub fn new(weights: BalancedWeights) -> Self {
        Self {
            weights,
            checkpoints: CheckpointLedger::default(),
        }
    }

    #[must_use]
    pub const fn weights(&self) -> &BalancedWeights {
        &self.weights
    }
}

impl RewardShaper for BalancedShaper {
    fn name(&self) -> &str {
        "balanced"
    }

    fn compute_reward(&mut self, t: &Transition) -> f64 {
        let w = &self.weights;
        let mut reward = self.checkpoints.bonus(t.checkpoint_index, w.checkpoint_reward);
        if t.collision {
            reward += w.collision_penalty;
        }
        if t.out_of_bounds {
            reward += w.out_of_bounds_penalty;
        }
        reward += w.speed_reward_factor * (t.velocity / SPEED_NORMALIZER).min(1.0);
        reward += w.progress_reward_factor * t.progress;
        if let Some(last) = t.last_velocity {
            reward += w.stability_reward / (1.0 + (t.velocity - last).abs());
        }
        reward + w.exploits.apply(t)
    }

    fn reset(&mut self) {
        self.checkpoints.reset();
    }
}

impl ConfigurableShaper for BalancedShaper {
    type Weights = BalancedWeights;

    fn from_weights(weights: Self::Weights) -> Self {
        Self::new(weights)
    }
}
