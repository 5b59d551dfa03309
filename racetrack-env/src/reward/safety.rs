use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::{CheckpointLedger, ConfigurableShaper, ExploitPenalties, NamedWeights, RewardShaper, Transition};
use crate::constants::SMOOTH_ACCELERATION_LIMIT;

/// Weights for [`SafetyShaper`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SafetyWeights {
    #[serde(default = "SafetyWeights::default_collision_penalty")]
    pub collision_penalty: f64,
    #[serde(default = "SafetyWeights::default_out_of_bounds_penalty")]
    pub out_of_bounds_penalty: f64,
    /// Flat reward for every step spent driving.
    #[serde(default = "SafetyWeights::default_smooth_driving_reward")]
    pub smooth_driving_reward: f64,
    #[serde(default = "SafetyWeights::default_checkpoint_bonus")]
    pub checkpoint_bonus: f64,
    #[serde(default = "SafetyWeights::default_smooth_acceleration_bonus")]
    pub smooth_acceleration_bonus: f64,
    #[serde(default = "SafetyWeights::default_abrupt_acceleration_factor")]
    pub abrupt_acceleration_factor: f64,
    /// Speed change per step below which acceleration counts as smooth.
    #[serde(default = "SafetyWeights::default_smooth_acceleration_limit")]
    pub smooth_acceleration_limit: f64,
    #[serde(default)]
    pub exploits: ExploitPenalties,
}

impl SafetyWeights {
    const fn default_collision_penalty() -> f64 {
        -200.0
    }

    const fn default_out_of_bounds_penalty() -> f64 {
        -150.0
    }

    const fn default_smooth_driving_reward() -> f64 {
        2.0
    }

    const fn default_checkpoint_bonus() -> f64 {
        100.0
    }

    const fn default_smooth_acceleration_bonus() -> f64 {
        1.0
    }

    const fn default_abrupt_acceleration_factor() -> f64 {
        0.5
    }

    const fn default_smooth_acceleration_limit() -> f64 {
        SMOOTH_ACCELERATION_LIMIT
    }
}

impl Default for SafetyWeights {
    fn default() -> Self {
        Self {
            collision_penalty: Self::default_collision_penalty(),
            out_of_bounds_penalty: Self::default_out_of_bounds_penalty(),
            smooth_driving_reward: Self::default_smooth_driving_reward(),
            checkpoint_bonus: Self::default_checkpoint_bonus(),
            smooth_acceleration_bonus: Self::default_smooth_acceleration_bonus(),
            abrupt_acceleration_factor: Self::default_abrupt_acceleration_factor(),
            smooth_acceleration_limit: Self::default_smooth_acceleration_limit(),
            exploits: ExploitPenalties::default(),
        }
    }
}

impl NamedWeights for SafetyWeights {
    fn named_weights(&self) -> SmallVec<[(&'static str, f64); 12]> {
        let mut out = SmallVec::new();
        out.push(("collision_penalty", self.collision_penalty));
        out.push(("out_of_bounds_penalty", self.out_of_bounds_penalty));
        out.push(("smooth_driving_reward", self.smooth_driving_reward));
        out.push(("checkpoint_bonus", self.checkpoint_bonus));
        out.push(("smooth_acceleration_bonus", self.smooth_acceleration_bonus));
        out.push(("abrupt_acceleration_factor", self.abrupt_acceleration_factor));
        out.push(("smooth_acceleration_limit", self.smooth_acceleration_limit));
        self.exploits.push_named(&mut out);
        out
    }
}

/// Cautious driving: a per-step baseline, severe crash penalties, and a
/// preference for gentle speed changes.
#[derive(Debug, Clone, Default)]
pub struct SafetyShaper {
    weights: SafetyWeights,
    checkpoints: CheckpointLedger,
}

impl SafetyShaper {
    #[must_use]
    pub fn new(weights: SafetyWeights) -> Self {
        Self {
            weights,
            checkpoints: CheckpointLedger::default(),
        }
    }

    #[must_use]
    pub const fn weights(&self) -> &SafetyWeights {
        &self.weights
    }
}

impl RewardShaper for SafetyShaper {
    fn name(&self) -> &str {
        "safety"
    }

    fn compute_reward(&mut self, t: &Transition) -> f64 {
        let w = &self.weights;
        let mut reward = w.smooth_driving_reward;
        if t.collision {
            reward += w.collision_penalty;
        }
        if t.out_of_bounds {
            reward += w.out_of_bounds_penalty;
        }
        reward += self.checkpoints.bonus(t.checkpoint_index, w.checkpoint_bonus);
        if let Some(last) = t.last_velocity {
            let acceleration = (t.velocity - last).abs();
            if acceleration < w.smooth_acceleration_limit {
                reward += w.smooth_acceleration_bonus;
            } else {
                reward -= acceleration * w.abrupt_acceleration_factor;
            }
        }
        reward + w.exploits.apply(t)
    }

    fn reset(&mut self) {
        self.checkpoints.reset();
    }
}

impl ConfigurableShaper for SafetyShaper {
    type Weights = SafetyWeights;

    fn from_weights(weights: Self::Weights) -> Self {
        Self::new(weights)
    }
}
