//! Pluggable reward shaping.
//!
//! A [`RewardShaper`] turns one [`Transition`] into a scalar reward. Shapers
//! are the only place rewards are computed: the environment reports raw
//! signals (drift, loop score, stagnation) and every built-in shaper folds
//! them in through [`ExploitPenalties`].

mod balanced;
mod registry;
mod safety;
mod speed;

pub use balanced::{BalancedShaper, BalancedWeights};
pub use registry::{ShaperFactory, ShaperParams, ShaperRegistry};
pub use safety::{SafetyShaper, SafetyWeights};
pub use speed::{SpeedShaper, SpeedWeights};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt::Debug;

use crate::constants::{DRIFT_PENALTY_FACTOR, LOOP_PENALTY_FACTOR, STAGNATION_PENALTY};
use crate::geometry::Vec2;
use crate::numbers::usize_to_f64;

/// Everything a shaper may look at for one step.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Transition {
    pub position: Vec2,
    /// Signed speed after the step.
    pub velocity: f64,
    pub heading: f64,
    /// Index of the next checkpoint to reach (equals the count reached so far).
    pub checkpoint_index: usize,
    pub total_checkpoints: usize,
    pub collision: bool,
    pub out_of_bounds: bool,
    /// Normalized distance closed toward the current target; may be negative.
    pub progress: f64,
    pub last_velocity: Option<f64>,
    pub drift: f64,
    pub loop_score: f64,
    pub stagnated: bool,
}

/// Capability set every reward strategy provides.
pub trait RewardShaper: Debug + Send {
    fn name(&self) -> &str;

    /// Reward for one transition. Finite for finite inputs.
    fn compute_reward(&mut self, transition: &Transition) -> f64;

    /// Clear per-episode state. Calling it twice equals calling it once.
    fn reset(&mut self);
}

/// Shapers that can be built by name from a JSON parameter map.
pub trait ConfigurableShaper: RewardShaper + Sized + 'static {
    type Weights: DeserializeOwned + NamedWeights;

    fn from_weights(weights: Self::Weights) -> Self;
}

/// Lists the numeric weights of a parameter set so they can be range-checked.
pub trait NamedWeights {
    fn named_weights(&self) -> SmallVec<[(&'static str, f64); 12]>;
}

/// Penalties for degenerate driving, shared by the built-in shapers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExploitPenalties {
    #[serde(default = "ExploitPenalties::default_drift_factor")]
    pub drift_factor: f64,
    #[serde(default = "ExploitPenalties::default_loop_factor")]
    pub loop_factor: f64,
    #[serde(default = "ExploitPenalties::default_stagnation_penalty")]
    pub stagnation_penalty: f64,
}

impl ExploitPenalties {
    const fn default_drift_factor() -> f64 {
        DRIFT_PENALTY_FACTOR
    }

    const fn default_loop_factor() -> f64 {
        LOOP_PENALTY_FACTOR
    }

    const fn default_stagnation_penalty() -> f64 {
        STAGNATION_PENALTY
    }

    /// No exploit penalties at all.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            drift_factor: 0.0,
            loop_factor: 0.0,
            stagnation_penalty: 0.0,
        }
    }

    /// Combined (non-positive for non-negative factors) exploit term.
    #[must_use]
    pub fn apply(&self, transition: &Transition) -> f64 {
        let mut penalty = -self.drift_factor * transition.drift;
        penalty -= self.loop_factor * transition.loop_score;
        if transition.stagnated {
            penalty += self.stagnation_penalty;
        }
        penalty
    }

    fn push_named(&self, out: &mut SmallVec<[(&'static str, f64); 12]>) {
        out.push(("exploits.drift_factor", self.drift_factor));
        out.push(("exploits.loop_factor", self.loop_factor));
        out.push(("exploits.stagnation_penalty", self.stagnation_penalty));
    }
}

impl Default for ExploitPenalties {
    fn default() -> Self {
        Self {
            drift_factor: Self::default_drift_factor(),
            loop_factor: Self::default_loop_factor(),
            stagnation_penalty: Self::default_stagnation_penalty(),
        }
    }
}

/// Tracks the last checkpoint index already paid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CheckpointLedger {
    last_rewarded: usize,
}

impl CheckpointLedger {
    /// Number of newly reached indices since the last claim; 0 if none.
    pub fn claim(&mut self, index: usize) -> usize {
        if index > self.last_rewarded {
            let skipped = index - self.last_rewarded;
            self.last_rewarded = index;
            skipped
        } else {
            0
        }
    }

    /// Bonus for newly reached checkpoints at `per_checkpoint` each.
    pub fn bonus(&mut self, index: usize, per_checkpoint: f64) -> f64 {
        per_checkpoint * usize_to_f64(self.claim(index))
    }

    #[must_use]
    pub const fn last_rewarded(&self) -> usize {
        self.last_rewarded
    }

    pub fn reset(&mut self) {
        self.last_rewarded = 0;
    }
}
