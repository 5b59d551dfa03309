//! Racetrack Environment
//!
//! Headless 2D racing environment for reinforcement-learning agents. A car
//! with simple kinematics drives over a procedurally laid-out track, collects
//! ordered checkpoints, and is rewarded by a pluggable reward shaper. This
//! crate has no rendering or platform dependencies.

pub(crate) mod constants;

pub mod config;
pub mod curriculum;
pub mod env;
pub mod error;
pub mod geometry;
pub mod kinematics;
pub mod metrics;
pub mod multi;
pub mod numbers;
pub mod reward;
pub mod rng;
pub mod track;
pub mod trajectory;

// Re-export commonly used types
pub use config::{EnvConfig, SensorConfig, SpawnConfig};
pub use curriculum::{Curriculum, CurriculumPhase, CurriculumTracker, PhaseReport};
pub use env::{
    CORE_OBSERVATION_LEN, EnvPhase, EpisodeEnd, Observation, RaceEnv, ResetInfo, StepInfo,
    StepOutcome,
};
pub use error::{ActionError, EnvConfigError, EnvError, RewardError};
pub use geometry::{Rect, Vec2};
pub use kinematics::{Action, CarProfile, CarState, KinematicModel, Motion, PhysicsConfig};
pub use metrics::{EpisodeLedger, EpisodeRecord, EpisodeTally};
pub use multi::{MultiEnv, MultiStep};
pub use reward::{
    BalancedShaper, BalancedWeights, ConfigurableShaper, ExploitPenalties, RewardShaper,
    SafetyShaper, SafetyWeights, ShaperRegistry, SpeedShaper, SpeedWeights, Transition,
};
pub use rng::RngBundle;
pub use track::{Boundary, MapKind, Surface, Track};
pub use trajectory::{LoopDetector, LoopDetectorConfig, LoopHeuristic, LoopReport};
