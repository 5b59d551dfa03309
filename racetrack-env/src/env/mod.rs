//! Episode orchestration: the `reset` / `step` contract.
//!
//! [`RaceEnv`] composes the track, the kinematic model, the loop detector,
//! and a reward shaper. One instance is single-owner and never resets itself;
//! callers decide when a finished episode starts over.

mod observation;
mod progress;

pub use observation::{CORE_OBSERVATION_LEN, Observation, sensor_readings};
pub use progress::EpisodeProgress;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::EnvConfig;
use crate::error::EnvError;
use crate::geometry::Vec2;
use crate::kinematics::{Action, CarProfile, CarState, KinematicModel};
use crate::numbers::angle_between;
use crate::reward::{RewardShaper, ShaperRegistry, Transition};
use crate::rng::{RngBundle, symmetric_jitter};
use crate::track::{Surface, Track};
use crate::trajectory::LoopDetector;

/// Reaching a checkpoint this close counts regardless of heading.
const ARRIVAL_EPSILON: f64 = 1e-6;

/// Lifecycle of an environment instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvPhase {
    Uninitialized,
    Ready,
    Finished,
}

/// Why an episode stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeEnd {
    Completed,
    LeftTrack,
    Stagnated,
    StepLimit,
    TimeLimit,
}

impl EpisodeEnd {
    /// Terminal outcomes set `terminated`; limits set `truncated`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::LeftTrack | Self::Stagnated)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::LeftTrack => "left_track",
            Self::Stagnated => "stagnated",
            Self::StepLimit => "step_limit",
            Self::TimeLimit => "time_limit",
        }
    }
}

impl fmt::Display for EpisodeEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostics from a reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResetInfo {
    pub attempts: u32,
    pub spawn: Vec2,
    pub heading: f64,
    pub checkpoints: usize,
}

/// The fixed per-step info record.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StepInfo {
    /// Times the car left the drivable region this episode.
    pub collisions: u32,
    pub episode_time: f64,
    /// Index of the next checkpoint.
    pub checkpoint: usize,
    /// A checkpoint was reached on this step.
    pub success: bool,
    /// Distinct checkpoints reached this episode. Checkpoints are taken in
    /// order, so this always equals `checkpoint`.
    pub progress: usize,
}

/// Result of one `step`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub observation: Observation,
    pub reward: f64,
    pub terminated: bool,
    pub truncated: bool,
    pub info: StepInfo,
    pub end: Option<EpisodeEnd>,
}

impl StepOutcome {
    #[must_use]
    pub const fn done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// A single racing environment.
#[derive(Debug)]
pub struct RaceEnv {
    config: EnvConfig,
    track: Track,
    model: KinematicModel,
    car: CarState,
    shaper: Box<dyn RewardShaper>,
    detector: LoopDetector,
    progress: EpisodeProgress,
    rng: RngBundle,
    phase: EnvPhase,
}

impl RaceEnv {
    /// Build an environment using the built-in reward shapers.
    ///
    /// # Errors
    ///
    /// Returns `EnvError::Config` for invalid settings or `EnvError::Reward`
    /// when the configured shaper cannot be built.
    pub fn new(config: EnvConfig) -> Result<Self, EnvError> {
        Self::with_registry(config, &ShaperRegistry::with_builtins())
    }

    /// Build an environment resolving the shaper name against `registry`.
    ///
    /// # Errors
    ///
    /// Returns `EnvError::Config` for invalid settings or `EnvError::Reward`
    /// when the configured shaper cannot be built.
    pub fn with_registry(config: EnvConfig, registry: &ShaperRegistry) -> Result<Self, EnvError> {
        config.validate()?;
        let shaper = registry.create(&config.shaper, &config.shaper_params)?;
        if !config.stagnation_reachable() {
            warn!(
                "loop detector needs {} steps to flag stagnation but episodes end after {}",
                config.loop_detector.steps_to_stagnate(),
                config.episode_step_limit()
            );
        }
        let track = Track::build(config.map, config.scale);
        let car = CarState::new(track.spawn(), config.spawn.speed, track.spawn_heading());
        Ok(Self {
            model: KinematicModel::new(config.physics),
            detector: LoopDetector::new(config.loop_detector.clone()),
            rng: RngBundle::from_user_seed(config.seed),
            track,
            car,
            shaper,
            progress: EpisodeProgress::default(),
            phase: EnvPhase::Uninitialized,
            config,
        })
    }

    /// Re-derive every RNG stream from `seed`.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = RngBundle::from_user_seed(seed);
    }

    /// Start a new episode.
    ///
    /// # Errors
    ///
    /// Returns `EnvError::SpawnExhausted` when no drivable spawn pose is found
    /// within the configured attempts.
    pub fn reset(&mut self, randomize_checkpoints: bool) -> Result<(Observation, ResetInfo), EnvError> {
        let spawn = self.config.spawn.clone();
        let scale = self.track.scale();
        let mut placed = None;
        for attempt in 1..=spawn.max_attempts {
            let (position, heading) = if spawn.randomize {
                let rng = self.rng.spawn();
                let dx = symmetric_jitter(rng, spawn.position_jitter * scale);
                let dy = symmetric_jitter(rng, spawn.position_jitter * scale);
                let dh = symmetric_jitter(rng, spawn.heading_jitter);
                (self.track.spawn() + Vec2::new(dx, dy), self.track.spawn_heading() + dh)
            } else {
                (self.track.spawn(), self.track.spawn_heading())
            };
            if self.track.is_drivable(position) {
                placed = Some((attempt, position, heading));
                break;
            }
            debug!("spawn attempt {attempt} at {position:?} is not drivable");
        }
        let Some((attempts, position, heading)) = placed else {
            return Err(EnvError::SpawnExhausted {
                attempts: spawn.max_attempts,
                map: self.track.kind(),
            });
        };

        self.car = CarState::new(position, spawn.speed, heading);
        self.track
            .reroll_checkpoints(randomize_checkpoints, self.rng.checkpoints());
        self.progress = EpisodeProgress::default();
        let target = self.progress.target(self.track.checkpoints());
        self.progress.prev_distance = target.map(|t| position.distance(t));
        self.shaper.reset();
        self.detector.reset();
        self.phase = EnvPhase::Ready;
        debug!(
            "reset {} after {attempts} attempt(s): spawn {position:?}, heading {:.1}",
            self.track.kind(),
            self.car.heading
        );

        let info = ResetInfo {
            attempts,
            spawn: position,
            heading: self.car.heading,
            checkpoints: self.track.checkpoints().len(),
        };
        Ok((self.observation(), info))
    }

    /// Step with a raw action index.
    ///
    /// # Errors
    ///
    /// Returns `EnvError::Action` for indices outside `0..=3`, plus the
    /// errors of [`RaceEnv::step_action`].
    pub fn step(&mut self, action: i64) -> Result<StepOutcome, EnvError> {
        let action = Action::try_from(action)?;
        self.step_action(action)
    }

    /// Advance the simulation by one time step.
    ///
    /// # Errors
    ///
    /// Returns `EnvError::NotReset` before the first reset and
    /// `EnvError::EpisodeFinished` after a terminal or truncated step.
    pub fn step_action(&mut self, action: Action) -> Result<StepOutcome, EnvError> {
        match self.phase {
            EnvPhase::Uninitialized => return Err(EnvError::NotReset),
            EnvPhase::Finished => return Err(EnvError::EpisodeFinished),
            EnvPhase::Ready => {}
        }

        let dt = self.config.time_step;
        self.progress.step = self.progress.step.saturating_add(1);
        self.progress.episode_time = f64::from(self.progress.step) * dt;

        let motion = self.model.advance(self.car, &self.config.car, action, dt);
        self.car = motion.state;

        let surface = self.track.classify(self.car.position);
        let off_track = surface != Surface::Drivable;
        if off_track {
            self.progress.collisions = self.progress.collisions.saturating_add(1);
        }

        let checkpoints = self.track.checkpoints();
        let target = self.progress.target(checkpoints);
        let progress_delta =
            self.progress
                .advance_toward(self.car.position, target, self.config.car.max_speed);

        let mut success = false;
        if !off_track
            && let Some(checkpoint) = checkpoints.get(self.progress.checkpoint_index).copied()
            && self.reached(checkpoint)
        {
            self.progress.checkpoint_index += 1;
            success = true;
            // Reaching a checkpoint clears loop suspicion.
            self.detector.reset();
            self.progress.prev_distance = self
                .progress
                .target(checkpoints)
                .map(|t| self.car.position.distance(t));
            debug!(
                "checkpoint {}/{} reached at step {}",
                self.progress.checkpoint_index,
                checkpoints.len(),
                self.progress.step
            );
        }
        let total_checkpoints = checkpoints.len();

        self.detector.observe(self.progress.step, self.car.position);
        let stagnated = self.detector.is_stagnated();

        let transition = Transition {
            position: self.car.position,
            velocity: self.car.speed,
            heading: self.car.heading,
            checkpoint_index: self.progress.checkpoint_index,
            total_checkpoints,
            collision: surface == Surface::Barrier,
            out_of_bounds: surface == Surface::OutOfBounds,
            progress: progress_delta,
            last_velocity: self.progress.last_velocity,
            drift: motion.drift,
            loop_score: self.detector.loop_score(),
            stagnated,
        };
        let reward = self.shaper.compute_reward(&transition);
        self.progress.last_velocity = Some(self.car.speed);

        let end = if off_track {
            Some(EpisodeEnd::LeftTrack)
        } else if self.progress.finished_course(total_checkpoints) {
            Some(EpisodeEnd::Completed)
        } else if stagnated {
            Some(EpisodeEnd::Stagnated)
        } else if self.progress.step >= self.config.max_steps {
            Some(EpisodeEnd::StepLimit)
        } else if self.progress.episode_time >= self.config.max_episode_time {
            Some(EpisodeEnd::TimeLimit)
        } else {
            None
        };
        if let Some(end) = end {
            self.phase = EnvPhase::Finished;
            debug!(
                "episode ended ({end}) after {} steps, {}/{} checkpoints",
                self.progress.step, self.progress.checkpoint_index, total_checkpoints
            );
        }

        let info = StepInfo {
            collisions: self.progress.collisions,
            episode_time: self.progress.episode_time,
            checkpoint: self.progress.checkpoint_index,
            success,
            progress: self.progress.reached().len(),
        };
        Ok(StepOutcome {
            observation: self.observation(),
            reward,
            terminated: end.is_some_and(EpisodeEnd::is_terminal),
            truncated: end.is_some_and(|e| !e.is_terminal()),
            info,
            end,
        })
    }

    #[must_use]
    pub const fn car(&self) -> &CarState {
        &self.car
    }

    #[must_use]
    pub const fn profile(&self) -> &CarProfile {
        &self.config.car
    }

    #[must_use]
    pub const fn track(&self) -> &Track {
        &self.track
    }

    #[must_use]
    pub fn checkpoints(&self) -> &[Vec2] {
        self.track.checkpoints()
    }

    #[must_use]
    pub const fn checkpoint_index(&self) -> usize {
        self.progress.checkpoint_index
    }

    #[must_use]
    pub const fn progress(&self) -> &EpisodeProgress {
        &self.progress
    }

    #[must_use]
    pub const fn phase(&self) -> EnvPhase {
        self.phase
    }

    #[must_use]
    pub const fn loop_detector(&self) -> &LoopDetector {
        &self.detector
    }

    #[must_use]
    pub fn shaper_name(&self) -> &str {
        self.shaper.name()
    }

    #[must_use]
    pub const fn config(&self) -> &EnvConfig {
        &self.config
    }

    #[must_use]
    pub const fn observation_len(&self) -> usize {
        self.config.observation_len()
    }

    /// Within reach distance and roughly facing the checkpoint, or on top of it.
    fn reached(&self, checkpoint: Vec2) -> bool {
        let distance = self.car.position.distance(checkpoint);
        if distance <= ARRIVAL_EPSILON {
            return true;
        }
        let bearing = self.car.position.bearing_to(checkpoint);
        distance < self.config.reach_distance * self.track.scale()
            && angle_between(self.car.heading, bearing) < self.config.reach_angle
    }

    fn observation(&mut self) -> Observation {
        let target = self.progress.target(self.track.checkpoints());
        observation::observe(
            &self.track,
            &self.car,
            &self.config.car,
            target,
            &self.config.sensors,
            self.config.observation_noise,
            self.rng.noise(),
        )
    }
}
