//! Discrete-action car kinematics.
use serde::{Deserialize, Serialize};

use crate::constants::{
    CAR_ACCELERATION, CAR_MAX_SPEED, CAR_TURN_RATE_DEG, DRIFT_ALIGNMENT_THRESHOLD, FRICTION,
    MOTION_EPSILON, TIME_STEP,
};
use crate::error::{ActionError, EnvConfigError};
use crate::geometry::Vec2;
use crate::numbers::wrap_degrees;

/// The four discrete controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Accelerate = 0,
    Brake = 1,
    TurnLeft = 2,
    TurnRight = 3,
}

impl Action {
    pub const ALL: [Self; 4] = [Self::Accelerate, Self::Brake, Self::TurnLeft, Self::TurnRight];

    #[must_use]
    pub const fn index(self) -> i64 {
        self as i64
    }
}

impl TryFrom<i64> for Action {
    type Error = ActionError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Accelerate),
            1 => Ok(Self::Brake),
            2 => Ok(Self::TurnLeft),
            3 => Ok(Self::TurnRight),
            other => Err(ActionError::Invalid(other)),
        }
    }
}

impl From<Action> for i64 {
    fn from(value: Action) -> Self {
        value.index()
    }
}

/// Per-car handling stats. Every field is required when deserialized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CarProfile {
    pub acceleration: f64,
    pub turn_rate: f64,
    pub max_speed: f64,
}

impl CarProfile {
    /// # Errors
    ///
    /// Returns `EnvConfigError` when any stat is non-finite or not positive.
    pub fn validate(&self) -> Result<(), EnvConfigError> {
        for (field, value) in [
            ("car.acceleration", self.acceleration),
            ("car.turn_rate", self.turn_rate),
            ("car.max_speed", self.max_speed),
        ] {
            if !value.is_finite() {
                return Err(EnvConfigError::NonFinite { field, value });
            }
            if value <= 0.0 {
                return Err(EnvConfigError::MinViolation {
                    field,
                    min: f64::MIN_POSITIVE,
                    value,
                });
            }
        }
        Ok(())
    }
}

impl Default for CarProfile {
    fn default() -> Self {
        Self {
            acceleration: CAR_ACCELERATION,
            turn_rate: CAR_TURN_RATE_DEG,
            max_speed: CAR_MAX_SPEED,
        }
    }
}

/// Integration constants shared by every car.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicsConfig {
    #[serde(default = "PhysicsConfig::default_friction")]
    pub friction: f64,
    #[serde(default = "PhysicsConfig::default_motion_epsilon")]
    pub motion_epsilon: f64,
    #[serde(default = "PhysicsConfig::default_drift_alignment")]
    pub drift_alignment: f64,
    /// Time step at which one unit of speed moves one world unit.
    #[serde(default = "PhysicsConfig::default_reference_time_step")]
    pub reference_time_step: f64,
}

impl PhysicsConfig {
    const fn default_friction() -> f64 {
        FRICTION
    }

    const fn default_motion_epsilon() -> f64 {
        MOTION_EPSILON
    }

    const fn default_drift_alignment() -> f64 {
        DRIFT_ALIGNMENT_THRESHOLD
    }

    const fn default_reference_time_step() -> f64 {
        TIME_STEP
    }

    /// # Errors
    ///
    /// Returns `EnvConfigError` when a constant is outside its usable range.
    pub fn validate(&self) -> Result<(), EnvConfigError> {
        if !(0.0..=1.0).contains(&self.friction) {
            return Err(EnvConfigError::RangeViolation {
                field: "physics.friction",
                min: 0.0,
                max: 1.0,
                value: self.friction,
            });
        }
        if !(0.0..=1.0).contains(&self.drift_alignment) {
            return Err(EnvConfigError::RangeViolation {
                field: "physics.drift_alignment",
                min: 0.0,
                max: 1.0,
                value: self.drift_alignment,
            });
        }
        if !self.motion_epsilon.is_finite() || self.motion_epsilon < 0.0 {
            return Err(EnvConfigError::MinViolation {
                field: "physics.motion_epsilon",
                min: 0.0,
                value: self.motion_epsilon,
            });
        }
        if !self.reference_time_step.is_finite() || self.reference_time_step <= 0.0 {
            return Err(EnvConfigError::MinViolation {
                field: "physics.reference_time_step",
                min: f64::MIN_POSITIVE,
                value: self.reference_time_step,
            });
        }
        Ok(())
    }
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            friction: Self::default_friction(),
            motion_epsilon: Self::default_motion_epsilon(),
            drift_alignment: Self::default_drift_alignment(),
            reference_time_step: Self::default_reference_time_step(),
        }
    }
}

/// Position, signed speed, and heading (degrees, `[0, 360)`).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CarState {
    pub position: Vec2,
    pub speed: f64,
    pub heading: f64,
}

impl CarState {
    #[must_use]
    pub fn new(position: Vec2, speed: f64, heading: f64) -> Self {
        Self {
            position,
            speed,
            heading: wrap_degrees(heading),
        }
    }
}

/// Result of one integration step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Motion {
    pub state: CarState,
    pub displacement: Vec2,
    /// `1 - alignment` between movement and heading when misaligned, else 0.
    pub drift: f64,
}

/// Stateless integrator for [`CarState`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct KinematicModel {
    physics: PhysicsConfig,
}

impl KinematicModel {
    #[must_use]
    pub const fn new(physics: PhysicsConfig) -> Self {
        Self { physics }
    }

    #[must_use]
    pub const fn physics(&self) -> &PhysicsConfig {
        &self.physics
    }

    /// Apply one action for `dt` seconds.
    #[must_use]
    pub fn advance(&self, state: CarState, profile: &CarProfile, action: Action, dt: f64) -> Motion {
        let friction = self.physics.friction;
        let speed = match action {
            Action::Accelerate => state.speed.mul_add(friction, profile.acceleration),
            Action::Brake => state.speed.mul_add(friction, -profile.acceleration),
            Action::TurnLeft | Action::TurnRight => state.speed * friction,
        }
        .clamp(-profile.max_speed, profile.max_speed);

        let heading = match action {
            Action::TurnLeft => wrap_degrees(state.heading - profile.turn_rate),
            Action::TurnRight => wrap_degrees(state.heading + profile.turn_rate),
            Action::Accelerate | Action::Brake => wrap_degrees(state.heading),
        };

        let mut displacement = Vec2::ZERO;
        let mut drift = 0.0;
        if speed.abs() > self.physics.motion_epsilon {
            let facing = Vec2::from_heading(heading);
            displacement = facing * (speed * dt / self.physics.reference_time_step);
            let length = displacement.length();
            if length > 0.0 {
                let alignment = (displacement * (1.0 / length)).dot(facing);
                if alignment < self.physics.drift_alignment {
                    drift = 1.0 - alignment;
                }
            }
        }

        Motion {
            state: CarState {
                position: state.position + displacement,
                speed,
                heading,
            },
            displacement,
            drift,
        }
    }
}
