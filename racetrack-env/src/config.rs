//! Environment configuration.
//!
//! Every field has a serde default, so `{}` is a valid configuration and
//! partial JSON documents only override what they name.
use serde::{Deserialize, Serialize};

use crate::constants::{
    CHECKPOINT_REACH_ANGLE_DEG, CHECKPOINT_REACH_DISTANCE, MAX_EPISODE_TIME, MAX_STEPS,
    OBS_NOISE_STD, SENSOR_COUNT, SENSOR_MIN_DISTANCE, SENSOR_RANGE, SENSOR_SAMPLES,
    SPAWN_HEADING_JITTER_DEG, SPAWN_MAX_ATTEMPTS, SPAWN_POSITION_JITTER, SPAWN_SPEED, TIME_STEP,
};
use crate::error::{EnvConfigError, EnvError};
use crate::kinematics::{CarProfile, PhysicsConfig};
use crate::numbers::{ceil_to_u64, usize_to_f64};
use crate::reward::ShaperParams;
use crate::track::MapKind;
use crate::trajectory::LoopDetectorConfig;

/// Range sensor layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    #[serde(default = "SensorConfig::default_count")]
    pub count: usize,
    /// Maximum range at scale 1.0.
    #[serde(default = "SensorConfig::default_range")]
    pub range: f64,
    /// First sample distance at scale 1.0.
    #[serde(default = "SensorConfig::default_min_distance")]
    pub min_distance: f64,
    #[serde(default = "SensorConfig::default_samples")]
    pub samples: usize,
}

impl SensorConfig {
    const fn default_count() -> usize {
        SENSOR_COUNT
    }

    const fn default_range() -> f64 {
        SENSOR_RANGE
    }

    const fn default_min_distance() -> f64 {
        SENSOR_MIN_DISTANCE
    }

    const fn default_samples() -> usize {
        SENSOR_SAMPLES
    }

    fn validate(&self) -> Result<(), EnvConfigError> {
        if self.count == 0 {
            return Ok(());
        }
        if !self.range.is_finite() || self.range <= 0.0 {
            return Err(EnvConfigError::MinViolation {
                field: "sensors.range",
                min: f64::MIN_POSITIVE,
                value: self.range,
            });
        }
        if !(0.0..=self.range).contains(&self.min_distance) {
            return Err(EnvConfigError::RangeViolation {
                field: "sensors.min_distance",
                min: 0.0,
                max: self.range,
                value: self.min_distance,
            });
        }
        if self.samples == 0 {
            return Err(EnvConfigError::MinViolation {
                field: "sensors.samples",
                min: 1.0,
                value: usize_to_f64(self.samples),
            });
        }
        Ok(())
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            count: Self::default_count(),
            range: Self::default_range(),
            min_distance: Self::default_min_distance(),
            samples: Self::default_samples(),
        }
    }
}

/// Spawn placement and jitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnConfig {
    /// Jitter the spawn pose on every reset.
    #[serde(default = "SpawnConfig::default_randomize")]
    pub randomize: bool,
    /// Position jitter at scale 1.0, applied independently per axis.
    #[serde(default = "SpawnConfig::default_position_jitter")]
    pub position_jitter: f64,
    #[serde(default = "SpawnConfig::default_heading_jitter")]
    pub heading_jitter: f64,
    #[serde(default = "SpawnConfig::default_speed")]
    pub speed: f64,
    #[serde(default = "SpawnConfig::default_max_attempts")]
    pub max_attempts: u32,
}

impl SpawnConfig {
    const fn default_randomize() -> bool {
        true
    }

    const fn default_position_jitter() -> f64 {
        SPAWN_POSITION_JITTER
    }

    const fn default_heading_jitter() -> f64 {
        SPAWN_HEADING_JITTER_DEG
    }

    const fn default_speed() -> f64 {
        SPAWN_SPEED
    }

    const fn default_max_attempts() -> u32 {
        SPAWN_MAX_ATTEMPTS
    }

    fn validate(&self) -> Result<(), EnvConfigError> {
        for (field, value) in [
            ("spawn.position_jitter", self.position_jitter),
            ("spawn.heading_jitter", self.heading_jitter),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(EnvConfigError::MinViolation {
                    field,
                    min: 0.0,
                    value,
                });
            }
        }
        if !self.speed.is_finite() {
            return Err(EnvConfigError::NonFinite {
                field: "spawn.speed",
                value: self.speed,
            });
        }
        if self.max_attempts == 0 {
            return Err(EnvConfigError::MinViolation {
                field: "spawn.max_attempts",
                min: 1.0,
                value: 0.0,
            });
        }
        Ok(())
    }
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            randomize: Self::default_randomize(),
            position_jitter: Self::default_position_jitter(),
            heading_jitter: Self::default_heading_jitter(),
            speed: Self::default_speed(),
            max_attempts: Self::default_max_attempts(),
        }
    }
}

/// Complete configuration for one [`crate::RaceEnv`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvConfig {
    #[serde(default)]
    pub map: MapKind,
    #[serde(default = "EnvConfig::default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub car: CarProfile,
    #[serde(default)]
    pub physics: PhysicsConfig,
    #[serde(default = "EnvConfig::default_shaper")]
    pub shaper: String,
    #[serde(default)]
    pub shaper_params: ShaperParams,
    #[serde(default = "EnvConfig::default_time_step")]
    pub time_step: f64,
    #[serde(default = "EnvConfig::default_max_steps")]
    pub max_steps: u32,
    /// Simulated seconds before truncation.
    #[serde(default = "EnvConfig::default_max_episode_time")]
    pub max_episode_time: f64,
    /// Standard deviation of Gaussian observation noise; 0 disables it.
    #[serde(default = "EnvConfig::default_observation_noise")]
    pub observation_noise: f64,
    /// Reach radius at scale 1.0.
    #[serde(default = "EnvConfig::default_reach_distance")]
    pub reach_distance: f64,
    /// Maximum heading error, in degrees, for a checkpoint to count.
    #[serde(default = "EnvConfig::default_reach_angle")]
    pub reach_angle: f64,
    #[serde(default)]
    pub spawn: SpawnConfig,
    #[serde(default)]
    pub sensors: SensorConfig,
    #[serde(default)]
    pub loop_detector: LoopDetectorConfig,
    #[serde(default)]
    pub seed: u64,
}

impl EnvConfig {
    #[must_use]
    pub const fn default_scale() -> f64 {
        1.0
    }

    #[must_use]
    pub fn default_shaper() -> String {
        "balanced".to_string()
    }

    #[must_use]
    pub const fn default_time_step() -> f64 {
        TIME_STEP
    }

    #[must_use]
    pub const fn default_max_steps() -> u32 {
        MAX_STEPS
    }

    #[must_use]
    pub const fn default_max_episode_time() -> f64 {
        MAX_EPISODE_TIME
    }

    #[must_use]
    pub const fn default_observation_noise() -> f64 {
        OBS_NOISE_STD
    }

    #[must_use]
    pub const fn default_reach_distance() -> f64 {
        CHECKPOINT_REACH_DISTANCE
    }

    #[must_use]
    pub const fn default_reach_angle() -> f64 {
        CHECKPOINT_REACH_ANGLE_DEG
    }

    /// Default configuration on `map`.
    #[must_use]
    pub fn for_map(map: MapKind) -> Self {
        Self {
            map,
            ..Self::default()
        }
    }

    /// Parse a JSON document and validate it.
    ///
    /// # Errors
    ///
    /// Returns `EnvError::Parse` for malformed JSON or `EnvError::Config` when
    /// a value is out of range.
    pub fn from_json(json: &str) -> Result<Self, EnvError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Number of floats in an observation.
    #[must_use]
    pub const fn observation_len(&self) -> usize {
        crate::env::CORE_OBSERVATION_LEN + self.sensors.count
    }

    /// Most steps an episode can last before a step or time limit truncates it.
    #[must_use]
    pub fn episode_step_limit(&self) -> u64 {
        ceil_to_u64(self.max_episode_time / self.time_step).min(u64::from(self.max_steps))
    }

    /// Whether a sustained loop can end an episode as stagnated before the
    /// step and time limits truncate it.
    #[must_use]
    pub fn stagnation_reachable(&self) -> bool {
        self.loop_detector.steps_to_stagnate() <= self.episode_step_limit()
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns `EnvConfigError` when any field violates the documented bounds.
    pub fn validate(&self) -> Result<(), EnvConfigError> {
        for (field, value) in [
            ("scale", self.scale),
            ("time_step", self.time_step),
            ("max_episode_time", self.max_episode_time),
            ("reach_distance", self.reach_distance),
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
        if self.max_steps == 0 {
            return Err(EnvConfigError::MinViolation {
                field: "max_steps",
                min: 1.0,
                value: 0.0,
            });
        }
        if !self.observation_noise.is_finite() || self.observation_noise < 0.0 {
            return Err(EnvConfigError::MinViolation {
                field: "observation_noise",
                min: 0.0,
                value: self.observation_noise,
            });
        }
        if !(self.reach_angle > 0.0 && self.reach_angle <= 180.0) {
            return Err(EnvConfigError::RangeViolation {
                field: "reach_angle",
                min: 0.0,
                max: 180.0,
                value: self.reach_angle,
            });
        }
        self.car.validate()?;
        self.physics.validate()?;
        self.spawn.validate()?;
        self.sensors.validate()?;
        self.loop_detector.validate()?;
        Ok(())
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            map: MapKind::default(),
            scale: Self::default_scale(),
            car: CarProfile::default(),
            physics: PhysicsConfig::default(),
            shaper: Self::default_shaper(),
            shaper_params: ShaperParams::new(),
            time_step: Self::default_time_step(),
            max_steps: Self::default_max_steps(),
            max_episode_time: Self::default_max_episode_time(),
            observation_noise: Self::default_observation_noise(),
            reach_distance: Self::default_reach_distance(),
            reach_angle: Self::default_reach_angle(),
            spawn: SpawnConfig::default(),
            sensors: SensorConfig::default(),
            loop_detector: LoopDetectorConfig::default(),
            seed: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let config = EnvConfig::from_json("{}").unwrap();
        assert_eq!(config, EnvConfig::default());
        assert_eq!(config.observation_len(), 15);
        assert_eq!(config.spawn.max_attempts, 10);
        assert_eq!(config.loop_detector.sample_stride, 1);
    }

    #[test]
    fn default_episode_leaves_room_to_stagnate() {
        let config = EnvConfig::default();
        assert_eq!(config.episode_step_limit(), 150);
        assert!(config.stagnation_reachable());

        let mut sparse = EnvConfig::default();
        sparse.loop_detector.sample_stride = 10;
        assert!(!sparse.stagnation_reachable());

        let short = EnvConfig {
            max_steps: 20,
            ..EnvConfig::default()
        };
        assert_eq!(short.episode_step_limit(), 20);
        assert!(!short.stagnation_reachable());
    }

    #[test]
    fn partial_json_overrides() {
        let config = EnvConfig::from_json(
            r#"{"map": "circle", "scale": 1.5, "sensors": {"count": 4}, "shaper": "safety"}"#,
        )
        .unwrap();
        assert_eq!(config.map, MapKind::Circle);
        assert!((config.scale - 1.5).abs() < f64::EPSILON);
        assert_eq!(config.sensors.count, 4);
        assert_eq!(config.sensors.samples, 20);
        assert_eq!(config.shaper, "safety");
    }

    #[test]
    fn unknown_map_falls_back_to_open() {
        let config = EnvConfig::from_json(r#"{"map": "spiral"}"#).unwrap();
        assert_eq!(config.map, MapKind::Open);
    }

    #[test]
    fn car_profile_missing_key_is_a_parse_error() {
        let err = EnvConfig::from_json(r#"{"car": {"acceleration": 1.0}}"#).unwrap_err();
        assert!(matches!(err, EnvError::Parse(_)));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let config = EnvConfig {
            scale: 0.0,
            ..EnvConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(EnvConfigError::MinViolation { field, .. }) if field == "scale"
        ));

        let config = EnvConfig {
            reach_angle: 270.0,
            ..EnvConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(EnvConfigError::RangeViolation { field, .. }) if field == "reach_angle"
        ));

        let config = EnvConfig {
            observation_noise: f64::NAN,
            ..EnvConfig::default()
        };
        assert!(config.validate().is_err());

        let mut config = EnvConfig::default();
        config.sensors.min_distance = 500.0;
        assert!(matches!(
            config.validate(),
            Err(EnvConfigError::RangeViolation { field, .. }) if field == "sensors.min_distance"
        ));
    }

    #[test]
    fn serializes_round_trip() {
        let config = EnvConfig::for_map(MapKind::Curve);
        let json = serde_json::to_string(&config).unwrap();
        let parsed = EnvConfig::from_json(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
