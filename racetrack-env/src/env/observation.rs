//! Observation vector assembly and range sensors.
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::Deref;

use crate::config::SensorConfig;
use crate::geometry::Vec2;
use crate::kinematics::{CarProfile, CarState};
use crate::numbers::{clamp_f64_to_f32, usize_to_f64};
use crate::rng::standard_normal;
use crate::track::Track;

/// Number of non-sensor values at the front of every observation.
pub const CORE_OBSERVATION_LEN: usize = 7;

/// Flat `f32` observation: seven core values followed by sensor readings.
///
/// Layout: `x / width`, `y / height`, `speed / max_speed`, `sin(heading)`,
/// `cos(heading)`, then the vector to the target checkpoint divided by
/// `(width, height)`, then one reading per sensor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Observation(Vec<f32>);

impl Observation {
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    #[must_use]
    pub fn core(&self) -> &[f32] {
        &self.0[..CORE_OBSERVATION_LEN.min(self.0.len())]
    }

    #[must_use]
    pub fn sensors(&self) -> &[f32] {
        &self.0[CORE_OBSERVATION_LEN.min(self.0.len())..]
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<f32> {
        self.0
    }
}

impl Deref for Observation {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.0
    }
}

/// Normalized distance to the first non-drivable sample along each ray, or 1.0.
#[must_use]
pub fn sensor_readings(track: &Track, state: &CarState, sensors: &SensorConfig) -> Vec<f64> {
    let scale = track.scale();
    let range = sensors.range * scale;
    let near = sensors.min_distance * scale;
    let steps = sensors.samples.saturating_sub(1);
    let count = usize_to_f64(sensors.count);
    (0..sensors.count)
        .map(|i| {
            let direction = Vec2::from_heading(state.heading + 360.0 * usize_to_f64(i) / count);
            (0..sensors.samples)
                .map(|s| {
                    if steps == 0 {
                        near
                    } else {
                        near + (range - near) * usize_to_f64(s) / usize_to_f64(steps)
                    }
                })
                .find(|d| !track.is_drivable(state.position + direction * *d))
                .map_or(1.0, |d| d / range)
        })
        .collect()
}

/// Vector from the car to `target`, or zero when there is none.
fn target_offset(state: &CarState, target: Option<Vec2>) -> Vec2 {
    target.map_or(Vec2::ZERO, |t| t - state.position)
}

/// Assemble an observation, adding Gaussian noise of `noise_std` when positive.
pub(crate) fn observe<R: Rng + ?Sized>(
    track: &Track,
    state: &CarState,
    profile: &CarProfile,
    target: Option<Vec2>,
    sensors: &SensorConfig,
    noise_std: f64,
    rng: &mut R,
) -> Observation {
    let width = track.width();
    let height = track.height();
    let heading = state.heading.to_radians();
    let offset = target_offset(state, target);
    let mut values = Vec::with_capacity(CORE_OBSERVATION_LEN + sensors.count);
    values.extend([
        state.position.x / width,
        state.position.y / height,
        state.speed / profile.max_speed,
        heading.sin(),
        heading.cos(),
        offset.x / width,
        offset.y / height,
    ]);
    values.extend(sensor_readings(track, state, sensors));
    if noise_std > 0.0 {
        for value in &mut values {
            *value += noise_std * standard_normal(rng);
        }
    }
    Observation(values.into_iter().map(clamp_f64_to_f32).collect())
}
