//! Centralized layout and tuning constants for the racetrack simulation.
//!
//! Every value here is expressed at scale 1.0 and is multiplied by the
//! configured scale factor where it describes a length. Components never read
//! these directly at runtime; they seed the `Default` impls of the
//! configuration structs so each environment instance can be tuned on its own.

// World --------------------------------------------------------------------
pub(crate) const WORLD_WIDTH: f64 = 800.0;
pub(crate) const WORLD_HEIGHT: f64 = 600.0;
pub(crate) const BOUNDARY_EPSILON: f64 = 1e-6;

// Corridor layout ----------------------------------------------------------
pub(crate) const CORRIDOR_RECT: [f64; 4] = [100.0, 200.0, 600.0, 200.0];
pub(crate) const CORRIDOR_BARRIERS: [[f64; 4]; 2] = [
    [90.0, 200.0, 10.0, 200.0],
    [700.0, 200.0, 10.0, 200.0],
];
pub(crate) const CORRIDOR_CHECKPOINT: [f64; 2] = [700.0, 300.0];
pub(crate) const CORRIDOR_CHECKPOINT_Y_RANGE: (f64, f64) = (220.0, 380.0);

// Curve layout -------------------------------------------------------------
pub(crate) const CURVE_RECTS: [[f64; 4]; 2] = [
    [100.0, 200.0, 400.0, 200.0],
    [300.0, 20.0, 200.0, 380.0],
];
pub(crate) const CURVE_BARRIERS: [[f64; 4]; 2] = [
    [90.0, 200.0, 10.0, 200.0],
    [300.0, 10.0, 200.0, 10.0],
];
pub(crate) const CURVE_CHECKPOINTS: [[f64; 2]; 2] = [[400.0, 300.0], [400.0, 80.0]];
pub(crate) const CURVE_FIRST_Y_RANGE: (f64, f64) = (260.0, 340.0);
pub(crate) const CURVE_SECOND_X_RANGE: (f64, f64) = (340.0, 460.0);

// Circle layout ------------------------------------------------------------
pub(crate) const CIRCLE_CENTER: [f64; 2] = [400.0, 300.0];
pub(crate) const CIRCLE_INNER_RADIUS: f64 = 150.0;
pub(crate) const CIRCLE_OUTER_RADIUS: f64 = 250.0;
pub(crate) const CIRCLE_CHECKPOINT_RADIUS: f64 = 200.0;
pub(crate) const CIRCLE_CHECKPOINT_COUNT: usize = 4;
pub(crate) const CIRCLE_ANGLE_JITTER_DEG: f64 = 10.0;
pub(crate) const CIRCLE_SPAWN_ANGLE_DEG: f64 = -30.0;

// Spawn --------------------------------------------------------------------
pub(crate) const SPAWN_POINT: [f64; 2] = [150.0, 300.0];
pub(crate) const SPAWN_POSITION_JITTER: f64 = 20.0;
pub(crate) const SPAWN_HEADING_JITTER_DEG: f64 = 10.0;
pub(crate) const SPAWN_SPEED: f64 = 1.0;
pub(crate) const SPAWN_MAX_ATTEMPTS: u32 = 10;

// Car profile --------------------------------------------------------------
pub(crate) const CAR_ACCELERATION: f64 = 0.5;
pub(crate) const CAR_TURN_RATE_DEG: f64 = 5.0;
pub(crate) const CAR_MAX_SPEED: f64 = 20.0;

// Physics ------------------------------------------------------------------
pub(crate) const FRICTION: f64 = 0.98;
pub(crate) const MOTION_EPSILON: f64 = 0.01;
pub(crate) const DRIFT_ALIGNMENT_THRESHOLD: f64 = 0.98;
pub(crate) const TIME_STEP: f64 = 0.1;

// Episode ------------------------------------------------------------------
pub(crate) const MAX_STEPS: u32 = 1_000;
pub(crate) const MAX_EPISODE_TIME: f64 = 15.0;
pub(crate) const OBS_NOISE_STD: f64 = 0.01;
pub(crate) const CHECKPOINT_REACH_DISTANCE: f64 = 20.0;
pub(crate) const CHECKPOINT_REACH_ANGLE_DEG: f64 = 30.0;

// Sensors ------------------------------------------------------------------
pub(crate) const SENSOR_COUNT: usize = 8;
pub(crate) const SENSOR_RANGE: f64 = 100.0;
pub(crate) const SENSOR_MIN_DISTANCE: f64 = 5.0;
pub(crate) const SENSOR_SAMPLES: usize = 20;

// Loop detection -----------------------------------------------------------
pub(crate) const LOOP_HISTORY_CAPACITY: usize = 100;
pub(crate) const LOOP_SAMPLE_STRIDE: u32 = 1;
pub(crate) const LOOP_MIN_SAMPLES: usize = 30;
pub(crate) const LOOP_DISPLACEMENT_RATIO: f64 = 0.1;
pub(crate) const LOOP_STRAIGHT_RATIO: f64 = 0.9;
pub(crate) const LOOP_SPECTRAL_PEAK_LIMIT: usize = 3;
pub(crate) const LOOP_CORRELATION_THRESHOLD: f64 = 0.7;
pub(crate) const LOOP_CORRELATION_PEAK_LIMIT: usize = 2;
pub(crate) const LOOP_CORRELATION_GUARD_LAGS: usize = 5;
pub(crate) const LOOP_SCORE_SCALE: f64 = 10.0;
pub(crate) const LOOP_STAGNATION_LIMIT: u32 = 5;
pub(crate) const ZSCORE_EPSILON: f64 = 1e-8;
pub(crate) const TRAVEL_EPSILON: f64 = 1e-6;

// Reward defaults ----------------------------------------------------------
pub(crate) const SPEED_NORMALIZER: f64 = 20.0;
pub(crate) const DRIFT_PENALTY_FACTOR: f64 = 0.5;
pub(crate) const LOOP_PENALTY_FACTOR: f64 = 1.0;
pub(crate) const STAGNATION_PENALTY: f64 = -50.0;
pub(crate) const SMOOTH_ACCELERATION_LIMIT: f64 = 2.0;
