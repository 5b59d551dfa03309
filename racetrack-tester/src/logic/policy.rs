use std::fmt;

use racetrack_env::numbers::wrap_degrees;
use racetrack_env::{Action, RaceEnv};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Offset beyond which the seeker slows down before turning.
const SHARP_TURN_DEG: f64 = 45.0;
/// Speed the seeker is willing to corner at.
const CORNER_SPEED: f64 = 3.0;
/// Distance-to-speed ratio for the approach speed cap.
const APPROACH_FACTOR: f64 = 6.0;

/// Scripted driver interface for automated runs.
pub trait DriverPolicy {
    /// Name used for logging/debug output.
    fn name(&self) -> &'static str;

    /// Choose the next control from the live environment state.
    fn act(&mut self, env: &RaceEnv) -> Action;

    /// Called before every episode.
    fn reset(&mut self) {}
}

/// Built-in scripted drivers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DriverKind {
    Throttle,
    Seeker,
    Spinner,
    Random,
}

impl DriverKind {
    pub const ALL: [Self; 4] = [Self::Throttle, Self::Seeker, Self::Spinner, Self::Random];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Throttle => "throttle",
            Self::Seeker => "seeker",
            Self::Spinner => "spinner",
            Self::Random => "random",
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Throttle => "Always accelerate; never steers",
            Self::Seeker => "Steers toward the next checkpoint with a speed cap on approach",
            Self::Spinner => "Alternates throttle and right turns; drives in circles",
            Self::Random => "Uniform random controls from a seeded ChaCha20 stream",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.label().eq_ignore_ascii_case(name.trim()))
    }

    #[must_use]
    pub fn create_policy(self, seed: u64) -> Box<dyn DriverPolicy + Send> {
        match self {
            Self::Throttle => Box::new(ThrottleDriver),
            Self::Seeker => Box::new(SeekerDriver),
            Self::Spinner => Box::new(SpinnerDriver::default()),
            Self::Random => Box::new(RandomDriver::new(seed)),
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

struct ThrottleDriver;
struct SeekerDriver;

#[derive(Default)]
struct SpinnerDriver {
    tick: u64,
}

struct RandomDriver {
    rng: ChaCha20Rng,
}

impl RandomDriver {
    fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }
}

impl DriverPolicy for ThrottleDriver {
    fn name(&self) -> &'static str {
        "throttle"
    }

    fn act(&mut self, _env: &RaceEnv) -> Action {
        Action::Accelerate
    }
}

impl DriverPolicy for SeekerDriver {
    fn name(&self) -> &'static str {
        "seeker"
    }

    fn act(&mut self, env: &RaceEnv) -> Action {
        let car = env.car();
        let profile = env.profile();
        let Some(target) = env.progress().target(env.checkpoints()) else {
            return Action::Accelerate;
        };
        let offset = signed_offset(car.heading, car.position.bearing_to(target));
        if offset.abs() > SHARP_TURN_DEG && car.speed > CORNER_SPEED {
            return Action::Brake;
        }
        if offset.abs() > profile.turn_rate / 2.0 {
            return if offset > 0.0 {
                Action::TurnRight
            } else {
                Action::TurnLeft
            };
        }
        let cruise = (car.position.distance(target) / APPROACH_FACTOR)
            .clamp(CORNER_SPEED, profile.max_speed.max(CORNER_SPEED));
        if car.speed > cruise {
            Action::Brake
        } else {
            Action::Accelerate
        }
    }
}

impl DriverPolicy for SpinnerDriver {
    fn name(&self) -> &'static str {
        "spinner"
    }

    fn act(&mut self, _env: &RaceEnv) -> Action {
        self.tick = self.tick.wrapping_add(1);
        if self.tick % 2 == 0 {
            Action::TurnRight
        } else {
            Action::Accelerate
        }
    }

    fn reset(&mut self) {
        self.tick = 0;
    }
}

impl DriverPolicy for RandomDriver {
    fn name(&self) -> &'static str {
        "random"
    }

    fn act(&mut self, _env: &RaceEnv) -> Action {
        Action::ALL[self.rng.gen_range(0..Action::ALL.len())]
    }
}

/// Signed heading correction in `(-180, 180]`; positive means turn right.
fn signed_offset(heading: f64, bearing: f64) -> f64 {
    let delta = wrap_degrees(bearing - heading);
    if delta > 180.0 { delta - 360.0 } else { delta }
}

#[cfg(test)]
mod tests {
    use super::*;
    use racetrack_env::{EnvConfig, MapKind};

    fn ready_env(map: MapKind) -> RaceEnv {
        let mut config = EnvConfig::for_map(map);
        config.spawn.randomize = false;
        let mut env = RaceEnv::new(config).unwrap();
        env.reset(false).unwrap();
        env
    }

    #[test]
    fn names_round_trip() {
        for kind in DriverKind::ALL {
            assert_eq!(DriverKind::from_name(kind.label()), Some(kind));
            assert_eq!(kind.create_policy(1).name(), kind.label());
        }
        assert_eq!(DriverKind::from_name(" Seeker "), Some(DriverKind::Seeker));
        assert_eq!(DriverKind::from_name("pilot"), None);
    }

    #[test]
    fn signed_offset_picks_the_short_way() {
        assert!((signed_offset(350.0, 10.0) - 20.0).abs() < 1e-9);
        assert!((signed_offset(10.0, 350.0) + 20.0).abs() < 1e-9);
        assert!((signed_offset(0.0, 180.0) - 180.0).abs() < 1e-9);
    }

    #[test]
    fn seeker_accelerates_when_aligned() {
        let env = ready_env(MapKind::Corridor);
        let mut seeker = DriverKind::Seeker.create_policy(0);
        assert_eq!(seeker.act(&env), Action::Accelerate);
    }

    #[test]
    fn seeker_steers_onto_the_ring_checkpoint() {
        // Circle spawn faces 60 degrees; the first checkpoint bears about 75.
        let env = ready_env(MapKind::Circle);
        let mut seeker = DriverKind::Seeker.create_policy(0);
        assert_eq!(seeker.act(&env), Action::TurnRight);
    }

    #[test]
    fn random_driver_is_seeded() {
        let env = ready_env(MapKind::Open);
        let mut a = DriverKind::Random.create_policy(9);
        let mut b = DriverKind::Random.create_policy(9);
        let left: Vec<Action> = (0..32).map(|_| a.act(&env)).collect();
        let right: Vec<Action> = (0..32).map(|_| b.act(&env)).collect();
        assert_eq!(left, right);
    }

    #[test]
    fn spinner_alternates_and_resets() {
        let env = ready_env(MapKind::Open);
        let mut spinner = DriverKind::Spinner.create_policy(0);
        assert_eq!(spinner.act(&env), Action::Accelerate);
        assert_eq!(spinner.act(&env), Action::TurnRight);
        spinner.reset();
        assert_eq!(spinner.act(&env), Action::Accelerate);
    }
}
