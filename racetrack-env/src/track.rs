//! Track layouts, surface classification, and checkpoint placement.
use log::warn;
use rand::Rng;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

use crate::constants::{
    BOUNDARY_EPSILON, CIRCLE_ANGLE_JITTER_DEG, CIRCLE_CENTER, CIRCLE_CHECKPOINT_COUNT,
    CIRCLE_CHECKPOINT_RADIUS, CIRCLE_INNER_RADIUS, CIRCLE_OUTER_RADIUS, CIRCLE_SPAWN_ANGLE_DEG,
    CORRIDOR_BARRIERS, CORRIDOR_CHECKPOINT, CORRIDOR_CHECKPOINT_Y_RANGE, CORRIDOR_RECT,
    CURVE_BARRIERS, CURVE_CHECKPOINTS, CURVE_FIRST_Y_RANGE, CURVE_RECTS, CURVE_SECOND_X_RANGE,
    SPAWN_POINT, WORLD_HEIGHT, WORLD_WIDTH,
};
use crate::geometry::{Rect, Vec2};
use crate::rng::symmetric_jitter;

/// Available track layouts.
///
/// Parsing is permissive: any unrecognized name becomes [`MapKind::Open`],
/// the layout with no boundary and no checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MapKind {
    #[default]
    Corridor,
    Curve,
    Circle,
    Open,
}

impl MapKind {
    pub const ALL: [Self; 4] = [Self::Corridor, Self::Curve, Self::Circle, Self::Open];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Corridor => "corridor",
            Self::Curve => "curve",
            Self::Circle => "circle",
            Self::Open => "open",
        }
    }

    /// Parse a map name, falling back to [`MapKind::Open`] for unknown names.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "corridor" => Self::Corridor,
            "curve" => Self::Curve,
            "circle" => Self::Circle,
            "open" => Self::Open,
            other => {
                warn!("unknown map kind '{other}', using open layout");
                Self::Open
            }
        }
    }
}

impl fmt::Display for MapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for MapKind {
    fn from(value: String) -> Self {
        Self::from_name(&value)
    }
}

impl From<&str> for MapKind {
    fn from(value: &str) -> Self {
        Self::from_name(value)
    }
}

impl From<MapKind> for String {
    fn from(value: MapKind) -> Self {
        value.as_str().to_string()
    }
}

/// Result of classifying a point against the track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    Drivable,
    Barrier,
    OutOfBounds,
}

/// Drivable-region description.
#[derive(Debug, Clone, PartialEq)]
pub enum Boundary {
    /// Union of drivable rectangles minus barrier rectangles.
    Rects {
        drivable: SmallVec<[Rect; 2]>,
        barriers: SmallVec<[Rect; 2]>,
    },
    /// Annulus around `center`.
    Ring {
        center: Vec2,
        inner_radius: f64,
        outer_radius: f64,
    },
    /// Everything is drivable.
    Open,
}

/// An immutable track layout plus its current checkpoint placement.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    kind: MapKind,
    scale: f64,
    boundary: Boundary,
    checkpoints: Vec<Vec2>,
    spawn: Vec2,
    spawn_heading: f64,
}

impl Track {
    /// Build the named layout at the given scale with canonical checkpoints.
    #[must_use]
    pub fn build(kind: MapKind, scale: f64) -> Self {
        let spawn = Vec2::from(SPAWN_POINT) * scale;
        let (boundary, spawn, spawn_heading) = match kind {
            MapKind::Corridor => (
                Boundary::Rects {
                    drivable: SmallVec::from_iter([Rect::scaled(CORRIDOR_RECT, scale)]),
                    barriers: CORRIDOR_BARRIERS
                        .iter()
                        .map(|raw| Rect::scaled(*raw, scale))
                        .collect(),
                },
                spawn,
                0.0,
            ),
            MapKind::Curve => (
                Boundary::Rects {
                    drivable: CURVE_RECTS
                        .iter()
                        .map(|raw| Rect::scaled(*raw, scale))
                        .collect(),
                    barriers: CURVE_BARRIERS
                        .iter()
                        .map(|raw| Rect::scaled(*raw, scale))
                        .collect(),
                },
                spawn,
                0.0,
            ),
            MapKind::Circle => {
                let center = Vec2::from(CIRCLE_CENTER) * scale;
                let spawn = center
                    + Vec2::from_heading(CIRCLE_SPAWN_ANGLE_DEG) * (CIRCLE_CHECKPOINT_RADIUS * scale);
                (
                    Boundary::Ring {
                        center,
                        inner_radius: CIRCLE_INNER_RADIUS * scale,
                        outer_radius: CIRCLE_OUTER_RADIUS * scale,
                    },
                    spawn,
                    crate::numbers::wrap_degrees(CIRCLE_SPAWN_ANGLE_DEG + 90.0),
                )
            }
            MapKind::Open => (Boundary::Open, spawn, 0.0),
        };
        let mut track = Self {
            kind,
            scale,
            boundary,
            checkpoints: Vec::new(),
            spawn,
            spawn_heading,
        };
        track.checkpoints = track.canonical_checkpoints();
        track
    }

    #[must_use]
    pub const fn kind(&self) -> MapKind {
        self.kind
    }

    #[must_use]
    pub const fn scale(&self) -> f64 {
        self.scale
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        WORLD_WIDTH * self.scale
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        WORLD_HEIGHT * self.scale
    }

    #[must_use]
    pub const fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    #[must_use]
    pub fn checkpoints(&self) -> &[Vec2] {
        &self.checkpoints
    }

    /// Nominal spawn point before jitter.
    #[must_use]
    pub const fn spawn(&self) -> Vec2 {
        self.spawn
    }

    /// Nominal spawn heading in degrees.
    #[must_use]
    pub const fn spawn_heading(&self) -> f64 {
        self.spawn_heading
    }

    /// Classify a point. Pure: depends only on the layout and the point.
    #[must_use]
    pub fn classify(&self, point: Vec2) -> Surface {
        if !point.is_finite() {
            return Surface::OutOfBounds;
        }
        match &self.boundary {
            Boundary::Rects { drivable, barriers } => {
                if barriers.iter().any(|rect| rect.contains(point)) {
                    Surface::Barrier
                } else if !drivable.is_empty() && !drivable.iter().any(|rect| rect.contains(point)) {
                    Surface::OutOfBounds
                } else {
                    Surface::Drivable
                }
            }
            Boundary::Ring {
                center,
                inner_radius,
                outer_radius,
            } => {
                let r = point.distance(*center);
                let near_outer = (r - outer_radius).abs() <= BOUNDARY_EPSILON;
                if !near_outer && (*inner_radius..*outer_radius).contains(&r) {
                    Surface::Drivable
                } else {
                    Surface::OutOfBounds
                }
            }
            Boundary::Open => Surface::Drivable,
        }
    }

    #[must_use]
    pub fn is_drivable(&self, point: Vec2) -> bool {
        self.classify(point) == Surface::Drivable
    }

    /// Compute a checkpoint placement, jittered within the layout's ranges when
    /// `randomize` is set.
    pub fn layout_checkpoints<R: Rng + ?Sized>(&self, randomize: bool, rng: &mut R) -> Vec<Vec2> {
        if !randomize {
            return self.canonical_checkpoints();
        }
        let scale = self.scale;
        match self.kind {
            MapKind::Corridor => {
                let (lo, hi) = CORRIDOR_CHECKPOINT_Y_RANGE;
                vec![Vec2::new(CORRIDOR_CHECKPOINT[0], rng.gen_range(lo..=hi)) * scale]
            }
            MapKind::Curve => {
                let (y_lo, y_hi) = CURVE_FIRST_Y_RANGE;
                let (x_lo, x_hi) = CURVE_SECOND_X_RANGE;
                let first = Vec2::new(CURVE_CHECKPOINTS[0][0], rng.gen_range(y_lo..=y_hi));
                let second = Vec2::new(rng.gen_range(x_lo..=x_hi), CURVE_CHECKPOINTS[1][1]);
                vec![first * scale, second * scale]
            }
            MapKind::Circle => (0..CIRCLE_CHECKPOINT_COUNT)
                .map(|i| {
                    let angle = circle_checkpoint_angle(i)
                        + symmetric_jitter(rng, CIRCLE_ANGLE_JITTER_DEG);
                    self.ring_point(angle)
                })
                .collect(),
            MapKind::Open => Vec::new(),
        }
    }

    /// Replace the stored checkpoints with a fresh placement.
    pub fn reroll_checkpoints<R: Rng + ?Sized>(&mut self, randomize: bool, rng: &mut R) {
        self.checkpoints = self.layout_checkpoints(randomize, rng);
    }

    fn canonical_checkpoints(&self) -> Vec<Vec2> {
        let scale = self.scale;
        match self.kind {
            MapKind::Corridor => vec![Vec2::from(CORRIDOR_CHECKPOINT) * scale],
            MapKind::Curve => CURVE_CHECKPOINTS
                .iter()
                .map(|raw| Vec2::from(*raw) * scale)
                .collect(),
            MapKind::Circle => (0..CIRCLE_CHECKPOINT_COUNT)
                .map(|i| self.ring_point(circle_checkpoint_angle(i)))
                .collect(),
            MapKind::Open => Vec::new(),
        }
    }

    fn ring_point(&self, angle_deg: f64) -> Vec2 {
        Vec2::from(CIRCLE_CENTER) * self.scale
            + Vec2::from_heading(angle_deg) * (CIRCLE_CHECKPOINT_RADIUS * self.scale)
    }
}

fn circle_checkpoint_angle(index: usize) -> f64 {
    360.0 * crate::numbers::usize_to_f64(index) / crate::numbers::usize_to_f64(CIRCLE_CHECKPOINT_COUNT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn map_kind_parsing_is_permissive() {
        assert_eq!(MapKind::from_name("Curve"), MapKind::Curve);
        assert_eq!(MapKind::from_name(" circle "), MapKind::Circle);
        assert_eq!(MapKind::from_name("figure-eight"), MapKind::Open);
        let parsed: MapKind = serde_json::from_str("\"nonsense\"").unwrap();
        assert_eq!(parsed, MapKind::Open);
        assert_eq!(serde_json::to_string(&MapKind::Corridor).unwrap(), "\"corridor\"");
    }

    #[test]
    fn corridor_classification() {
        let track = Track::build(MapKind::Corridor, 1.0);
        assert_eq!(track.classify(Vec2::new(150.0, 300.0)), Surface::Drivable);
        assert_eq!(track.classify(Vec2::new(95.0, 300.0)), Surface::Barrier);
        assert_eq!(track.classify(Vec2::new(400.0, 100.0)), Surface::OutOfBounds);
        // Left edge belongs to both the barrier and the corridor; barrier wins.
        assert_eq!(track.classify(Vec2::new(100.0, 300.0)), Surface::Barrier);
        assert_eq!(track.checkpoints(), &[Vec2::new(700.0, 300.0)]);
    }

    #[test]
    fn curve_is_an_l_shape() {
        let track = Track::build(MapKind::Curve, 1.0);
        assert!(track.is_drivable(Vec2::new(200.0, 300.0)));
        assert!(track.is_drivable(Vec2::new(400.0, 100.0)));
        assert!(!track.is_drivable(Vec2::new(200.0, 100.0)));
        assert!(!track.is_drivable(Vec2::new(600.0, 300.0)));
        for checkpoint in track.checkpoints() {
            assert!(track.is_drivable(*checkpoint), "{checkpoint:?}");
        }
    }

    #[test]
    fn ring_outer_edge_is_exclusive() {
        let track = Track::build(MapKind::Circle, 1.0);
        assert!(!track.is_drivable(Vec2::new(650.0, 300.0)));
        assert!(!track.is_drivable(Vec2::new(650.0 - 5e-7, 300.0)));
        assert!(track.is_drivable(Vec2::new(550.0, 300.0)));
        assert!(track.is_drivable(Vec2::new(600.0, 300.0)));
        assert!(!track.is_drivable(Vec2::new(400.0, 300.0)));
        assert!(track.is_drivable(track.spawn()));
        assert!((track.spawn_heading() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn open_layout_is_unbounded() {
        let track = Track::build(MapKind::Open, 1.0);
        assert!(track.is_drivable(Vec2::new(-1e6, 1e6)));
        assert!(track.checkpoints().is_empty());
        let mut rng = SmallRng::seed_from_u64(1);
        assert!(track.layout_checkpoints(true, &mut rng).is_empty());
    }

    #[test]
    fn classification_is_pure() {
        let track = Track::build(MapKind::Curve, 1.3);
        let point = Vec2::new(420.0, 200.0);
        let first = track.classify(point);
        for _ in 0..10 {
            assert_eq!(track.classify(point), first);
        }
    }

    #[test]
    fn randomized_checkpoints_stay_in_ranges() {
        let mut rng = SmallRng::seed_from_u64(99);
        let corridor = Track::build(MapKind::Corridor, 1.0);
        let curve = Track::build(MapKind::Curve, 1.0);
        let circle = Track::build(MapKind::Circle, 1.0);
        for _ in 0..50 {
            let cp = corridor.layout_checkpoints(true, &mut rng);
            assert!((220.0..=380.0).contains(&cp[0].y));
            assert!((cp[0].x - 700.0).abs() < 1e-9);

            let cp = curve.layout_checkpoints(true, &mut rng);
            assert!((260.0..=340.0).contains(&cp[0].y));
            assert!((340.0..=460.0).contains(&cp[1].x));
            assert!(cp.iter().all(|p| curve.is_drivable(*p)));

            let cp = circle.layout_checkpoints(true, &mut rng);
            assert_eq!(cp.len(), 4);
            for p in cp {
                assert!((p.distance(Vec2::new(400.0, 300.0)) - 200.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn scale_multiplies_layout() {
        let track = Track::build(MapKind::Corridor, 2.0);
        assert!((track.width() - 1600.0).abs() < 1e-9);
        assert_eq!(track.checkpoints(), &[Vec2::new(1400.0, 600.0)]);
        assert!(track.is_drivable(Vec2::new(300.0, 600.0)));
    }

    #[test]
    fn reroll_replaces_checkpoints() {
        let mut track = Track::build(MapKind::Corridor, 1.0);
        let mut rng = SmallRng::seed_from_u64(5);
        track.reroll_checkpoints(true, &mut rng);
        assert_eq!(track.checkpoints().len(), 1);
        track.reroll_checkpoints(false, &mut rng);
        assert_eq!(track.checkpoints(), &[Vec2::new(700.0, 300.0)]);
    }
}
