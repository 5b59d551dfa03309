//! Planar vector and rectangle primitives shared by the track and physics code.
use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// A point or displacement in world units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Unit vector pointing along `heading` degrees (0 = +x, 90 = +y).
    #[must_use]
    pub fn from_heading(heading: f64) -> Self {
        let rad = heading.to_radians();
        Self::new(rad.cos(), rad.sin())
    }

    #[must_use]
    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        (other - self).length()
    }

    #[must_use]
    pub fn dot(self, other: Self) -> f64 {
        self.x.mul_add(other.x, self.y * other.y)
    }

    /// Heading in degrees from `self` towards `target`, wrapped into `[0, 360)`.
    #[must_use]
    pub fn bearing_to(self, target: Self) -> f64 {
        let delta = target - self;
        crate::numbers::wrap_degrees(delta.y.atan2(delta.x).to_degrees())
    }

    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vec2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl From<[f64; 2]> for Vec2 {
    fn from(value: [f64; 2]) -> Self {
        Self::new(value[0], value[1])
    }
}

/// Axis-aligned rectangle given by its top-left corner and size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    #[must_use]
    pub const fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// Edges are inclusive.
    #[must_use]
    pub fn contains(&self, point: Vec2) -> bool {
        (self.x..=self.x + self.w).contains(&point.x) && (self.y..=self.y + self.h).contains(&point.y)
    }

    #[must_use]
    pub(crate) fn scaled(raw: [f64; 4], scale: f64) -> Self {
        Self::new(raw[0] * scale, raw[1] * scale, raw[2] * scale, raw[3] * scale)
    }
}
