//! Numeric conversion helpers centralizing safe numeric casts and angle math.

use num_traits::cast::cast;

/// Clamp a f64 to the f32 range and downcast, returning 0.0 for non-finite values.
#[must_use]
pub fn clamp_f64_to_f32(value: f64) -> f32 {
    if !value.is_finite() {
        return 0.0;
    }
    let min = cast::<f32, f64>(f32::MIN).unwrap_or(f64::MIN);
    let max = cast::<f32, f64>(f32::MAX).unwrap_or(f64::MAX);
    let clamped = value.clamp(min, max);
    cast::<f64, f32>(clamped).unwrap_or(0.0)
}

/// Convert a count to f64 while allowing precision loss in a single location.
#[must_use]
pub fn usize_to_f64(value: usize) -> f64 {
    cast::<usize, f64>(value).unwrap_or(0.0)
}

/// Round a non-negative float up to a count, saturating at `u64::MAX`.
/// NaN and infinity saturate too.
#[must_use]
pub fn ceil_to_u64(value: f64) -> u64 {
    if value <= 0.0 {
        return 0;
    }
    cast::<f64, u64>(value.ceil()).unwrap_or(u64::MAX)
}

/// Replace NaN and infinities with `fallback`.
#[must_use]
pub fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value } else { fallback }
}

/// Wrap an angle in degrees into `[0, 360)`.
///
/// `rem_euclid` can round tiny negative inputs up to exactly 360.0, which is
/// folded back to zero.
#[must_use]
pub fn wrap_degrees(angle: f64) -> f64 {
    if !angle.is_finite() {
        return 0.0;
    }
    let wrapped = angle.rem_euclid(360.0);
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Smallest absolute difference between two headings, in `[0, 180]`.
#[must_use]
pub fn angle_between(a: f64, b: f64) -> f64 {
    let diff = (wrap_degrees(a) - wrap_degrees(b)).abs();
    diff.min(360.0 - diff)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_handles_non_finite() {
        assert!((clamp_f64_to_f32(f64::NAN) - 0.0).abs() < f32::EPSILON);
        assert!((clamp_f64_to_f32(f64::from(f32::MAX) * 2.0) - f32::MAX).abs() < f32::EPSILON);
    }

    #[test]
    fn ceil_to_u64_saturates() {
        assert_eq!(ceil_to_u64(149.2), 150);
        assert_eq!(ceil_to_u64(-3.0), 0);
        assert_eq!(ceil_to_u64(f64::INFINITY), u64::MAX);
        assert_eq!(ceil_to_u64(f64::NAN), u64::MAX);
    }

    #[test]
    fn wrap_degrees_stays_in_range() {
        assert!((wrap_degrees(-5.0) - 355.0).abs() < 1e-12);
        assert!((wrap_degrees(725.0) - 5.0).abs() < 1e-12);
        assert!(wrap_degrees(-1e-18) < 360.0);
        assert!(wrap_degrees(f64::NAN).abs() < f64::EPSILON);
    }

    #[test]
    fn angle_between_takes_short_way_round() {
        assert!((angle_between(350.0, 10.0) - 20.0).abs() < 1e-12);
        assert!((angle_between(90.0, 270.0) - 180.0).abs() < 1e-12);
        assert!(angle_between(42.0, 42.0).abs() < 1e-12);
    }

    #[test]
    fn finite_or_replaces_non_finite() {
        assert!((finite_or(f64::INFINITY, 1.5) - 1.5).abs() < f64::EPSILON);
        assert!((finite_or(2.0, 1.5) - 2.0).abs() < f64::EPSILON);
    }
}
