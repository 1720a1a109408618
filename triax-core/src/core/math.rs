//! Scalar and angular helpers used throughout the geometric kernel.

use super::Vec2;
use std::f64::consts::{PI, TAU};

/// Compare two scalars within `eps`.
#[inline]
pub fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
    (a - b).abs() <= eps
}

/// Is the scalar zero within `eps`?
#[inline]
pub fn approx_zero(a: f64, eps: f64) -> bool {
    a.abs() <= eps
}

/// Positive modulus: result is always in `[0, m)`.
#[inline]
pub fn mod_positive(a: f64, m: f64) -> f64 {
    let r = a % m;
    if r < 0.0 {
        r + m
    } else {
        r
    }
}

/// Compare two angles modulo 2π within `eps_angular`.
#[inline]
pub fn angles_equal(a: f64, b: f64, eps_angular: f64) -> bool {
    let d = mod_positive(a - b, TAU);
    d <= eps_angular || TAU - d <= eps_angular
}

/// Angle of the direction from `p1` to `p2`, in `(-π, π]`.
#[inline]
pub fn line_angle(p1: Vec2, p2: Vec2) -> f64 {
    let dir = p2 - p1;
    dir.y.atan2(dir.x)
}

/// Angle between the lines `(a1, a2)` and `(b1, b2)`.
#[inline]
pub fn line_angle_between(a1: Vec2, a2: Vec2, b1: Vec2, b2: Vec2) -> f64 {
    line_angle(b1, b2) - line_angle(a1, a2)
}

/// Twice the signed area of the triangle `(a, b, p)`.
///
/// Positive iff `p` lies on the left-hand side of the directed line `a -> b`.
#[inline]
pub fn side_of_line(a: Vec2, b: Vec2, p: Vec2) -> f64 {
    (b - a).cross(p - a)
}

/// Radians to degrees.
#[inline]
pub fn to_degrees(rad: f64) -> f64 {
    rad / PI * 180.0
}

/// Degrees to radians.
#[inline]
pub fn to_radians(deg: f64) -> f64 {
    deg / 180.0 * PI
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mod_positive() {
        assert!((mod_positive(-0.5, TAU) - (TAU - 0.5)).abs() < 1e-12);
        assert!((mod_positive(TAU + 0.25, TAU) - 0.25).abs() < 1e-12);
        assert_eq!(mod_positive(0.0, TAU), 0.0);
    }

    #[test]
    fn test_angles_equal_wraparound() {
        assert!(angles_equal(0.001, TAU - 0.001, 0.01));
        assert!(!angles_equal(0.0, PI, 0.01));
    }

    #[test]
    fn test_side_of_line() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(1.0, 0.0);
        assert!(side_of_line(a, b, Vec2::new(0.5, 1.0)) > 0.0);
        assert!(side_of_line(a, b, Vec2::new(0.5, -1.0)) < 0.0);
        assert_eq!(side_of_line(a, b, Vec2::new(2.0, 0.0)), 0.0);
    }

    #[test]
    fn test_line_angle() {
        let origin = Vec2::ZERO;
        assert!((line_angle(origin, Vec2::new(1.0, 0.0))).abs() < 1e-12);
        assert!((line_angle(origin, Vec2::new(0.0, 1.0)) - PI / 2.0).abs() < 1e-12);
    }
}
