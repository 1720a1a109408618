//! Point and coordinate types for the angular configuration space.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub};

/// Raster coordinates (integer cell indices into the configuration space).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PixelCoord {
    /// X coordinate (column index, a4 direction)
    pub x: i32,
    /// Y coordinate (row index, a2 direction)
    pub y: i32,
}

impl PixelCoord {
    /// Create a new raster coordinate
    #[inline]
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The 8 neighbours in Moore order, clockwise starting north-west.
    ///
    /// The order matters for boundary tracing: the tracer resumes scanning
    /// from the backtrack direction, so neighbours must form a fixed cycle.
    #[inline]
    pub fn neighbours_8(&self) -> [PixelCoord; 8] {
        [
            PixelCoord::new(self.x - 1, self.y - 1), // NW
            PixelCoord::new(self.x, self.y - 1),     // N
            PixelCoord::new(self.x + 1, self.y - 1), // NE
            PixelCoord::new(self.x + 1, self.y),     // E
            PixelCoord::new(self.x + 1, self.y + 1), // SE
            PixelCoord::new(self.x, self.y + 1),     // S
            PixelCoord::new(self.x - 1, self.y + 1), // SW
            PixelCoord::new(self.x - 1, self.y),     // W
        ]
    }

    /// Convert to a real-valued vector.
    #[inline]
    pub fn to_vec2(self) -> Vec2 {
        Vec2::new(self.x as f64, self.y as f64)
    }
}

impl Add for PixelCoord {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        PixelCoord::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for PixelCoord {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        PixelCoord::new(self.x - other.x, self.y - other.y)
    }
}

/// 2D vector in configuration space (f64, no unit awareness).
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    /// X component (a4, sample scattering angle direction)
    pub x: f64,
    /// Y component (a2, monochromator scattering angle direction)
    pub y: f64,
}

impl Vec2 {
    /// Zero vector (origin)
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    /// Create a new vector
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    #[inline]
    pub fn distance(&self, other: Vec2) -> f64 {
        (*self - other).norm()
    }

    /// Squared distance (avoids the sqrt)
    #[inline]
    pub fn distance_sq(&self, other: Vec2) -> f64 {
        let d = *self - other;
        d.dot(d)
    }

    /// Length (magnitude)
    #[inline]
    pub fn norm(&self) -> f64 {
        self.dot(*self).sqrt()
    }

    /// Dot product
    #[inline]
    pub fn dot(&self, other: Vec2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Cross product (z component of the 3D cross product)
    #[inline]
    pub fn cross(&self, other: Vec2) -> f64 {
        self.x * other.y - self.y * other.x
    }

    /// Normalise to unit length; zero vectors are returned unchanged.
    #[inline]
    pub fn normalized(&self) -> Vec2 {
        let len = self.norm();
        if len > 0.0 {
            *self / len
        } else {
            *self
        }
    }

    /// Linear interpolation towards `other` at parameter `t`
    #[inline]
    pub fn lerp(&self, other: Vec2, t: f64) -> Vec2 {
        *self + (other - *self) * t
    }

    /// Rotate around the origin by `angle` radians (CCW positive)
    #[inline]
    pub fn rotated(&self, angle: f64) -> Vec2 {
        let (sin_a, cos_a) = angle.sin_cos();
        Vec2::new(
            self.x * cos_a - self.y * sin_a,
            self.x * sin_a + self.y * cos_a,
        )
    }

    /// Perpendicular vector (90 degrees CCW)
    #[inline]
    pub fn perp(&self) -> Vec2 {
        Vec2::new(-self.y, self.x)
    }

    /// Both components are finite (neither NaN nor infinite)
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Component-wise comparison within `eps`
    #[inline]
    pub fn approx_eq(&self, other: Vec2, eps: f64) -> bool {
        (self.x - other.x).abs() <= eps && (self.y - other.y).abs() <= eps
    }
}

impl Add for Vec2 {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Vec2::new(self.x + other.x, self.y + other.y)
    }
}

impl AddAssign for Vec2 {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.x += other.x;
        self.y += other.y;
    }
}

impl Sub for Vec2 {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Vec2::new(self.x - other.x, self.y - other.y)
    }
}

impl Neg for Vec2 {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Vec2::new(-self.x, -self.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Self;

    #[inline]
    fn mul(self, scalar: f64) -> Self {
        Vec2::new(self.x * scalar, self.y * scalar)
    }
}

impl Div<f64> for Vec2 {
    type Output = Self;

    #[inline]
    fn div(self, scalar: f64) -> Self {
        Vec2::new(self.x / scalar, self.y / scalar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(3.0, 4.0);
        assert!((a.distance(b) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_cross_sign() {
        let e_x = Vec2::new(1.0, 0.0);
        let e_y = Vec2::new(0.0, 1.0);
        assert!(e_x.cross(e_y) > 0.0);
        assert!(e_y.cross(e_x) < 0.0);
    }

    #[test]
    fn test_rotated() {
        let p = Vec2::new(1.0, 0.0);
        let r = p.rotated(std::f64::consts::FRAC_PI_2);
        assert!(r.approx_eq(Vec2::new(0.0, 1.0), 1e-12));
    }

    #[test]
    fn test_lerp() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(2.0, -2.0);
        assert!(a.lerp(b, 0.5).approx_eq(Vec2::new(1.0, -1.0), 1e-12));
    }

    #[test]
    fn test_pixel_neighbours_cycle() {
        let c = PixelCoord::new(5, 5);
        let n = c.neighbours_8();
        // all 8 distinct and adjacent
        for (i, a) in n.iter().enumerate() {
            assert!((a.x - c.x).abs() <= 1 && (a.y - c.y).abs() <= 1);
            for b in n.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
