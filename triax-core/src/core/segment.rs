//! Line segments and segment/line intersection primitives.

use super::Vec2;
use serde::{Deserialize, Serialize};

/// An ordered pair of points. Unoriented for intersection tests; the order
/// carries orientation for the Voronoi stage.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Segment {
    pub p: Vec2,
    pub q: Vec2,
}

impl Segment {
    #[inline]
    pub fn new(p: Vec2, q: Vec2) -> Self {
        Self { p, q }
    }

    #[inline]
    pub fn direction(&self) -> Vec2 {
        self.q - self.p
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.direction().norm()
    }

    /// Point at parameter `t` (0 = p, 1 = q).
    #[inline]
    pub fn point_at(&self, t: f64) -> Vec2 {
        self.p.lerp(self.q, t)
    }

    /// Closest point on the segment to `pt`, with its parameter.
    pub fn closest_point(&self, pt: Vec2) -> (Vec2, f64) {
        let d = self.direction();
        let len_sq = d.dot(d);
        if len_sq <= 0.0 {
            return (self.p, 0.0);
        }
        let t = ((pt - self.p).dot(d) / len_sq).clamp(0.0, 1.0);
        (self.point_at(t), t)
    }

    /// Distance from `pt` to the segment.
    #[inline]
    pub fn distance_to(&self, pt: Vec2) -> f64 {
        self.closest_point(pt).0.distance(pt)
    }
}

/// Intersect the infinite lines `a + s*da` and `b + t*db`.
///
/// # Returns
/// `(point, s, t)`, or `None` for (anti)parallel directions.
pub fn intersect_lines(a: Vec2, da: Vec2, b: Vec2, db: Vec2, eps: f64) -> Option<(Vec2, f64, f64)> {
    let denom = da.cross(db);
    if denom.abs() <= eps {
        return None;
    }
    let diff = b - a;
    let s = diff.cross(db) / denom;
    let t = diff.cross(da) / denom;
    Some((a + da * s, s, t))
}

/// Intersect two segments; endpoint touches count.
///
/// Collinear segments are only reported when they share an endpoint (the
/// shared endpoint is the reported intersection); collinear interior
/// overlaps yield `None`.
pub fn intersect_segments(s1: &Segment, s2: &Segment, eps: f64) -> Option<Vec2> {
    match intersect_lines(s1.p, s1.direction(), s2.p, s2.direction(), eps) {
        Some((pt, s, t)) => {
            if (-eps..=1.0 + eps).contains(&s) && (-eps..=1.0 + eps).contains(&t) {
                Some(pt)
            } else {
                None
            }
        }
        None => {
            // parallel; a shared endpoint of collinear segments is reported once
            if side_distance(s1, s2.p).abs() > eps {
                return None;
            }
            for a in [s1.p, s1.q] {
                for b in [s2.p, s2.q] {
                    if a.approx_eq(b, eps) {
                        return Some(a);
                    }
                }
            }
            None
        }
    }
}

fn side_distance(seg: &Segment, pt: Vec2) -> f64 {
    let d = seg.direction();
    let len = d.norm();
    if len <= 0.0 {
        return seg.p.distance(pt);
    }
    d.cross(pt - seg.p) / len
}
