//! 2D kinematic instrument model.
//!
//! Two arms pose on the instrument floor: monochromator to sample, rotated
//! by the monochromator scattering angle a2 against the incoming beam, and
//! sample to analyser, rotated by the sample scattering angle a4 against the
//! first arm. Each arm is an oriented rectangle; obstacles are static
//! circles and axis-aligned boxes.

use super::{AngularLimits, Collision, InstrumentSpace};
use crate::core::{Segment, Vec2};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::atomic::{AtomicU64, Ordering};

/// A static obstacle on the instrument floor.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum Obstacle {
    Circle {
        name: String,
        centre: (f64, f64),
        radius: f64,
    },
    #[serde(rename = "box")]
    AxisBox {
        name: String,
        min: (f64, f64),
        max: (f64, f64),
    },
}

impl Obstacle {
    pub fn name(&self) -> &str {
        match self {
            Obstacle::Circle { name, .. } => name,
            Obstacle::AxisBox { name, .. } => name,
        }
    }

    /// Distance from a line segment to the obstacle boundary (0 inside).
    fn distance_to_segment(&self, seg: &Segment) -> f64 {
        match self {
            Obstacle::Circle { centre, radius, .. } => {
                let c = Vec2::new(centre.0, centre.1);
                (seg.distance_to(c) - radius).max(0.0)
            }
            Obstacle::AxisBox { min, max, .. } => {
                segment_aabb_distance(seg, Vec2::new(min.0, min.1), Vec2::new(max.0, max.1))
            }
        }
    }
}

/// Minimal distance between a segment and an axis-aligned box (0 when they
/// intersect or the segment lies inside).
fn segment_aabb_distance(seg: &Segment, min: Vec2, max: Vec2) -> f64 {
    let inside = |p: Vec2| p.x >= min.x && p.x <= max.x && p.y >= min.y && p.y <= max.y;
    if inside(seg.p) || inside(seg.q) {
        return 0.0;
    }

    let corners = [
        Vec2::new(min.x, min.y),
        Vec2::new(max.x, min.y),
        Vec2::new(max.x, max.y),
        Vec2::new(min.x, max.y),
    ];

    let mut dist = f64::MAX;
    for i in 0..4 {
        let edge = Segment::new(corners[i], corners[(i + 1) % 4]);
        if crate::core::intersect_segments(&edge, seg, 1e-12).is_some() {
            return 0.0;
        }
        dist = dist.min(segment_segment_distance(seg, &edge));
    }
    dist
}

/// Minimal distance between two non-intersecting segments.
fn segment_segment_distance(s1: &Segment, s2: &Segment) -> f64 {
    let d1 = s1.distance_to(s2.p).min(s1.distance_to(s2.q));
    let d2 = s2.distance_to(s1.p).min(s2.distance_to(s1.q));
    d1.min(d2)
}

/// Concrete instrument space: two rectangular arms plus an obstacle set.
#[derive(Debug)]
pub struct TasInstrumentModel {
    /// monochromator -> sample arm length
    pub len_mono_sample: f64,
    /// sample -> analyser arm length
    pub len_sample_ana: f64,
    /// full width of both arms
    pub arm_width: f64,
    limits: AngularLimits,
    obstacles: Vec<Obstacle>,
    generation: AtomicU64,
}

impl TasInstrumentModel {
    pub fn new(len_mono_sample: f64, len_sample_ana: f64, arm_width: f64) -> Self {
        Self {
            len_mono_sample,
            len_sample_ana,
            arm_width,
            limits: AngularLimits {
                a2_lo: -PI,
                a2_hi: PI,
                a4_lo: -PI,
                a4_hi: PI,
            },
            obstacles: Vec::new(),
            generation: AtomicU64::new(0),
        }
    }

    pub fn set_limits(&mut self, limits: AngularLimits) {
        self.limits = limits;
        self.generation.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_obstacle(&mut self, obstacle: Obstacle) {
        self.obstacles.push(obstacle);
        self.generation.fetch_add(1, Ordering::Relaxed);
    }

    pub fn clear_obstacles(&mut self) {
        self.obstacles.clear();
        self.generation.fetch_add(1, Ordering::Relaxed);
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    /// Centrelines of both arms posed at `(a2, a4)`: the monochromator sits
    /// at the origin, the incoming beam runs along +x.
    pub fn arm_segments(&self, a2: f64, a4: f64) -> [Segment; 2] {
        let mono_dir = Vec2::new(a2.cos(), a2.sin());
        let sample_pos = mono_dir * self.len_mono_sample;

        let ana_angle = a2 + a4;
        let ana_dir = Vec2::new(ana_angle.cos(), ana_angle.sin());
        let ana_pos = sample_pos + ana_dir * self.len_sample_ana;

        [
            Segment::new(Vec2::ZERO, sample_pos),
            Segment::new(sample_pos, ana_pos),
        ]
    }
}

impl InstrumentSpace for TasInstrumentModel {
    fn check_collision(&self, a2: f64, a4: f64) -> Collision {
        let arms = self.arm_segments(a2, a4);
        let half_width = self.arm_width * 0.5;

        for (idx, obstacle) in self.obstacles.iter().enumerate() {
            for arm in &arms {
                if obstacle.distance_to_segment(arm) < half_width {
                    return Collision::with(idx as u32 + 1);
                }
            }
        }
        Collision::FREE
    }

    fn angular_limits(&self) -> AngularLimits {
        self.limits
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }

    fn obstacle_ident(&self, id: u32) -> Option<&str> {
        if id == 0 {
            return None;
        }
        self.obstacles.get(id as usize - 1).map(|o| o.name())
    }
}
