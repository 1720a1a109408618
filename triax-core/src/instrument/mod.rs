//! Instrument space abstraction.
//!
//! The planning core never inspects instrument geometry directly: it poses
//! the kinematic model at an `(a2, a4)` setting and asks whether anything
//! collides. The renderer-facing application owns the real instrument
//! space; [`TasInstrumentModel`] is the concrete implementation used by the
//! CLI and the test suite.

mod file;
mod model;

pub use file::{load_instrument_file, InstrumentFile, PROGRAM_IDENT};
pub use model::{Obstacle, TasInstrumentModel};

/// Result of a collision query at one angular setting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Collision {
    /// Did any obstacle intersect the posed instrument?
    pub colliding: bool,
    /// 1-based identifier of the first colliding obstacle (0 when free).
    pub obstacle: u32,
}

impl Collision {
    pub const FREE: Collision = Collision {
        colliding: false,
        obstacle: 0,
    };

    pub fn with(obstacle: u32) -> Self {
        Self {
            colliding: true,
            obstacle,
        }
    }
}

/// Reachable angular ranges, radians.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AngularLimits {
    pub a2_lo: f64,
    pub a2_hi: f64,
    pub a4_lo: f64,
    pub a4_hi: f64,
}

/// The collaborator interface the pipeline samples against.
///
/// Implementations are read concurrently by the sampler workers and MUST
/// not mutate during a calculation; `generation` lets the paths builder
/// detect wall changes between calculations.
pub trait InstrumentSpace: Send + Sync {
    /// Pose the instrument at `(a2, a4)` and test for collisions.
    fn check_collision(&self, a2: f64, a4: f64) -> Collision;

    /// Mechanically reachable angular ranges.
    fn angular_limits(&self) -> AngularLimits;

    /// Monotonic counter, incremented whenever walls change.
    fn generation(&self) -> u64;

    /// Human-readable identifier of an obstacle id returned by
    /// [`Self::check_collision`].
    fn obstacle_ident(&self, id: u32) -> Option<&str>;
}
