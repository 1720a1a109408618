//! Fundamental geometric types shared by all pipeline stages.
//!
//! All real-valued geometry uses `f64`; all angles are radians. Epsilons are
//! never implicit: every tolerance-sensitive routine takes them as explicit
//! parameters or reads them from the planner configuration.

mod math;
mod matrix;
mod point;
mod segment;

pub use math::{
    angles_equal, approx_eq, approx_zero, line_angle, line_angle_between, mod_positive,
    side_of_line, to_degrees, to_radians,
};
pub use matrix::{Mat2, Mat3, Mat4};
pub use point::{PixelCoord, Vec2};
pub use segment::{intersect_lines, intersect_segments, Segment};
