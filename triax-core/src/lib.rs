//! # TRIAX core: collision-free path planning for triple-axis spectrometers
//!
//! A triple-axis spectrometer moves three coupled rotation stages; driving
//! it between two configurations must not sweep its arms through walls,
//! pillars or racks on the instrument floor. This crate plans such moves in
//! the two-dimensional angular configuration space spanned by the
//! monochromator scattering angle a2 and the sample scattering angle a4.
//!
//! ## Pipeline
//!
//! ```text
//!  InstrumentSpace (collision oracle)
//!        |
//!        v
//!  configspace   raster sampling of (a2, a4), parallel workers      (C1)
//!        |       wall index: group id table + kd-tree               (C2)
//!        v
//!  contour       boundary tracing + simplification                  (C3)
//!        |
//!        v
//!  poly          convex splitting into line segment groups          (C4)
//!        |
//!        v
//!  voronoi       segment Voronoi diagram, linear + parabolic        (C5)
//!        |       bisectors, roadmap assembly
//!        v
//!  graph         Dijkstra over the roadmap                          (C6)
//!        |
//!        v
//!  builder       query interface: find_path, path vertices          (C7)
//!        |
//!        v
//!  export        RAW / NOMAD / NICOS scripts                        (C8)
//! ```
//!
//! The geometric kernel (hull, delaunay, intersect, voronoi) is pure and
//! lock-free; the builder owns the stage artefacts and revalidates them
//! when the instrument space changes. All angles are radians internally;
//! exporters emit degrees.

pub mod builder;
pub mod config;
pub mod configspace;
pub mod contour;
pub mod core;
pub mod delaunay;
pub mod error;
pub mod export;
pub mod graph;
pub mod hull;
pub mod instrument;
pub mod intersect;
pub mod poly;
pub mod voronoi;

pub use builder::{InstrumentPath, PathStrategy, PathsBuilder};
pub use config::PlannerConfig;
pub use error::{CoreError, Result};
pub use instrument::{InstrumentSpace, TasInstrumentModel};
