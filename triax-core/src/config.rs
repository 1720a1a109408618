//! Planner configuration.
//!
//! All sections load from one YAML file; missing sections and fields fall
//! back to their defaults, so a minimal file stays minimal.

use crate::voronoi::VoronoiBackend;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;

/// Epsilons of the geometric kernel. Every tolerance the pipeline uses is
/// one of these three; nothing is implicit.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EpsilonSection {
    /// Cartesian tolerance
    pub eps: f64,
    /// angular tolerance, radians
    pub eps_angular: f64,
    /// Voronoi parabola discretisation step; fixes the integer scale
    pub eps_voronoi_edge: f64,
}

impl Default for EpsilonSection {
    fn default() -> Self {
        Self {
            eps: 1e-6,
            eps_angular: 0.01 / 180.0 * std::f64::consts::PI,
            eps_voronoi_edge: 2e-2,
        }
    }
}

/// Configuration-space sampler settings.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerSection {
    /// a2 step, degrees (converted at the builder entry)
    pub da2_deg: f64,
    /// a4 step, degrees
    pub da4_deg: f64,
    /// cells of padding beyond the angular limits
    pub padding_cells: usize,
    /// worker pool cap
    pub max_threads: usize,
    /// progress notifications per stage
    pub progress_granularity: usize,
}

impl Default for SamplerSection {
    fn default() -> Self {
        Self {
            da2_deg: 0.5,
            da4_deg: 0.5,
            padding_cells: 4,
            max_threads: 8,
            progress_granularity: 100,
        }
    }
}

/// Contour simplification settings.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ContourSection {
    /// staircase collapse span, pixels
    pub min_dist: f64,
}

impl Default for ContourSection {
    fn default() -> Self {
        Self { min_dist: 2.0 }
    }
}

/// Voronoi stage settings.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct VoronoiSection {
    pub backend: VoronoiBackend,
    pub group_lines: bool,
    pub discard_interior: bool,
}

impl Default for VoronoiSection {
    fn default() -> Self {
        Self {
            backend: VoronoiBackend::Exact,
            group_lines: true,
            discard_interior: true,
        }
    }
}

/// Path query settings.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSection {
    /// verify each path segment against the raster
    pub verify: bool,
    /// Chaikin corner-cutting iterations when smoothing
    pub smooth_iterations: usize,
}

impl Default for PathSection {
    fn default() -> Self {
        Self {
            verify: true,
            smooth_iterations: 2,
        }
    }
}

/// Full planner configuration.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PlannerConfig {
    pub epsilons: EpsilonSection,
    pub sampler: SamplerSection,
    pub contour: ContourSection,
    pub voronoi: VoronoiSection,
    pub path: PathSection,
}

impl PlannerConfig {
    /// Load from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}
