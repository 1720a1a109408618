//! Paths builder: pipeline orchestration and path queries.
//!
//! The builder owns every stage artefact, tagged with the
//! `(instrument generation, kf_fixed)` pair that produced it. Any change to
//! that pair invalidates the whole cache; queries against an invalid or
//! incomplete pipeline fail without touching stale data. One mutex guards
//! the cache against a query racing a recalculation; the geometric kernel
//! itself is pure and runs lock-free.

mod smoothing;

pub use smoothing::{chaikin_smooth, subdivide_path};

use crate::config::PlannerConfig;
use crate::configspace::{sample_config_space, ConfigSpaceRaster, SamplerParams, WallIndex};
use crate::contour::{simplify_contour, trace_contours};
use crate::core::{PixelCoord, Vec2};
use crate::error::{CoreError, Result};
use crate::export::PathExporter;
use crate::graph::{dijkstra, reconstruct_path, Graph};
use crate::instrument::InstrumentSpace;
use crate::poly::convex_split;
use crate::voronoi::{calc_voronoi, BisectorRef, LineGroups, VoronoiBackend, VoronoiConfig, VoronoiResults};
use parking_lot::Mutex;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

/// Path search strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PathStrategy {
    /// minimise Euclidean length over the roadmap
    #[default]
    Shortest,
    /// additionally penalise roadmap edges close to walls
    PenaliseWalls,
}

/// Result of a path query. Angular positions use `x = a4`, `y = a2`, in the
/// instrument's native sign convention (scattering senses apply only to
/// exported path vertices).
#[derive(Clone, Debug, Default)]
pub struct InstrumentPath {
    pub ok: bool,
    pub cancelled: bool,
    /// roadmap vertex nearest to the start position
    pub start_vertex: Option<usize>,
    /// roadmap vertex nearest to the target position
    pub end_vertex: Option<usize>,
    /// roadmap vertex sequence from start to end
    pub vertices: Vec<usize>,
    /// exact angular start position, native convention
    pub start: Vec2,
    /// exact angular target position, native convention
    pub target: Vec2,
}

/// Per-stage artefacts; `None` until the stage ran.
#[derive(Default)]
struct BuilderState {
    /// (instrument generation, kf_fixed) that produced the artefacts
    tag: Option<(u64, bool)>,
    raster: Option<ConfigSpaceRaster>,
    wall_index: Option<WallIndex>,
    /// full traced contours, before simplification (kept for inspection)
    full_contours: Vec<Vec<PixelCoord>>,
    /// processed contours with their border flag
    contours: Vec<(Vec<Vec2>, bool)>,
    lines: Vec<crate::core::Segment>,
    groups: Vec<(usize, usize)>,
    points_outside: Vec<Vec2>,
    inverted: Vec<bool>,
    use_region_function: bool,
    voronoi: Option<VoronoiResults>,
}

type ProgressSlot = Box<dyn Fn(&str, f64) -> bool + Send + Sync>;

/// Identifier of a registered progress callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotId(u64);

/// The paths builder. See the crate documentation for the pipeline shape.
pub struct PathsBuilder<'a> {
    instrument: &'a dyn InstrumentSpace,
    config: PlannerConfig,
    /// kf fixed: a2 refers to the monochromator; otherwise to the analyser
    kf_fixed: bool,
    /// scattering senses (mono, sample, analyser), each +-1
    senses: [f64; 3],
    stop: AtomicBool,
    slots: Vec<(u64, ProgressSlot)>,
    next_slot: u64,
    state: Mutex<BuilderState>,
}

impl<'a> PathsBuilder<'a> {
    pub fn new(instrument: &'a dyn InstrumentSpace, config: PlannerConfig) -> Self {
        Self {
            instrument,
            config,
            kf_fixed: true,
            senses: [1.0, 1.0, 1.0],
            stop: AtomicBool::new(false),
            slots: Vec::new(),
            next_slot: 0,
            state: Mutex::new(BuilderState::default()),
        }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Switch between kf-fixed and ki-fixed operation. Invalidates all
    /// artefacts.
    pub fn set_kf_fixed(&mut self, kf_fixed: bool) {
        if self.kf_fixed != kf_fixed {
            self.kf_fixed = kf_fixed;
            self.state.lock().tag = None;
            log::info!("kf_fixed changed, pipeline invalidated");
        }
    }

    pub fn kf_fixed(&self) -> bool {
        self.kf_fixed
    }

    /// Scattering senses (monochromator, sample, analyser), each +-1.
    ///
    /// Pipeline artefacts and path queries are sense-free; the signs are
    /// applied exactly once, when [`Self::path_vertices`] extracts
    /// coordinates for export. Changing them does not invalidate anything.
    pub fn set_scattering_senses(&mut self, senses: [f64; 3]) {
        self.senses = senses;
    }

    /// Register a progress callback `(stage name, fraction) -> continue`.
    pub fn add_progress_slot(
        &mut self,
        slot: impl Fn(&str, f64) -> bool + Send + Sync + 'static,
    ) -> SlotId {
        let id = self.next_slot;
        self.next_slot += 1;
        self.slots.push((id, Box::new(slot)));
        SlotId(id)
    }

    pub fn remove_progress_slot(&mut self, id: SlotId) {
        self.slots.retain(|(slot_id, _)| *slot_id != id.0);
    }

    /// Request cooperative cancellation of a running calculation.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Clear the stop flag before a new calculation.
    pub fn clear_stop(&self) {
        self.stop.store(false, Ordering::Relaxed);
    }

    /// Are the cached artefacts current for the instrument state?
    pub fn is_valid(&self) -> bool {
        self.state.lock().tag == Some(self.current_tag())
    }

    fn current_tag(&self) -> (u64, bool) {
        (self.instrument.generation(), self.kf_fixed)
    }

    fn notify(&self, stage: &str, fraction: f64) -> bool {
        let mut keep_going = true;
        for (_, slot) in &self.slots {
            keep_going &= slot(stage, fraction);
        }
        keep_going
    }

    /// Effective sense signs for the (a2, a4) axes.
    fn axis_senses(&self) -> (f64, f64) {
        let mono_idx = if self.kf_fixed { 0 } else { 2 };
        (self.senses[mono_idx], self.senses[1])
    }

    // ------------------------------------------------------------------
    // pipeline stages, C1 -> C6
    // ------------------------------------------------------------------

    /// C1: raster the configuration space over the instrument's angular
    /// limits, padded by a few cells so limit contours close cleanly.
    pub fn calculate_config_space(&self) -> Result<()> {
        let tag = self.current_tag();
        let limits = self.instrument.angular_limits();

        let da2 = self.config.sampler.da2_deg / 180.0 * std::f64::consts::PI;
        let da4 = self.config.sampler.da4_deg / 180.0 * std::f64::consts::PI;
        let pad = self.config.sampler.padding_cells as f64;

        let params = SamplerParams {
            da2,
            da4,
            a2_range: (limits.a2_lo - pad * da2, limits.a2_hi + pad * da2),
            a4_range: (limits.a4_lo - pad * da4, limits.a4_hi + pad * da4),
            max_threads: self.config.sampler.max_threads,
            progress_granularity: self.config.sampler.progress_granularity,
        };

        let raster = match sample_config_space(self.instrument, &params, &self.stop, &|f| {
            self.notify("configuration space", f)
        }) {
            Ok(raster) => raster,
            Err(err) => {
                // a cancelled or failed sampling leaves the builder invalid
                self.state.lock().tag = None;
                return Err(err);
            }
        };

        let mut state = self.state.lock();
        *state = BuilderState::default();
        state.tag = Some(tag);
        state.raster = Some(raster);
        Ok(())
    }

    /// C2: obstacle id table plus kd-tree over wall pixels.
    pub fn calculate_wall_index(&self) -> Result<()> {
        let mut guard = self.lock_valid()?;
        let state = &mut *guard;
        let raster = state
            .raster
            .as_ref()
            .ok_or(CoreError::StageInvalid("config space"))?;
        state.wall_index = Some(WallIndex::build(raster));
        Ok(())
    }

    /// C3 + C4: trace forbidden-region boundaries, simplify them, and split
    /// into convex pieces.
    pub fn calculate_wall_contours(&self, simplify: bool, split_convex: bool) -> Result<()> {
        let mut guard = self.lock_valid()?;
        let state = &mut *guard;
        let raster = state
            .raster
            .as_ref()
            .ok_or(CoreError::StageInvalid("config space"))?;

        self.notify("wall contours", 0.0);
        let traced = trace_contours(raster);
        state.full_contours = traced.iter().map(|c| c.pixels.clone()).collect();

        self.notify("wall contours", 0.33);
        let eps = self.config.epsilons.eps;
        let eps_angular = self.config.epsilons.eps_angular;

        let mut contours: Vec<(Vec<Vec2>, bool)> = Vec::new();
        for mut traced in traced {
            if simplify {
                simplify_contour(
                    &mut traced.pixels,
                    self.config.contour.min_dist,
                    eps_angular,
                    eps,
                );
            }
            let poly: Vec<Vec2> = traced.pixels.iter().map(|p| p.to_vec2()).collect();

            if split_convex && !traced.touches_border {
                let pieces = convex_split(&poly, eps);
                if pieces.is_empty() {
                    contours.push((poly, traced.touches_border));
                } else {
                    for piece in pieces {
                        contours.push((piece, traced.touches_border));
                    }
                }
            } else {
                contours.push((poly, traced.touches_border));
            }
        }

        state.contours = contours;
        self.notify("wall contours", 1.0);
        Ok(())
    }

    /// Build the global segment array and its groups from the contours.
    ///
    /// With `use_region_function` set, the Voronoi stage classifies interior
    /// points by raster lookup; otherwise geometrically, using a reference
    /// point outside each region and an inversion flag derived from the
    /// raster (an inverted region encircles allowed coordinates).
    pub fn calculate_line_segments(&self, use_region_function: bool) -> Result<()> {
        let mut guard = self.lock_valid()?;
        let state = &mut *guard;
        if state.contours.is_empty() {
            return Err(CoreError::StageInvalid("wall contours"));
        }
        let raster = state
            .raster
            .as_ref()
            .ok_or(CoreError::StageInvalid("config space"))?;

        let mut lines = Vec::new();
        let mut groups = Vec::new();
        let mut points_outside = Vec::new();
        let mut inverted = Vec::new();

        // the angular-limit rectangle bounds free space; its edges join the
        // segment array ungrouped, so they act as walls without forming an
        // obstacle region of their own
        let limits = self.instrument.angular_limits();
        let lo = raster.angle_to_pixel(Vec2::new(limits.a4_lo, limits.a2_lo));
        let hi = raster.angle_to_pixel(Vec2::new(limits.a4_hi, limits.a2_hi));
        let frame = [
            Vec2::new(lo.x, lo.y),
            Vec2::new(hi.x, lo.y),
            Vec2::new(hi.x, hi.y),
            Vec2::new(lo.x, hi.y),
        ];
        for i in 0..4 {
            lines.push(crate::core::Segment::new(frame[i], frame[(i + 1) % 4]));
        }

        for (poly, touches_border) in &state.contours {
            // regions merged into the limit band are already represented by
            // the frame
            if *touches_border || poly.len() < 3 {
                continue;
            }
            let begin = lines.len();
            for i in 0..poly.len() {
                let j = (i + 1) % poly.len();
                lines.push(crate::core::Segment::new(poly[i], poly[j]));
            }
            groups.push((begin, lines.len()));

            if !use_region_function {
                // a pixel just outside the contour's bounding box
                let mut min = Vec2::new(f64::MAX, f64::MAX);
                for v in poly {
                    min.x = min.x.min(v.x);
                    min.y = min.y.min(v.y);
                }
                let outside = min - Vec2::new(1.0, 1.0);
                points_outside.push(outside);
                let outside_pix =
                    PixelCoord::new(outside.x.floor() as i32, outside.y.floor() as i32);
                inverted.push(raster.id_at(outside_pix) != 0);
            }
        }

        if groups.is_empty() {
            log::warn!("no obstacle contours: roadmap will be empty");
        }

        state.lines = lines;
        state.groups = groups;
        state.points_outside = points_outside;
        state.inverted = inverted;
        state.use_region_function = use_region_function;
        Ok(())
    }

    /// C5: the segment Voronoi diagram and its roadmap graph.
    pub fn calculate_voronoi(
        &self,
        group_lines: bool,
        backend: VoronoiBackend,
        discard_interior: bool,
    ) -> Result<()> {
        let mut guard = self.lock_valid()?;
        let state = &mut *guard;
        if state.lines.is_empty() {
            return Err(CoreError::StageInvalid("line segments"));
        }
        let raster = state
            .raster
            .as_ref()
            .ok_or(CoreError::StageInvalid("config space"))?;

        self.notify("voronoi diagram", 0.0);

        let cfg = VoronoiConfig {
            backend,
            group_lines,
            discard_interior,
            eps: self.config.epsilons.eps,
            eps_angular: self.config.epsilons.eps_angular,
            edge_eps: self.config.epsilons.eps_voronoi_edge,
        };

        let region_func = |pos: Vec2| -> bool {
            let pix = PixelCoord::new(pos.x.floor() as i32, pos.y.floor() as i32);
            !raster.is_free(pix)
        };
        let region_ref: &(dyn Fn(Vec2) -> bool) = &region_func;

        let groups = LineGroups {
            groups: &state.groups,
            points_outside: &state.points_outside,
            inverted: &state.inverted,
            region_func: state.use_region_function.then_some(region_ref),
        };

        let results = calc_voronoi(&state.lines, groups, &cfg)?;
        self.notify("voronoi diagram", 1.0);

        log::info!(
            "voronoi: {} vertices, {} linear, {} parabolic edges",
            results.vertices.len(),
            results.linear_edges.len(),
            results.parabolic_edges.len()
        );

        state.voronoi = Some(results);
        Ok(())
    }

    /// Run all stages C1 through C6 with the configured defaults.
    pub fn recalculate(&self) -> Result<()> {
        self.clear_stop();
        self.calculate_config_space()?;
        self.calculate_wall_index()?;
        self.calculate_wall_contours(true, true)?;
        self.calculate_line_segments(false)?;
        self.calculate_voronoi(
            self.config.voronoi.group_lines,
            self.config.voronoi.backend,
            self.config.voronoi.discard_interior,
        )
    }

    fn lock_valid(&self) -> Result<parking_lot::MutexGuard<'_, BuilderState>> {
        let state = self.state.lock();
        if state.tag != Some(self.current_tag()) {
            return Err(CoreError::StageInvalid("instrument space changed"));
        }
        Ok(state)
    }

    // ------------------------------------------------------------------
    // queries, C7
    // ------------------------------------------------------------------

    /// Find a path from the current to the target angular position.
    ///
    /// Angles in radians, in the instrument's native sign convention: the
    /// raster was sampled in that frame, so every collision, limit and
    /// pixel query here stays in it. The configured scattering senses touch
    /// nothing but the coordinates [`Self::path_vertices`] hands out.
    /// `ok` is false when either endpoint collides, the roadmap is
    /// unavailable, or verification finds a blocked cell.
    pub fn find_path(
        &self,
        a2_cur: f64,
        a4_cur: f64,
        a2_tgt: f64,
        a4_tgt: f64,
        strategy: PathStrategy,
    ) -> InstrumentPath {
        let start = Vec2::new(a4_cur, a2_cur);
        let target = Vec2::new(a4_tgt, a2_tgt);

        let mut path = InstrumentPath {
            start,
            target,
            ..InstrumentPath::default()
        };

        if self.stop.load(Ordering::Relaxed) {
            path.cancelled = true;
            return path;
        }

        let Ok(state) = self.lock_valid() else {
            log::warn!("find_path called on an invalid pipeline");
            return path;
        };
        let (Some(raster), Some(wall_index), Some(voronoi)) = (
            state.raster.as_ref(),
            state.wall_index.as_ref(),
            state.voronoi.as_ref(),
        ) else {
            log::warn!("find_path called before the pipeline completed");
            return path;
        };

        // both endpoints must be collision-free and within limits
        for pos in [start, target] {
            let limits = self.instrument.angular_limits();
            let (a4, a2) = (pos.x, pos.y);
            let within = a2 >= limits.a2_lo
                && a2 <= limits.a2_hi
                && a4 >= limits.a4_lo
                && a4 <= limits.a4_hi;
            if !within || self.instrument.check_collision(a2, a4).colliding {
                log::info!("path endpoint ({a4:.4}, {a2:.4}) blocked");
                return path;
            }
        }

        let start_pix = raster.angle_to_pixel(start);
        let target_pix = raster.angle_to_pixel(target);

        let Some(start_vertex) = voronoi.nearest_vertex(start_pix) else {
            return path;
        };
        let Some(end_vertex) = voronoi.nearest_vertex(target_pix) else {
            return path;
        };
        path.start_vertex = Some(start_vertex);
        path.end_vertex = Some(end_vertex);

        // strategy-dependent edge weights
        let penalise = strategy == PathStrategy::PenaliseWalls;
        let weight_fn = |i: usize, j: usize| -> Option<f64> {
            let weight = voronoi.graph.weight(i, j)?;
            if !penalise {
                return Some(weight);
            }
            let dist = [i, j]
                .iter()
                .filter_map(|&v| wall_index.nearest_wall(voronoi.vertices[v]))
                .map(|(_, d)| d)
                .fold(f64::MAX, f64::min);
            if dist <= 0.0 || dist == f64::MAX {
                Some(weight)
            } else {
                Some(weight / dist)
            }
        };

        let predecessors = dijkstra(&voronoi.graph, start_vertex, Some(&weight_fn));
        let Some(vertices) = reconstruct_path(&predecessors, start_vertex, end_vertex) else {
            log::info!("no roadmap path between vertices {start_vertex} and {end_vertex}");
            return path;
        };
        path.vertices = vertices;

        if self.config.path.verify && !self.verify_path(raster, voronoi, &path) {
            log::info!("path verification failed, a sampled cell is blocked");
            return path;
        }

        path.ok = true;
        path
    }

    /// Sample every straight segment of the path in configuration space and
    /// check each touched cell is free.
    fn verify_path(
        &self,
        raster: &ConfigSpaceRaster,
        voronoi: &VoronoiResults,
        path: &InstrumentPath,
    ) -> bool {
        let mut waypoints: Vec<Vec2> = vec![raster.angle_to_pixel(path.start)];
        for &v in &path.vertices {
            waypoints.push(voronoi.vertices[v]);
        }
        waypoints.push(raster.angle_to_pixel(path.target));

        for pair in waypoints.windows(2) {
            let steps = pair[0].distance(pair[1]).ceil().max(1.0) as usize;
            for k in 0..=steps {
                let pos = pair[0].lerp(pair[1], k as f64 / steps as f64);
                // nudge off exact cell boundaries so skeleton vertices on a
                // boundary resolve to the cell they border
                let pix = PixelCoord::new(
                    (pos.x + 1e-6).floor() as i32,
                    (pos.y + 1e-6).floor() as i32,
                );
                if !raster.is_free(pix) {
                    return false;
                }
            }
        }
        true
    }

    /// Angular coordinates along a found path.
    ///
    /// Walks parabolic bisectors point by point and linear bisectors by
    /// their endpoints. With `extend`, the exact start and target are
    /// prepended and appended; with `smooth`, Chaikin corner cutting is
    /// applied (endpoints pinned). The scattering senses are applied here,
    /// once, to every returned coordinate (endpoints included); this is the
    /// only place sign conventions enter the pipeline.
    pub fn path_vertices(&self, path: &InstrumentPath, extend: bool, smooth: bool) -> Vec<Vec2> {
        if !path.ok {
            return Vec::new();
        }
        let Ok(state) = self.lock_valid() else {
            return Vec::new();
        };
        let (Some(raster), Some(voronoi)) = (state.raster.as_ref(), state.voronoi.as_ref())
        else {
            return Vec::new();
        };

        let mut pixel_points: Vec<Vec2> = Vec::new();
        for (idx, &v) in path.vertices.iter().enumerate() {
            let vert = voronoi.vertices[v];
            if idx == 0 {
                pixel_points.push(vert);
                continue;
            }
            let prev = path.vertices[idx - 1];
            match voronoi.edge_between(prev, v) {
                Some(BisectorRef::Parabolic(parabola)) => {
                    // walk the arc in path direction, skipping the shared
                    // start point
                    let forward = parabola.v0 == prev;
                    let points: Vec<Vec2> = if forward {
                        parabola.points.iter().skip(1).copied().collect()
                    } else {
                        parabola.points.iter().rev().skip(1).copied().collect()
                    };
                    pixel_points.extend(points);
                }
                _ => pixel_points.push(vert),
            }
        }

        let mut angles: Vec<Vec2> = pixel_points
            .iter()
            .map(|&p| raster.pixel_to_angle(p))
            .collect();

        if extend {
            angles.insert(0, path.start);
            angles.push(path.target);
        }
        if smooth {
            for _ in 0..self.config.path.smooth_iterations {
                angles = chaikin_smooth(&angles);
            }
        }

        let (sense_a2, sense_a4) = self.axis_senses();
        for angle in &mut angles {
            angle.x *= sense_a4;
            angle.y *= sense_a2;
        }
        angles
    }

    /// Dispatch an exporter over extracted path vertices.
    pub fn accept_exporter(
        &self,
        exporter: &dyn PathExporter,
        vertices: &[Vec2],
        sink: &mut dyn Write,
    ) -> Result<()> {
        exporter.export(vertices, sink)
    }

    // ------------------------------------------------------------------
    // artefact access (read-only, for front-ends)
    // ------------------------------------------------------------------

    /// Run a closure over the raster, if computed.
    pub fn with_raster<R>(&self, f: impl FnOnce(&ConfigSpaceRaster) -> R) -> Option<R> {
        let state = self.state.lock();
        state.raster.as_ref().map(f)
    }

    /// Run a closure over the Voronoi results, if computed.
    pub fn with_voronoi<R>(&self, f: impl FnOnce(&VoronoiResults) -> R) -> Option<R> {
        let state = self.state.lock();
        state.voronoi.as_ref().map(f)
    }

    /// Run a closure over the wall contours: the full traced boundaries and
    /// the processed (simplified, convex-split) polygons.
    pub fn with_contours<R>(
        &self,
        f: impl FnOnce(&[Vec<PixelCoord>], &[(Vec<Vec2>, bool)]) -> R,
    ) -> R {
        let state = self.state.lock();
        f(&state.full_contours, &state.contours)
    }

    /// Number of line segment groups (one per convex obstacle).
    pub fn num_line_groups(&self) -> usize {
        self.state.lock().groups.len()
    }
}
