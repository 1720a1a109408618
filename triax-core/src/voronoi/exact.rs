//! Pairwise-bisector Voronoi backend.
//!
//! Every input segment decomposes into two point sites and one open segment
//! site (shared endpoints deduplicated). For each pair of sites the
//! bisector curve is constructed analytically, then clipped against the
//! dominance regions of all other sites: a parameter survives iff both
//! generating sites realise the minimal distance there. Surviving intervals
//! are the diagram edges; interval boundaries are refined by bisection, so
//! the Voronoi vertices land on the true equidistant points up to
//! floating-point resolution of the scaled integer grid.
//!
//! Secondary edges, the perpendicular separators between a segment and its
//! own endpoints, are not generated; a group's cells merge through them
//! anyway and the diagram stays the skeleton of free space.

use super::{LineGroups, RawCurve, RawDiagram, RawEdge, VoronoiConfig};
use crate::core::{intersect_lines, Segment, Vec2};
use crate::error::Result;
use kiddo::{KdTree, SquaredEuclidean};
use std::collections::HashMap;

/// Lower bound on validity samples per bisector curve.
const MIN_SAMPLES: usize = 384;
/// Upper bound on validity samples per bisector curve.
const MAX_SAMPLES: usize = 8192;
/// Bisection iterations per interval boundary.
const REFINE_STEPS: usize = 48;
/// Exhaustive dominance scans below this site count; kd-candidates above.
const EXHAUSTIVE_LIMIT: usize = 64;

#[derive(Clone, Debug)]
enum SiteShape {
    Point(Vec2),
    Seg {
        p: Vec2,
        dir: Vec2,
        len: f64,
    },
}

#[derive(Clone, Debug)]
struct Site {
    shape: SiteShape,
    /// group of the owning segments; `None` when shared across groups
    group: Option<usize>,
}

impl Site {
    /// Distance from `pos`, infinite where the site is not responsible
    /// (a segment site only answers inside its slab; the endpoints own the
    /// rest).
    fn distance(&self, pos: Vec2) -> f64 {
        match &self.shape {
            SiteShape::Point(p) => p.distance(pos),
            SiteShape::Seg { p, dir, len } => {
                let t = (pos - *p).dot(*dir);
                if t < 0.0 || t > *len {
                    f64::INFINITY
                } else {
                    (pos - *p).cross(*dir).abs()
                }
            }
        }
    }
}

/// A parametrised bisector curve in scaled coordinates.
enum Curve {
    Line {
        origin: Vec2,
        dir: Vec2,
        range: (f64, f64),
        /// parameter near the generating sites, used to anchor truncation
        centre: f64,
    },
    Parabola {
        /// directrix segment start
        origin: Vec2,
        /// unit direction along the directrix
        u: Vec2,
        /// unit normal towards the focus
        v: Vec2,
        /// focus position in the local frame
        fx: f64,
        fy: f64,
        range: (f64, f64),
    },
}

impl Curve {
    fn point_at(&self, t: f64) -> Vec2 {
        match self {
            Curve::Line { origin, dir, .. } => *origin + *dir * t,
            Curve::Parabola {
                origin, u, v, fx, fy, ..
            } => {
                let y = ((t - fx) * (t - fx) + fy * fy) / (2.0 * fy);
                *origin + *u * t + *v * y
            }
        }
    }

    fn range(&self) -> (f64, f64) {
        match self {
            Curve::Line { range, .. } => *range,
            Curve::Parabola { range, .. } => *range,
        }
    }
}

/// Candidate pre-filter for dominance tests on larger site sets.
struct SiteIndex {
    tree: KdTree<f64, 2>,
    sample_owner: Vec<usize>,
}

impl SiteIndex {
    fn build(sites: &[Site], spacing: f64) -> Self {
        let mut tree: KdTree<f64, 2> = KdTree::new();
        let mut sample_owner = Vec::new();
        for (idx, site) in sites.iter().enumerate() {
            let mut push = |pos: Vec2| {
                tree.add(&[pos.x, pos.y], sample_owner.len() as u64);
                sample_owner.push(idx);
            };
            match &site.shape {
                SiteShape::Point(p) => push(*p),
                SiteShape::Seg { p, dir, len } => {
                    let n = (len / spacing).ceil().max(1.0) as usize;
                    for k in 0..=n {
                        push(*p + *dir * (len * k as f64 / n as f64));
                    }
                }
            }
        }
        Self { tree, sample_owner }
    }

    /// Site indices plausibly nearest to `pos`.
    fn candidates(&self, pos: Vec2, out: &mut Vec<usize>) {
        out.clear();
        let found = self.tree.nearest_n::<SquaredEuclidean>(&[pos.x, pos.y], 16);
        for neighbour in found {
            let owner = self.sample_owner[neighbour.item as usize];
            if !out.contains(&owner) {
                out.push(owner);
            }
        }
    }
}

pub(crate) fn compute(
    lines: &[Segment],
    groups: &LineGroups<'_>,
    cfg: &VoronoiConfig,
) -> Result<RawDiagram> {
    // integer scaling: divide by edge_eps^2, round
    let scale = (1.0 / (cfg.edge_eps * cfg.edge_eps)).ceil();
    let scaled: Vec<Segment> = lines
        .iter()
        .map(|l| {
            Segment::new(
                Vec2::new((l.p.x * scale).round(), (l.p.y * scale).round()),
                Vec2::new((l.q.x * scale).round(), (l.q.y * scale).round()),
            )
        })
        .collect();

    let max_len = scaled.iter().map(|s| s.length()).fold(1.0_f64, f64::max);
    let min_len = scaled
        .iter()
        .map(|s| s.length())
        .filter(|&l| l > 0.0)
        .fold(max_len, f64::min);
    let infline = max_len * 10.0;
    let tol = (cfg.eps * scale).max(1e-9 * infline);
    let vertex_tol = (tol * 2.0).max(1e-7 * infline);
    let min_edge_len = vertex_tol * 2.0;

    // diagram features all live inside the site bounding box inflated by
    // the infinite-edge length; line bisectors are clipped to it
    let mut bbox_min = Vec2::new(f64::MAX, f64::MAX);
    let mut bbox_max = Vec2::new(f64::MIN, f64::MIN);
    for seg in &scaled {
        for p in [seg.p, seg.q] {
            bbox_min.x = bbox_min.x.min(p.x);
            bbox_min.y = bbox_min.y.min(p.y);
            bbox_max.x = bbox_max.x.max(p.x);
            bbox_max.y = bbox_max.y.max(p.y);
        }
    }
    bbox_min = bbox_min - Vec2::new(infline, infline);
    bbox_max = bbox_max + Vec2::new(infline, infline);

    let sites = build_sites(&scaled, groups);
    let index = if sites.len() > EXHAUSTIVE_LIMIT {
        Some(SiteIndex::build(&sites, max_len / 8.0))
    } else {
        None
    };

    let clip = ClipParams {
        tol,
        min_edge_len,
        min_site_len: min_len,
        infline,
        bbox: (bbox_min, bbox_max),
    };

    let mut diagram = RawDiagram::default();
    let mut interner = VertexInterner::new(vertex_tol);
    let mut candidates = Vec::new();

    for i in 0..sites.len() {
        for j in (i + 1)..sites.len() {
            if cfg.group_lines {
                if let (Some(gi), Some(gj)) = (sites[i].group, sites[j].group) {
                    if gi == gj {
                        continue;
                    }
                }
            }

            for curve in bisector_curves(&sites[i], &sites[j], infline, tol) {
                clip_and_emit(
                    &curve,
                    i,
                    j,
                    &sites,
                    index.as_ref(),
                    &clip,
                    cfg,
                    &mut interner,
                    &mut diagram,
                    &mut candidates,
                );
            }
        }
    }

    // back to input coordinates
    for v in &mut interner.positions {
        *v = *v / scale;
    }
    diagram.vertices = interner.positions;
    for edge in &mut diagram.edges {
        match &mut edge.curve {
            RawCurve::Linear(seg) => {
                seg.p = seg.p / scale;
                seg.q = seg.q / scale;
            }
            RawCurve::Parabolic(points) => {
                for p in points {
                    *p = *p / scale;
                }
            }
        }
    }

    Ok(diagram)
}

/// Decompose segments into deduplicated point sites plus open segment sites.
fn build_sites(scaled: &[Segment], groups: &LineGroups<'_>) -> Vec<Site> {
    let mut sites: Vec<Site> = Vec::with_capacity(scaled.len() * 2);
    let mut point_index: HashMap<(i64, i64), usize> = HashMap::new();

    for (seg_idx, seg) in scaled.iter().enumerate() {
        let group = groups.group_of_segment(seg_idx);

        for endpoint in [seg.p, seg.q] {
            let key = (endpoint.x.round() as i64, endpoint.y.round() as i64);
            match point_index.get(&key) {
                Some(&site_idx) => {
                    if sites[site_idx].group != group {
                        sites[site_idx].group = None;
                    }
                }
                None => {
                    point_index.insert(key, sites.len());
                    sites.push(Site {
                        shape: SiteShape::Point(endpoint),
                        group,
                    });
                }
            }
        }

        let len = seg.length();
        if len > 0.0 {
            sites.push(Site {
                shape: SiteShape::Seg {
                    p: seg.p,
                    dir: seg.direction() / len,
                    len,
                },
                group,
            });
        } else {
            log::warn!("degenerate zero-length Voronoi segment {seg_idx}, skipped");
        }
    }

    sites
}

/// Analytic bisector curves for a site pair. Secondary pairs (a segment and
/// one of its own endpoints) and degenerate configurations yield nothing.
fn bisector_curves(a: &Site, b: &Site, infline: f64, tol: f64) -> Vec<Curve> {
    match (&a.shape, &b.shape) {
        (SiteShape::Point(p), SiteShape::Point(q)) => {
            let diff = *q - *p;
            let len = diff.norm();
            if len <= tol {
                return Vec::new();
            }
            let origin = (*p + *q) * 0.5;
            let dir = diff.perp() / len;
            vec![Curve::Line {
                origin,
                dir,
                range: (-2.0 * infline, 2.0 * infline),
                centre: 0.0,
            }]
        }

        (SiteShape::Point(pt), SiteShape::Seg { p, dir, len })
        | (SiteShape::Seg { p, dir, len }, SiteShape::Point(pt)) => {
            // secondary pair: the point is an endpoint of this segment
            let seg_end = *p + *dir * *len;
            if pt.distance(*p) <= 0.5 || pt.distance(seg_end) <= 0.5 {
                return Vec::new();
            }

            let side = dir.cross(*pt - *p);
            if side.abs() <= 0.5 {
                log::debug!("point site on segment support line, degenerate parabola skipped");
                return Vec::new();
            }
            let v = if side > 0.0 { dir.perp() } else { -dir.perp() };
            let fx = (*pt - *p).dot(*dir);
            let fy = side.abs();
            vec![Curve::Parabola {
                origin: *p,
                u: *dir,
                v,
                fx,
                fy,
                range: (0.0, *len),
            }]
        }

        (
            SiteShape::Seg {
                p: p1,
                dir: u1,
                len: l1,
            },
            SiteShape::Seg {
                p: p2,
                dir: u2,
                len: l2,
            },
        ) => {
            let mid = (*p1 + *p1 + *u1 * *l1 + *p2 + *p2 + *u2 * *l2) * 0.25;
            let cross = u1.cross(*u2);

            if cross.abs() <= 1e-9 {
                // parallel supporting lines
                let offset = u1.cross(*p2 - *p1);
                if offset.abs() <= 0.5 {
                    // same line; the endpoints own any gap between them
                    return Vec::new();
                }
                let foot = *p1 + *u1 * (*p2 - *p1).dot(*u1);
                let origin = (foot + *p2) * 0.5;
                let centre = (mid - origin).dot(*u1);
                return vec![Curve::Line {
                    origin,
                    dir: *u1,
                    range: (centre - 2.0 * infline, centre + 2.0 * infline),
                    centre,
                }];
            }

            let Some((o, _, _)) = intersect_lines(*p1, *u1, *p2, *u2, 1e-12) else {
                return Vec::new();
            };
            let u2n = if u1.dot(*u2) >= 0.0 { *u2 } else { -*u2 };
            let mut curves = Vec::with_capacity(2);
            for sum in [*u1 + u2n, *u1 - u2n] {
                let norm = sum.norm();
                let dir = if norm > 1e-12 {
                    sum / norm
                } else {
                    // the angle bisector of (anti)parallel directions
                    u1.perp()
                };
                let centre = (mid - o).dot(dir);
                curves.push(Curve::Line {
                    origin: o,
                    dir,
                    range: (centre - 2.0 * infline, centre + 2.0 * infline),
                    centre,
                });
            }
            curves
        }
    }
}

/// Does the pair `(i, j)` dominate at `pos`? Both distances must equal the
/// global minimum within `tol`.
#[allow(clippy::too_many_arguments)]
fn pair_dominates(
    pos: Vec2,
    i: usize,
    j: usize,
    sites: &[Site],
    index: Option<&SiteIndex>,
    tol: f64,
    candidates: &mut Vec<usize>,
) -> bool {
    let di = sites[i].distance(pos);
    let dj = sites[j].distance(pos);
    if !di.is_finite() || !dj.is_finite() || (di - dj).abs() > tol {
        return false;
    }
    let dm = di.min(dj);

    match index {
        None => {
            for (k, site) in sites.iter().enumerate() {
                if k == i || k == j {
                    continue;
                }
                if site.distance(pos) < dm - tol {
                    return false;
                }
            }
            true
        }
        Some(index) => {
            index.candidates(pos, candidates);
            for &k in candidates.iter() {
                if k == i || k == j {
                    continue;
                }
                if sites[k].distance(pos) < dm - tol {
                    return false;
                }
            }
            true
        }
    }
}

/// Shared clipping parameters (scaled coordinates).
struct ClipParams {
    tol: f64,
    min_edge_len: f64,
    /// shortest input segment; bounds the sampling step so that no
    /// feature-sized interval falls between samples
    min_site_len: f64,
    infline: f64,
    bbox: (Vec2, Vec2),
}

/// Intersect a line's parameter range with the inflated bounding box.
fn clip_line_range(origin: Vec2, dir: Vec2, lo: f64, hi: f64, bbox: (Vec2, Vec2)) -> Option<(f64, f64)> {
    let (mut t_lo, mut t_hi) = (lo, hi);
    for (o, d, min_c, max_c) in [
        (origin.x, dir.x, bbox.0.x, bbox.1.x),
        (origin.y, dir.y, bbox.0.y, bbox.1.y),
    ] {
        if d.abs() < 1e-15 {
            if o < min_c || o > max_c {
                return None;
            }
            continue;
        }
        let (mut enter, mut exit) = ((min_c - o) / d, (max_c - o) / d);
        if enter > exit {
            std::mem::swap(&mut enter, &mut exit);
        }
        t_lo = t_lo.max(enter);
        t_hi = t_hi.min(exit);
    }
    (t_lo < t_hi).then_some((t_lo, t_hi))
}

/// Clip a bisector curve to its dominated intervals and emit diagram edges.
#[allow(clippy::too_many_arguments)]
fn clip_and_emit(
    curve: &Curve,
    i: usize,
    j: usize,
    sites: &[Site],
    index: Option<&SiteIndex>,
    clip: &ClipParams,
    cfg: &VoronoiConfig,
    interner: &mut VertexInterner,
    diagram: &mut RawDiagram,
    candidates: &mut Vec<usize>,
) {
    let (range_lo, range_hi) = curve.range();
    let (lo, hi) = match curve {
        Curve::Line { origin, dir, .. } => {
            match clip_line_range(*origin, *dir, range_lo, range_hi, clip.bbox) {
                Some(r) => r,
                None => return,
            }
        }
        Curve::Parabola { .. } => (range_lo, range_hi),
    };

    // sample finely enough that no feature-sized interval is skipped
    let step_target = (clip.min_site_len / 4.0).max((hi - lo) / MAX_SAMPLES as f64);
    let samples = (((hi - lo) / step_target).ceil() as usize).clamp(MIN_SAMPLES, MAX_SAMPLES);
    let step = (hi - lo) / samples as f64;

    let mut valid = vec![false; samples + 1];
    let mut any = false;
    for (k, v) in valid.iter_mut().enumerate() {
        let t = lo + step * k as f64;
        *v = pair_dominates(curve.point_at(t), i, j, sites, index, clip.tol, candidates);
        any |= *v;
    }
    if !any {
        return;
    }

    let mut refine = |t_invalid: f64, t_valid: f64| -> f64 {
        let (mut bad, mut good) = (t_invalid, t_valid);
        for _ in 0..REFINE_STEPS {
            let mid = 0.5 * (bad + good);
            if pair_dominates(curve.point_at(mid), i, j, sites, index, clip.tol, candidates) {
                good = mid;
            } else {
                bad = mid;
            }
        }
        good
    };

    let mut k = 0;
    while k <= samples {
        if !valid[k] {
            k += 1;
            continue;
        }
        // run of valid samples [k, run_end]
        let mut run_end = k;
        while run_end + 1 <= samples && valid[run_end + 1] {
            run_end += 1;
        }

        let at_floor = k == 0;
        let at_ceil = run_end == samples;
        let t0 = if at_floor {
            lo
        } else {
            refine(lo + step * (k - 1) as f64, lo + step * k as f64)
        };
        let t1 = if at_ceil {
            hi
        } else {
            refine(lo + step * (run_end + 1) as f64, lo + step * run_end as f64)
        };

        emit_interval(
            curve,
            t0,
            t1,
            at_floor,
            at_ceil,
            clip.min_edge_len,
            clip.infline,
            cfg,
            interner,
            diagram,
        );
        k = run_end + 1;
    }
}

/// Turn one surviving parameter interval into a diagram edge.
///
/// Interval ends that reach the sampling range are infinite: they carry no
/// vertex and their reported endpoint sits ten maximal segment lengths out
/// from the finite side.
#[allow(clippy::too_many_arguments)]
fn emit_interval(
    curve: &Curve,
    t0: f64,
    t1: f64,
    inf0: bool,
    inf1: bool,
    min_edge_len: f64,
    infline: f64,
    cfg: &VoronoiConfig,
    interner: &mut VertexInterner,
    diagram: &mut RawDiagram,
) {
    if !inf0 && !inf1 && (t1 - t0) < min_edge_len {
        return;
    }

    match curve {
        Curve::Parabola { .. } => {
            // the slab bounds the parabola: both ends are finite
            let scale = (1.0 / (cfg.edge_eps * cfg.edge_eps)).ceil();
            let step = (cfg.edge_eps * scale).max(1e-9);
            let n = (((t1 - t0) / step).ceil() as usize).max(1);

            let mut points = Vec::with_capacity(n + 1);
            for k in 0..=n {
                let t = t0 + (t1 - t0) * k as f64 / n as f64;
                points.push(curve.point_at(t));
            }

            let v0 = interner.intern(points[0]);
            let v1 = interner.intern(*points.last().unwrap());
            if v0 == v1 {
                return;
            }
            diagram.edges.push(RawEdge {
                curve: RawCurve::Parabolic(points),
                v0: Some(v0),
                v1: Some(v1),
            });
        }

        Curve::Line { centre, .. } => {
            let (start, end, v0, v1) = match (inf0, inf1) {
                (false, false) => {
                    let (a, b) = (curve.point_at(t0), curve.point_at(t1));
                    let (va, vb) = (interner.intern(a), interner.intern(b));
                    if va == vb {
                        return;
                    }
                    (a, b, Some(va), Some(vb))
                }
                (false, true) => {
                    let a = curve.point_at(t0);
                    (a, curve.point_at(t0 + infline), Some(interner.intern(a)), None)
                }
                (true, false) => {
                    let b = curve.point_at(t1);
                    (curve.point_at(t1 - infline), b, None, Some(interner.intern(b)))
                }
                (true, true) => {
                    let anchor = centre.clamp(t0, t1);
                    (
                        curve.point_at(anchor - infline),
                        curve.point_at(anchor + infline),
                        None,
                        None,
                    )
                }
            };
            diagram.edges.push(RawEdge {
                curve: RawCurve::Linear(Segment::new(start, end)),
                v0,
                v1,
            });
        }
    }
}

/// Deduplicating store of Voronoi vertex positions (scaled coordinates).
struct VertexInterner {
    positions: Vec<Vec2>,
    tol: f64,
}

impl VertexInterner {
    fn new(tol: f64) -> Self {
        Self {
            positions: Vec::new(),
            tol,
        }
    }

    fn intern(&mut self, pos: Vec2) -> usize {
        for (idx, existing) in self.positions.iter().enumerate() {
            if existing.distance(pos) <= self.tol {
                return idx;
            }
        }
        self.positions.push(pos);
        self.positions.len() - 1
    }
}
