//! Voronoi diagrams for line segments.
//!
//! The input is a planar straight-line graph: an array of segments,
//! optionally partitioned into groups where each group bounds one convex
//! obstacle. The diagram is returned as vertices, linear bisectors,
//! parabolic bisectors (discretised to polylines), and a roadmap graph over
//! the finite edges. Two interchangeable backends share this contract:
//!
//! - [`VoronoiBackend::Exact`]: pairwise bisector construction with
//!   dominance clipping against all other sites
//! - [`VoronoiBackend::Sampled`]: point sampling along the segments and the
//!   Delaunay dual of the samples; linear output only
//!
//! Coordinates are scaled by `1 / edge_eps^2` and rounded to integers
//! before the exact construction; floating-point geometry on raw input is
//! not robust enough for the near-degenerate sites raster contours produce.

mod exact;
mod sampled;

use crate::core::{Segment, Vec2};
use crate::error::{CoreError, Result};
use crate::graph::{AdjacencyList, Graph};
use crate::poly::point_in_segment_group;
use kiddo::{KdTree, SquaredEuclidean};
use serde::{Deserialize, Serialize};

/// Backend selection, per call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoronoiBackend {
    #[default]
    Exact,
    Sampled,
}

/// Parameters of the Voronoi stage.
#[derive(Clone, Debug)]
pub struct VoronoiConfig {
    pub backend: VoronoiBackend,
    /// discard edges generated by two sites of the same group
    pub group_lines: bool,
    /// discard edges with an endpoint inside any group region
    pub discard_interior: bool,
    /// Cartesian tolerance
    pub eps: f64,
    /// angular tolerance (collinear continuation merge)
    pub eps_angular: f64,
    /// parabola discretisation step; also fixes the integer scale
    pub edge_eps: f64,
}

impl Default for VoronoiConfig {
    fn default() -> Self {
        Self {
            backend: VoronoiBackend::Exact,
            group_lines: true,
            discard_interior: false,
            eps: 1e-6,
            eps_angular: 1e-3,
            edge_eps: 1e-2,
        }
    }
}

/// Segment grouping and region classification inputs.
///
/// `groups` are half-open `[begin, end)` ranges into the segment array, one
/// per convex obstacle. For the geometric interior test each group needs a
/// reference point outside its polygon (`points_outside`) and a flag telling
/// whether the region is inverted, i.e. encircles allowed space
/// (`inverted`); alternatively `region_func` classifies positions directly
/// from the configuration-space raster.
#[derive(Clone, Copy, Default)]
pub struct LineGroups<'a> {
    pub groups: &'a [(usize, usize)],
    pub points_outside: &'a [Vec2],
    pub inverted: &'a [bool],
    pub region_func: Option<&'a (dyn Fn(Vec2) -> bool + 'a)>,
}

impl LineGroups<'_> {
    /// Group index owning the segment, if any.
    pub(crate) fn group_of_segment(&self, segment: usize) -> Option<usize> {
        self.groups
            .iter()
            .position(|&(begin, end)| segment >= begin && segment < end)
    }
}

/// A straight diagram edge. A `None` vertex index marks an end that extends
/// to infinity; its segment endpoint lies 10 maximal segment lengths out.
#[derive(Clone, Debug)]
pub struct LinearBisector {
    pub seg: Segment,
    pub v0: Option<usize>,
    pub v1: Option<usize>,
}

/// A curved diagram edge between a point site and a line site, discretised
/// with a step bounded by `edge_eps`. Always finite.
#[derive(Clone, Debug)]
pub struct ParabolicBisector {
    pub points: Vec<Vec2>,
    pub v0: usize,
    pub v1: usize,
}

/// Reference to either bisector kind.
pub enum BisectorRef<'a> {
    Linear(&'a LinearBisector),
    Parabolic(&'a ParabolicBisector),
}

/// Backend-internal edge representation before post-processing.
#[derive(Clone, Debug)]
pub(crate) enum RawCurve {
    Linear(Segment),
    Parabolic(Vec<Vec2>),
}

#[derive(Clone, Debug)]
pub(crate) struct RawEdge {
    pub curve: RawCurve,
    pub v0: Option<usize>,
    pub v1: Option<usize>,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct RawDiagram {
    pub vertices: Vec<Vec2>,
    pub edges: Vec<RawEdge>,
}

/// The assembled diagram plus its roadmap graph.
pub struct VoronoiResults {
    pub vertices: Vec<Vec2>,
    pub linear_edges: Vec<LinearBisector>,
    pub parabolic_edges: Vec<ParabolicBisector>,
    /// Undirected weighted graph; vertex ids correspond to `vertices`
    /// indices, weights are Euclidean (chord) lengths.
    pub graph: AdjacencyList,
    index: Option<KdTree<f64, 2>>,
}

impl VoronoiResults {
    /// Index of the Voronoi vertex closest to a position.
    pub fn nearest_vertex(&self, pos: Vec2) -> Option<usize> {
        let index = self.index.as_ref()?;
        if self.vertices.is_empty() {
            return None;
        }
        let found = index.nearest_one::<SquaredEuclidean>(&[pos.x, pos.y]);
        Some(found.item as usize)
    }

    /// The bisector joining two vertex indices, if they are adjacent.
    pub fn edge_between(&self, i: usize, j: usize) -> Option<BisectorRef<'_>> {
        for edge in &self.parabolic_edges {
            if (edge.v0 == i && edge.v1 == j) || (edge.v0 == j && edge.v1 == i) {
                return Some(BisectorRef::Parabolic(edge));
            }
        }
        for edge in &self.linear_edges {
            if (edge.v0 == Some(i) && edge.v1 == Some(j))
                || (edge.v0 == Some(j) && edge.v1 == Some(i))
            {
                return Some(BisectorRef::Linear(edge));
            }
        }
        None
    }
}

/// Compute the line-segment Voronoi diagram.
pub fn calc_voronoi(
    lines: &[Segment],
    groups: LineGroups<'_>,
    cfg: &VoronoiConfig,
) -> Result<VoronoiResults> {
    if lines.is_empty() {
        return Err(CoreError::InvalidInput("no Voronoi input segments".into()));
    }
    if lines.iter().any(|l| !l.p.is_finite() || !l.q.is_finite()) {
        return Err(CoreError::InvalidInput(
            "non-finite Voronoi input segment".into(),
        ));
    }

    let raw = match cfg.backend {
        VoronoiBackend::Exact => exact::compute(lines, &groups, cfg)?,
        VoronoiBackend::Sampled => sampled::compute(lines, &groups, cfg)?,
    };

    Ok(postprocess(raw, lines, &groups, cfg))
}

// ----------------------------------------------------------------------------
// post-processing shared by both backends
// ----------------------------------------------------------------------------

fn postprocess(
    mut raw: RawDiagram,
    lines: &[Segment],
    groups: &LineGroups<'_>,
    cfg: &VoronoiConfig,
) -> VoronoiResults {
    if cfg.discard_interior && !groups.groups.is_empty() {
        discard_interior_edges(&mut raw, lines, groups, cfg.eps);
    }

    merge_collinear_chains(&mut raw, cfg.eps_angular);

    // build the roadmap graph over finite edges
    let mut graph = AdjacencyList::new();
    for idx in 0..raw.vertices.len() {
        graph.add_vertex(&idx.to_string());
    }
    for edge in &raw.edges {
        if let (Some(v0), Some(v1)) = (edge.v0, edge.v1) {
            if v0 != v1 {
                let len = raw.vertices[v0].distance(raw.vertices[v1]);
                graph.add_edge(v0, v1, len);
            }
        }
    }

    // drop vertices without any connection, compacting all indices
    let connected: Vec<bool> = (0..raw.vertices.len())
        .map(|v| !graph.neighbours(v).is_empty())
        .collect();
    let mut remap: Vec<Option<usize>> = vec![None; raw.vertices.len()];
    let mut vertices = Vec::new();
    let mut final_graph = AdjacencyList::new();
    for (old, &keep) in connected.iter().enumerate() {
        if keep {
            remap[old] = Some(vertices.len());
            final_graph.add_vertex(&old.to_string());
            vertices.push(raw.vertices[old]);
        }
    }
    for (old, &keep) in connected.iter().enumerate() {
        if !keep {
            continue;
        }
        for n in graph.neighbours(old) {
            if n > old {
                if let (Some(a), Some(b)) = (remap[old], remap[n]) {
                    final_graph.add_edge(a, b, graph.weight(old, n).unwrap_or(0.0));
                }
            }
        }
    }

    let mut linear_edges = Vec::new();
    let mut parabolic_edges = Vec::new();
    for edge in raw.edges {
        let v0 = edge.v0.and_then(|v| remap[v]);
        let v1 = edge.v1.and_then(|v| remap[v]);
        match edge.curve {
            RawCurve::Linear(seg) => linear_edges.push(LinearBisector { seg, v0, v1 }),
            RawCurve::Parabolic(points) => {
                // parabolic arcs are always finite; drop any whose vertices
                // fell to compaction
                if let (Some(v0), Some(v1)) = (v0, v1) {
                    parabolic_edges.push(ParabolicBisector { points, v0, v1 });
                }
            }
        }
    }

    let index = if vertices.is_empty() {
        None
    } else {
        let mut tree: KdTree<f64, 2> = KdTree::new();
        for (idx, v) in vertices.iter().enumerate() {
            tree.add(&[v.x, v.y], idx as u64);
        }
        Some(tree)
    };

    VoronoiResults {
        vertices,
        linear_edges,
        parabolic_edges,
        graph: final_graph,
        index,
    }
}

/// Remove edges whose endpoints lie inside a forbidden region.
fn discard_interior_edges(
    raw: &mut RawDiagram,
    lines: &[Segment],
    groups: &LineGroups<'_>,
    eps: f64,
) {
    let vertices = raw.vertices.clone();
    raw.edges.retain(|edge| {
        let inside = edge_in_forbidden_region(
            edge.v0.map(|v| vertices[v]),
            edge.v1.map(|v| vertices[v]),
            lines,
            groups,
            eps,
        );
        if inside {
            log::debug!("discarding Voronoi edge inside obstacle region");
        }
        !inside
    });
}

/// Port of the region test deciding whether a diagram edge is buried inside
/// an obstacle. Normal regions encircle forbidden space: any endpoint
/// inside one condemns the edge. Inverted regions encircle allowed space:
/// the edge is condemned when an endpoint escapes all of them.
fn edge_in_forbidden_region(
    v0: Option<Vec2>,
    v1: Option<Vec2>,
    lines: &[Segment],
    groups: &LineGroups<'_>,
    eps: f64,
) -> bool {
    if let Some(func) = groups.region_func {
        return [v0, v1].iter().flatten().any(|&pos| func(pos));
    }

    let mut has_inverted = false;
    let mut v0_outside_all_inverted = true;
    let mut v1_outside_all_inverted = true;

    for (grp_idx, &(begin, end)) in groups.groups.iter().enumerate() {
        let outside = groups
            .points_outside
            .get(grp_idx)
            .copied()
            .unwrap_or_else(|| fallback_outside_point(lines, begin, end));
        let inverted = groups.inverted.get(grp_idx).copied().unwrap_or(false);

        for (vert, outside_flag) in [
            (v0, &mut v0_outside_all_inverted),
            (v1, &mut v1_outside_all_inverted),
        ] {
            let Some(pos) = vert else { continue };
            let inside = point_in_segment_group(lines, begin, end, pos, outside, eps);
            if inverted {
                has_inverted = true;
                if inside {
                    *outside_flag = false;
                }
            } else if inside {
                return true;
            }
        }
    }

    has_inverted && (v0_outside_all_inverted || v1_outside_all_inverted)
}

/// Reference point guaranteed outside the group: just past its bounding box.
fn fallback_outside_point(lines: &[Segment], begin: usize, end: usize) -> Vec2 {
    let mut min = Vec2::new(f64::MAX, f64::MAX);
    for line in &lines[begin..end] {
        min.x = min.x.min(line.p.x).min(line.q.x);
        min.y = min.y.min(line.p.y).min(line.q.y);
    }
    min - Vec2::new(1.0, 1.3)
}

/// Merge pairs of linear edges meeting collinearly at a degree-2 vertex.
///
/// The exact backend produces the diagram per site pair, so a straight
/// bisector shared by several pairs (parallel segments and their endpoint
/// pairs) arrives in collinear pieces; geometrically it is one edge.
fn merge_collinear_chains(raw: &mut RawDiagram, eps_angular: f64) {
    loop {
        // degree over finite endpoints of all edges
        let mut incident: Vec<Vec<usize>> = vec![Vec::new(); raw.vertices.len()];
        for (e_idx, edge) in raw.edges.iter().enumerate() {
            for v in [edge.v0, edge.v1].into_iter().flatten() {
                incident[v].push(e_idx);
            }
        }

        let mut merged = false;
        'vertices: for (v, edges_at) in incident.iter().enumerate() {
            if edges_at.len() != 2 {
                continue;
            }
            let (ea, eb) = (edges_at[0], edges_at[1]);
            if ea == eb {
                continue;
            }
            let (RawCurve::Linear(sa), RawCurve::Linear(sb)) =
                (&raw.edges[ea].curve, &raw.edges[eb].curve)
            else {
                continue;
            };

            let da = sa.direction().normalized();
            let db = sb.direction().normalized();
            if da.cross(db).abs() > eps_angular {
                continue;
            }

            // far endpoints and vertex indices away from v
            let (far_a, far_va) = if raw.edges[ea].v0 == Some(v) {
                (raw.edges[ea].seg_end(), raw.edges[ea].v1)
            } else {
                (raw.edges[ea].seg_start(), raw.edges[ea].v0)
            };
            let (far_b, far_vb) = if raw.edges[eb].v0 == Some(v) {
                (raw.edges[eb].seg_end(), raw.edges[eb].v1)
            } else {
                (raw.edges[eb].seg_start(), raw.edges[eb].v0)
            };

            // the pieces must continue through v, not double back
            let at_v = raw.vertices[v];
            if (far_a - at_v).dot(far_b - at_v) >= 0.0 {
                continue;
            }

            raw.edges[ea] = RawEdge {
                curve: RawCurve::Linear(Segment::new(far_a, far_b)),
                v0: far_va,
                v1: far_vb,
            };
            raw.edges.remove(eb);
            merged = true;
            break 'vertices;
        }

        if !merged {
            break;
        }
    }
}

impl RawEdge {
    fn seg_start(&self) -> Vec2 {
        match &self.curve {
            RawCurve::Linear(seg) => seg.p,
            RawCurve::Parabolic(points) => points[0],
        }
    }

    fn seg_end(&self) -> Vec2 {
        match &self.curve {
            RawCurve::Linear(seg) => seg.q,
            RawCurve::Parabolic(points) => *points.last().unwrap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;

    fn seg(x1: f64, y1: f64, x2: f64, y2: f64) -> Segment {
        Segment::new(Vec2::new(x1, y1), Vec2::new(x2, y2))
    }

    fn cfg() -> VoronoiConfig {
        VoronoiConfig {
            edge_eps: 0.1,
            ..VoronoiConfig::default()
        }
    }

    #[test]
    fn test_two_parallel_segments_single_bisector() {
        let lines = vec![seg(0.0, 0.0, 1.0, 0.0), seg(0.0, 2.0, 1.0, 2.0)];
        let results = calc_voronoi(&lines, LineGroups::default(), &cfg()).unwrap();

        assert_eq!(
            results.linear_edges.len(),
            1,
            "expected one merged bisector: {:?}",
            results.linear_edges
        );
        assert!(results.parabolic_edges.is_empty());
        // the surviving edge is infinite on both sides: no roadmap vertices
        assert_eq!(results.vertices.len(), 0);
        assert_eq!(results.graph.num_vertices(), 0);

        let edge = &results.linear_edges[0];
        assert!(edge.v0.is_none() && edge.v1.is_none());
        assert!((edge.seg.p.y - 1.0).abs() < 1e-6, "{:?}", edge.seg);
        assert!((edge.seg.q.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_single_segment_no_finite_edges() {
        let lines = vec![seg(0.0, 0.0, 2.0, 0.0)];
        let results = calc_voronoi(&lines, LineGroups::default(), &cfg()).unwrap();
        // a lone segment has no finite Voronoi vertices
        assert!(results.vertices.is_empty());
        assert!(results.graph.num_vertices() == 0);
    }

    #[test]
    fn test_empty_input_rejected() {
        assert!(calc_voronoi(&[], LineGroups::default(), &cfg()).is_err());
    }

    #[test]
    fn test_square_obstacle_skeleton() {
        // one square obstacle as a grouped contour: all interior edges are
        // discarded, the outside skeleton keeps the diagonal spokes
        let lines = vec![
            seg(0.0, 0.0, 1.0, 0.0),
            seg(1.0, 0.0, 1.0, 1.0),
            seg(1.0, 1.0, 0.0, 1.0),
            seg(0.0, 1.0, 0.0, 0.0),
        ];
        let groups_arr = [(0usize, 4usize)];
        let groups = LineGroups {
            groups: &groups_arr,
            ..LineGroups::default()
        };
        let results = calc_voronoi(&lines, groups, &cfg()).unwrap();

        // everything generated by the single group alone is discarded
        assert!(results.vertices.is_empty(), "{:?}", results.vertices);
        assert!(results.linear_edges.is_empty());
        assert!(results.parabolic_edges.is_empty());
    }

    #[test]
    fn test_two_squares_corridor_bisector() {
        // two square obstacles side by side: the corridor between them is
        // bisected by the x = 2 line
        let mut lines = Vec::new();
        square(0.0, 0.0, &mut lines);
        square(3.0, 0.0, &mut lines);

        let groups_arr = [(0usize, 4usize), (4usize, 8usize)];
        let groups = LineGroups {
            groups: &groups_arr,
            ..LineGroups::default()
        };
        let results = calc_voronoi(&lines, groups, &cfg()).unwrap();

        let has_corridor_edge = results.linear_edges.iter().any(|e| {
            (e.seg.p.x - 2.0).abs() < 1e-3 && (e.seg.q.x - 2.0).abs() < 1e-3
        });
        assert!(has_corridor_edge, "{:?}", results.linear_edges);
    }

    fn square(x0: f64, y0: f64, out: &mut Vec<Segment>) {
        out.push(seg(x0, y0, x0 + 1.0, y0));
        out.push(seg(x0 + 1.0, y0, x0 + 1.0, y0 + 1.0));
        out.push(seg(x0 + 1.0, y0 + 1.0, x0, y0 + 1.0));
        out.push(seg(x0, y0 + 1.0, x0, y0));
    }

    #[test]
    fn test_squares_over_wall_skeleton() {
        // two squares above a long wall: the skeleton between them carries
        // finite straight pieces, parabolic arcs around the square corners,
        // and junction vertices that survive into the roadmap graph
        let mut lines = Vec::new();
        square(0.0, 0.0, &mut lines);
        square(3.0, 0.0, &mut lines);
        // wall below, y in [-3, -2], spanning past both squares
        lines.push(seg(-2.0, -2.0, 6.0, -2.0));
        lines.push(seg(6.0, -2.0, 6.0, -3.0));
        lines.push(seg(6.0, -3.0, -2.0, -3.0));
        lines.push(seg(-2.0, -3.0, -2.0, -2.0));

        let groups_arr = [(0usize, 4usize), (4usize, 8usize), (8usize, 12usize)];
        let groups = LineGroups {
            groups: &groups_arr,
            ..LineGroups::default()
        };
        let results = calc_voronoi(&lines, groups, &cfg()).unwrap();

        assert!(
            results.vertices.len() >= 4,
            "expected junction vertices, got {:?}",
            results.vertices
        );
        // the band between squares and wall runs along y = -1
        let has_band_edge = results
            .linear_edges
            .iter()
            .any(|e| (e.seg.p.y + 1.0).abs() < 1e-3 && (e.seg.q.y + 1.0).abs() < 1e-3);
        assert!(has_band_edge, "{:?}", results.linear_edges);
        // square corners opposite the wall generate parabolic arcs
        assert!(!results.parabolic_edges.is_empty());

        // all surviving vertices are connected
        assert_eq!(results.graph.num_vertices(), results.vertices.len());
        for v in 0..results.graph.num_vertices() {
            assert!(!results.graph.neighbours(v).is_empty());
        }
        // bisector property: graph edge weights equal vertex distances
        for v in 0..results.graph.num_vertices() {
            for n in results.graph.neighbours(v) {
                let w = results.graph.weight(v, n).unwrap();
                let d = results.vertices[v].distance(results.vertices[n]);
                assert!((w - d).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_linear_bisector_equidistance() {
        // property: points on a point-point bisector are equidistant from
        // both generating endpoints
        let lines = vec![seg(0.0, 0.0, 1.0, 0.0), seg(0.0, 2.0, 1.0, 2.0)];
        let results = calc_voronoi(&lines, LineGroups::default(), &cfg()).unwrap();
        let edge = &results.linear_edges[0];

        for t in [0.25, 0.5, 0.75] {
            let q = edge.seg.point_at(t);
            let d1 = lines[0].distance_to(q);
            let d2 = lines[1].distance_to(q);
            assert!((d1 - d2).abs() < 1e-6, "not equidistant at {q:?}");
        }
    }
}
