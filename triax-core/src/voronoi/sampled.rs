//! Sampled Voronoi backend.
//!
//! Approximates the segment Voronoi diagram by the point Voronoi diagram of
//! a dense sampling along the segments: Delaunay-triangulate the samples
//! and walk the dual. A dual edge separating samples of different sites
//! approximates a skeleton edge; everything generated within one site or
//! one group is dropped. The output contains linear bisectors only and no
//! unbounded rays; the exact backend is the reference, this one trades
//! fidelity for robustness on inputs the analytic construction rejects.

use super::{LineGroups, RawCurve, RawDiagram, RawEdge, VoronoiConfig};
use crate::core::{Segment, Vec2};
use crate::delaunay::delaunay_spade;
use crate::error::Result;

pub(crate) fn compute(
    lines: &[Segment],
    groups: &LineGroups<'_>,
    cfg: &VoronoiConfig,
) -> Result<RawDiagram> {
    let max_len = lines.iter().map(|l| l.length()).fold(1.0_f64, f64::max);
    let spacing = (max_len / 16.0).max(cfg.edge_eps);

    // sample positions with their owning segment
    let mut points: Vec<Vec2> = Vec::new();
    let mut owner: Vec<usize> = Vec::new();
    for (seg_idx, line) in lines.iter().enumerate() {
        let n = ((line.length() / spacing).ceil() as usize).max(1);
        for k in 0..=n {
            let pos = line.point_at(k as f64 / n as f64);
            if !points.iter().any(|p| p.approx_eq(pos, cfg.eps)) {
                points.push(pos);
                owner.push(seg_idx);
            }
        }
    }

    let delaunay = delaunay_spade(&points, cfg.eps)?;

    let mut diagram = RawDiagram::default();
    let mut vertex_of_triangle: Vec<Option<usize>> = vec![None; delaunay.triangles.len()];
    let mut intern = |diagram: &mut RawDiagram,
                      cache: &mut Vec<Option<usize>>,
                      tri: usize,
                      pos: Vec2| {
        if let Some(v) = cache[tri] {
            return v;
        }
        let v = diagram.vertices.len();
        diagram.vertices.push(pos);
        cache[tri] = v.into();
        v
    };

    for (t1, neighbours) in delaunay.neighbours.iter().enumerate() {
        for &t2 in neighbours {
            if t2 <= t1 {
                continue;
            }

            // the dual edge separates the cells of the shared edge samples
            let shared: Vec<usize> = delaunay.triangles[t1]
                .iter()
                .copied()
                .filter(|v| delaunay.triangles[t2].contains(v))
                .collect();
            if shared.len() != 2 {
                continue;
            }
            let (owner_a, owner_b) = (owner[shared[0]], owner[shared[1]]);
            if owner_a == owner_b {
                continue;
            }
            if cfg.group_lines {
                let (ga, gb) = (
                    groups.group_of_segment(owner_a),
                    groups.group_of_segment(owner_b),
                );
                if let (Some(ga), Some(gb)) = (ga, gb) {
                    if ga == gb {
                        continue;
                    }
                }
            }

            let (c1, c2) = (delaunay.circumcentres[t1], delaunay.circumcentres[t2]);
            if c1.distance(c2) <= cfg.eps {
                continue;
            }

            let v0 = intern(&mut diagram, &mut vertex_of_triangle, t1, c1);
            let v1 = intern(&mut diagram, &mut vertex_of_triangle, t2, c2);
            diagram.edges.push(RawEdge {
                curve: RawCurve::Linear(Segment::new(c1, c2)),
                v0: Some(v0),
                v1: Some(v1),
            });
        }
    }

    Ok(diagram)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voronoi::{calc_voronoi, VoronoiBackend};

    #[test]
    fn test_sampled_corridor_approximates_midline() {
        let lines = vec![
            Segment::new(Vec2::new(0.0, 0.0), Vec2::new(4.0, 0.0)),
            Segment::new(Vec2::new(0.0, 2.0), Vec2::new(4.0, 2.0)),
        ];
        let cfg = VoronoiConfig {
            backend: VoronoiBackend::Sampled,
            edge_eps: 0.05,
            ..VoronoiConfig::default()
        };
        let results = calc_voronoi(&lines, LineGroups::default(), &cfg).unwrap();

        // the dual must contain edges near the corridor mid-line y = 1
        let near_mid = results
            .linear_edges
            .iter()
            .filter(|e| (e.seg.p.y - 1.0).abs() < 0.2 && (e.seg.q.y - 1.0).abs() < 0.2)
            .count();
        assert!(near_mid > 0, "no mid-line edges: {:?}", results.linear_edges);
        assert!(results.parabolic_edges.is_empty());
    }

    #[test]
    fn test_sampled_graph_is_connected_enough() {
        let lines = vec![
            Segment::new(Vec2::new(0.0, 0.0), Vec2::new(4.0, 0.0)),
            Segment::new(Vec2::new(0.0, 2.0), Vec2::new(4.0, 2.0)),
        ];
        let cfg = VoronoiConfig {
            backend: VoronoiBackend::Sampled,
            edge_eps: 0.05,
            ..VoronoiConfig::default()
        };
        let results = calc_voronoi(&lines, LineGroups::default(), &cfg).unwrap();

        use crate::graph::{dijkstra, Graph};
        let n = results.graph.num_vertices();
        assert!(n >= 2);
        // some vertex pair along the corridor is connected
        let pred = dijkstra(&results.graph, 0, None);
        assert!(pred.iter().filter(|p| p.is_some()).count() > 0);
    }
}
