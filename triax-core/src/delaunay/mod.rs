//! Delaunay triangulation, three implementations with one output contract.
//!
//! - [`delaunay_spade`]: backed by the `spade` triangulation library
//! - [`delaunay_iterative`]: incremental insertion with Lawson edge flips
//! - [`delaunay_lifted`]: hand-rolled paraboloid lift; a triple forms a
//!   triangle iff no other point lies below its lifted plane, which is the
//!   in-circumcircle determinant test applied to all triples
//!
//! Every implementation returns the triangles in CCW order together with
//! their circumcentres (the Voronoi vertices of the point set) and the
//! edge-sharing neighbour sets.

use crate::core::{side_of_line, Vec2};
use crate::error::{CoreError, Result};
use spade::{DelaunayTriangulation, Point2, Triangulation};
use std::collections::HashMap;

/// Common result of all triangulation variants.
#[derive(Clone, Debug, Default)]
pub struct DelaunayResults {
    /// Deduplicated input points; triangle indices refer to this list.
    pub vertices: Vec<Vec2>,
    /// CCW vertex index triples.
    pub triangles: Vec<[usize; 3]>,
    /// Circumcentre of each triangle.
    pub circumcentres: Vec<Vec2>,
    /// For each triangle, the triangles sharing one of its edges (at most 3).
    pub neighbours: Vec<Vec<usize>>,
}

/// Circumcentre of the triangle `(a, b, c)`.
pub fn circumcentre(a: Vec2, b: Vec2, c: Vec2) -> Option<Vec2> {
    let n = 2.0 * a.x * (b.y - c.y) + 2.0 * b.x * (c.y - a.y) + 2.0 * c.x * (a.y - b.y);
    if n == 0.0 {
        return None;
    }
    let asq = a.dot(a);
    let bsq = b.dot(b);
    let csq = c.dot(c);
    let x = asq * (b.y - c.y) + bsq * (c.y - a.y) + csq * (a.y - b.y);
    let y = asq * (c.x - b.x) + bsq * (a.x - c.x) + csq * (b.x - a.x);
    Some(Vec2::new(x / n, y / n))
}

/// In-circumcircle determinant for the CCW triangle `(a, b, c)`.
///
/// Positive iff `p` lies strictly inside the circumcircle. This is the
/// plane-side test of the paraboloid lift written out.
pub fn in_circumcircle(a: Vec2, b: Vec2, c: Vec2, p: Vec2) -> f64 {
    let (ax, ay) = (a.x - p.x, a.y - p.y);
    let (bx, by) = (b.x - p.x, b.y - p.y);
    let (cx, cy) = (c.x - p.x, c.y - p.y);
    let (ad, bd, cd) = (ax * ax + ay * ay, bx * bx + by * by, cx * cx + cy * cy);

    ax * (by * cd - bd * cy) - ay * (bx * cd - bd * cx) + ad * (bx * cy - by * cx)
}

/// Drop duplicate points (within `eps`) without reordering, rejecting
/// non-finite coordinates.
fn prepare_points(points: &[Vec2], eps: f64) -> Result<Vec<Vec2>> {
    if points.iter().any(|p| !p.is_finite()) {
        return Err(CoreError::InvalidInput(
            "triangulation input contains non-finite coordinates".into(),
        ));
    }
    let mut unique: Vec<Vec2> = Vec::with_capacity(points.len());
    for &p in points {
        if !unique.iter().any(|q| q.approx_eq(p, eps)) {
            unique.push(p);
        }
    }
    Ok(unique)
}

/// Reorder a triple to CCW.
fn ccw_triple(points: &[Vec2], t: [usize; 3]) -> [usize; 3] {
    if side_of_line(points[t[0]], points[t[1]], points[t[2]]) < 0.0 {
        [t[0], t[2], t[1]]
    } else {
        t
    }
}

/// Edge-sharing neighbour triangles (shared pair of vertex indices).
fn extract_neighbours(triangles: &[[usize; 3]]) -> Vec<Vec<usize>> {
    let mut edge_map: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
    for (t_idx, t) in triangles.iter().enumerate() {
        for e in 0..3 {
            let (a, b) = (t[e], t[(e + 1) % 3]);
            let key = (a.min(b), a.max(b));
            edge_map.entry(key).or_default().push(t_idx);
        }
    }

    let mut neighbours = vec![Vec::new(); triangles.len()];
    for owners in edge_map.values() {
        for &a in owners {
            for &b in owners {
                if a != b && !neighbours[a].contains(&b) {
                    neighbours[a].push(b);
                }
            }
        }
    }
    for n in &mut neighbours {
        n.sort_unstable();
    }
    neighbours
}

fn assemble(vertices: Vec<Vec2>, triangles: Vec<[usize; 3]>) -> DelaunayResults {
    let circumcentres = triangles
        .iter()
        .map(|t| {
            circumcentre(vertices[t[0]], vertices[t[1]], vertices[t[2]])
                .unwrap_or(vertices[t[0]])
        })
        .collect();
    let neighbours = extract_neighbours(&triangles);
    DelaunayResults {
        vertices,
        triangles,
        circumcentres,
        neighbours,
    }
}

// ----------------------------------------------------------------------------
// library-backed variant
// ----------------------------------------------------------------------------

/// Delaunay triangulation via `spade`.
pub fn delaunay_spade(points: &[Vec2], eps: f64) -> Result<DelaunayResults> {
    let vertices = prepare_points(points, eps)?;
    if vertices.len() < 3 {
        return Ok(assemble(vertices, Vec::new()));
    }

    let mut tri: DelaunayTriangulation<Point2<f64>> = DelaunayTriangulation::new();
    let mut index_of_handle: HashMap<usize, usize> = HashMap::new();
    for (i, p) in vertices.iter().enumerate() {
        let handle = tri
            .insert(Point2::new(p.x, p.y))
            .map_err(|e| CoreError::InvalidInput(format!("spade insertion failed: {e:?}")))?;
        index_of_handle.insert(handle.index(), i);
    }

    let mut triangles = Vec::with_capacity(tri.num_inner_faces());
    for face in tri.inner_faces() {
        let vs = face.vertices();
        let t = [
            index_of_handle[&vs[0].fix().index()],
            index_of_handle[&vs[1].fix().index()],
            index_of_handle[&vs[2].fix().index()],
        ];
        triangles.push(ccw_triple(&vertices, t));
    }

    Ok(assemble(vertices, triangles))
}

// ----------------------------------------------------------------------------
// iterative variant (incremental insertion + Lawson flips)
// ----------------------------------------------------------------------------

/// Barycentric inside test (strictly inside or on the border).
fn point_in_triangle(a: Vec2, b: Vec2, c: Vec2, p: Vec2, eps: f64) -> bool {
    let d1 = side_of_line(a, b, p);
    let d2 = side_of_line(b, c, p);
    let d3 = side_of_line(c, a, p);
    d1 >= -eps && d2 >= -eps && d3 >= -eps
}

/// Andrew's monotone chain over a subset of point indices; returns hull
/// indices in CCW order.
fn hull_indices(points: &[Vec2], idxs: &[usize]) -> Vec<usize> {
    let mut sorted: Vec<usize> = idxs.to_vec();
    sorted.sort_by(|&a, &b| {
        (points[a].x, points[a].y)
            .partial_cmp(&(points[b].x, points[b].y))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    if sorted.len() <= 2 {
        return sorted;
    }

    let mut lower: Vec<usize> = Vec::new();
    for &i in &sorted {
        while lower.len() >= 2
            && side_of_line(
                points[lower[lower.len() - 2]],
                points[lower[lower.len() - 1]],
                points[i],
            ) <= 0.0
        {
            lower.pop();
        }
        lower.push(i);
    }
    let mut upper: Vec<usize> = Vec::new();
    for &i in sorted.iter().rev() {
        while upper.len() >= 2
            && side_of_line(
                points[upper[upper.len() - 2]],
                points[upper[upper.len() - 1]],
                points[i],
            ) <= 0.0
        {
            upper.pop();
        }
        upper.push(i);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Flip non-Delaunay edges until the empty-circumcircle property holds.
fn flip_fix(points: &[Vec2], triangles: &mut Vec<[usize; 3]>, eps: f64) {
    let max_rounds = triangles.len() * triangles.len() + 16;
    for _ in 0..max_rounds {
        let mut flipped = false;

        'outer: for t1_idx in 0..triangles.len() {
            for t2_idx in (t1_idx + 1)..triangles.len() {
                let t1 = triangles[t1_idx];
                let t2 = triangles[t2_idx];

                // find the shared edge
                let shared: Vec<usize> =
                    t1.iter().copied().filter(|v| t2.contains(v)).collect();
                if shared.len() != 2 {
                    continue;
                }
                let a = shared[0];
                let b = shared[1];
                let c = *t1.iter().find(|v| !shared.contains(v)).unwrap();
                let d = *t2.iter().find(|v| !shared.contains(v)).unwrap();

                let t1c = ccw_triple(points, [a, b, c]);
                if in_circumcircle(points[t1c[0]], points[t1c[1]], points[t1c[2]], points[d])
                    > eps
                {
                    // the flip is only valid when the quadrilateral is convex
                    let q1 = side_of_line(points[c], points[d], points[a]);
                    let q2 = side_of_line(points[c], points[d], points[b]);
                    if q1 * q2 >= 0.0 {
                        continue;
                    }

                    triangles[t1_idx] = ccw_triple(points, [c, d, a]);
                    triangles[t2_idx] = ccw_triple(points, [c, d, b]);
                    flipped = true;
                    break 'outer;
                }
            }
        }

        if !flipped {
            break;
        }
    }
}

/// Incremental Delaunay triangulation.
///
/// Points are inserted one at a time: a point inside an existing triangle
/// splits it into three; a point outside the current hull is connected to
/// the visible part of the hull. Edge flips restore the Delaunay property
/// after every insertion.
pub fn delaunay_iterative(points: &[Vec2], eps: f64) -> Result<DelaunayResults> {
    let vertices = prepare_points(points, eps)?;
    if vertices.len() < 3 {
        return Ok(assemble(vertices, Vec::new()));
    }

    let mut triangles: Vec<[usize; 3]> = Vec::new();
    let mut inserted: Vec<usize> = Vec::new();

    for i in 0..vertices.len() {
        let p = vertices[i];

        if triangles.is_empty() {
            inserted.push(i);
            // everything so far may be collinear; seed once a point leaves
            // the common line, fanning it out over the collinear run
            if inserted.len() >= 3 {
                let apex = *inserted.last().unwrap();
                let mut run: Vec<usize> = inserted[..inserted.len() - 1].to_vec();
                let origin = vertices[run[0]];
                let dir = vertices[*run.last().unwrap()] - origin;

                if side_of_line(origin, origin + dir, vertices[apex]).abs() > eps {
                    run.sort_by(|&u, &v| {
                        (vertices[u] - origin)
                            .dot(dir)
                            .partial_cmp(&(vertices[v] - origin).dot(dir))
                            .unwrap_or(std::cmp::Ordering::Equal)
                    });
                    for w in run.windows(2) {
                        let t = ccw_triple(&vertices, [w[0], w[1], apex]);
                        if side_of_line(vertices[t[0]], vertices[t[1]], vertices[t[2]]).abs()
                            > eps
                        {
                            triangles.push(t);
                        }
                    }
                    flip_fix(&vertices, &mut triangles, eps);
                }
            }
            continue;
        }

        // locate the containing triangle
        let containing = triangles.iter().position(|t| {
            point_in_triangle(vertices[t[0]], vertices[t[1]], vertices[t[2]], p, eps)
        });

        match containing {
            Some(t_idx) => {
                let [a, b, c] = triangles[t_idx];
                triangles.swap_remove(t_idx);
                for t in [[a, b, i], [b, c, i], [c, a, i]] {
                    if side_of_line(vertices[t[0]], vertices[t[1]], vertices[t[2]]).abs() > eps {
                        triangles.push(ccw_triple(&vertices, t));
                    }
                }
            }
            None => {
                // connect to every hull edge visible from p
                let hull = hull_indices(&vertices, &inserted);
                let n = hull.len();
                for e in 0..n {
                    let (a, b) = (hull[e], hull[(e + 1) % n]);
                    if side_of_line(vertices[a], vertices[b], p) < -eps {
                        triangles.push(ccw_triple(&vertices, [a, b, i]));
                    }
                }
            }
        }

        inserted.push(i);
        flip_fix(&vertices, &mut triangles, eps);
    }

    Ok(assemble(vertices, triangles))
}

// ----------------------------------------------------------------------------
// parabolic lift variant
// ----------------------------------------------------------------------------

/// Delaunay triangulation via the explicit paraboloid lift.
///
/// Each CCW triple is lifted onto `z = x^2 + y^2`; it is a lower-hull facet
/// (and thus a Delaunay triangle) iff no other point lies below its plane.
/// Quartic in the point count; intended for moderate inputs and as a
/// reference implementation for the other two.
pub fn delaunay_lifted(points: &[Vec2], eps: f64) -> Result<DelaunayResults> {
    let vertices = prepare_points(points, eps)?;
    let n = vertices.len();
    if n < 3 {
        return Ok(assemble(vertices, Vec::new()));
    }

    let mut candidates = Vec::new();
    for i in 0..n {
        for j in (i + 1)..n {
            for k in (j + 1)..n {
                let t = ccw_triple(&vertices, [i, j, k]);
                let (a, b, c) = (vertices[t[0]], vertices[t[1]], vertices[t[2]]);
                if side_of_line(a, b, c).abs() <= eps {
                    continue;
                }

                let empty = (0..n)
                    .filter(|&m| m != i && m != j && m != k)
                    .all(|m| in_circumcircle(a, b, c, vertices[m]) <= eps);
                if empty {
                    candidates.push(t);
                }
            }
        }
    }

    // cocircular point groups admit several triangulations and pass the
    // empty-circle test for all of them; keep a non-overlapping subset
    let mut triangles: Vec<[usize; 3]> = Vec::with_capacity(candidates.len());
    for t in candidates {
        if !triangles.iter().any(|kept| triangles_overlap(&vertices, kept, &t, eps)) {
            triangles.push(t);
        }
    }

    Ok(assemble(vertices, triangles))
}

/// Do the interiors of two triangles overlap? Shared edges and touching
/// vertices do not count; a properly crossing edge pair or a contained
/// centroid does.
fn triangles_overlap(points: &[Vec2], t1: &[usize; 3], t2: &[usize; 3], eps: f64) -> bool {
    use crate::core::intersect_lines;

    for e1 in 0..3 {
        let (a1, b1) = (points[t1[e1]], points[t1[(e1 + 1) % 3]]);
        for e2 in 0..3 {
            let (a2, b2) = (points[t2[e2]], points[t2[(e2 + 1) % 3]]);
            if let Some((_, s, t)) = intersect_lines(a1, b1 - a1, a2, b2 - a2, eps) {
                if s > eps && s < 1.0 - eps && t > eps && t < 1.0 - eps {
                    return true;
                }
            }
        }
    }

    for (t_a, t_b) in [(t1, t2), (t2, t1)] {
        let centroid = (points[t_a[0]] + points[t_a[1]] + points[t_a[2]]) / 3.0;
        if point_in_triangle(
            points[t_b[0]],
            points[t_b[1]],
            points[t_b[2]],
            centroid,
            -eps,
        ) {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn unit_square() -> Vec<Vec2> {
        vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ]
    }

    fn sorted_triples(results: &DelaunayResults) -> Vec<[usize; 3]> {
        let mut ts: Vec<[usize; 3]> = results
            .triangles
            .iter()
            .map(|t| {
                let mut s = *t;
                s.sort_unstable();
                s
            })
            .collect();
        ts.sort_unstable();
        ts
    }

    fn assert_delaunay_property(results: &DelaunayResults, eps: f64) {
        for t in &results.triangles {
            let (a, b, c) = (
                results.vertices[t[0]],
                results.vertices[t[1]],
                results.vertices[t[2]],
            );
            for (i, &p) in results.vertices.iter().enumerate() {
                if t.contains(&i) {
                    continue;
                }
                assert!(
                    in_circumcircle(a, b, c, p) <= eps,
                    "point {p:?} inside circumcircle of {t:?}"
                );
            }
        }
    }

    #[test]
    fn test_square_two_triangles() {
        for results in [
            delaunay_spade(&unit_square(), EPS).unwrap(),
            delaunay_iterative(&unit_square(), EPS).unwrap(),
            delaunay_lifted(&unit_square(), EPS).unwrap(),
        ] {
            assert_eq!(results.triangles.len(), 2, "{:?}", results.triangles);
            // one shared diagonal: the two triangles are mutual neighbours
            assert_eq!(results.neighbours[0], vec![1]);
            assert_eq!(results.neighbours[1], vec![0]);
            // circumcentre of both triangles is the square centre
            for c in &results.circumcentres {
                assert!(c.approx_eq(Vec2::new(0.5, 0.5), 1e-9), "{c:?}");
            }
            assert_delaunay_property(&results, 1e-9);
        }
    }

    #[test]
    fn test_implementations_agree() {
        let points = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(2.0, 0.2),
            Vec2::new(3.1, 1.7),
            Vec2::new(1.2, 2.3),
            Vec2::new(-0.4, 1.1),
            Vec2::new(1.4, 1.0),
        ];
        let s = delaunay_spade(&points, EPS).unwrap();
        let i = delaunay_iterative(&points, EPS).unwrap();
        let l = delaunay_lifted(&points, EPS).unwrap();

        assert_eq!(sorted_triples(&s), sorted_triples(&l));
        assert_eq!(sorted_triples(&i), sorted_triples(&l));
        for r in [&s, &i, &l] {
            assert_delaunay_property(r, 1e-9);
        }
    }

    #[test]
    fn test_retriangulation_idempotent() {
        let points = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.1),
            Vec2::new(0.4, 0.9),
            Vec2::new(1.3, 1.2),
            Vec2::new(-0.2, 0.6),
        ];
        let first = delaunay_lifted(&points, EPS).unwrap();
        let second = delaunay_lifted(&first.vertices, EPS).unwrap();
        assert_eq!(sorted_triples(&first), sorted_triples(&second));
    }

    #[test]
    fn test_boundary_cases() {
        for f in [delaunay_spade, delaunay_iterative, delaunay_lifted] {
            assert!(f(&[], EPS).unwrap().triangles.is_empty());
            assert!(f(&[Vec2::new(0.0, 0.0)], EPS).unwrap().triangles.is_empty());
            assert!(f(&unit_square()[..2], EPS).unwrap().triangles.is_empty());

            // collinear points have no triangulation
            let collinear = vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(2.0, 0.0),
            ];
            assert!(f(&collinear, EPS).unwrap().triangles.is_empty());
        }
    }

    #[test]
    fn test_duplicates_removed() {
        let mut points = unit_square();
        points.push(Vec2::new(0.0, 0.0));
        points.push(Vec2::new(1.0, 1.0));
        let r = delaunay_lifted(&points, 1e-6).unwrap();
        assert_eq!(r.vertices.len(), 4);
        assert_eq!(r.triangles.len(), 2);
    }

    #[test]
    fn test_rejects_nan() {
        let points = vec![Vec2::new(f64::NAN, 0.0)];
        assert!(delaunay_spade(&points, EPS).is_err());
    }
}
