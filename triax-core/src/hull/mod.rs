//! Convex hull computation, three interchangeable algorithms.
//!
//! All three produce the hull in counter-clockwise order with a canonical
//! (lowest x, then y) starting vertex, so callers can pick by performance
//! preference and tests can compare outputs directly:
//!
//! - [`hull_recursive`]: divide and conquer with tangent merging
//! - [`hull_iterative`]: incremental insertion with a straddle test
//! - [`hull_contour`]: monotone contour extraction plus a concave sweep
//!
//! Duplicate input points (within `eps`) are dropped before hulling.

use crate::core::{line_angle, side_of_line, Vec2};

/// Stable (x, y) lexicographic sort; interior runs of equal-x points are
/// collapsed to their extremes, duplicates within `eps` removed.
pub fn sort_unique_vertices(verts: &[Vec2], eps: f64) -> Vec<Vec2> {
    let mut verts: Vec<Vec2> = verts.iter().copied().filter(Vec2::is_finite).collect();
    verts.sort_by(|a, b| {
        if (a.x - b.x).abs() <= eps {
            a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal)
        } else {
            a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal)
        }
    });
    verts.dedup_by(|a, b| a.approx_eq(*b, eps));

    // collapse interior points of vertical runs, keeping both extremes
    let mut result: Vec<Vec2> = Vec::with_capacity(verts.len());
    let mut run_start = 0;
    for i in 0..=verts.len() {
        let run_ended = i == verts.len() || (verts[i].x - verts[run_start].x).abs() > eps;
        if run_ended {
            result.push(verts[run_start]);
            if i - run_start >= 2 {
                result.push(verts[i - 1]);
            }
            run_start = i;
        }
    }
    result
}

/// Sort vertices counter-clockwise by angle around their centroid.
/// Returns the sorted vertices and the centroid.
pub fn sort_by_angle(verts: &[Vec2]) -> (Vec<Vec2>, Vec2) {
    let mut verts = verts.to_vec();
    if verts.is_empty() {
        return (verts, Vec2::ZERO);
    }
    let mut mean = Vec2::ZERO;
    for v in &verts {
        mean += *v;
    }
    let mean = mean / verts.len() as f64;

    verts.sort_by(|a, b| {
        line_angle(mean, *a)
            .partial_cmp(&line_angle(mean, *b))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    (verts, mean)
}

/// Is the point inside (or on the border of) the CCW convex polygon?
pub fn point_in_hull(hull: &[Vec2], pt: Vec2) -> bool {
    if hull.len() < 3 {
        return false;
    }
    for i in 0..hull.len() {
        let j = (i + 1) % hull.len();
        if side_of_line(hull[i], hull[j], pt) < 0.0 {
            return false;
        }
    }
    true
}

/// For a fully collinear (or degenerate) point cloud, the hull is the pair
/// of extreme points. Returns `None` when the cloud spans an area.
fn collinear_extremes(sorted: &[Vec2], eps: f64) -> Option<Vec<Vec2>> {
    if sorted.len() <= 2 {
        return Some(sorted.to_vec());
    }
    let first = sorted[0];
    let last = *sorted.last().unwrap();
    if sorted
        .iter()
        .all(|&p| side_of_line(first, last, p).abs() <= eps)
    {
        Some(vec![first, last])
    } else {
        None
    }
}

/// Normalise a convex polygon: CCW orientation, no collinear interior
/// vertices, canonical starting vertex (lowest x, then lowest y).
fn normalize_hull(mut hull: Vec<Vec2>, eps: f64) -> Vec<Vec2> {
    if hull.len() < 3 {
        return hull;
    }

    // orient CCW (positive signed area)
    let area2: f64 = (0..hull.len())
        .map(|i| {
            let j = (i + 1) % hull.len();
            hull[i].cross(hull[j])
        })
        .sum();
    if area2 < 0.0 {
        hull.reverse();
    }

    // drop collinear interior vertices
    loop {
        let n = hull.len();
        if n < 3 {
            break;
        }
        let mut removed = false;
        for i in 0..n {
            let prev = hull[(i + n - 1) % n];
            let next = hull[(i + 1) % n];
            if side_of_line(prev, next, hull[i]).abs() <= eps {
                hull.remove(i);
                removed = true;
                break;
            }
        }
        if !removed {
            break;
        }
    }

    // canonical start vertex
    let start = hull
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            (a.x, a.y)
                .partial_cmp(&(b.x, b.y))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i)
        .unwrap_or(0);
    hull.rotate_left(start);
    hull
}

// ----------------------------------------------------------------------------
// recursive (divide and conquer)
// ----------------------------------------------------------------------------

/// Convex hull by divide and conquer: sort by x, bisect, recurse, and merge
/// the sub-hulls along their upper and lower tangents.
pub fn hull_recursive(verts: &[Vec2], eps: f64) -> Vec<Vec2> {
    let verts = sort_unique_vertices(verts, eps);
    if let Some(extremes) = collinear_extremes(&verts, eps) {
        return extremes;
    }
    let hull = hull_recursive_sorted(&verts, eps);
    normalize_hull(hull, eps)
}

fn hull_recursive_sorted(verts: &[Vec2], eps: f64) -> Vec<Vec2> {
    if verts.len() <= 3 {
        return sort_by_angle(verts).0;
    }

    // divide; keep equal-x columns on one side
    let mut div = verts.len() / 2;
    if (verts[div - 1].x - verts[div].x).abs() <= eps {
        div += 1;
    }
    let hull_left = hull_recursive_sorted(&verts[..div], eps);
    let hull_right = hull_recursive_sorted(&verts[div..], eps);
    merge_hulls(&hull_left, &hull_right)
}

/// Merge two CCW sub-hulls (disjoint in x) along their tangents.
fn merge_hulls(left: &[Vec2], right: &[Vec2]) -> Vec<Vec2> {
    if left.is_empty() {
        return right.to_vec();
    }
    if right.is_empty() {
        return left.to_vec();
    }
    let nl = left.len();
    let nr = right.len();

    let left_max = (0..nl)
        .max_by(|&a, &b| {
            left[a]
                .x
                .partial_cmp(&left[b].x)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap();
    let right_min = (0..nr)
        .min_by(|&a, &b| {
            right[a]
                .x
                .partial_cmp(&right[b].x)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap();

    // upper tangent: walk the left hull CCW and the right hull CW until no
    // vertex lies above the connecting line
    let (mut iu, mut ju) = (left_max, right_min);
    loop {
        let mut changed = false;
        while side_of_line(left[iu], right[ju], left[(iu + 1) % nl]) > 0.0 {
            iu = (iu + 1) % nl;
            changed = true;
        }
        while side_of_line(left[iu], right[ju], right[(ju + nr - 1) % nr]) > 0.0 {
            ju = (ju + nr - 1) % nr;
            changed = true;
        }
        if !changed {
            break;
        }
    }

    // lower tangent: opposite walking directions, opposite side
    let (mut il, mut jl) = (left_max, right_min);
    loop {
        let mut changed = false;
        while side_of_line(left[il], right[jl], left[(il + nl - 1) % nl]) < 0.0 {
            il = (il + nl - 1) % nl;
            changed = true;
        }
        while side_of_line(left[il], right[jl], right[(jl + 1) % nr]) < 0.0 {
            jl = (jl + 1) % nr;
            changed = true;
        }
        if !changed {
            break;
        }
    }

    // surviving arcs: left hull CCW from upper to lower tangent point,
    // right hull CCW from lower to upper tangent point
    let mut merged = Vec::with_capacity(nl + nr);
    let mut i = iu;
    loop {
        merged.push(left[i]);
        if i == il {
            break;
        }
        i = (i + 1) % nl;
    }
    let mut j = jl;
    loop {
        merged.push(right[j]);
        if j == ju {
            break;
        }
        j = (j + 1) % nr;
    }
    merged
}

// ----------------------------------------------------------------------------
// iterative (incremental insertion)
// ----------------------------------------------------------------------------

/// Tests whether the vertex lies inside the hull; when outside, returns the
/// indices of the hull edge straddling its direction from `center`.
fn vertex_in_hull(hull: &[Vec2], center: Vec2, v: Vec2) -> (bool, usize, usize) {
    let n = hull.len();
    for i1 in 0..n {
        let i2 = (i1 + 1) % n;
        if side_of_line(center, hull[i1], v) > 0.0 && side_of_line(center, hull[i2], v) <= 0.0 {
            if side_of_line(hull[i1], hull[i2], v) < 0.0 {
                return (false, i1, i2);
            }
        }
    }
    (true, 0, 0)
}

/// Incremental convex hull: insert each vertex in turn, replacing the chain
/// of hull vertices visible from it.
pub fn hull_iterative(verts: &[Vec2], eps: f64) -> Vec<Vec2> {
    let verts = sort_unique_vertices(verts, eps);
    if let Some(extremes) = collinear_extremes(&verts, eps) {
        return extremes;
    }
    if verts.len() <= 3 {
        return normalize_hull(sort_by_angle(&verts).0, eps);
    }

    let (mut hull, center) = sort_by_angle(&verts[..3]);

    for &v in &verts[3..] {
        let (inside, i1, i2) = vertex_in_hull(&hull, center, v);
        if inside {
            continue;
        }

        let n = hull.len() as isize;
        let at = |idx: isize| -> Vec2 { hull[idx.rem_euclid(n) as usize] };

        // walk backwards from the straddled edge while the predecessor is
        // still visible from v
        let mut lower = i1 as isize;
        for _ in 0..2 * n {
            if side_of_line(at(lower), v, at(lower - 1)) >= 0.0 {
                break;
            }
            lower -= 1;
        }

        // walk forwards while the successor is still visible
        let mut upper = if (i2 as isize) > lower {
            i2 as isize
        } else {
            i2 as isize + n
        };
        for _ in 0..2 * n {
            if side_of_line(at(upper), v, at(upper + 1)) <= 0.0 {
                break;
            }
            upper += 1;
        }

        // keep the arc upper..=lower (circular), insert v after `lower`
        let mut next_hull = Vec::with_capacity(hull.len() + 1);
        let mut idx = upper;
        loop {
            next_hull.push(at(idx));
            if idx.rem_euclid(n) == lower.rem_euclid(n) {
                break;
            }
            idx += 1;
        }
        next_hull.push(v);
        hull = next_hull;
    }

    normalize_hull(hull, eps)
}

// ----------------------------------------------------------------------------
// contour-based
// ----------------------------------------------------------------------------

/// Convex hull by contour polygon: extract the monotone upper and lower
/// contours, then sweep away concave triples.
pub fn hull_contour(verts: &[Vec2], eps: f64) -> Vec<Vec2> {
    let verts = sort_unique_vertices(verts, eps);
    if let Some(extremes) = collinear_extremes(&verts, eps) {
        return extremes;
    }
    if verts.len() <= 3 {
        return normalize_hull(sort_by_angle(&verts).0, eps);
    }

    // monotone contours: prefix maxima/minima in y from the left,
    // suffix maxima/minima from the right
    let mut left_top: Vec<Vec2> = Vec::new();
    let mut left_bottom: Vec<Vec2> = Vec::new();
    let (mut min_y, mut max_y) = (f64::MAX, f64::MIN);
    for &v in &verts {
        if v.y > max_y {
            max_y = v.y;
            left_top.push(v);
        }
        if v.y < min_y {
            min_y = v.y;
            left_bottom.insert(0, v);
        }
    }

    let mut right_top: Vec<Vec2> = Vec::new();
    let mut right_bottom: Vec<Vec2> = Vec::new();
    let (mut min_y, mut max_y) = (f64::MAX, f64::MIN);
    for &v in verts.iter().rev() {
        if v.y > max_y {
            max_y = v.y;
            right_top.insert(0, v);
        }
        if v.y < min_y {
            min_y = v.y;
            right_bottom.push(v);
        }
    }

    // stitch the four contour pieces into one closed loop
    let mut contour: Vec<Vec2> = Vec::with_capacity(
        left_top.len() + right_top.len() + right_bottom.len() + left_bottom.len(),
    );
    for piece in [left_top, right_top, right_bottom, left_bottom] {
        for v in piece {
            if contour.last().map(|l| l.approx_eq(v, eps)) != Some(true) {
                contour.push(v);
            }
        }
    }
    if contour.len() >= 2 && contour[0].approx_eq(*contour.last().unwrap(), eps) {
        contour.pop();
    }

    // remove concave triples until stable; the contour loop runs clockwise
    // here, so a vertex right of its neighbours' chord sticks inward
    loop {
        let n = contour.len();
        if n < 3 {
            break;
        }
        let mut removed = false;
        for idx in 0..n {
            let prev = contour[(idx + n - 1) % n];
            let cur = contour[idx];
            let next = contour[(idx + 1) % n];
            if side_of_line(prev, next, cur) < 0.0 {
                contour.remove(idx);
                removed = true;
                break;
            }
        }
        if !removed {
            break;
        }
    }

    normalize_hull(contour, eps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    const EPS: f64 = 1e-5;

    fn square_with_centroid() -> Vec<Vec2> {
        vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(0.5, 0.5),
        ]
    }

    fn assert_same_hull(a: &[Vec2], b: &[Vec2]) {
        assert_eq!(a.len(), b.len(), "hull sizes differ: {a:?} vs {b:?}");
        for v in a {
            assert!(
                b.iter().any(|w| w.approx_eq(*v, 1e-9)),
                "vertex {v:?} missing from {b:?}"
            );
        }
    }

    #[test]
    fn test_square_hull_excludes_centroid() {
        let verts = square_with_centroid();
        let expected = [
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];

        for hull in [
            hull_recursive(&verts, EPS),
            hull_iterative(&verts, EPS),
            hull_contour(&verts, EPS),
        ] {
            assert_same_hull(&hull, &expected);
            // canonical start and orientation
            assert!(hull[0].approx_eq(Vec2::new(0.0, 0.0), 1e-9));
            assert!(hull[1].approx_eq(Vec2::new(1.0, 0.0), 1e-9));
        }
    }

    #[test]
    fn test_algorithms_agree_on_random_clouds() {
        let mut rng = StdRng::seed_from_u64(0x7451_a2e4);
        for _ in 0..50 {
            let n = rng.gen_range(4..40);
            let verts: Vec<Vec2> = (0..n)
                .map(|_| Vec2::new(rng.gen_range(-10.0..10.0), rng.gen_range(-10.0..10.0)))
                .collect();

            let rec = hull_recursive(&verts, EPS);
            let it = hull_iterative(&verts, EPS);
            let con = hull_contour(&verts, EPS);

            assert_same_hull(&rec, &it);
            assert_same_hull(&rec, &con);

            // every input point is inside or on the hull
            for v in &verts {
                assert!(
                    point_in_hull_eps(&rec, *v, 1e-7),
                    "point {v:?} outside hull {rec:?}"
                );
            }
        }
    }

    fn point_in_hull_eps(hull: &[Vec2], pt: Vec2, eps: f64) -> bool {
        hull.len() >= 3
            && (0..hull.len()).all(|i| {
                let j = (i + 1) % hull.len();
                side_of_line(hull[i], hull[j], pt) >= -eps
            })
    }

    #[test]
    fn test_hull_of_hull_is_identity() {
        let mut rng = StdRng::seed_from_u64(41);
        let verts: Vec<Vec2> = (0..30)
            .map(|_| Vec2::new(rng.gen_range(-5.0..5.0), rng.gen_range(-5.0..5.0)))
            .collect();
        let hull = hull_recursive(&verts, EPS);
        let hull2 = hull_recursive(&hull, EPS);
        assert_same_hull(&hull, &hull2);
    }

    #[test]
    fn test_degenerate_inputs() {
        for f in [hull_recursive, hull_iterative, hull_contour] {
            assert!(f(&[], EPS).is_empty());
            assert_eq!(f(&[Vec2::new(1.0, 2.0)], EPS).len(), 1);
            assert_eq!(f(&[Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0)], EPS).len(), 2);
        }
    }

    #[test]
    fn test_duplicates_dropped() {
        let verts = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.5, 1.0),
        ];
        let hull = hull_iterative(&verts, EPS);
        assert_eq!(hull.len(), 3);
    }

    #[test]
    fn test_collinear_points() {
        let verts = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(3.0, 0.0),
            Vec2::new(1.5, 2.0),
        ];
        let rec = hull_recursive(&verts, EPS);
        let it = hull_iterative(&verts, EPS);
        let con = hull_contour(&verts, EPS);
        assert_same_hull(&rec, &it);
        assert_same_hull(&rec, &con);
        // the two interior collinear points are not hull vertices
        assert_eq!(rec.len(), 3);
    }

    #[test]
    fn test_point_in_hull() {
        let hull = hull_recursive(&square_with_centroid(), EPS);
        assert!(point_in_hull(&hull, Vec2::new(0.5, 0.5)));
        assert!(!point_in_hull(&hull, Vec2::new(1.5, 0.5)));
    }
}
