//! Decomposition of a concave polygon into convex sub-polygons.

use crate::core::{intersect_lines, line_angle_between, mod_positive, Vec2};
use crate::poly::CircularView;
use std::f64::consts::{PI, TAU};

/// Split a simple CCW polygon into convex sub-polygons.
///
/// Finds the first reflex vertex (interior angle > pi + `eps`), extends its
/// incoming edge until it hits another polygon edge, splits along the chord
/// between the reflex vertex's successor and the vertex past the hit, and
/// recurses on both halves.
///
/// # Returns
/// The convex pieces, or an empty list when the polygon is already convex
/// (the caller keeps the original in that case). Pieces with fewer than
/// three vertices are discarded.
pub fn convex_split(poly: &[Vec2], eps: f64) -> Vec<Vec<Vec2>> {
    let mut split = Vec::new();

    let n = poly.len();
    if n <= 3 {
        return split;
    }

    // find the first reflex corner
    let mut idx_reflex: Option<usize> = None;
    for idx1 in 0..n {
        let idx2 = (idx1 + 1) % n;
        let idx3 = (idx1 + 2) % n;

        let angle = mod_positive(
            PI - line_angle_between(poly[idx1], poly[idx2], poly[idx2], poly[idx3]),
            TAU,
        );
        if angle > PI + eps {
            idx_reflex = Some(idx1);
            break;
        }
    }
    let Some(idx_reflex) = idx_reflex else {
        return split; // convex
    };

    // extend the incoming edge of the reflex corner until it hits the contour
    let verts = CircularView::new(poly);
    let vert1 = poly[idx_reflex];
    let vert2 = *verts.get(idx_reflex as isize + 1);
    let dir1 = vert2 - vert1;

    let mut idx_hit: Option<usize> = None;
    for offset in (idx_reflex as isize + 2)..(idx_reflex as isize + n as isize) {
        let vert3 = *verts.get(offset);
        let vert4 = *verts.get(offset + 1);
        let dir2 = vert4 - vert3;

        if let Some((_, param1, param2)) = intersect_lines(vert1, dir1, vert3, dir2, eps) {
            if param2 >= 0.0 && param2 < 1.0 && param1 >= 0.0 {
                idx_hit = Some((offset + 1).rem_euclid(n as isize) as usize);
                break;
            }
        }
    }
    let Some(idx_hit) = idx_hit else {
        log::warn!("convex split: no contour intersection for reflex corner, keeping polygon");
        return split;
    };

    // split along the chord [idx_reflex + 1, idx_hit]
    let mut poly1: Vec<Vec2> = Vec::with_capacity(n);
    let mut poly2: Vec<Vec2> = Vec::with_capacity(n);

    let mut idx = idx_hit as isize;
    loop {
        poly1.push(*verts.get(idx));
        if idx.rem_euclid(n as isize) == (idx_reflex as isize + 1).rem_euclid(n as isize) {
            break;
        }
        idx += 1;
    }
    let mut idx = idx_reflex as isize + 1;
    loop {
        poly2.push(*verts.get(idx));
        if idx.rem_euclid(n as isize) == idx_hit as isize {
            break;
        }
        idx += 1;
    }

    if poly1.len() < 3 || poly2.len() < 3 {
        log::warn!("convex split: degenerate sub-polygon, keeping polygon unsplit");
        return Vec::new();
    }

    for half in [poly1, poly2] {
        let sub = convex_split(&half, eps);
        if sub.is_empty() {
            // already convex
            split.push(half);
        } else {
            for piece in sub {
                if piece.len() >= 3 {
                    split.push(piece);
                }
            }
        }
    }

    split
}
