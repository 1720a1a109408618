//! Obstacle contour extraction from the configuration-space raster.
//!
//! Connected forbidden regions are found by flood fill, their boundaries
//! walked by Moore neighbour tracing, and the resulting pixel polylines
//! cleaned up: duplicate vertices, raster staircase artefacts, and
//! near-collinear vertices are removed (the latter guarded against creating
//! self-intersections).

use crate::configspace::ConfigSpaceRaster;
use crate::core::{
    angles_equal, intersect_segments, line_angle, mod_positive, PixelCoord, Segment, Vec2,
};
use std::collections::VecDeque;
use std::f64::consts::{FRAC_PI_2, PI, TAU};

/// One traced forbidden region.
#[derive(Clone, Debug)]
pub struct TracedContour {
    /// Closed boundary polyline in CCW order (last connects to first).
    pub pixels: Vec<PixelCoord>,
    /// Raster group id of the region.
    pub region_id: u8,
    /// Does the region touch the raster border? The surrounding
    /// angular-limit band does; interior obstacles usually do not.
    pub touches_border: bool,
}

/// Trace the boundary of every maximal 8-connected region of equal id.
///
/// Regions are discovered in row-major scan order, so the contour order is
/// deterministic for a given raster.
pub fn trace_contours(raster: &ConfigSpaceRaster) -> Vec<TracedContour> {
    let (w, h) = (raster.width(), raster.height());
    let mut labelled = vec![false; w * h];
    let mut contours = Vec::new();

    for y in 0..h {
        for x in 0..w {
            let start = PixelCoord::new(x as i32, y as i32);
            let id = raster.id_at(start);
            if id == 0 || labelled[y * w + x] {
                continue;
            }

            // flood-fill the component
            let mut touches_border = false;
            let mut queue = VecDeque::from([start]);
            labelled[y * w + x] = true;
            while let Some(pix) = queue.pop_front() {
                if pix.x == 0
                    || pix.y == 0
                    || pix.x as usize == w - 1
                    || pix.y as usize == h - 1
                {
                    touches_border = true;
                }
                for n in pix.neighbours_8() {
                    if n.x < 0 || n.y < 0 || n.x as usize >= w || n.y as usize >= h {
                        continue;
                    }
                    let at = n.y as usize * w + n.x as usize;
                    if !labelled[at] && raster.id_at(n) == id {
                        labelled[at] = true;
                        queue.push_back(n);
                    }
                }
            }

            let mut pixels = trace_boundary(raster, start, id);
            make_ccw(&mut pixels);
            contours.push(TracedContour {
                pixels,
                region_id: id,
                touches_border,
            });
        }
    }

    contours
}

/// Moore neighbour tracing from the region's topmost-leftmost pixel.
fn trace_boundary(raster: &ConfigSpaceRaster, start: PixelCoord, id: u8) -> Vec<PixelCoord> {
    let in_region = |pix: PixelCoord| raster.id_at(pix) == id;

    let mut contour = vec![start];
    // the pixel west of the scan-order start is never part of the region
    let mut cur = start;
    let mut backtrack = start + PixelCoord::new(-1, 0);

    // generous bound; a boundary visits each pixel at most a few times
    let max_steps = 8 * raster.width() * raster.height() + 16;
    for _ in 0..max_steps {
        let neighbours = cur.neighbours_8();
        let back_idx = neighbours
            .iter()
            .position(|&n| n == backtrack)
            .unwrap_or(0);

        let mut advanced = false;
        for k in 1..=8 {
            let idx = (back_idx + k) % 8;
            let cand = neighbours[idx];
            if in_region(cand) {
                if cand == start {
                    // back at the trace origin
                    return contour;
                }
                contour.push(cand);
                backtrack = neighbours[(idx + 7) % 8];
                cur = cand;
                advanced = true;
                break;
            }
        }

        if !advanced {
            // isolated pixel
            return contour;
        }
    }

    log::warn!("boundary trace did not close, returning partial contour");
    contour
}

/// Reverse the polyline if its signed area is negative, fixing CCW order.
fn make_ccw(pixels: &mut [PixelCoord]) {
    let area2: i64 = (0..pixels.len())
        .map(|i| {
            let j = (i + 1) % pixels.len();
            pixels[i].x as i64 * pixels[j].y as i64 - pixels[j].x as i64 * pixels[i].y as i64
        })
        .sum();
    if area2 < 0 {
        pixels.reverse();
    }
}

/// Simplify a closed contour.
///
/// Three passes: drop duplicate neighbours, collapse staircase artefacts
/// (`v1..v4` with `|v4-v1| < min_dist`, a horizontal or vertical middle
/// edge, and equal flanking directions lose `v3` and `v4`), and drop
/// vertices on nearly straight runs when removal does not make the contour
/// self-intersect.
pub fn simplify_contour(
    contour: &mut Vec<PixelCoord>,
    min_dist: f64,
    eps_angular: f64,
    eps: f64,
) {
    remove_duplicate_vertices(contour);
    remove_staircases(contour, min_dist, eps_angular);
    remove_collinear_vertices(contour, eps_angular, eps);
}

fn remove_duplicate_vertices(contour: &mut Vec<PixelCoord>) {
    contour.dedup();
    while contour.len() > 1 && contour.first() == contour.last() {
        contour.pop();
    }
}

fn remove_staircases(contour: &mut Vec<PixelCoord>, min_dist: f64, eps_angular: f64) {
    let mut curidx = 0usize;
    let mut steps = 0usize;
    let max_steps = contour.len() * 4 + 8;

    while curidx <= contour.len() && steps < max_steps {
        steps += 1;
        let n = contour.len();
        if n < 5 {
            break;
        }

        let v1 = contour[curidx % n].to_vec2();
        let v2 = contour[(curidx + 1) % n].to_vec2();
        let v3 = contour[(curidx + 2) % n].to_vec2();
        let v4 = contour[(curidx + 3) % n].to_vec2();

        if (v4 - v1).norm() > min_dist {
            curidx += 1;
            continue;
        }

        // middle edge horizontal or vertical?
        let mid_angle = mod_positive(line_angle(v2, v3), TAU);
        let axis_aligned = [0.0, FRAC_PI_2, PI, 3.0 * FRAC_PI_2, TAU]
            .iter()
            .any(|&a| (mid_angle - a).abs() <= eps_angular);
        if !axis_aligned {
            curidx += 1;
            continue;
        }

        let angle1 = mod_positive(line_angle(v1, v2), TAU);
        let angle2 = mod_positive(line_angle(v3, v4), TAU);
        if angles_equal(angle1, angle2, eps_angular) {
            // drop v3 and v4
            let i3 = (curidx + 2) % n;
            let i4 = (curidx + 3) % n;
            if i4 > i3 {
                contour.remove(i4);
                contour.remove(i3);
            } else {
                contour.remove(i3);
                contour.remove(i4);
            }
        } else {
            curidx += 1;
        }
    }
}

/// Would removing `vert` (connecting `prev` directly to `next`) intersect
/// any other contour edge?
fn can_remove_vertex(
    contour: &[PixelCoord],
    prev: Vec2,
    vert: Vec2,
    next: Vec2,
    eps: f64,
) -> bool {
    let shortcut = Segment::new(prev, next);

    for i in 0..contour.len() {
        let j = (i + 1) % contour.len();
        let a = contour[i].to_vec2();
        let b = contour[j].to_vec2();

        // edges adjacent to the shortcut legitimately touch its endpoints
        if a.approx_eq(prev, eps)
            || a.approx_eq(vert, eps)
            || a.approx_eq(next, eps)
            || b.approx_eq(prev, eps)
            || b.approx_eq(vert, eps)
            || b.approx_eq(next, eps)
        {
            continue;
        }

        if intersect_segments(&shortcut, &Segment::new(a, b), eps).is_some() {
            return false;
        }
    }
    true
}

fn remove_collinear_vertices(contour: &mut Vec<PixelCoord>, eps_angular: f64, eps: f64) {
    let mut curidx = 1usize;
    let mut steps = 0usize;
    let max_steps = contour.len() * 4 + 8;

    while curidx < contour.len() * 2 && steps < max_steps {
        steps += 1;
        let n = contour.len();
        if n < 4 {
            break;
        }

        let v1 = contour[(curidx + n - 1) % n].to_vec2();
        let v2 = contour[curidx % n].to_vec2();
        let v3 = contour[(curidx + 1) % n].to_vec2();

        let mut angle = mod_positive(line_angle(v2, v3) - line_angle(v1, v2), TAU);
        if angle > PI {
            angle -= TAU;
        }

        let straight = angle.abs() <= eps_angular || (angle.abs() - PI).abs() <= eps_angular;
        if straight && can_remove_vertex(contour, v1, v2, v3, eps) {
            contour.remove(curidx % n);
            curidx = curidx.saturating_sub(1).max(1);
        } else {
            curidx += 1;
        }
    }
}
