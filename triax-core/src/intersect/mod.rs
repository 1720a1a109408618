//! All-pairs line segment intersection, two implementations.
//!
//! [`intersect_naive`] tests every pair; [`intersect_sweep`] is a
//! Bentley-Ottmann sweep over endpoint and intersection events. Both return
//! `(segment index A, segment index B, intersection point)` tuples and agree
//! up to `eps` for any input.

use crate::core::{intersect_segments, line_angle, mod_positive, Mat2, Segment, Vec2};
use ordered_float::OrderedFloat;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::f64::consts::{FRAC_PI_2, PI, TAU};

/// An intersection between the segments at the two indices.
pub type Intersection = (usize, usize, Vec2);

/// Pairwise O(n^2) intersection test.
pub fn intersect_naive(segments: &[Segment], eps: f64) -> Vec<Intersection> {
    let mut intersections = Vec::new();
    for i in 0..segments.len() {
        for j in (i + 1)..segments.len() {
            if let Some(pt) = intersect_segments(&segments[i], &segments[j], eps) {
                intersections.push((i, j, pt));
            }
        }
    }
    intersections
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EventKind {
    LeftVertex,
    RightVertex,
    Intersection,
}

/// Sweep event; the queue orders by ascending x (insertion sequence breaks
/// ties to keep the order deterministic).
#[derive(Clone, Debug)]
struct SweepEvent {
    x: OrderedFloat<f64>,
    seq: usize,
    kind: EventKind,
    line: usize,
    /// status-adjacent pair, for intersection events
    lower: usize,
    upper: usize,
    point: Vec2,
}

impl PartialEq for SweepEvent {
    fn eq(&self, other: &Self) -> bool {
        self.x == other.x && self.seq == other.seq
    }
}

impl Eq for SweepEvent {}

impl Ord for SweepEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // reverse ordering: BinaryHeap is a max-heap, we need min-x first
        other
            .x
            .cmp(&self.x)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for SweepEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// y coordinate of the (non-vertical) segment's supporting line at `x`.
fn line_y(seg: &Segment, x: f64) -> f64 {
    let slope = (seg.q.y - seg.p.y) / (seg.q.x - seg.p.x);
    seg.p.y + (x - seg.p.x) * slope
}

/// Queue an intersection event for a newly adjacent status pair.
fn queue_crossing(
    events: &mut BinaryHeap<SweepEvent>,
    seq: &mut usize,
    lines: &[Segment],
    lower: usize,
    upper: usize,
    cur_x: f64,
    eps: f64,
) {
    if let Some(pt) = intersect_segments(&lines[lower], &lines[upper], eps) {
        if (cur_x - pt.x).abs() > eps {
            events.push(SweepEvent {
                x: OrderedFloat(pt.x),
                seq: *seq,
                kind: EventKind::Intersection,
                line: lower,
                lower,
                upper,
                point: pt,
            });
            *seq += 1;
        }
    }
}

/// Bentley-Ottmann sweep over the segment set.
///
/// Vertical segments break the y-order of the status structure, so inputs
/// containing any are pre-rotated by half the smallest angle any segment
/// makes with the y axis, and the intersection points rotated back.
pub fn intersect_sweep(segments: &[Segment], eps: f64) -> Vec<Intersection> {
    let mut lines = segments.to_vec();

    // detect vertical segments and the smallest angle-to-y of the rest
    let mut has_vertical = false;
    let mut min_angle_to_y = f64::MAX;
    for line in &lines {
        if (line.p.x - line.q.x).abs() <= eps {
            has_vertical = true;
        } else {
            let mut angle_to_y = line_angle(line.p, line.q) + FRAC_PI_2;
            angle_to_y = mod_positive(angle_to_y, TAU);
            if angle_to_y > FRAC_PI_2 {
                angle_to_y -= PI;
            }
            if angle_to_y.abs() < min_angle_to_y.abs() {
                min_angle_to_y = angle_to_y;
            }
        }
    }

    let rot = if has_vertical {
        let angle = if min_angle_to_y == f64::MAX {
            // everything vertical: any rotation away from the axis works
            FRAC_PI_2 / 2.0
        } else {
            -min_angle_to_y * 0.5
        };
        let rot = Mat2::rotation(angle);
        for line in &mut lines {
            line.p = rot * line.p;
            line.q = rot * line.q;
        }
        Some(rot)
    } else {
        None
    };

    let mut events: BinaryHeap<SweepEvent> = BinaryHeap::new();
    let mut seq = 0usize;

    for (idx, line) in lines.iter().enumerate() {
        let (left_x, right_x) = (line.p.x.min(line.q.x), line.p.x.max(line.q.x));
        for (x, kind) in [(left_x, EventKind::LeftVertex), (right_x, EventKind::RightVertex)] {
            events.push(SweepEvent {
                x: OrderedFloat(x),
                seq,
                kind,
                line: idx,
                lower: 0,
                upper: 0,
                point: Vec2::ZERO,
            });
            seq += 1;
        }
    }

    // status: active segment indices ordered by y at the sweep position
    let mut status: Vec<usize> = Vec::new();
    let mut intersections: Vec<Intersection> = Vec::new();

    while let Some(evt) = events.pop() {
        let cur_x = evt.x.0;

        match evt.kind {
            EventKind::LeftVertex => {
                let y = line_y(&lines[evt.line], cur_x);
                let pos = status.partition_point(|&other| line_y(&lines[other], cur_x) < y);
                status.insert(pos, evt.line);

                if pos > 0 {
                    queue_crossing(
                        &mut events,
                        &mut seq,
                        &lines,
                        status[pos - 1],
                        evt.line,
                        cur_x,
                        eps,
                    );
                }
                if pos + 1 < status.len() {
                    queue_crossing(
                        &mut events,
                        &mut seq,
                        &lines,
                        evt.line,
                        status[pos + 1],
                        cur_x,
                        eps,
                    );
                }
            }
            EventKind::RightVertex => {
                let Some(pos) = status.iter().position(|&l| l == evt.line) else {
                    continue;
                };
                status.remove(pos);
                if pos > 0 && pos < status.len() {
                    queue_crossing(
                        &mut events,
                        &mut seq,
                        &lines,
                        status[pos - 1],
                        status[pos],
                        cur_x,
                        eps,
                    );
                }
            }
            EventKind::Intersection => {
                // endpoint touches count only while both segments are active
                let pos_lower = status.iter().position(|&l| l == evt.lower);
                let pos_upper = status.iter().position(|&l| l == evt.upper);
                let (Some(pos_lower), Some(pos_upper)) = (pos_lower, pos_upper) else {
                    continue;
                };

                let already = intersections
                    .iter()
                    .any(|&(_, _, pt)| pt.approx_eq(evt.point, eps));
                if !already {
                    intersections.push((evt.lower, evt.upper, evt.point));
                }

                // the pair swaps order at the crossing
                status.swap(pos_lower, pos_upper);
                let (lo, hi) = (pos_lower.min(pos_upper), pos_lower.max(pos_upper));
                if lo > 0 {
                    queue_crossing(
                        &mut events,
                        &mut seq,
                        &lines,
                        status[lo - 1],
                        status[lo],
                        cur_x,
                        eps,
                    );
                }
                if hi + 1 < status.len() {
                    queue_crossing(
                        &mut events,
                        &mut seq,
                        &lines,
                        status[hi],
                        status[hi + 1],
                        cur_x,
                        eps,
                    );
                }
            }
        }
    }

    // rotate intersection points back into the input frame
    if let Some(rot) = rot {
        let back = rot.transposed();
        for inters in &mut intersections {
            inters.2 = back * inters.2;
        }
    }

    intersections
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(x1: f64, y1: f64, x2: f64, y2: f64) -> Segment {
        Segment::new(Vec2::new(x1, y1), Vec2::new(x2, y2))
    }

    fn assert_same_points(a: &[Intersection], b: &[Intersection], eps: f64) {
        assert_eq!(a.len(), b.len(), "{a:?} vs {b:?}");
        for &(_, _, pt) in a {
            assert!(
                b.iter().any(|&(_, _, q)| q.approx_eq(pt, eps)),
                "point {pt:?} missing from {b:?}"
            );
        }
    }

    #[test]
    fn test_single_crossing() {
        let segs = vec![seg(0.0, 0.0, 2.0, 2.0), seg(0.0, 2.0, 2.0, 0.0)];
        let naive = intersect_naive(&segs, 1e-9);
        let sweep = intersect_sweep(&segs, 1e-9);
        assert_eq!(naive.len(), 1);
        assert!(naive[0].2.approx_eq(Vec2::new(1.0, 1.0), 1e-9));
        assert_same_points(&naive, &sweep, 1e-7);
    }

    #[test]
    fn test_no_crossing() {
        let segs = vec![seg(0.0, 0.0, 1.0, 0.0), seg(0.0, 1.0, 1.0, 1.0)];
        assert!(intersect_naive(&segs, 1e-9).is_empty());
        assert!(intersect_sweep(&segs, 1e-9).is_empty());
    }

    #[test]
    fn test_sweep_matches_naive_on_grid() {
        // a 3x3 grid of crossing segments: 9 interior intersections
        let mut segs = Vec::new();
        for i in 0..3 {
            let c = i as f64;
            segs.push(seg(-1.0, c, 3.0, c + 0.2)); // nearly horizontal
            segs.push(seg(c, -1.0, c + 0.2, 3.0)); // nearly vertical
        }
        let naive = intersect_naive(&segs, 1e-9);
        let sweep = intersect_sweep(&segs, 1e-9);
        assert_eq!(naive.len(), 9);
        assert_same_points(&naive, &sweep, 1e-6);
    }

    #[test]
    fn test_vertical_segments() {
        let segs = vec![seg(1.0, -1.0, 1.0, 1.0), seg(0.0, 0.0, 2.0, 0.0)];
        let naive = intersect_naive(&segs, 1e-9);
        let sweep = intersect_sweep(&segs, 1e-9);
        assert_eq!(naive.len(), 1);
        assert_same_points(&naive, &sweep, 1e-6);
        assert!(sweep[0].2.approx_eq(Vec2::new(1.0, 0.0), 1e-6));
    }

    #[test]
    fn test_shared_endpoint_star() {
        // three segments meeting at the origin
        let segs = vec![
            seg(0.0, 0.0, 1.0, 0.1),
            seg(0.0, 0.0, 0.1, 1.0),
            seg(0.0, 0.0, -1.0, 0.5),
        ];
        let naive = intersect_naive(&segs, 1e-9);
        // all three pairs touch at the origin
        assert_eq!(naive.len(), 3);
        for &(_, _, pt) in &naive {
            assert!(pt.approx_eq(Vec2::ZERO, 1e-9));
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(intersect_naive(&[], 1e-9).is_empty());
        assert!(intersect_sweep(&[], 1e-9).is_empty());
    }
}
