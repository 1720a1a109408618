//! Path post-processing: corner cutting and subdivision.

use crate::core::Vec2;

/// One iteration of Chaikin corner cutting. Endpoints stay pinned so the
/// instrument still reaches the exact start and target settings.
pub fn chaikin_smooth(path: &[Vec2]) -> Vec<Vec2> {
    if path.len() <= 2 {
        return path.to_vec();
    }

    let mut smoothed = Vec::with_capacity(path.len() * 2);
    smoothed.push(path[0]);
    for pair in path.windows(2) {
        let (p, q) = (pair[0], pair[1]);
        smoothed.push(p.lerp(q, 0.25));
        smoothed.push(p.lerp(q, 0.75));
    }
    smoothed.push(*path.last().unwrap());
    smoothed
}

/// Insert evenly spaced intermediate points so no leg exceeds `max_len`.
pub fn subdivide_path(path: &[Vec2], max_len: f64) -> Vec<Vec2> {
    if path.len() < 2 || max_len <= 0.0 {
        return path.to_vec();
    }

    let mut result = vec![path[0]];
    for pair in path.windows(2) {
        let (p, q) = (pair[0], pair[1]);
        let pieces = (p.distance(q) / max_len).ceil().max(1.0) as usize;
        for k in 1..=pieces {
            result.push(p.lerp(q, k as f64 / pieces as f64));
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chaikin_pins_endpoints() {
        let path = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
        ];
        let smoothed = chaikin_smooth(&path);
        assert_eq!(smoothed[0], path[0]);
        assert_eq!(*smoothed.last().unwrap(), *path.last().unwrap());
        assert!(smoothed.len() > path.len());
    }

    #[test]
    fn test_chaikin_cuts_the_corner() {
        let path = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
        ];
        let smoothed = chaikin_smooth(&path);
        // the corner vertex itself is gone
        assert!(!smoothed.iter().any(|p| p.approx_eq(Vec2::new(1.0, 0.0), 1e-12)));
        // replaced by points at 3/4 of each leg
        assert!(smoothed
            .iter()
            .any(|p| p.approx_eq(Vec2::new(0.75, 0.0), 1e-12)));
        assert!(smoothed
            .iter()
            .any(|p| p.approx_eq(Vec2::new(1.0, 0.25), 1e-12)));
    }

    #[test]
    fn test_short_paths_untouched() {
        let path = vec![Vec2::new(0.0, 0.0), Vec2::new(1.0, 1.0)];
        assert_eq!(chaikin_smooth(&path).len(), 2);
    }

    #[test]
    fn test_subdivide() {
        let path = vec![Vec2::new(0.0, 0.0), Vec2::new(4.0, 0.0)];
        let fine = subdivide_path(&path, 1.0);
        assert_eq!(fine.len(), 5);
        assert!(fine[1].approx_eq(Vec2::new(1.0, 0.0), 1e-12));
    }
}
