//! Path simplification using the Ramer-Douglas-Peucker algorithm.
//!
//! Reduces point count in traced paths by removing points that are within
//! a given tolerance of the line between their neighbors. Kept points
//! retain their traced intensity.

use crate::types::{EdgePath, Point};

/// Simplify a single path using the Ramer-Douglas-Peucker algorithm.
///
/// Points within `tolerance` pixels of the line between their endpoints
/// are removed, so a higher tolerance keeps fewer points. A tolerance of
/// 0.0 preserves all points.
///
/// Paths with fewer than 3 points are returned unchanged (nothing to
/// simplify). The path's intensity is carried over unchanged.
#[must_use = "returns the simplified path"]
pub fn simplify(path: &EdgePath, tolerance: f64) -> EdgePath {
    let points = path.points();
    if points.len() < 3 {
        return path.clone();
    }

    let positions: Vec<Point> = path.positions().collect();
    let mut kept = vec![false; points.len()];
    kept[0] = true;
    kept[points.len() - 1] = true;

    rdp_recurse(&positions, 0, points.len() - 1, tolerance, &mut kept);

    path.with_points(
        points
            .iter()
            .zip(&kept)
            .filter(|&(_, k)| *k)
            .map(|(&p, _)| p)
            .collect(),
    )
}

/// Recursive step of the Ramer-Douglas-Peucker algorithm.
///
/// Finds the point between `start` and `end` that is farthest from the
/// line segment between them. If that distance exceeds `tolerance`, the
/// point is kept and both sub-segments are processed recursively.
fn rdp_recurse(points: &[Point], start: usize, end: usize, tolerance: f64, kept: &mut [bool]) {
    if end <= start + 1 {
        return;
    }

    let mut max_dist = 0.0;
    let mut max_idx = start;

    for i in (start + 1)..end {
        let d = perpendicular_distance(points[i], points[start], points[end]);
        if d > max_dist {
            max_dist = d;
            max_idx = i;
        }
    }

    if max_dist > tolerance {
        kept[max_idx] = true;
        rdp_recurse(points, start, max_idx, tolerance, kept);
        rdp_recurse(points, max_idx, end, tolerance, kept);
    }
}

/// Perpendicular distance from point `p` to the line defined by `a` and `b`.
///
/// When `a` and `b` coincide, returns the distance from `p` to `a`.
fn perpendicular_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx.mul_add(dx, dy * dy);

    if length_sq == 0.0 {
        return p.distance(a);
    }

    let cross = dx.mul_add(a.y - p.y, -(dy * (a.x - p.x)));
    cross.abs() / length_sq.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EdgePoint;

    fn path(coords: &[(f64, f64)]) -> EdgePath {
        let points: Vec<Point> = coords.iter().map(|&(x, y)| Point::new(x, y)).collect();
        EdgePath::from_points(&points, 1.0)
    }

    #[test]
    fn short_paths_unchanged() {
        assert!(simplify(&path(&[]), 1.0).is_empty());
        assert_eq!(simplify(&path(&[(1.0, 2.0)]), 1.0).len(), 1);
        assert_eq!(simplify(&path(&[(0.0, 0.0), (10.0, 0.0)]), 1.0).len(), 2);
    }

    #[test]
    fn zero_tolerance_preserves_all_points() {
        let p = path(&[(0.0, 0.0), (1.0, 0.1), (2.0, 0.0), (3.0, 0.05), (4.0, 0.0)]);
        assert_eq!(simplify(&p, 0.0).len(), 5);
    }

    #[test]
    fn collinear_points_collapse_to_endpoints() {
        let p = path(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (3.0, 3.0), (4.0, 4.0)]);
        let result = simplify(&p, 0.1);
        assert_eq!(result.len(), 2);
        assert_eq!(result.first(), Some(Point::new(0.0, 0.0)));
        assert_eq!(result.last(), Some(Point::new(4.0, 4.0)));
    }

    #[test]
    fn zigzag_retains_peaks_until_tolerance_exceeds_them() {
        let p = path(&[(0.0, 0.0), (2.0, 5.0), (4.0, 0.0), (6.0, 5.0), (8.0, 0.0)]);
        assert_eq!(simplify(&p, 1.0).len(), 5);
        assert_eq!(simplify(&p, 10.0).len(), 2);
    }

    #[test]
    fn higher_tolerance_never_keeps_more_points() {
        let coords: Vec<(f64, f64)> = (0..60)
            .map(|i| {
                let x = f64::from(i);
                (x, (x * 0.3).sin() * 6.0)
            })
            .collect();
        let p = path(&coords);
        let counts: Vec<usize> = [0.5, 1.0, 2.0, 4.0, 8.0]
            .iter()
            .map(|&t| simplify(&p, t).len())
            .collect();
        assert!(counts.windows(2).all(|w| w[0] >= w[1]), "{counts:?}");
    }

    #[test]
    fn kept_points_keep_their_intensity() {
        let p = EdgePath::new(vec![
            EdgePoint::new(0.0, 0.0, 0.2),
            EdgePoint::new(1.0, 0.0, 0.4),
            EdgePoint::new(2.0, 0.0, 0.9),
        ]);
        let result = simplify(&p, 0.5);
        assert_eq!(result.len(), 2);
        assert!((result.points()[1].intensity - 0.9).abs() < f32::EPSILON);
        assert!((result.intensity() - p.intensity()).abs() < f32::EPSILON);
    }

    #[test]
    fn perpendicular_distance_diagonal_segment() {
        let d = perpendicular_distance(
            Point::new(2.0, -1.0),
            Point::new(0.0, 0.0),
            Point::new(4.0, 2.0),
        );
        let expected = 8.0 / 20.0_f64.sqrt();
        assert!((d - expected).abs() < 1e-10, "got {d}, expected {expected}");
    }

    #[test]
    fn perpendicular_distance_coincident_endpoints() {
        let d = perpendicular_distance(
            Point::new(3.0, 4.0),
            Point::new(0.0, 0.0),
            Point::new(0.0, 0.0),
        );
        assert!((d - 5.0).abs() < 1e-10);
    }
}
