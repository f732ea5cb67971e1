//! SVG path `d` strings from traced paths.
//!
//! Points are mapped into the output viewport with a
//! [`ViewportTransform`], rounded to 0.01 units, and emitted through the
//! [`svg`] crate's [`Data`] builder.
//!
//! Curves use the smooth-through-midpoints construction: every interior
//! point becomes a quadratic control point and each segment ends halfway
//! to the next point. With wiggle enabled the "halfway" divisor is drawn
//! per segment from [`WIGGLE_DIVISORS`], which gives a hand-drawn jitter
//! that changes on every call.

use std::ops::RangeInclusive;

use rand::Rng;
use serde::{Deserialize, Serialize};
use svg::node::Value;
use svg::node::element::path::Data;

use vectrace_pipeline::{Dimensions, EdgePath, Point};

use crate::viewport::{RasterOrigin, ViewportTransform};

/// Divisor that places a curve endpoint exactly between two points.
pub const MIDPOINT_DIVISOR: f64 = 2.0;

/// Range the wiggle divisor is drawn from.
pub const WIGGLE_DIVISORS: RangeInclusive<f64> = 1.975..=2.025;

/// Connected output starts a new subpath when the gap between two paths
/// exceeds the longer viewport side divided by this.
pub const CONNECT_DIVISOR: f64 = 6.0;

/// How paths are turned into path data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathOptions {
    /// Emit quadratic curves instead of straight segments.
    pub use_bezier: bool,
    /// Jitter curve endpoints (only with `use_bezier`).
    pub wiggle: bool,
    /// Merge all paths into one path string.
    pub connect_edges: bool,
    /// Vertical origin of the source raster.
    pub origin: RasterOrigin,
}

impl Default for PathOptions {
    fn default() -> Self {
        Self {
            use_bezier: true,
            wiggle: false,
            connect_edges: false,
            origin: RasterOrigin::default(),
        }
    }
}

/// Build path data for `paths` traced on a `source`-sized raster, drawn
/// into an `output`-sized viewport.
///
/// Paths with fewer than two points are skipped. Without
/// `connect_edges` the result holds one string per remaining path, in
/// order. With it, the result holds at most one string.
#[must_use = "returns the path data"]
pub fn to_path_data<R: Rng>(
    paths: &[EdgePath],
    source: Dimensions,
    output: Dimensions,
    options: &PathOptions,
    rng: &mut R,
) -> Vec<String> {
    let transform = ViewportTransform::fit(source, output, options.origin);
    let mapped: Vec<Vec<Point>> = paths
        .iter()
        .filter(|p| p.len() >= 2)
        .map(|p| p.positions().map(|q| transform.apply(q)).collect())
        .collect();
    if mapped.is_empty() {
        return Vec::new();
    }

    let mut divisor = || {
        if options.wiggle {
            rng.gen_range(WIGGLE_DIVISORS)
        } else {
            MIDPOINT_DIVISOR
        }
    };

    if !options.connect_edges {
        return mapped
            .iter()
            .map(|points| {
                let data = if options.use_bezier {
                    curve(Data::new(), points, &mut divisor)
                } else {
                    polyline(Data::new(), points)
                };
                String::from(Value::from(data))
            })
            .collect();
    }

    let max_gap = f64::from(output.width.max(output.height)) / CONNECT_DIVISOR;
    let data = if options.use_bezier {
        split_at_gaps(&mapped, max_gap)
            .iter()
            .fold(Data::new(), |data, run| curve(data, run, &mut divisor))
    } else {
        bridged_polyline(&mapped, max_gap)
    };
    vec![String::from(Value::from(data))]
}

/// Round to 0.01 for compact, stable output.
#[allow(clippy::cast_possible_truncation)]
fn round2(v: f64) -> f32 {
    // Adding zero turns -0 into 0.
    ((v * 100.0).round() / 100.0 + 0.0) as f32
}

fn xy(p: Point) -> (f32, f32) {
    (round2(p.x), round2(p.y))
}

/// `M p0 L p1 ...`
fn polyline(data: Data, points: &[Point]) -> Data {
    let Some((&first, rest)) = points.split_first() else {
        return data;
    };
    rest.iter()
        .fold(data.move_to(xy(first)), |data, &p| data.line_to(xy(p)))
}

/// Smooth-through-midpoints curve. Two points become `M L`; a single
/// point emits nothing.
fn curve(data: Data, points: &[Point], divisor: &mut impl FnMut() -> f64) -> Data {
    match points {
        [] | [_] => data,
        [a, b] => data.move_to(xy(*a)).line_to(xy(*b)),
        [first, .., penultimate, last] => {
            let mut data = data.move_to(xy(*first));
            for pair in points[1..].windows(2) {
                let (current, next) = (pair[0], pair[1]);
                let d = divisor();
                let end = Point::new((current.x + next.x) / d, (current.y + next.y) / d);
                let (cx, cy) = xy(current);
                let (ex, ey) = xy(end);
                data = data.quadratic_curve_to((cx, cy, ex, ey));
            }
            let (cx, cy) = xy(*penultimate);
            let (ex, ey) = xy(*last);
            data.quadratic_curve_to((cx, cy, ex, ey))
        }
    }
}

/// Concatenate paths into runs, starting a new run wherever the jump
/// from one path's end to the next path's start exceeds `max_gap`.
fn split_at_gaps(paths: &[Vec<Point>], max_gap: f64) -> Vec<Vec<Point>> {
    let mut runs: Vec<Vec<Point>> = Vec::new();
    for path in paths {
        let (Some(&start), Some(run)) = (path.first(), runs.last_mut()) else {
            runs.push(path.clone());
            continue;
        };
        let near = run.last().is_some_and(|&end| end.distance(start) <= max_gap);
        if near {
            run.extend_from_slice(path);
        } else {
            runs.push(path.clone());
        }
    }
    runs
}

/// One straight-segment path: near paths are bridged with `L`, far ones
/// start a new subpath with `M`.
fn bridged_polyline(paths: &[Vec<Point>], max_gap: f64) -> Data {
    let mut data = Data::new();
    let mut last: Option<Point> = None;
    for path in paths {
        let Some((&first, rest)) = path.split_first() else {
            continue;
        };
        data = match last {
            Some(end) if end.distance(first) <= max_gap => data.line_to(xy(first)),
            _ => data.move_to(xy(first)),
        };
        for &p in rest {
            data = data.line_to(xy(p));
        }
        last = path.last().copied();
    }
    data
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn path(coords: &[(f64, f64)]) -> EdgePath {
        let points: Vec<Point> = coords.iter().map(|&(x, y)| Point::new(x, y)).collect();
        EdgePath::from_points(&points, 1.0)
    }

    fn run(y: f64, xs: std::ops::Range<u32>) -> EdgePath {
        let points: Vec<Point> = xs.map(|x| Point::new(f64::from(x), y)).collect();
        EdgePath::from_points(&points, 1.0)
    }

    fn dims(width: u32, height: u32) -> Dimensions {
        Dimensions::new(width, height)
    }

    fn straight() -> PathOptions {
        PathOptions {
            use_bezier: false,
            ..PathOptions::default()
        }
    }

    fn count(d: &str, command: char) -> usize {
        d.chars().filter(|&c| c == command).count()
    }

    #[test]
    fn straight_segments() {
        let mut rng = StdRng::seed_from_u64(1);
        let d = to_path_data(
            &[path(&[(10.0, 20.0), (30.0, 40.0), (50.0, 40.0)])],
            dims(100, 100),
            dims(100, 100),
            &straight(),
            &mut rng,
        );
        assert_eq!(d, vec!["M10,20 L30,40 L50,40".to_string()]);
    }

    #[test]
    fn two_point_curve_is_a_line() {
        let mut rng = StdRng::seed_from_u64(1);
        let d = to_path_data(
            &[path(&[(10.0, 20.0), (30.0, 40.0)])],
            dims(100, 100),
            dims(100, 100),
            &PathOptions::default(),
            &mut rng,
        );
        assert_eq!(d, vec!["M10,20 L30,40".to_string()]);
    }

    #[test]
    fn curve_ends_each_segment_at_the_midpoint() {
        let mut rng = StdRng::seed_from_u64(1);
        let d = to_path_data(
            &[path(&[(0.0, 0.0), (10.0, 0.0), (20.0, 10.0), (30.0, 10.0)])],
            dims(100, 100),
            dims(100, 100),
            &PathOptions::default(),
            &mut rng,
        );
        assert_eq!(d, vec!["M0,0 Q10,0,15,5 Q20,10,25,10 Q20,10,30,10".to_string()]);
    }

    #[test]
    fn short_paths_are_skipped() {
        let mut rng = StdRng::seed_from_u64(1);
        let paths = [path(&[(1.0, 1.0)]), path(&[]), path(&[(0.0, 0.0), (5.0, 5.0)])];
        let d = to_path_data(&paths, dims(10, 10), dims(10, 10), &straight(), &mut rng);
        assert_eq!(d.len(), 1);
    }

    #[test]
    fn coordinates_are_rounded_to_hundredths() {
        let mut rng = StdRng::seed_from_u64(1);
        let d = to_path_data(
            &[path(&[(0.0, 0.0), (1.0, 1.0)])],
            dims(3, 3),
            dims(10, 10),
            &straight(),
            &mut rng,
        );
        assert_eq!(d, vec!["M0,0 L3.33,3.33".to_string()]);
    }

    #[test]
    fn connect_separates_far_runs() {
        let mut rng = StdRng::seed_from_u64(1);
        // Threshold is 600 / 6 = 100; the runs are 200 apart.
        let paths = [run(10.0, 0..100), run(210.0, 0..100)];
        let options = PathOptions {
            connect_edges: true,
            ..straight()
        };
        let d = to_path_data(&paths, dims(600, 600), dims(600, 600), &options, &mut rng);
        assert_eq!(d.len(), 1);
        assert_eq!(count(&d[0], 'M'), 2);
    }

    #[test]
    fn connect_bridges_near_runs() {
        let mut rng = StdRng::seed_from_u64(1);
        let paths = [run(10.0, 0..100), run(30.0, 100..200)];
        let options = PathOptions {
            connect_edges: true,
            ..straight()
        };
        let d = to_path_data(&paths, dims(600, 600), dims(600, 600), &options, &mut rng);
        assert_eq!(count(&d[0], 'M'), 1);

        let curved = PathOptions {
            connect_edges: true,
            ..PathOptions::default()
        };
        let d = to_path_data(&paths, dims(600, 600), dims(600, 600), &curved, &mut rng);
        assert_eq!(count(&d[0], 'M'), 1);
        assert!(count(&d[0], 'Q') > 0);
    }

    #[test]
    fn connected_curves_split_at_far_gaps() {
        let mut rng = StdRng::seed_from_u64(1);
        let paths = [run(10.0, 0..50), run(300.0, 0..50)];
        let options = PathOptions {
            connect_edges: true,
            ..PathOptions::default()
        };
        let d = to_path_data(&paths, dims(600, 600), dims(600, 600), &options, &mut rng);
        assert_eq!(d.len(), 1);
        assert_eq!(count(&d[0], 'M'), 2);
    }

    #[test]
    fn wiggle_is_seeded_and_differs_from_plain_curves() {
        let paths = [path(&[(0.0, 0.0), (100.0, 0.0), (200.0, 100.0), (300.0, 100.0)])];
        let options = PathOptions {
            wiggle: true,
            ..PathOptions::default()
        };
        let size = dims(400, 400);
        let seeded = |options: &PathOptions| {
            to_path_data(&paths, size, size, options, &mut StdRng::seed_from_u64(7))
        };
        assert_eq!(seeded(&options), seeded(&options));
        assert_ne!(seeded(&options), seeded(&PathOptions::default()));
    }

    #[test]
    fn wiggle_resamples_on_every_call() {
        let paths = [path(&[(0.0, 0.0), (100.0, 0.0), (200.0, 100.0), (300.0, 100.0)])];
        let options = PathOptions {
            wiggle: true,
            ..PathOptions::default()
        };
        let mut rng = StdRng::seed_from_u64(7);
        let first = to_path_data(&paths, dims(400, 400), dims(400, 400), &options, &mut rng);
        let second = to_path_data(&paths, dims(400, 400), dims(400, 400), &options, &mut rng);
        assert_ne!(first, second);
    }

    #[test]
    fn bottom_left_origin_flips() {
        let mut rng = StdRng::seed_from_u64(1);
        let options = PathOptions {
            origin: RasterOrigin::BottomLeft,
            ..straight()
        };
        let d = to_path_data(
            &[path(&[(0.0, 0.0), (10.0, 10.0)])],
            dims(10, 10),
            dims(10, 10),
            &options,
            &mut rng,
        );
        assert_eq!(d, vec!["M0,10 L10,0".to_string()]);
    }
}
