//! Raster to path conversion: trace, filter, simplify and order.

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::optimize::optimize_path_order;
use crate::raster::EdgeRaster;
use crate::simplify::simplify;
use crate::trace::{EdgeTracer, TracerKind};
use crate::types::EdgePath;

/// Options for turning one raster into paths.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorizeOptions {
    /// Pixels with a value at or above this are traced.
    pub threshold: u8,
    /// Paths with fewer traced points than this are dropped.
    pub min_path_length: usize,
    /// RDP tolerance in pixels; higher keeps fewer points.
    pub simplification: f64,
    /// Tracing algorithm.
    pub tracer: TracerKind,
    /// Reorder paths so each starts near the previous one's end.
    pub order_paths: bool,
}

impl VectorizeOptions {
    /// Default outline threshold.
    pub const DEFAULT_THRESHOLD: u8 = 10;
    /// Default outline minimum path length.
    pub const DEFAULT_MIN_PATH_LENGTH: usize = 5;
    /// Default outline simplification tolerance.
    pub const DEFAULT_SIMPLIFICATION: f64 = 4.0;

    /// Default background threshold (applied to the blurred frame).
    pub const BACKGROUND_THRESHOLD: u8 = 140;
    /// Default background minimum path length.
    pub const BACKGROUND_MIN_PATH_LENGTH: usize = 3;
    /// Default background simplification tolerance.
    pub const BACKGROUND_SIMPLIFICATION: f64 = 3.0;

    /// Options for the background layer traced from the blurred frame.
    ///
    /// The thresholded frame holds filled regions rather than thin edges,
    /// so this preset follows region borders.
    #[must_use]
    pub fn background() -> Self {
        Self {
            threshold: Self::BACKGROUND_THRESHOLD,
            min_path_length: Self::BACKGROUND_MIN_PATH_LENGTH,
            simplification: Self::BACKGROUND_SIMPLIFICATION,
            tracer: TracerKind::BorderFollowing,
            ..Self::default()
        }
    }
}

impl Default for VectorizeOptions {
    fn default() -> Self {
        Self {
            threshold: Self::DEFAULT_THRESHOLD,
            min_path_length: Self::DEFAULT_MIN_PATH_LENGTH,
            simplification: Self::DEFAULT_SIMPLIFICATION,
            tracer: TracerKind::default(),
            order_paths: true,
        }
    }
}

/// Trace `raster` into simplified paths.
///
/// Paths shorter than `min_path_length` (counted before simplification)
/// are discarded. Every returned path has at least one point.
#[must_use = "returns the traced paths"]
pub fn vectorize(raster: &GrayImage, options: &VectorizeOptions) -> Vec<EdgePath> {
    let traced = options.tracer.trace(raster, options.threshold);
    let traced_count = traced.len();
    let simplification = options.simplification.max(0.0);
    let paths: Vec<EdgePath> = traced
        .into_iter()
        .filter(|p| !p.is_empty() && p.len() >= options.min_path_length)
        .map(|p| simplify(&p, simplification))
        .collect();
    let paths = if options.order_paths {
        optimize_path_order(&paths)
    } else {
        paths
    };
    tracing::debug!(
        traced = traced_count,
        kept = paths.len(),
        points = paths.iter().map(EdgePath::len).sum::<usize>(),
        "vectorized raster",
    );
    paths
}

/// Trace an edge raster into simplified paths.
#[must_use = "returns the traced paths"]
pub fn vectorize_edges(edges: &EdgeRaster, options: &VectorizeOptions) -> Vec<EdgePath> {
    vectorize(edges.image(), options)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Luma;

    use super::*;

    fn run_image(y_rows: &[u32], x_range: std::ops::Range<u32>) -> GrayImage {
        GrayImage::from_fn(200, 50, |x, y| {
            Luma([if y_rows.contains(&y) && x_range.contains(&x) { 255 } else { 0 }])
        })
    }

    #[test]
    fn straight_run_yields_one_path_with_two_points() {
        let edges = EdgeRaster::from_image(run_image(&[10], 20..120));
        let paths = vectorize_edges(&edges, &VectorizeOptions::default());
        assert_eq!(paths.len(), 1);
        assert!(paths[0].len() >= 2);
        // A straight run simplifies to its endpoints.
        assert_eq!(paths[0].len(), 2);
    }

    #[test]
    fn short_paths_are_discarded() {
        let mut img = run_image(&[10], 20..120);
        for x in 150..153 {
            img.put_pixel(x, 30, Luma([255]));
        }
        let options = VectorizeOptions {
            min_path_length: 5,
            ..VectorizeOptions::default()
        };
        assert_eq!(vectorize(&img, &options).len(), 1);
        let keep_all = VectorizeOptions {
            min_path_length: 1,
            ..options
        };
        assert_eq!(vectorize(&img, &keep_all).len(), 2);
    }

    #[test]
    fn empty_raster_yields_nothing() {
        let edges = EdgeRaster::empty(crate::types::Dimensions::new(30, 30));
        assert!(vectorize_edges(&edges, &VectorizeOptions::default()).is_empty());
    }

    #[test]
    fn background_defaults() {
        let bg = VectorizeOptions::background();
        assert_eq!(bg.threshold, 140);
        assert_eq!(bg.min_path_length, 3);
        assert!((bg.simplification - 3.0).abs() < f64::EPSILON);
        assert_eq!(bg.tracer, TracerKind::BorderFollowing);
    }

    #[test]
    fn background_traces_filled_region_outline() {
        let img = GrayImage::from_fn(300, 300, |x, y| {
            Luma([if (50..250).contains(&x) && (50..250).contains(&y) { 255 } else { 0 }])
        });
        let paths = vectorize(&img, &VectorizeOptions::background());
        assert_eq!(paths.len(), 1);
        let path = &paths[0];
        assert!(path.len() <= 6, "{} points", path.len());
        let on_border = |v: f64| (v - 50.0).abs() < 1.0 || (v - 249.0).abs() < 1.0;
        assert!(
            path.positions().all(|p| on_border(p.x) || on_border(p.y)),
            "{path:?}"
        );
    }

    #[test]
    fn options_serde_fills_missing_fields_with_defaults() {
        let options: VectorizeOptions = serde_json::from_str(r#"{"threshold": 99}"#).unwrap();
        assert_eq!(options.threshold, 99);
        assert_eq!(options.min_path_length, VectorizeOptions::DEFAULT_MIN_PATH_LENGTH);
    }
}
