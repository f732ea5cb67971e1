//! Circle detection by multi-radius Hough voting in image space.
//!
//! For each candidate radius, every edge pixel votes for the centres it
//! could belong to at a fixed set of angles. Peaks are read from a coarse
//! grid of each accumulator, then a greedy non-maximum suppression across
//! all radii removes duplicate detections.
//!
//! The detector is single-threaded. Callers that want parallelism split
//! the radius list into bands, run [`CircleDetector::vote_band`] for each,
//! and merge the results with [`CircleDetector::suppress_duplicates`].

use serde::{Deserialize, Serialize};

use crate::processor::try_alloc;
use crate::raster::EdgeRaster;
use crate::types::{Circle, Dimensions, PipelineError};

/// Circle detector parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircleDetector {
    /// Increment between tested radii.
    pub radius_step: u32,
    /// Increment between voting angles, in degrees.
    pub angle_step_degrees: u32,
    /// Spacing of the grid scanned for peaks.
    pub grid_step: u32,
    /// Peak window half-width, in grid steps.
    pub peak_window_steps: u32,
    /// Two detections closer than this are candidates for merging.
    pub center_tolerance: f32,
    /// Two detections whose radii differ by less than this are candidates
    /// for merging.
    pub radius_tolerance: u32,
    /// Maximum number of circles returned.
    pub max_circles: usize,
}

impl CircleDetector {
    /// Default radius increment.
    pub const DEFAULT_RADIUS_STEP: u32 = 5;
    /// Default angle increment in degrees.
    pub const DEFAULT_ANGLE_STEP_DEGREES: u32 = 15;
    /// Default peak grid spacing.
    pub const DEFAULT_GRID_STEP: u32 = 5;
    /// Default peak window half-width in grid steps.
    pub const DEFAULT_PEAK_WINDOW_STEPS: u32 = 2;
    /// Default duplicate centre distance.
    pub const DEFAULT_CENTER_TOLERANCE: f32 = 30.0;
    /// Default duplicate radius difference.
    pub const DEFAULT_RADIUS_TOLERANCE: u32 = 15;
    /// Default result cap.
    pub const DEFAULT_MAX_CIRCLES: usize = 100;

    /// Detect circles with radii in `[min_radius, max_radius]`, strongest
    /// first.
    ///
    /// Parameters are clamped: `min_radius >= 1`,
    /// `max_radius >= min_radius`, `votes_threshold >= 1`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Allocation`] if an accumulator cannot be
    /// allocated.
    pub fn detect(
        &self,
        edges: &EdgeRaster,
        min_radius: u32,
        max_radius: u32,
        votes_threshold: u32,
    ) -> Result<Vec<Circle>, PipelineError> {
        let pixels = edge_pixels(edges);
        if pixels.is_empty() {
            return Ok(Vec::new());
        }
        let radii = self.radii(min_radius, max_radius);
        let candidates = self.vote_band(&pixels, edges.dimensions(), &radii, votes_threshold)?;
        let candidate_count = candidates.len();
        let circles = self.suppress_duplicates(candidates);
        tracing::debug!(
            edge_pixels = pixels.len(),
            radii = radii.len(),
            candidates = candidate_count,
            circles = circles.len(),
            "circle voting complete",
        );
        Ok(circles)
    }

    /// The radii tested for a clamped `[min_radius, max_radius]` range.
    #[must_use]
    pub fn radii(&self, min_radius: u32, max_radius: u32) -> Vec<u32> {
        let min = min_radius.max(1);
        let max = max_radius.max(min);
        (min..=max).step_by(self.radius_step.max(1) as usize).collect()
    }

    /// Vote and extract raw peaks for each radius in `radii`.
    ///
    /// Candidates are returned in radius order, then row-major scan order,
    /// without duplicate suppression.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Allocation`] if an accumulator cannot be
    /// allocated.
    pub fn vote_band(
        &self,
        pixels: &[(u32, u32)],
        dims: Dimensions,
        radii: &[u32],
        votes_threshold: u32,
    ) -> Result<Vec<Circle>, PipelineError> {
        let threshold = votes_threshold.max(1);
        let angles = self.angles();
        let mut candidates = Vec::new();
        for &radius in radii {
            let acc = CircleAccumulator::vote(pixels, dims, radius, &angles)?;
            candidates.extend(acc.peaks(
                threshold,
                self.grid_step.max(1),
                self.peak_window_steps,
            ));
        }
        Ok(candidates)
    }

    /// Greedy non-maximum suppression across radii.
    ///
    /// Candidates are visited strongest first (stable for ties); each is
    /// kept unless a kept circle has both a centre distance below
    /// `center_tolerance` and a radius difference below
    /// `radius_tolerance`. Running it on its own output removes nothing.
    #[must_use]
    pub fn suppress_duplicates(&self, mut candidates: Vec<Circle>) -> Vec<Circle> {
        candidates.sort_by(|a, b| b.votes.cmp(&a.votes));
        let mut kept: Vec<Circle> = Vec::new();
        for c in candidates {
            if kept.len() >= self.max_circles {
                break;
            }
            if !kept.iter().any(|k| self.is_duplicate(k, &c)) {
                kept.push(c);
            }
        }
        kept
    }

    fn is_duplicate(&self, a: &Circle, b: &Circle) -> bool {
        let dx = f64::from(a.x) - f64::from(b.x);
        let dy = f64::from(a.y) - f64::from(b.y);
        dx.hypot(dy) < f64::from(self.center_tolerance)
            && a.radius.abs_diff(b.radius) < self.radius_tolerance
    }

    fn angles(&self) -> Vec<(f64, f64)> {
        (0..360u32)
            .step_by(self.angle_step_degrees.max(1) as usize)
            .map(|deg| f64::from(deg).to_radians().sin_cos())
            .collect()
    }
}

impl Default for CircleDetector {
    fn default() -> Self {
        Self {
            radius_step: Self::DEFAULT_RADIUS_STEP,
            angle_step_degrees: Self::DEFAULT_ANGLE_STEP_DEGREES,
            grid_step: Self::DEFAULT_GRID_STEP,
            peak_window_steps: Self::DEFAULT_PEAK_WINDOW_STEPS,
            center_tolerance: Self::DEFAULT_CENTER_TOLERANCE,
            radius_tolerance: Self::DEFAULT_RADIUS_TOLERANCE,
            max_circles: Self::DEFAULT_MAX_CIRCLES,
        }
    }
}

/// Circle detection settings for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircleSearch {
    /// Detector parameters.
    pub detector: CircleDetector,
    /// Smallest radius tested.
    pub min_radius: u32,
    /// Largest radius tested.
    pub max_radius: u32,
    /// Minimum votes for a peak.
    pub votes_threshold: u32,
}

impl CircleSearch {
    /// Default smallest radius.
    pub const DEFAULT_MIN_RADIUS: u32 = 10;
    /// Default largest radius.
    pub const DEFAULT_MAX_RADIUS: u32 = 200;
    /// Default minimum votes.
    pub const DEFAULT_VOTES_THRESHOLD: u32 = 46;

    /// Run the detector with these settings.
    ///
    /// # Errors
    ///
    /// See [`CircleDetector::detect`].
    pub fn detect(&self, edges: &EdgeRaster) -> Result<Vec<Circle>, PipelineError> {
        self.detector.detect(edges, self.min_radius, self.max_radius, self.votes_threshold)
    }
}

impl Default for CircleSearch {
    fn default() -> Self {
        Self {
            detector: CircleDetector::default(),
            min_radius: Self::DEFAULT_MIN_RADIUS,
            max_radius: Self::DEFAULT_MAX_RADIUS,
            votes_threshold: Self::DEFAULT_VOTES_THRESHOLD,
        }
    }
}

/// Coordinates of every edge pixel, collected once per detection.
#[must_use]
pub fn edge_pixels(edges: &EdgeRaster) -> Vec<(u32, u32)> {
    edges.edge_pixels(1)
}

/// Centre votes for one radius, row-major over the raster.
struct CircleAccumulator {
    dims: Dimensions,
    radius: u32,
    counts: Vec<u32>,
}

impl CircleAccumulator {
    #[allow(clippy::cast_possible_truncation)]
    fn vote(
        pixels: &[(u32, u32)],
        dims: Dimensions,
        radius: u32,
        angles: &[(f64, f64)],
    ) -> Result<Self, PipelineError> {
        let len = usize::try_from(dims.pixel_count()).map_err(|_| PipelineError::Allocation {
            what: "circle accumulator",
            bytes: usize::MAX,
        })?;
        let mut counts = try_alloc(len, "circle accumulator")?;
        counts.resize(len, 0u32);

        let r = f64::from(radius);
        let (w, h) = (i64::from(dims.width), i64::from(dims.height));
        for &(x, y) in pixels {
            for &(sin, cos) in angles {
                // Half-up rounding, so -0.5 lands on 0.
                let cx = (r.mul_add(-cos, f64::from(x)) + 0.5).floor() as i64;
                let cy = (r.mul_add(-sin, f64::from(y)) + 0.5).floor() as i64;
                if (0..w).contains(&cx) && (0..h).contains(&cy) {
                    #[allow(clippy::cast_sign_loss)]
                    let i = (cy * w + cx) as usize;
                    counts[i] += 1;
                }
            }
        }
        Ok(Self {
            dims,
            radius,
            counts,
        })
    }

    fn get(&self, x: i64, y: i64) -> u32 {
        if x < 0 || y < 0 || x >= i64::from(self.dims.width) || y >= i64::from(self.dims.height) {
            return 0;
        }
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let i = (y * i64::from(self.dims.width) + x) as usize;
        self.counts.get(i).copied().unwrap_or(0)
    }

    /// Grid cells at least `radius` from every border with enough votes
    /// and no strictly stronger grid neighbour within the window.
    fn peaks(&self, threshold: u32, grid_step: u32, window_steps: u32) -> Vec<Circle> {
        let r = self.radius;
        let step = grid_step as usize;
        let reach = i64::from(window_steps) * i64::from(grid_step);
        let mut out = Vec::new();
        for y in (r..self.dims.height.saturating_sub(r)).step_by(step) {
            for x in (r..self.dims.width.saturating_sub(r)).step_by(step) {
                let (xi, yi) = (i64::from(x), i64::from(y));
                let votes = self.get(xi, yi);
                if votes < threshold {
                    continue;
                }
                let offsets = (-reach..=reach).step_by(step);
                let dominated = offsets.clone().any(|dy| {
                    offsets
                        .clone()
                        .any(|dx| self.get(xi + dx, yi + dy) > votes)
                });
                if !dominated {
                    out.push(Circle {
                        x,
                        y,
                        radius: r,
                        votes,
                    });
                }
            }
        }
        out
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::{GrayImage, Luma};

    use super::*;

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn circle_raster(size: u32, cx: f64, cy: f64, radius: f64) -> EdgeRaster {
        let mut img = GrayImage::new(size, size);
        for step in 0..3600u32 {
            let a = (f64::from(step) * 0.1).to_radians();
            let x = (radius.mul_add(a.cos(), cx) + 0.5).floor();
            let y = (radius.mul_add(a.sin(), cy) + 0.5).floor();
            if x >= 0.0 && y >= 0.0 && x < f64::from(size) && y < f64::from(size) {
                img.put_pixel(x as u32, y as u32, Luma([255]));
            }
        }
        EdgeRaster::from_image(img)
    }

    #[test]
    fn empty_raster_yields_no_circles() {
        let edges = EdgeRaster::empty(Dimensions::new(100, 100));
        let circles = CircleDetector::default().detect(&edges, 10, 60, 1).unwrap();
        assert!(circles.is_empty());
    }

    #[test]
    fn finds_single_circle() {
        let edges = circle_raster(200, 100.0, 100.0, 40.0);
        let circles = CircleDetector::default().detect(&edges, 10, 60, 20).unwrap();
        assert_eq!(circles.len(), 1, "{circles:?}");
        let c = circles[0];
        assert!(c.x.abs_diff(100) <= 5);
        assert!(c.y.abs_diff(100) <= 5);
        assert!(c.radius.abs_diff(40) <= 5);
        assert!(c.votes >= 20);
    }

    #[test]
    fn radii_clamp_and_step() {
        let d = CircleDetector::default();
        assert_eq!(d.radii(10, 30), vec![10, 15, 20, 25, 30]);
        assert_eq!(d.radii(0, 0), vec![1]);
        assert_eq!(d.radii(20, 5), vec![20]);
    }

    #[test]
    fn suppression_prefers_stronger_candidate() {
        let d = CircleDetector::default();
        let weak = Circle {
            x: 50,
            y: 50,
            radius: 20,
            votes: 30,
        };
        let strong = Circle {
            x: 55,
            y: 50,
            radius: 25,
            votes: 40,
        };
        let far = Circle {
            x: 150,
            y: 150,
            radius: 20,
            votes: 35,
        };
        let kept = d.suppress_duplicates(vec![weak, strong, far]);
        assert_eq!(kept, vec![strong, far]);
    }

    #[test]
    fn concentric_circles_with_distinct_radii_both_survive() {
        let d = CircleDetector::default();
        let inner = Circle {
            x: 50,
            y: 50,
            radius: 20,
            votes: 30,
        };
        let outer = Circle {
            radius: 40,
            ..inner
        };
        assert_eq!(d.suppress_duplicates(vec![inner, outer]).len(), 2);
    }

    #[test]
    fn suppression_is_idempotent() {
        let d = CircleDetector::default();
        let candidates: Vec<Circle> = (0..40)
            .map(|i| Circle {
                x: (i * 7) % 120,
                y: (i * 13) % 120,
                radius: 10 + (i % 5) * 5,
                votes: 20 + (i * 3) % 17,
            })
            .collect();
        let once = d.suppress_duplicates(candidates);
        let twice = d.suppress_duplicates(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn output_capped() {
        let d = CircleDetector {
            max_circles: 2,
            ..CircleDetector::default()
        };
        let candidates: Vec<Circle> = (0..5)
            .map(|i| Circle {
                x: i * 100,
                y: 0,
                radius: 10,
                votes: 10,
            })
            .collect();
        assert_eq!(d.suppress_duplicates(candidates).len(), 2);
    }

    #[test]
    fn bands_merge_to_same_result() {
        let edges = circle_raster(160, 80.0, 80.0, 30.0);
        let d = CircleDetector::default();
        let pixels = edge_pixels(&edges);
        let radii = d.radii(10, 50);
        let whole =
            d.suppress_duplicates(d.vote_band(&pixels, edges.dimensions(), &radii, 15).unwrap());
        let mut merged = Vec::new();
        for band in radii.chunks(3) {
            merged.extend(d.vote_band(&pixels, edges.dimensions(), band, 15).unwrap());
        }
        assert_eq!(d.suppress_duplicates(merged), whole);
    }

    #[test]
    fn search_clamps_zero_threshold() {
        let edges = circle_raster(100, 50.0, 50.0, 20.0);
        let search = CircleSearch {
            votes_threshold: 0,
            min_radius: 20,
            max_radius: 20,
            ..CircleSearch::default()
        };
        let circles = search.detect(&edges).unwrap();
        assert!(circles.iter().all(|c| c.votes >= 1));
        assert!(!circles.is_empty());
    }
}
