//! Straight-line detection by Hough voting over (θ, ρ).
//!
//! The accumulator covers θ in `[0, π)` and ρ in `[-maxRho, maxRho]`
//! where `maxRho` is the raster diagonal. Two voting strategies fill it:
//!
//! - [`VotingStrategy::Gather`] evaluates every accumulator cell as an
//!   independent kernel, counting edge pixels whose ρ falls within a
//!   tolerance of the cell's ρ. This is the form a pixel processor can
//!   run in parallel.
//! - [`VotingStrategy::Scatter`] walks edge pixels and increments the
//!   nearest ρ bin for every θ.
//!
//! Gather counts every pixel within the tolerance band, so neighbouring
//! ρ bins share votes; scatter assigns each pixel to exactly one bin per
//! θ. Vote totals from the two strategies are therefore not comparable.

use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

use crate::processor::{PixelProcessor, try_alloc};
use crate::raster::EdgeRaster;
use crate::types::{Dimensions, Line, PipelineError};

/// How the accumulator is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VotingStrategy {
    /// Per-cell evaluation with a ρ tolerance band.
    #[default]
    Gather,
    /// Per-pixel increments of the nearest ρ bin.
    Scatter,
}

/// Line detector parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineDetector {
    /// Number of θ bins over `[0, π)`.
    pub theta_bins: u32,
    /// Only every `row_stride`-th row of edge pixels votes.
    pub row_stride: u32,
    /// Gather mode: a pixel votes for a cell when its ρ is strictly
    /// closer than this to the cell's ρ.
    pub rho_tolerance: f32,
    /// Half-width, in bins, of the peak suppression window.
    pub peak_window: u32,
    /// Maximum number of lines returned.
    pub max_lines: usize,
    /// Accumulator filling strategy.
    pub voting: VotingStrategy,
}

impl LineDetector {
    /// Default number of θ bins (one per degree).
    pub const DEFAULT_THETA_BINS: u32 = 180;
    /// Default row subsampling.
    pub const DEFAULT_ROW_STRIDE: u32 = 2;
    /// Default gather tolerance in raster units.
    pub const DEFAULT_RHO_TOLERANCE: f32 = 2.5;
    /// Default peak window half-width.
    pub const DEFAULT_PEAK_WINDOW: u32 = 2;
    /// Default result cap.
    pub const DEFAULT_MAX_LINES: usize = 40;

    /// Detect lines in `edges`, strongest first.
    ///
    /// `votes_threshold` is clamped to at least 1. An edge raster without
    /// edge pixels yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Allocation`] if the accumulator cannot be
    /// allocated.
    pub fn detect<P: PixelProcessor>(
        &self,
        processor: &P,
        edges: &EdgeRaster,
        votes_threshold: u32,
    ) -> Result<Vec<Line>, PipelineError> {
        let Some(acc) = self.accumulate(processor, edges)? else {
            return Ok(Vec::new());
        };
        let mut lines = acc.peaks(votes_threshold.max(1), self.peak_window);
        lines.sort_by(|a, b| b.votes.cmp(&a.votes));
        lines.truncate(self.max_lines);
        tracing::debug!(
            max_votes = acc.max_votes(),
            nonzero_cells = acc.nonzero_cells(),
            lines = lines.len(),
            "line voting complete",
        );
        Ok(lines)
    }

    /// Fill the accumulator for `edges`. Returns `None` when no edge
    /// pixel is sampled.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Allocation`] if the accumulator cannot be
    /// allocated.
    pub fn accumulate<P: PixelProcessor>(
        &self,
        processor: &P,
        edges: &EdgeRaster,
    ) -> Result<Option<LineAccumulator>, PipelineError> {
        let pixels = edges.edge_pixels(self.row_stride);
        if pixels.is_empty() {
            return Ok(None);
        }
        let geometry = Geometry::new(edges.dimensions(), self.theta_bins.max(1));
        let counts = match self.voting {
            VotingStrategy::Gather => gather(processor, &geometry, &pixels, self.rho_tolerance)?,
            VotingStrategy::Scatter => scatter(&geometry, &pixels)?,
        };
        Ok(Some(LineAccumulator { geometry, counts }))
    }
}

impl Default for LineDetector {
    fn default() -> Self {
        Self {
            theta_bins: Self::DEFAULT_THETA_BINS,
            row_stride: Self::DEFAULT_ROW_STRIDE,
            rho_tolerance: Self::DEFAULT_RHO_TOLERANCE,
            peak_window: Self::DEFAULT_PEAK_WINDOW,
            max_lines: Self::DEFAULT_MAX_LINES,
            voting: VotingStrategy::default(),
        }
    }
}

/// Line detection settings for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineSearch {
    /// Detector parameters.
    pub detector: LineDetector,
    /// Minimum votes for a peak.
    pub votes_threshold: u32,
}

impl LineSearch {
    /// Default minimum votes.
    pub const DEFAULT_VOTES_THRESHOLD: u32 = 20;

    /// Run the detector with these settings.
    ///
    /// # Errors
    ///
    /// See [`LineDetector::detect`].
    pub fn detect<P: PixelProcessor>(
        &self,
        processor: &P,
        edges: &EdgeRaster,
    ) -> Result<Vec<Line>, PipelineError> {
        self.detector.detect(processor, edges, self.votes_threshold)
    }
}

impl Default for LineSearch {
    fn default() -> Self {
        Self {
            detector: LineDetector::default(),
            votes_threshold: Self::DEFAULT_VOTES_THRESHOLD,
        }
    }
}

/// Bin layout shared by voting and peak mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Geometry {
    theta_bins: u32,
    rho_bins: u32,
    max_rho: f32,
    rho_step: f32,
}

impl Geometry {
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn new(dims: Dimensions, theta_bins: u32) -> Self {
        let max_rho = (dims.width as f32).hypot(dims.height as f32);
        let rho_bins = ((2.0 * max_rho).ceil() as u32).max(1);
        Self {
            theta_bins,
            rho_bins,
            max_rho,
            rho_step: 2.0 * max_rho / rho_bins as f32,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn theta(&self, t: u32) -> f32 {
        t as f32 * PI / self.theta_bins as f32
    }

    /// ρ at the centre of bin `r`.
    #[allow(clippy::cast_precision_loss)]
    fn rho(&self, r: u32) -> f32 {
        (r as f32 + 0.5).mul_add(self.rho_step, -self.max_rho)
    }

    /// Nearest bin for `rho`, clamped into range.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn bin(&self, rho: f32) -> u32 {
        let r = ((rho + self.max_rho) / self.rho_step).floor().max(0.0) as u32;
        r.min(self.rho_bins - 1)
    }

    fn cell_count(&self) -> usize {
        self.theta_bins as usize * self.rho_bins as usize
    }

    fn trig(&self) -> Vec<(f32, f32)> {
        (0..self.theta_bins).map(|t| self.theta(t).sin_cos()).collect()
    }
}

#[allow(clippy::cast_precision_loss)]
fn pixel_rho((x, y): (u32, u32), (sin, cos): (f32, f32)) -> f32 {
    (x as f32).mul_add(cos, y as f32 * sin)
}

/// Per-cell evaluation: for every θ the sampled pixels' ρ values are
/// sorted once, then each cell counts the values inside its open band
/// with two binary searches.
fn gather<P: PixelProcessor>(
    processor: &P,
    geometry: &Geometry,
    pixels: &[(u32, u32)],
    tolerance: f32,
) -> Result<Vec<u32>, PipelineError> {
    let mut table: Vec<Vec<f32>> = try_alloc(geometry.theta_bins as usize, "line rho table")?;
    for trig in geometry.trig() {
        let mut rhos: Vec<f32> = try_alloc(pixels.len(), "line rho table")?;
        rhos.extend(pixels.iter().map(|&p| pixel_rho(p, trig)));
        rhos.sort_by(f32::total_cmp);
        table.push(rhos);
    }

    let dims = Dimensions::new(geometry.theta_bins, geometry.rho_bins);
    processor.map_cells(dims, "line accumulator", |t, r| {
        let target = geometry.rho(r);
        let rhos = &table[t as usize];
        let lo = rhos.partition_point(|&v| v <= target - tolerance);
        let hi = rhos.partition_point(|&v| v < target + tolerance);
        u32::try_from(hi.saturating_sub(lo)).unwrap_or(u32::MAX)
    })
}

fn scatter(geometry: &Geometry, pixels: &[(u32, u32)]) -> Result<Vec<u32>, PipelineError> {
    let cells = geometry.cell_count();
    let mut counts = try_alloc(cells, "line accumulator")?;
    counts.resize(cells, 0u32);
    let trig = geometry.trig();
    let stride = geometry.theta_bins as usize;
    for &p in pixels {
        for (t, &sc) in trig.iter().enumerate() {
            let r = geometry.bin(pixel_rho(p, sc)) as usize;
            counts[r * stride + t] += 1;
        }
    }
    Ok(counts)
}

/// A filled (θ, ρ) accumulator. Cell `(t, r)` lives at `r * theta_bins + t`.
#[derive(Debug, Clone, PartialEq)]
pub struct LineAccumulator {
    geometry: Geometry,
    counts: Vec<u32>,
}

impl LineAccumulator {
    /// Number of θ bins.
    #[must_use]
    pub const fn theta_bins(&self) -> u32 {
        self.geometry.theta_bins
    }

    /// Number of ρ bins.
    #[must_use]
    pub const fn rho_bins(&self) -> u32 {
        self.geometry.rho_bins
    }

    /// Votes in cell `(t, r)`; zero outside the accumulator.
    #[must_use]
    pub fn votes(&self, t: u32, r: u32) -> u32 {
        if t >= self.geometry.theta_bins || r >= self.geometry.rho_bins {
            return 0;
        }
        self.counts
            .get(r as usize * self.geometry.theta_bins as usize + t as usize)
            .copied()
            .unwrap_or(0)
    }

    /// Largest cell count.
    #[must_use]
    pub fn max_votes(&self) -> u32 {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    /// Number of cells with at least one vote.
    #[must_use]
    pub fn nonzero_cells(&self) -> usize {
        self.counts.iter().filter(|&&c| c > 0).count()
    }

    /// Local maxima with at least `threshold` votes, in θ-major scan order.
    ///
    /// A cell is a peak unless a cell within `window` bins on both axes
    /// has strictly more votes. Equal neighbours do not suppress.
    #[must_use]
    pub fn peaks(&self, threshold: u32, window: u32) -> Vec<Line> {
        let mut out = Vec::new();
        for t in 0..self.geometry.theta_bins {
            for r in 0..self.geometry.rho_bins {
                let votes = self.votes(t, r);
                if votes >= threshold && self.is_local_max(t, r, votes, window) {
                    out.push(Line {
                        rho: self.geometry.rho(r),
                        theta: self.geometry.theta(t),
                        votes,
                    });
                }
            }
        }
        out
    }

    fn is_local_max(&self, t: u32, r: u32, votes: u32, window: u32) -> bool {
        (t.saturating_sub(window)..=t.saturating_add(window)).all(|nt| {
            (r.saturating_sub(window)..=r.saturating_add(window))
                .all(|nr| self.votes(nt, nr) <= votes)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::{GrayImage, Luma};

    use super::*;
    use crate::processor::CpuProcessor;

    fn vertical_run(x0: u32, y_range: std::ops::Range<u32>) -> EdgeRaster {
        EdgeRaster::from_image(GrayImage::from_fn(200, 200, |x, y| {
            Luma([if x == x0 && y_range.contains(&y) { 255 } else { 0 }])
        }))
    }

    #[test]
    fn empty_raster_yields_no_lines() {
        let edges = EdgeRaster::empty(Dimensions::new(64, 48));
        let lines = LineDetector::default()
            .detect(&CpuProcessor::new(), &edges, 1)
            .unwrap();
        assert!(lines.is_empty());
    }

    #[test]
    fn zero_sized_raster_yields_no_lines() {
        let edges = EdgeRaster::empty(Dimensions::new(0, 0));
        let lines = LineDetector::default()
            .detect(&CpuProcessor::new(), &edges, 1)
            .unwrap();
        assert!(lines.is_empty());
    }

    #[test]
    fn gather_finds_vertical_line() {
        let edges = vertical_run(60, 20..120);
        let lines = LineDetector::default()
            .detect(&CpuProcessor::new(), &edges, 20)
            .unwrap();
        let top = lines[0];
        // Rows 20, 22, .., 118 vote.
        assert_eq!(top.votes, 50);
        assert!(top.theta.abs() < f32::EPSILON);
        assert!((top.rho - 60.0).abs() < 2.5, "rho {}", top.rho);
        assert!(lines.len() <= LineDetector::DEFAULT_MAX_LINES);
    }

    #[test]
    fn scatter_finds_vertical_line_within_one_bin() {
        let edges = vertical_run(60, 20..120);
        let detector = LineDetector {
            row_stride: 1,
            voting: VotingStrategy::Scatter,
            ..LineDetector::default()
        };
        let lines = detector.detect(&CpuProcessor::new(), &edges, 20).unwrap();
        let top = lines[0];
        assert_eq!(top.votes, 100);
        assert!(top.theta.abs() < f32::EPSILON);
        assert!((top.rho - 60.0).abs() < 1.0, "rho {}", top.rho);
    }

    #[test]
    fn horizontal_line_has_theta_half_pi() {
        let edges = EdgeRaster::from_image(GrayImage::from_fn(120, 120, |x, y| {
            Luma([if y == 40 && (10..110).contains(&x) { 255 } else { 0 }])
        }));
        let detector = LineDetector {
            row_stride: 1,
            voting: VotingStrategy::Scatter,
            ..LineDetector::default()
        };
        let top = detector.detect(&CpuProcessor::new(), &edges, 10).unwrap()[0];
        assert_eq!(top.votes, 100);
        assert!((top.theta - PI / 2.0).abs() < 1e-4);
        assert!((top.rho - 40.0).abs() < 1.0);
    }

    fn anti_diagonal(size: u32) -> EdgeRaster {
        EdgeRaster::from_image(GrayImage::from_fn(size, size, |x, y| {
            Luma([if x + y == size - 1 { 255 } else { 0 }])
        }))
    }

    #[test]
    fn gather_finds_anti_diagonal_at_quarter_pi() {
        let lines = LineDetector::default()
            .detect(&CpuProcessor::new(), &anti_diagonal(200), 20)
            .unwrap();
        let top = lines[0];
        // x·cos45° + (199 − x)·sin45° = 199/√2 for every pixel.
        let expected_rho = 199.0 / 2.0_f32.sqrt();
        assert!((top.theta - PI / 4.0).abs() < 1e-4, "theta {}", top.theta);
        assert!(
            (top.rho - expected_rho).abs() <= LineDetector::DEFAULT_RHO_TOLERANCE,
            "rho {}",
            top.rho
        );
        // Rows 0, 2, .., 198 vote.
        assert_eq!(top.votes, 100);
    }

    #[test]
    fn scatter_finds_anti_diagonal_in_one_bin() {
        let detector = LineDetector {
            row_stride: 1,
            voting: VotingStrategy::Scatter,
            ..LineDetector::default()
        };
        let top = detector
            .detect(&CpuProcessor::new(), &anti_diagonal(200), 20)
            .unwrap()[0];
        assert!((top.theta - PI / 4.0).abs() < 1e-4, "theta {}", top.theta);
        assert!((top.rho - 199.0 / 2.0_f32.sqrt()).abs() < 1.0, "rho {}", top.rho);
        assert_eq!(top.votes, 200);
    }

    #[test]
    fn results_sorted_and_thresholded() {
        let edges = vertical_run(60, 20..120);
        let lines = LineDetector::default()
            .detect(&CpuProcessor::new(), &edges, 30)
            .unwrap();
        assert!(!lines.is_empty());
        assert!(lines.windows(2).all(|w| w[0].votes >= w[1].votes));
        assert!(lines.iter().all(|l| l.votes >= 30));
    }

    #[test]
    fn threshold_above_maximum_yields_nothing() {
        let edges = vertical_run(60, 20..120);
        let lines = LineDetector::default()
            .detect(&CpuProcessor::new(), &edges, 51)
            .unwrap();
        assert!(lines.is_empty());
    }

    #[test]
    fn max_lines_caps_output() {
        let edges = vertical_run(60, 20..120);
        let detector = LineDetector {
            max_lines: 3,
            ..LineDetector::default()
        };
        let lines = detector.detect(&CpuProcessor::new(), &edges, 1).unwrap();
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn ties_do_not_suppress_each_other() {
        let geometry = Geometry::new(Dimensions::new(3, 3), 5);
        let mut counts = vec![0; geometry.cell_count()];
        // Two equal neighbours in the same θ column.
        counts[2 * 5 + 1] = 7;
        counts[3 * 5 + 1] = 7;
        counts[4 * 5 + 1] = 3;
        let acc = LineAccumulator { geometry, counts };
        let peaks = acc.peaks(1, 2);
        assert_eq!(peaks.len(), 2);
        assert!(peaks.iter().all(|l| l.votes == 7));
    }

    #[test]
    fn gather_counts_are_band_counts() {
        let edges = vertical_run(60, 20..120);
        let detector = LineDetector::default();
        let acc = detector
            .accumulate(&CpuProcessor::new(), &edges)
            .unwrap()
            .unwrap();
        let r = acc.geometry.bin(60.0);
        assert_eq!(acc.votes(0, r), 50);
        // Far from the line, nothing.
        assert_eq!(acc.votes(0, acc.geometry.bin(100.0)), 0);
        assert_eq!(acc.votes(u32::MAX, 0), 0);
    }
}
