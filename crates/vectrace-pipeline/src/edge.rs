//! Edge detection: blur, Sobel gradient, non-maximum suppression and
//! hysteresis thresholding.
//!
//! Each stage reads the previous stage's raster and writes a new one of
//! the same dimensions. Suppression is a per-pixel kernel; hysteresis is
//! a breadth-first flood from strong pixels over all 8 neighbours.

use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

use crate::blur::{self, BlurMode};
use crate::gradient::{self, Gradient, MAX_MAGNITUDE, MagnitudePlane};
use crate::processor::{PixelProcessor, Precision};
use crate::raster::{EdgeRaster, Raster};
use crate::types::{Dimensions, PipelineError};

/// Minimum allowed hysteresis threshold.
///
/// A low threshold of zero marks every pixel with any gradient as a
/// potential edge, producing an edge map too dense to vectorize.
pub const MIN_THRESHOLD: f32 = 1.0;
const _: () = assert!(MIN_THRESHOLD > 0.0);

/// Parameters of the edge-detection stages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    /// Weak-edge threshold in Sobel magnitude units.
    pub low_threshold: f32,
    /// Strong-edge threshold in Sobel magnitude units.
    pub high_threshold: f32,
    /// Blur applied before the gradient.
    pub blur: BlurMode,
    /// Precision of the gradient and suppression intermediates.
    pub precision: Precision,
}

impl EdgeConfig {
    /// Default weak-edge threshold.
    pub const DEFAULT_LOW_THRESHOLD: f32 = 50.0;
    /// Default strong-edge threshold.
    pub const DEFAULT_HIGH_THRESHOLD: f32 = 150.0;

    /// The thresholds after clamping: both within
    /// `[MIN_THRESHOLD, MAX_MAGNITUDE]` and `low <= high`.
    #[must_use]
    pub fn clamped_thresholds(&self) -> (f32, f32) {
        let high = self.high_threshold.max(MIN_THRESHOLD).min(MAX_MAGNITUDE);
        let low = self.low_threshold.max(MIN_THRESHOLD).min(high);
        (low, high)
    }
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            low_threshold: Self::DEFAULT_LOW_THRESHOLD,
            high_threshold: Self::DEFAULT_HIGH_THRESHOLD,
            blur: BlurMode::default(),
            precision: Precision::default(),
        }
    }
}

/// Intermediate and final rasters of one edge-detection run.
#[derive(Debug, Clone)]
pub struct EdgeStages {
    /// Output of the blur stage.
    pub blurred: GrayImage,
    /// Strongest gradient magnitude seen, in Sobel units.
    pub max_magnitude: f32,
    /// Binary edge raster.
    pub edges: EdgeRaster,
}

/// Detect edges in a frame.
///
/// # Errors
///
/// See [`process_staged`].
pub fn process<P: PixelProcessor>(
    processor: &P,
    frame: &Raster,
    config: &EdgeConfig,
) -> Result<EdgeRaster, PipelineError> {
    Ok(process_staged(processor, &frame.to_gray(), config)?.edges)
}

/// Detect edges in a grayscale frame, keeping the blurred raster.
///
/// A zero-sized input yields an empty edge raster. The input is never
/// modified, and identical inputs give identical outputs.
///
/// # Errors
///
/// Returns [`PipelineError::Capability`] when the processor cannot hold
/// the requested intermediate precision or the raster size, before any
/// work is done. Propagates [`PipelineError::Allocation`].
pub fn process_staged<P: PixelProcessor>(
    processor: &P,
    gray: &GrayImage,
    config: &EdgeConfig,
) -> Result<EdgeStages, PipelineError> {
    let dims = Dimensions::new(gray.width(), gray.height());
    if dims.is_empty() {
        return Ok(EdgeStages {
            blurred: gray.clone(),
            max_magnitude: 0.0,
            edges: EdgeRaster::empty(dims),
        });
    }
    processor.capabilities().require(dims, config.precision)?;

    let (low, high) = config.clamped_thresholds();
    let blurred = blur::blur(processor, gray, config.blur)?;
    let gradient = gradient::sobel(processor, &blurred, config.precision)?;
    let thinned = non_maximum_suppression(processor, &gradient)?;
    let edges = hysteresis(&thinned, dims, low, high);

    let max_magnitude = gradient.magnitude().max();
    tracing::debug!(
        width = dims.width,
        height = dims.height,
        low,
        high,
        max_magnitude,
        edge_pixels = edges.edge_pixel_count(),
        "edge detection complete",
    );

    Ok(EdgeStages {
        blurred,
        max_magnitude,
        edges,
    })
}

/// Thin ridges to one pixel by zeroing non-maxima along the gradient.
///
/// The direction is quantized to 0°, 45°, 90° or 135°. A pixel is kept
/// unless one of its two neighbours along that direction is strictly
/// larger, so plateaus survive. Border pixels are always zero.
///
/// # Errors
///
/// Propagates [`PipelineError::Allocation`].
pub fn non_maximum_suppression<P: PixelProcessor>(
    processor: &P,
    gradient: &Gradient,
) -> Result<MagnitudePlane, PipelineError> {
    let dims = gradient.dimensions();
    Ok(match gradient.magnitude().precision() {
        Precision::Float => MagnitudePlane::Float(processor.map_cells(
            dims,
            "suppressed magnitude",
            |x, y| suppressed_at(gradient, x, y),
        )?),
        Precision::Byte => MagnitudePlane::Byte(processor.map_cells(
            dims,
            "suppressed magnitude",
            |x, y| gradient::quantize(suppressed_at(gradient, x, y)),
        )?),
    })
}

fn suppressed_at(gradient: &Gradient, x: u32, y: u32) -> f32 {
    let Dimensions { width, height } = gradient.dimensions();
    if x == 0 || y == 0 || x + 1 >= width || y + 1 >= height {
        return 0.0;
    }
    let (gx, gy) = gradient.derivatives(x, y);
    let mut angle = f32::from(gy).atan2(f32::from(gx)).to_degrees();
    if angle < 0.0 {
        angle += 180.0;
    }
    let ((x1, y1), (x2, y2)) = if !(22.5..157.5).contains(&angle) {
        ((x - 1, y), (x + 1, y))
    } else if angle < 67.5 {
        ((x + 1, y + 1), (x - 1, y - 1))
    } else if angle < 112.5 {
        ((x, y - 1), (x, y + 1))
    } else {
        ((x - 1, y + 1), (x + 1, y - 1))
    };
    let m = gradient.magnitude_at(x, y);
    if m < gradient.magnitude_at(x1, y1) || m < gradient.magnitude_at(x2, y2) {
        0.0
    } else {
        m
    }
}

/// Double-threshold the thinned magnitudes.
///
/// Pixels at or above `high` seed a non-recursive flood that claims every
/// 8-connected pixel at or above `low`. Output pixels are 255 or 0.
#[must_use = "returns the binary edge raster"]
pub fn hysteresis(thinned: &MagnitudePlane, dims: Dimensions, low: f32, high: f32) -> EdgeRaster {
    let (w, h) = (dims.width, dims.height);
    let mut out = GrayImage::new(w, h);
    let index = |x: u32, y: u32| y as usize * w as usize + x as usize;
    let mut stack = Vec::new();
    for y in 0..h {
        for x in 0..w {
            if thinned.get(index(x, y)) < high || out.get_pixel(x, y).0[0] != 0 {
                continue;
            }
            out.put_pixel(x, y, Luma([255]));
            stack.push((x, y));
            while let Some((nx, ny)) = stack.pop() {
                let neighbors = [
                    (nx + 1, ny),
                    (nx + 1, ny + 1),
                    (nx, ny + 1),
                    (nx.wrapping_sub(1), ny.wrapping_sub(1)),
                    (nx.wrapping_sub(1), ny),
                    (nx.wrapping_sub(1), ny + 1),
                    (nx, ny.wrapping_sub(1)),
                    (nx + 1, ny.wrapping_sub(1)),
                ];
                for (cx, cy) in neighbors {
                    // wrapping_sub turns -1 into u32::MAX, caught here.
                    if cx >= w || cy >= h {
                        continue;
                    }
                    if thinned.get(index(cx, cy)) >= low && out.get_pixel(cx, cy).0[0] == 0 {
                        out.put_pixel(cx, cy, Luma([255]));
                        stack.push((cx, cy));
                    }
                }
            }
        }
    }
    EdgeRaster::from_image(out)
}
