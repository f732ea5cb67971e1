//! Blur stage: noise reduction before gradient computation.
//!
//! Three closed modes are available through [`BlurMode`]. Gaussian blur
//! wraps [`imageproc::filter::gaussian_blur_f32`]; motion and bokeh are
//! per-pixel gather kernels run through the [`PixelProcessor`].

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::processor::PixelProcessor;
use crate::types::{Dimensions, PipelineError};

/// Number of disc samples taken per pixel by the bokeh kernel.
const BOKEH_SAMPLES: u32 = 24;

/// Golden angle in radians, used to spread bokeh samples over the disc.
const GOLDEN_ANGLE: f32 = 2.399_963_3;

/// Which blur kernel runs before edge detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BlurMode {
    /// Isotropic Gaussian smoothing.
    Gaussian {
        /// Standard deviation in pixels. Non-positive disables the blur.
        sigma: f32,
    },
    /// Directional smear along a line centred on each pixel.
    Motion {
        /// Direction of the smear in degrees (0 = +x, 90 = +y).
        angle_degrees: f32,
        /// Total smear length in pixels.
        length: f32,
    },
    /// Depth-of-field disc blur that grows away from a focus point.
    Bokeh {
        /// Focus point, as a fraction of the width.
        focus_x: f32,
        /// Focus point, as a fraction of the height.
        focus_y: f32,
        /// Normalized distance from the focus that stays sharp.
        aperture: f32,
        /// Disc radius in pixels at the farthest corner.
        max_blur: f32,
    },
}

impl BlurMode {
    /// Default Gaussian sigma.
    pub const DEFAULT_SIGMA: f32 = 1.4;
    /// Default motion blur length in pixels.
    pub const DEFAULT_MOTION_LENGTH: f32 = 60.0;
    /// Default motion blur direction in degrees.
    pub const DEFAULT_MOTION_ANGLE: f32 = 0.0;
    /// Default bokeh sharp-zone radius (normalized).
    pub const DEFAULT_APERTURE: f32 = 0.15;
    /// Default bokeh maximum disc radius in pixels.
    pub const DEFAULT_MAX_BLUR: f32 = 25.0;

    /// Motion blur with default length and direction.
    #[must_use]
    pub const fn default_motion() -> Self {
        Self::Motion {
            angle_degrees: Self::DEFAULT_MOTION_ANGLE,
            length: Self::DEFAULT_MOTION_LENGTH,
        }
    }

    /// Bokeh blur focused on the frame centre with default aperture.
    #[must_use]
    pub const fn default_bokeh() -> Self {
        Self::Bokeh {
            focus_x: 0.5,
            focus_y: 0.5,
            aperture: Self::DEFAULT_APERTURE,
            max_blur: Self::DEFAULT_MAX_BLUR,
        }
    }
}

impl Default for BlurMode {
    fn default() -> Self {
        Self::Gaussian {
            sigma: Self::DEFAULT_SIGMA,
        }
    }
}

/// Blur `image` with the selected mode. The input is never modified.
///
/// # Errors
///
/// Propagates [`PipelineError::Allocation`] from the processor.
pub fn blur<P: PixelProcessor>(
    processor: &P,
    image: &GrayImage,
    mode: BlurMode,
) -> Result<GrayImage, PipelineError> {
    let dims = Dimensions::new(image.width(), image.height());
    if dims.is_empty() {
        return Ok(image.clone());
    }
    match mode {
        BlurMode::Gaussian { sigma } => Ok(gaussian_blur(image, sigma)),
        BlurMode::Motion {
            angle_degrees,
            length,
        } => {
            let (sin, cos) = angle_degrees.to_radians().sin_cos();
            let dx = cos * length;
            let dy = sin * length;
            let samples = motion_sample_count(length);
            let buf = processor.map_cells(dims, "motion blur raster", |x, y| {
                motion_kernel(image, x, y, dx, dy, samples)
            })?;
            Ok(from_buffer(dims, buf))
        }
        BlurMode::Bokeh {
            focus_x,
            focus_y,
            aperture,
            max_blur,
        } => {
            let lens = Lens::new(dims, focus_x, focus_y, aperture, max_blur);
            let buf = processor.map_cells(dims, "bokeh blur raster", |x, y| {
                bokeh_kernel(image, x, y, lens.radius_at(x, y))
            })?;
            Ok(from_buffer(dims, buf))
        }
    }
}

/// Apply Gaussian blur to a grayscale image.
///
/// Non-positive sigma values return the image unchanged, since
/// `imageproc`'s underlying function panics on `sigma <= 0.0`.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 || !sigma.is_finite() {
        return image.clone();
    }

    imageproc::filter::gaussian_blur_f32(image, sigma)
}

fn from_buffer(dims: Dimensions, buf: Vec<u8>) -> GrayImage {
    GrayImage::from_raw(dims.width, dims.height, buf)
        .unwrap_or_else(|| GrayImage::new(dims.width, dims.height))
}

/// Nearest-pixel lookup with coordinates clamped to the raster.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn sample_clamped(image: &GrayImage, x: f32, y: f32) -> f32 {
    let max_x = (image.width() - 1) as f32;
    let max_y = (image.height() - 1) as f32;
    let sx = x.round().clamp(0.0, max_x) as u32;
    let sy = y.round().clamp(0.0, max_y) as u32;
    f32::from(image.get_pixel(sx, sy).0[0])
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn motion_sample_count(length: f32) -> u32 {
    if length.is_finite() && length > 1.0 {
        (length.ceil() as u32).clamp(2, 256)
    } else {
        1
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn motion_kernel(image: &GrayImage, x: u32, y: u32, dx: f32, dy: f32, samples: u32) -> u8 {
    if samples <= 1 {
        return image.get_pixel(x, y).0[0];
    }
    let (fx, fy) = (x as f32, y as f32);
    let last = (samples - 1) as f32;
    let sum: f32 = (0..samples)
        .map(|i| {
            let t = i as f32 / last - 0.5;
            sample_clamped(image, t.mul_add(dx, fx), t.mul_add(dy, fy))
        })
        .sum();
    (sum / samples as f32).round().clamp(0.0, 255.0) as u8
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn bokeh_kernel(image: &GrayImage, x: u32, y: u32, radius: f32) -> u8 {
    if radius < 0.5 {
        return image.get_pixel(x, y).0[0];
    }
    let (fx, fy) = (x as f32, y as f32);
    let n = BOKEH_SAMPLES as f32;
    let sum: f32 = (0..BOKEH_SAMPLES)
        .map(|i| {
            let k = i as f32;
            let r = radius * ((k + 0.5) / n).sqrt();
            let (sin, cos) = (k * GOLDEN_ANGLE).sin_cos();
            sample_clamped(image, r.mul_add(cos, fx), r.mul_add(sin, fy))
        })
        .sum();
    (sum / n).round().clamp(0.0, 255.0) as u8
}

/// Precomputed depth-of-field geometry for one raster.
struct Lens {
    width: f32,
    height: f32,
    focus_x: f32,
    focus_y: f32,
    aperture: f32,
    falloff: f32,
    max_blur: f32,
}

impl Lens {
    #[allow(clippy::cast_precision_loss)]
    fn new(dims: Dimensions, focus_x: f32, focus_y: f32, aperture: f32, max_blur: f32) -> Self {
        let focus_x = focus_x.clamp(0.0, 1.0);
        let focus_y = focus_y.clamp(0.0, 1.0);
        let aperture = aperture.max(0.0);
        let far_x = focus_x.max(1.0 - focus_x);
        let far_y = focus_y.max(1.0 - focus_y);
        Self {
            width: dims.width as f32,
            height: dims.height as f32,
            focus_x,
            focus_y,
            aperture,
            falloff: far_x.hypot(far_y) - aperture,
            max_blur: max_blur.max(0.0),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn radius_at(&self, x: u32, y: u32) -> f32 {
        if self.falloff <= 0.0 {
            return 0.0;
        }
        let nx = (x as f32 + 0.5) / self.width - self.focus_x;
        let ny = (y as f32 + 0.5) / self.height - self.focus_y;
        let t = ((nx.hypot(ny) - self.aperture) / self.falloff).clamp(0.0, 1.0);
        self.max_blur * t
    }
}
