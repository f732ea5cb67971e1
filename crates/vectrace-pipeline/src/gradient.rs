//! Sobel gradient stage.
//!
//! Produces per-pixel horizontal and vertical derivatives plus a magnitude
//! plane stored at the requested [`Precision`]. Derivatives come from
//! imageproc's clamped 3x3 Sobel filter, so border pixels repeat their
//! edge neighbours and the plane has the input's exact dimensions.

use image::{GrayImage, Luma};
use imageproc::definitions::Image;
use imageproc::filter::filter_clamped;
use imageproc::kernel;

use crate::processor::{PixelProcessor, Precision};
use crate::types::{Dimensions, PipelineError};

/// Largest possible Sobel magnitude for 8-bit input: each axis peaks at
/// `4 * 255`.
pub const MAX_MAGNITUDE: f32 = 4.0 * 255.0 * std::f32::consts::SQRT_2;

/// A magnitude plane at either float or byte precision.
///
/// Byte planes store `round(m / MAX_MAGNITUDE * 255)`; [`Self::get`]
/// always returns values in Sobel units.
#[derive(Debug, Clone, PartialEq)]
pub enum MagnitudePlane {
    /// Full-precision magnitudes.
    Float(Vec<f32>),
    /// Quantized magnitudes.
    Byte(Vec<u8>),
}

impl MagnitudePlane {
    /// Magnitude at row-major `index` in Sobel units; 0 when out of range.
    #[must_use]
    pub fn get(&self, index: usize) -> f32 {
        match self {
            Self::Float(v) => v.get(index).copied().unwrap_or(0.0),
            Self::Byte(v) => v.get(index).map_or(0.0, |&q| dequantize(q)),
        }
    }

    /// Number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Float(v) => v.len(),
            Self::Byte(v) => v.len(),
        }
    }

    /// `true` when no values are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Precision of this plane.
    #[must_use]
    pub const fn precision(&self) -> Precision {
        match self {
            Self::Float(_) => Precision::Float,
            Self::Byte(_) => Precision::Byte,
        }
    }

    /// Largest stored magnitude in Sobel units.
    #[must_use]
    pub fn max(&self) -> f32 {
        (0..self.len()).map(|i| self.get(i)).fold(0.0, f32::max)
    }
}

/// Quantize a Sobel magnitude to one byte.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn quantize(magnitude: f32) -> u8 {
    (magnitude / MAX_MAGNITUDE * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Inverse of [`quantize`], up to rounding.
#[must_use]
pub fn dequantize(q: u8) -> f32 {
    f32::from(q) / 255.0 * MAX_MAGNITUDE
}

/// Derivatives and magnitude of a blurred raster.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    dimensions: Dimensions,
    gx: Vec<i16>,
    gy: Vec<i16>,
    magnitude: MagnitudePlane,
}

impl Gradient {
    /// Raster dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Magnitude plane.
    #[must_use]
    pub const fn magnitude(&self) -> &MagnitudePlane {
        &self.magnitude
    }

    /// `(gx, gy)` at `(x, y)`; zero outside the raster.
    #[must_use]
    pub fn derivatives(&self, x: u32, y: u32) -> (i16, i16) {
        self.index(x, y)
            .and_then(|i| Some((*self.gx.get(i)?, *self.gy.get(i)?)))
            .unwrap_or((0, 0))
    }

    /// Magnitude at `(x, y)` in Sobel units; zero outside the raster.
    #[must_use]
    pub fn magnitude_at(&self, x: u32, y: u32) -> f32 {
        self.index(x, y).map_or(0.0, |i| self.magnitude.get(i))
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.dimensions.width && y < self.dimensions.height)
            .then(|| y as usize * self.dimensions.width as usize + x as usize)
    }
}

/// Compute the Sobel gradient of `image`.
///
/// # Errors
///
/// Propagates [`PipelineError::Allocation`] from the processor.
pub fn sobel<P: PixelProcessor>(
    processor: &P,
    image: &GrayImage,
    precision: Precision,
) -> Result<Gradient, PipelineError> {
    let dimensions = Dimensions::new(image.width(), image.height());
    if dimensions.is_empty() {
        return Ok(Gradient {
            dimensions,
            gx: Vec::new(),
            gy: Vec::new(),
            magnitude: match precision {
                Precision::Float => MagnitudePlane::Float(Vec::new()),
                Precision::Byte => MagnitudePlane::Byte(Vec::new()),
            },
        });
    }

    // |g| <= 4 * 255 per axis, so i16 never clamps.
    let gx: Image<Luma<i16>> = filter_clamped(image, kernel::SOBEL_HORIZONTAL_3X3);
    let gy: Image<Luma<i16>> = filter_clamped(image, kernel::SOBEL_VERTICAL_3X3);
    let (gx, gy) = (gx.into_raw(), gy.into_raw());

    let magnitude = match precision {
        Precision::Float => MagnitudePlane::Float(
            processor.map_cells(dimensions, "gradient magnitude", |x, y| {
                let i = y as usize * dimensions.width as usize + x as usize;
                hypot(gx[i], gy[i])
            })?,
        ),
        Precision::Byte => MagnitudePlane::Byte(
            processor.map_cells(dimensions, "gradient magnitude", |x, y| {
                let i = y as usize * dimensions.width as usize + x as usize;
                quantize(hypot(gx[i], gy[i]))
            })?,
        ),
    };

    Ok(Gradient {
        dimensions,
        gx,
        gy,
        magnitude,
    })
}

fn hypot(gx: i16, gy: i16) -> f32 {
    f32::from(gx).hypot(f32::from(gy))
}
