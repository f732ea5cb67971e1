//! Frame rasters and the binary edge raster.
//!
//! A [`Raster`] is an immutable snapshot of one video frame as handed
//! over by the frame source. The pipeline converts it to a single
//! luminance channel before any kernel runs. [`EdgeRaster`] wraps the
//! pipeline's binary output so detectors cannot be fed an arbitrary
//! grayscale image by accident.

use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, PipelineError};

/// Pixel layout of a frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channels {
    /// One luminance byte per pixel.
    Gray,
    /// Red, green, blue bytes per pixel.
    Rgb,
    /// Red, green, blue, alpha bytes per pixel.
    Rgba,
}

impl Channels {
    /// Bytes per pixel.
    #[must_use]
    pub const fn count(self) -> usize {
        match self {
            Self::Gray => 1,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }
}

/// One frame: dimensions, channel layout, and a row-major byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    dimensions: Dimensions,
    channels: Channels,
    data: Vec<u8>,
}

impl Raster {
    /// Wrap a row-major buffer.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidRaster`] if the buffer length does
    /// not equal `width * height * channels`.
    pub fn new(
        width: u32,
        height: u32,
        channels: Channels,
        data: Vec<u8>,
    ) -> Result<Self, PipelineError> {
        let expected = usize::try_from(Dimensions::new(width, height).pixel_count())
            .ok()
            .and_then(|n| n.checked_mul(channels.count()))
            .ok_or_else(|| {
                PipelineError::InvalidRaster(format!("{width}x{height} raster overflows usize"))
            })?;
        if data.len() != expected {
            return Err(PipelineError::InvalidRaster(format!(
                "{width}x{height} {channels:?} raster needs {expected} bytes, got {}",
                data.len(),
            )));
        }
        Ok(Self {
            dimensions: Dimensions::new(width, height),
            channels,
            data,
        })
    }

    /// Decode encoded image bytes (PNG, JPEG, BMP, WebP) into an RGBA frame.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyInput`] if `bytes` is empty and
    /// [`PipelineError::ImageDecode`] if the data cannot be decoded.
    pub fn decode(bytes: &[u8]) -> Result<Self, PipelineError> {
        if bytes.is_empty() {
            return Err(PipelineError::EmptyInput);
        }
        let img = image::load_from_memory(bytes)?;
        Ok(Self::from_dynamic(&img))
    }

    /// Snapshot a decoded image as an RGBA frame.
    #[must_use]
    pub fn from_dynamic(img: &DynamicImage) -> Self {
        let rgba = img.to_rgba8();
        Self {
            dimensions: Dimensions::new(rgba.width(), rgba.height()),
            channels: Channels::Rgba,
            data: rgba.into_raw(),
        }
    }

    /// Snapshot a grayscale image.
    #[must_use]
    pub fn from_gray(img: &GrayImage) -> Self {
        Self {
            dimensions: Dimensions::new(img.width(), img.height()),
            channels: Channels::Gray,
            data: img.as_raw().clone(),
        }
    }

    /// Frame dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Channel layout.
    #[must_use]
    pub const fn channels(&self) -> Channels {
        self.channels
    }

    /// Raw row-major bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Luminance of every pixel: `0.299 R + 0.587 G + 0.114 B`.
    ///
    /// Alpha is ignored.
    #[must_use = "returns the grayscale image"]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_gray(&self) -> GrayImage {
        let Dimensions { width, height } = self.dimensions;
        let stride = self.channels.count();
        let buf = match self.channels {
            Channels::Gray => self.data.clone(),
            Channels::Rgb | Channels::Rgba => self
                .data
                .chunks_exact(stride)
                .map(|px| {
                    let luma = 0.114f32.mul_add(
                        f32::from(px[2]),
                        0.299f32.mul_add(f32::from(px[0]), 0.587 * f32::from(px[1])),
                    );
                    luma.round().clamp(0.0, 255.0) as u8
                })
                .collect(),
        };
        GrayImage::from_raw(width, height, buf).unwrap_or_else(|| GrayImage::new(width, height))
    }

    /// The frame flipped left-to-right, as front-facing cameras present it.
    #[must_use = "returns the mirrored raster"]
    pub fn mirrored_horizontal(&self) -> Self {
        let stride = self.channels.count();
        let row_len = self.dimensions.width as usize * stride;
        let data = if row_len == 0 {
            Vec::new()
        } else {
            self.data
                .chunks_exact(row_len)
                .flat_map(|row| row.chunks_exact(stride).rev().flatten().copied())
                .collect()
        };
        Self {
            dimensions: self.dimensions,
            channels: self.channels,
            data,
        }
    }
}

/// Binary output of the edge pipeline: 255 marks an edge, 0 background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRaster(GrayImage);

impl EdgeRaster {
    /// Wrap an image whose non-zero pixels are edges.
    #[must_use]
    pub const fn from_image(img: GrayImage) -> Self {
        Self(img)
    }

    /// An edge raster with no edges.
    #[must_use]
    pub fn empty(dimensions: Dimensions) -> Self {
        Self(GrayImage::new(dimensions.width, dimensions.height))
    }

    /// Underlying image.
    #[must_use]
    pub const fn image(&self) -> &GrayImage {
        &self.0
    }

    /// Consume and return the underlying image.
    #[must_use]
    pub fn into_image(self) -> GrayImage {
        self.0
    }

    /// Raster dimensions.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.0.width(), self.0.height())
    }

    /// Whether the pixel at `(x, y)` is an edge. Out of bounds is not.
    #[must_use]
    pub fn is_edge(&self, x: u32, y: u32) -> bool {
        x < self.0.width() && y < self.0.height() && self.0.get_pixel(x, y).0[0] > 0
    }

    /// Number of edge pixels.
    #[must_use]
    pub fn edge_pixel_count(&self) -> usize {
        self.0.as_raw().iter().filter(|&&v| v > 0).count()
    }

    /// Row-major coordinates of every edge pixel on rows divisible by
    /// `row_stride` (clamped to at least 1).
    #[must_use]
    pub fn edge_pixels(&self, row_stride: u32) -> Vec<(u32, u32)> {
        let stride = row_stride.max(1);
        self.0
            .enumerate_pixels()
            .filter(|(_, y, px)| y % stride == 0 && px.0[0] > 0)
            .map(|(x, y, _)| (x, y))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Luma;

    use super::*;

    fn encode_png(img: &image::RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn buffer_length_is_validated() {
        let err = Raster::new(2, 2, Channels::Rgb, vec![0; 11]).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidRaster(_)));
        assert!(Raster::new(2, 2, Channels::Rgb, vec![0; 12]).is_ok());
    }

    #[test]
    fn zero_sized_raster_is_valid() {
        let r = Raster::new(0, 5, Channels::Rgba, vec![]).unwrap();
        assert!(r.dimensions().is_empty());
        assert_eq!(r.to_gray().width(), 0);
    }

    #[test]
    fn empty_input_returns_error() {
        assert!(matches!(Raster::decode(&[]), Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_returns_image_decode_error() {
        let result = Raster::decode(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn decoded_png_keeps_dimensions() {
        let img = image::RgbaImage::from_fn(17, 31, |_, _| image::Rgba([128, 64, 32, 255]));
        let raster = Raster::decode(&encode_png(&img)).unwrap();
        assert_eq!(raster.dimensions(), Dimensions::new(17, 31));
        assert_eq!(raster.channels(), Channels::Rgba);
    }

    #[test]
    fn luma_weights_green_over_red_over_blue() {
        let data = vec![255, 0, 0, 0, 255, 0, 0, 0, 255];
        let gray = Raster::new(3, 1, Channels::Rgb, data).unwrap().to_gray();
        assert_eq!(gray.get_pixel(0, 0).0[0], 76);
        assert_eq!(gray.get_pixel(1, 0).0[0], 150);
        assert_eq!(gray.get_pixel(2, 0).0[0], 29);
    }

    #[test]
    fn mirror_reverses_each_row() {
        let data = vec![1, 2, 3, 4, 5, 6];
        let r = Raster::new(3, 2, Channels::Gray, data).unwrap();
        assert_eq!(r.mirrored_horizontal().as_bytes(), &[3, 2, 1, 6, 5, 4]);
    }

    #[test]
    fn mirror_keeps_pixel_channels_together() {
        let data = vec![1, 2, 3, 4, 5, 6];
        let r = Raster::new(2, 1, Channels::Rgb, data).unwrap();
        assert_eq!(r.mirrored_horizontal().as_bytes(), &[4, 5, 6, 1, 2, 3]);
    }

    #[test]
    fn edge_pixels_respect_row_stride() {
        let img = GrayImage::from_fn(4, 4, |x, _| if x == 1 { Luma([255]) } else { Luma([0]) });
        let edges = EdgeRaster::from_image(img);
        assert_eq!(edges.edge_pixel_count(), 4);
        assert_eq!(edges.edge_pixels(1).len(), 4);
        assert_eq!(edges.edge_pixels(2), vec![(1, 0), (1, 2)]);
        assert!(edges.is_edge(1, 3));
        assert!(!edges.is_edge(1, 4));
    }
}
