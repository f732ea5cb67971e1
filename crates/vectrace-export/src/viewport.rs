//! Raster-to-viewport coordinate mapping.
//!
//! The source raster is scaled uniformly to fit the output viewport and
//! centred along the axis that does not fill it. Rasters whose vertical
//! origin is the bottom-left corner are flipped first.

use serde::{Deserialize, Serialize};

use vectrace_pipeline::{Dimensions, Point};

/// Where row zero of the source raster sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RasterOrigin {
    /// Row zero is the top row, as in SVG.
    #[default]
    TopLeft,
    /// Row zero is the bottom row, as in GPU framebuffers.
    BottomLeft,
}

/// Uniform scale plus translation from raster space to viewport space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportTransform {
    scale: f64,
    translate_x: f64,
    translate_y: f64,
    /// Source height when Y is flipped.
    flip_height: Option<f64>,
}

impl ViewportTransform {
    /// The transform that leaves every point unchanged.
    #[must_use]
    pub const fn identity() -> Self {
        Self {
            scale: 1.0,
            translate_x: 0.0,
            translate_y: 0.0,
            flip_height: None,
        }
    }

    /// Fit `source` inside `target`, preserving aspect ratio.
    ///
    /// When the target is relatively wider the height is fitted and the
    /// content centred horizontally; otherwise the width is fitted and
    /// the content centred vertically. An empty source or target maps
    /// with unit scale.
    #[must_use]
    pub fn fit(source: Dimensions, target: Dimensions, origin: RasterOrigin) -> Self {
        let flip_height = match origin {
            RasterOrigin::TopLeft => None,
            RasterOrigin::BottomLeft => Some(f64::from(source.height)),
        };
        if source.is_empty() || target.is_empty() {
            return Self {
                flip_height,
                ..Self::identity()
            };
        }

        let (sw, sh) = (f64::from(source.width), f64::from(source.height));
        let (tw, th) = (f64::from(target.width), f64::from(target.height));
        // Compare tw/th against sw/sh without dividing.
        let (scale, translate_x, translate_y) = if tw * sh > th * sw {
            let scale = th / sh;
            (scale, (tw - sw * scale) / 2.0, 0.0)
        } else {
            let scale = tw / sw;
            (scale, 0.0, (th - sh * scale) / 2.0)
        };
        Self {
            scale,
            translate_x,
            translate_y,
            flip_height,
        }
    }

    /// Uniform scale factor.
    #[must_use]
    pub const fn scale(&self) -> f64 {
        self.scale
    }

    /// Horizontal and vertical translation, in viewport units.
    #[must_use]
    pub const fn translation(&self) -> (f64, f64) {
        (self.translate_x, self.translate_y)
    }

    /// Map a raster point into the viewport.
    #[must_use]
    pub fn apply(&self, p: Point) -> Point {
        let y = self.flip_height.map_or(p.y, |h| h - p.y);
        Point::new(
            p.x.mul_add(self.scale, self.translate_x),
            y.mul_add(self.scale, self.translate_y),
        )
    }
}

impl Default for ViewportTransform {
    fn default() -> Self {
        Self::identity()
    }
}
