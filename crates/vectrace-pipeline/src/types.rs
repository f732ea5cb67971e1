//! Shared types for the vectrace processing pipeline.

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate raster data without depending on `image` directly.
pub use image::GrayImage;

/// A 2D point in raster coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from the raster's origin row).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }
}

/// One traced sample of an edge path: a position plus the raster value
/// it was traced from, normalized to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgePoint {
    /// Position in raster coordinates.
    pub position: Point,
    /// Normalized raster intensity at this position.
    pub intensity: f32,
}

impl EdgePoint {
    /// Create a new edge point.
    #[must_use]
    pub const fn new(x: f64, y: f64, intensity: f32) -> Self {
        Self {
            position: Point::new(x, y),
            intensity,
        }
    }
}

/// One connected polyline traced from an edge raster.
///
/// Points are spatially contiguous in traversal order. `intensity` is the
/// mean of the point intensities and drives per-path opacity on export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgePath {
    points: Vec<EdgePoint>,
    intensity: f32,
}

impl EdgePath {
    /// Create a path, computing its mean intensity from the points.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(points: Vec<EdgePoint>) -> Self {
        let intensity = if points.is_empty() {
            0.0
        } else {
            points.iter().map(|p| p.intensity).sum::<f32>() / points.len() as f32
        };
        Self { points, intensity }
    }

    /// Build a path from bare positions with a uniform intensity.
    #[must_use]
    pub fn from_points(points: &[Point], intensity: f32) -> Self {
        Self::new(
            points
                .iter()
                .map(|p| EdgePoint {
                    position: *p,
                    intensity,
                })
                .collect(),
        )
    }

    /// Returns `true` if the path has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of points in the path.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.points.len()
    }

    /// Mean intensity of the path in `[0, 1]`.
    #[must_use]
    pub const fn intensity(&self) -> f32 {
        self.intensity
    }

    /// All points of the path.
    #[must_use]
    pub fn points(&self) -> &[EdgePoint] {
        &self.points
    }

    /// First position, if any.
    #[must_use]
    pub fn first(&self) -> Option<Point> {
        self.points.first().map(|p| p.position)
    }

    /// Last position, if any.
    #[must_use]
    pub fn last(&self) -> Option<Point> {
        self.points.last().map(|p| p.position)
    }

    /// Iterate over positions only.
    pub fn positions(&self) -> impl Iterator<Item = Point> + '_ {
        self.points.iter().map(|p| p.position)
    }

    /// Replace the points, keeping this path's intensity.
    #[must_use]
    pub const fn with_points(&self, points: Vec<EdgePoint>) -> Self {
        Self {
            points,
            intensity: self.intensity,
        }
    }

    /// Return the same path traversed in the opposite direction.
    #[must_use]
    pub fn reversed(&self) -> Self {
        let mut points = self.points.clone();
        points.reverse();
        Self {
            points,
            intensity: self.intensity,
        }
    }

    /// Consumes the path and returns its points.
    #[must_use]
    pub fn into_points(self) -> Vec<EdgePoint> {
        self.points
    }
}

/// Raster dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create new dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// `true` when either axis is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Total number of pixels.
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// A straight line in normal form: `x·cosθ + y·sinθ = ρ`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Line {
    /// Signed distance from the raster origin.
    pub rho: f32,
    /// Normal angle in radians, in `[0, π)`.
    pub theta: f32,
    /// Accumulator votes for this line.
    pub votes: u32,
}

impl Line {
    /// Two far-apart points on the line, `extent` units either side of the
    /// foot of the normal. Used to draw the (infinite) line as a segment.
    #[must_use]
    pub fn segment(&self, extent: f64) -> (Point, Point) {
        let (sin, cos) = f64::from(self.theta).sin_cos();
        let x0 = cos * f64::from(self.rho);
        let y0 = sin * f64::from(self.rho);
        (
            Point::new(extent.mul_add(-sin, x0), extent.mul_add(cos, y0)),
            Point::new(extent.mul_add(sin, x0), extent.mul_add(-cos, y0)),
        )
    }
}

/// A circle found by the circle detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Circle {
    /// Center column.
    pub x: u32,
    /// Center row.
    pub y: u32,
    /// Radius in pixels.
    pub radius: u32,
    /// Accumulator votes at the center for this radius.
    pub votes: u32,
}

/// An accelerator feature the pipeline may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Capability {
    /// Float-precision intermediate rasters.
    FloatIntermediates,
    /// Rasters with an axis longer than the processor supports.
    RasterSize {
        /// Longest axis requested.
        requested: u32,
        /// Longest axis supported.
        supported: u32,
    },
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FloatIntermediates => write!(f, "float-precision intermediate rasters"),
            Self::RasterSize {
                requested,
                supported,
            } => write!(f, "raster axis of {requested} px (max {supported} px)"),
        }
    }
}

/// Errors that can occur during pipeline processing.
///
/// Uses custom `Serialize`/`Deserialize` because `image::ImageError`
/// does not implement serde traits. The `ImageDecode` variant is
/// serialized as its `Display` string.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The pixel processor lacks a feature this tick needs.
    #[error("pixel processor does not support {0}")]
    Capability(Capability),

    /// A raster or accumulator could not be allocated.
    #[error("failed to allocate {bytes} bytes for {what}")]
    Allocation {
        /// What was being allocated.
        what: &'static str,
        /// Requested size in bytes.
        bytes: usize,
    },

    /// A raster buffer does not match its declared dimensions.
    #[error("invalid raster: {0}")]
    InvalidRaster(String),

    /// Failed to decode an input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,
}

/// Serde-compatible proxy for `PipelineError`.
#[derive(Serialize, Deserialize)]
enum PipelineErrorProxy {
    Capability(Capability),
    Allocation { what: String, bytes: usize },
    InvalidRaster(String),
    ImageDecode(String),
    EmptyInput,
}

impl Serialize for PipelineError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::Capability(c) => PipelineErrorProxy::Capability(*c),
            Self::Allocation { what, bytes } => PipelineErrorProxy::Allocation {
                what: (*what).to_string(),
                bytes: *bytes,
            },
            Self::InvalidRaster(s) => PipelineErrorProxy::InvalidRaster(s.clone()),
            Self::ImageDecode(e) => PipelineErrorProxy::ImageDecode(e.to_string()),
            Self::EmptyInput => PipelineErrorProxy::EmptyInput,
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PipelineError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = PipelineErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            PipelineErrorProxy::Capability(c) => Self::Capability(c),
            // The static label cannot be reconstructed; keep the size.
            PipelineErrorProxy::Allocation { bytes, .. } => Self::Allocation {
                what: "deserialized allocation",
                bytes,
            },
            PipelineErrorProxy::InvalidRaster(s) => Self::InvalidRaster(s),
            PipelineErrorProxy::ImageDecode(msg) => {
                Self::InvalidRaster(format!("image decode error: {msg}"))
            }
            PipelineErrorProxy::EmptyInput => Self::EmptyInput,
        })
    }
}
