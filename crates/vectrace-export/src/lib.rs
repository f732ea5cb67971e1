//! vectrace-export: Pure SVG serializers (sans-IO)
//!
//! Maps traced paths from raster space into an output viewport, builds
//! straight or curved path data, and assembles named layers and Hough
//! detection overlays into SVG documents.

pub mod color;
pub mod dash;
pub mod path_data;
pub mod svg;
pub mod viewport;

pub use color::hex_to_rgba;
pub use dash::DashAnimation;
pub use path_data::{PathOptions, to_path_data};
pub use svg::{
    BACKGROUND_LAYER, DEFAULT_LAYER_ORDER, DashStyle, Layer, OUTLINE_LAYER, PathStyle,
    RenderFrame, detections_layer, detections_svg, to_layer, to_svg_document,
};
pub use viewport::{RasterOrigin, ViewportTransform};

/// Errors from export helpers.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// A colour string was not `#rgb` or `#rrggbb`.
    #[error("invalid hex colour: {0:?}")]
    InvalidColor(String),
}
