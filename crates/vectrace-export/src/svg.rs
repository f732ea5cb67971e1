//! SVG export serializer.
//!
//! Converts traced paths into named `<g>` layers of `<path>` elements
//! using the [`svg`] crate for document construction, XML escaping, and
//! path data formatting. Layers are stacked into one document in a
//! caller-chosen order.
//!
//! A second serializer renders Hough detections (lines and circles) as
//! an overlay.
//!
//! These are pure functions with no I/O -- they return `String`s.

use rand::Rng;
use serde::{Deserialize, Serialize};
use svg::Document;
use svg::node::element::{Circle as CircleElement, Group, Line as LineElement, Path};

use vectrace_pipeline::{Circle, Dimensions, EdgePath, Line};

use crate::dash::DashAnimation;
use crate::path_data::{PathOptions, to_path_data};
use crate::viewport::ViewportTransform;

/// Layer id for paths traced from the blurred frame.
pub const BACKGROUND_LAYER: &str = "background";
/// Layer id for paths traced from the edge raster.
pub const OUTLINE_LAYER: &str = "outlinePaths";
/// Bottom-to-top stacking used when the caller has no preference.
pub const DEFAULT_LAYER_ORDER: [&str; 2] = [BACKGROUND_LAYER, OUTLINE_LAYER];

/// Half-length of the segment drawn for each detected line.
pub const LINE_EXTENT: f64 = 1000.0;

/// Dashed stroke settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashStyle {
    /// Dash and gap length.
    pub size: f64,
    /// Offset animation driven by the render time.
    pub animation: DashAnimation,
}

impl DashStyle {
    /// Default dash length.
    pub const DEFAULT_SIZE: f64 = 8.0;
}

impl Default for DashStyle {
    fn default() -> Self {
        Self {
            size: Self::DEFAULT_SIZE,
            animation: DashAnimation::default(),
        }
    }
}

/// Stroke and fill attributes for one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathStyle {
    /// Stroke width in source pixels, before viewport scaling.
    pub stroke_width: f64,
    /// Any SVG colour, e.g. from [`hex_to_rgba`](crate::hex_to_rgba).
    pub stroke_color: String,
    /// Fixed opacity; `None` derives it from each path's intensity.
    pub opacity: Option<f64>,
    /// Fill paint, `"none"` for strokes only.
    pub fill: String,
    /// Dashed stroke, solid when `None`.
    pub dash: Option<DashStyle>,
}

impl PathStyle {
    /// Default outline stroke width.
    pub const DEFAULT_STROKE_WIDTH: f64 = 0.3;
    /// Default background stroke width.
    pub const BACKGROUND_STROKE_WIDTH: f64 = 0.12;
    /// Default stroke colour.
    pub const DEFAULT_STROKE_COLOR: &str = "#000000";
    /// Default fill.
    pub const DEFAULT_FILL: &str = "none";
    /// Floor for intensity-derived opacity.
    pub const MIN_PATH_OPACITY: f64 = 0.3;

    /// Style for the background layer.
    #[must_use]
    pub fn background() -> Self {
        Self {
            stroke_width: Self::BACKGROUND_STROKE_WIDTH,
            ..Self::default()
        }
    }
}

impl Default for PathStyle {
    fn default() -> Self {
        Self {
            stroke_width: Self::DEFAULT_STROKE_WIDTH,
            stroke_color: Self::DEFAULT_STROKE_COLOR.to_owned(),
            opacity: None,
            fill: Self::DEFAULT_FILL.to_owned(),
            dash: None,
        }
    }
}

/// Where and when a layer is rendered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderFrame {
    /// Size of the raster the paths were traced on.
    pub source: Dimensions,
    /// Size of the output viewport.
    pub output: Dimensions,
    /// Render time in milliseconds, drives dash animation.
    pub time_ms: Option<f64>,
}

/// A named group of paths.
#[derive(Debug, Clone)]
pub struct Layer {
    /// Layer id, also the `<g id>`.
    pub name: String,
    /// The `<g>` element.
    pub group: Group,
}

/// Render `paths` as a `<g id="{name}">` layer.
///
/// Stroke width is `style.stroke_width * scale * 2`, where `scale` is the
/// viewport fit factor. Opacity is `style.opacity` when set; otherwise
/// `max(0.3, intensity)` per path, or 1 for connected output.
#[must_use = "returns the rendered layer"]
pub fn to_layer<R: Rng>(
    name: &str,
    paths: &[EdgePath],
    frame: &RenderFrame,
    options: &PathOptions,
    style: &PathStyle,
    rng: &mut R,
) -> Layer {
    let scale = ViewportTransform::fit(frame.source, frame.output, options.origin).scale();
    let stroke_width = style.stroke_width * scale * 2.0;
    let dash = style.dash.map(|dash| {
        let offset = frame.time_ms.map_or(0.0, |t| dash.animation.offset(t));
        (dash.size, offset)
    });
    let make_path = |d: String, opacity: f64| {
        let path = Path::new()
            .set("d", d)
            .set("stroke", style.stroke_color.as_str())
            .set("stroke-width", format!("{stroke_width:.2}"))
            .set("fill", style.fill.as_str())
            .set("opacity", format!("{opacity:.2}"))
            .set("stroke-linecap", "round")
            .set("stroke-linejoin", "round");
        match dash {
            Some((size, offset)) => path
                .set("stroke-dasharray", format!("{size}"))
                .set("stroke-dashoffset", format!("{offset:.2}")),
            None => path,
        }
    };

    let data = to_path_data(paths, frame.source, frame.output, options, rng);
    let mut group = Group::new().set("id", name);
    if options.connect_edges {
        for d in data {
            group = group.add(make_path(d, style.opacity.unwrap_or(1.0)));
        }
    } else {
        // One string per path with at least two points, in order.
        let drawn = paths.iter().filter(|p| p.len() >= 2);
        for (path, d) in drawn.zip(data) {
            let opacity = style
                .opacity
                .unwrap_or_else(|| f64::from(path.intensity()).max(PathStyle::MIN_PATH_OPACITY));
            group = group.add(make_path(d, opacity));
        }
    }
    Layer {
        name: name.to_owned(),
        group,
    }
}

/// Stack layers into one SVG document sized to `output`.
///
/// `order` lists layer names bottom to top. Names without a matching
/// layer are skipped, as are layers not named in `order`.
#[must_use]
pub fn to_svg_document(output: Dimensions, layers: &[Layer], order: &[&str]) -> String {
    let mut doc = document(output);
    for name in order {
        for layer in layers.iter().filter(|l| l.name == *name) {
            doc = doc.add(layer.group.clone());
        }
    }
    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}

/// Render detections as a `<g id="detections">` layer.
///
/// Each line becomes a segment `(ρcosθ, ρsinθ) ± LINE_EXTENT·(−sinθ, cosθ)`
/// and each circle a translucent disc.
#[must_use]
pub fn detections_layer(lines: &[Line], circles: &[Circle]) -> Layer {
    let mut group = Group::new().set("id", "detections");
    for line in lines {
        let (a, b) = line.segment(LINE_EXTENT);
        group = group.add(
            LineElement::new()
                .set("x1", format!("{:.2}", a.x))
                .set("y1", format!("{:.2}", a.y))
                .set("x2", format!("{:.2}", b.x))
                .set("y2", format!("{:.2}", b.y))
                .set("stroke", "red")
                .set("stroke-width", 1),
        );
    }
    for circle in circles {
        group = group.add(
            CircleElement::new()
                .set("cx", circle.x)
                .set("cy", circle.y)
                .set("r", circle.radius)
                .set("fill", "black")
                .set("stroke", "none")
                .set("opacity", 0.5),
        );
    }
    Layer {
        name: "detections".to_owned(),
        group,
    }
}

/// Serialize detections into a standalone SVG in raster coordinates.
#[must_use]
pub fn detections_svg(lines: &[Line], circles: &[Circle], dimensions: Dimensions) -> String {
    let layer = detections_layer(lines, circles);
    to_svg_document(dimensions, std::slice::from_ref(&layer), &["detections"])
}

fn document(dimensions: Dimensions) -> Document {
    let w = dimensions.width;
    let h = dimensions.height;
    Document::new()
        .set("width", w)
        .set("height", h)
        .set("viewBox", (0, 0, w, h))
}
