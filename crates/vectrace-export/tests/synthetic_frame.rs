//! End-to-end tests: synthetic frames through the pipeline into SVG.

#![allow(clippy::unwrap_used)]

use image::{GrayImage, Luma};
use rand::SeedableRng;
use rand::rngs::StdRng;
use vectrace_export::{
    BACKGROUND_LAYER, DEFAULT_LAYER_ORDER, OUTLINE_LAYER, PathOptions, PathStyle, RenderFrame,
    detections_svg, hex_to_rgba, to_layer, to_svg_document,
};
use vectrace_pipeline::{
    CpuProcessor, Dimensions, LineSearch, Raster, TickConfig, TickResult, process_tick,
};

/// A bright disc and a bright bar on black.
fn frame() -> Raster {
    let img = GrayImage::from_fn(240, 180, |x, y| {
        let dx = f64::from(x) - 80.0;
        let dy = f64::from(y) - 90.0;
        let in_disc = dx.hypot(dy) <= 40.0;
        let in_bar = (160..220).contains(&x) && (30..150).contains(&y);
        Luma([if in_disc || in_bar { 255 } else { 0 }])
    });
    Raster::from_gray(&img)
}

fn tick() -> TickResult {
    process_tick(&CpuProcessor::new(), &frame(), &TickConfig::default()).unwrap()
}

#[test]
fn frame_renders_both_layers_in_order() {
    let result = tick();
    assert!(!result.outline_paths.is_empty());
    assert!(!result.background_paths.is_empty());

    let output = Dimensions::new(480, 360);
    let render = RenderFrame {
        source: result.dimensions,
        output,
        time_ms: Some(1_000.0),
    };
    let mut rng = StdRng::seed_from_u64(42);
    let outline_style = PathStyle {
        stroke_color: hex_to_rgba("#202020", 0.8).unwrap(),
        ..PathStyle::default()
    };
    let layers = [
        to_layer(
            OUTLINE_LAYER,
            &result.outline_paths,
            &render,
            &PathOptions::default(),
            &outline_style,
            &mut rng,
        ),
        to_layer(
            BACKGROUND_LAYER,
            &result.background_paths,
            &render,
            &PathOptions::default(),
            &PathStyle::background(),
            &mut rng,
        ),
    ];
    let svg = to_svg_document(output, &layers, &DEFAULT_LAYER_ORDER);

    assert!(svg.contains(r#"viewBox="0 0 480 360""#));
    assert!(svg.contains("rgba(32, 32, 32, 0.8)"));
    let bg = svg.find(r#"<g id="background">"#).unwrap();
    let outline = svg.find(r#"<g id="outlinePaths">"#).unwrap();
    assert!(bg < outline);
    assert!(svg.matches("<path").count() >= 2);
}

#[test]
fn connected_layer_is_a_single_path() {
    let result = tick();
    let output = result.dimensions;
    let options = PathOptions {
        connect_edges: true,
        ..PathOptions::default()
    };
    let layer = to_layer(
        OUTLINE_LAYER,
        &result.outline_paths,
        &RenderFrame {
            source: result.dimensions,
            output,
            time_ms: None,
        },
        &options,
        &PathStyle::default(),
        &mut StdRng::seed_from_u64(1),
    );
    let svg = to_svg_document(output, &[layer], &[OUTLINE_LAYER]);
    assert_eq!(svg.matches("<path").count(), 1);
}

#[test]
fn detections_overlay_finds_the_bar_edges() {
    let config = TickConfig {
        lines: Some(LineSearch::default()),
        ..TickConfig::default()
    };
    let result = process_tick(&CpuProcessor::new(), &frame(), &config).unwrap();
    assert!(!result.lines.is_empty());
    let svg = detections_svg(&result.lines, &result.circles, result.dimensions);
    assert_eq!(svg.matches("<line").count(), result.lines.len());
    assert_eq!(svg.matches("<circle").count(), result.circles.len());
}

#[test]
fn black_frame_renders_empty_layers() {
    let black = Raster::from_gray(&GrayImage::new(64, 48));
    let result = process_tick(&CpuProcessor::new(), &black, &TickConfig::default()).unwrap();
    let layer = to_layer(
        OUTLINE_LAYER,
        &result.outline_paths,
        &RenderFrame {
            source: result.dimensions,
            output: result.dimensions,
            time_ms: None,
        },
        &PathOptions::default(),
        &PathStyle::default(),
        &mut StdRng::seed_from_u64(1),
    );
    let svg = to_svg_document(result.dimensions, &[layer], &DEFAULT_LAYER_ORDER);
    assert!(svg.contains(r#"id="outlinePaths""#));
    assert_eq!(svg.matches("<path").count(), 0);
}
