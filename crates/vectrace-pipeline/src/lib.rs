//! vectrace-pipeline: Pure per-frame image processing core (sans-IO).
//!
//! One tick turns a raster frame into:
//! grayscale -> blur -> gradient -> suppression -> hysteresis edges,
//! Hough lines and circles found in those edges, and traced, simplified
//! paths for the outline (edges) and background (blurred frame) layers.
//!
//! This crate has **no I/O dependencies** and reads no clock. Frames
//! come in as [`Raster`] values; timing for diagnostics is supplied
//! through [`Clock`]. Every intermediate lives only for one tick.

pub mod blur;
pub mod diagnostics;
pub mod edge;
pub mod gradient;
pub mod hough_circles;
pub mod hough_lines;
pub mod optimize;
pub mod processor;
pub mod raster;
pub mod simplify;
pub mod trace;
pub mod types;
pub mod vectorize;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use blur::BlurMode;
pub use diagnostics::{Clock, StageDiagnostics, StageMetrics, TickDiagnostics, TickSummary};
pub use edge::EdgeConfig;
pub use hough_circles::{CircleDetector, CircleSearch};
pub use hough_lines::{LineDetector, LineSearch, VotingStrategy};
pub use processor::{Capabilities, CpuProcessor, PixelProcessor, Precision};
#[cfg(feature = "parallel")]
pub use processor::RayonProcessor;
pub use raster::{Channels, EdgeRaster, Raster};
pub use trace::{EdgeTracer, TracerKind};
pub use types::{
    Capability, Circle, Dimensions, EdgePath, EdgePoint, GrayImage, Line, PipelineError, Point,
};
pub use vectorize::VectorizeOptions;

/// Everything one tick needs besides the frame itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Edge detection parameters.
    pub edges: EdgeConfig,
    /// Line detection, skipped when `None`.
    pub lines: Option<LineSearch>,
    /// Circle detection, skipped when `None`.
    pub circles: Option<CircleSearch>,
    /// Vectorization of the edge raster.
    pub outline: VectorizeOptions,
    /// Vectorization of the blurred frame, skipped when `None`.
    pub background: Option<VectorizeOptions>,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            edges: EdgeConfig::default(),
            lines: Some(LineSearch::default()),
            circles: Some(CircleSearch::default()),
            outline: VectorizeOptions::default(),
            background: Some(VectorizeOptions::background()),
        }
    }
}

/// Output of one tick.
#[derive(Debug, Clone)]
pub struct TickResult {
    /// Frame dimensions; every raster and coordinate below uses them.
    pub dimensions: Dimensions,
    /// Blurred grayscale frame.
    pub blurred: GrayImage,
    /// Binary edge raster.
    pub edges: EdgeRaster,
    /// Detected lines, strongest first.
    pub lines: Vec<Line>,
    /// Detected circles, strongest first.
    pub circles: Vec<Circle>,
    /// Paths traced from the edge raster.
    pub outline_paths: Vec<EdgePath>,
    /// Paths traced from the blurred frame.
    pub background_paths: Vec<EdgePath>,
}

/// Run one tick over `frame`.
///
/// # Errors
///
/// Returns [`PipelineError::Capability`] if the processor cannot run the
/// configured precision or frame size, and [`PipelineError::Allocation`]
/// if an intermediate cannot be reserved. A zero-sized frame is not an
/// error: every output is empty.
pub fn process_tick<P: PixelProcessor>(
    processor: &P,
    frame: &Raster,
    config: &TickConfig,
) -> Result<TickResult, PipelineError> {
    process_tick_with_diagnostics(processor, frame, config, &NoClock).map(|(result, _)| result)
}

/// Run one tick over `frame`, timing each stage with `clock`.
///
/// # Errors
///
/// See [`process_tick`].
pub fn process_tick_with_diagnostics<P: PixelProcessor, C: Clock>(
    processor: &P,
    frame: &Raster,
    config: &TickConfig,
    clock: &C,
) -> Result<(TickResult, TickDiagnostics), PipelineError> {
    let tick_start = clock.now();
    let dimensions = frame.dimensions();

    let start = clock.now();
    let stages = edge::process_staged(processor, &frame.to_gray(), &config.edges)?;
    let (low_threshold, high_threshold) = config.edges.clamped_thresholds();
    let edge_pixel_count = u64::try_from(stages.edges.edge_pixel_count()).unwrap_or(u64::MAX);
    let edge_detection = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::EdgeDetection {
            precision: config.edges.precision,
            low_threshold,
            high_threshold,
            max_magnitude: stages.max_magnitude,
            edge_pixel_count,
            total_pixel_count: dimensions.pixel_count(),
        },
    };

    let (lines, line_detection) = match config.lines {
        Some(search) => {
            let start = clock.now();
            let lines = search.detect(processor, &stages.edges)?;
            let diag = StageDiagnostics {
                duration: clock.elapsed(&start),
                metrics: StageMetrics::LineDetection {
                    votes_threshold: search.votes_threshold,
                    line_count: lines.len(),
                    top_votes: lines.first().map_or(0, |l| l.votes),
                },
            };
            (lines, Some(diag))
        }
        None => (Vec::new(), None),
    };

    let (circles, circle_detection) = match config.circles {
        Some(search) => {
            let start = clock.now();
            let circles = search.detect(&stages.edges)?;
            let diag = StageDiagnostics {
                duration: clock.elapsed(&start),
                metrics: StageMetrics::CircleDetection {
                    min_radius: search.min_radius,
                    max_radius: search.max_radius,
                    votes_threshold: search.votes_threshold,
                    circle_count: circles.len(),
                },
            };
            (circles, Some(diag))
        }
        None => (Vec::new(), None),
    };

    let start = clock.now();
    let outline_paths = vectorize::vectorize_edges(&stages.edges, &config.outline);
    let outline = vectorize_diagnostics(clock.elapsed(&start), &config.outline, &outline_paths);

    let (background_paths, background) = match config.background {
        Some(options) => {
            let start = clock.now();
            let paths = vectorize::vectorize(&stages.blurred, &options);
            let diag = vectorize_diagnostics(clock.elapsed(&start), &options, &paths);
            (paths, Some(diag))
        }
        None => (Vec::new(), None),
    };

    let summary = TickSummary {
        width: dimensions.width,
        height: dimensions.height,
        edge_pixel_count,
        line_count: lines.len(),
        circle_count: circles.len(),
        path_count: outline_paths.len() + background_paths.len(),
    };
    let diagnostics = TickDiagnostics {
        edge_detection,
        line_detection,
        circle_detection,
        outline,
        background,
        total_duration: clock.elapsed(&tick_start),
        summary,
    };
    tracing::debug!(
        lines = lines.len(),
        circles = circles.len(),
        outline_paths = outline_paths.len(),
        background_paths = background_paths.len(),
        "tick complete",
    );

    let result = TickResult {
        dimensions,
        blurred: stages.blurred,
        edges: stages.edges,
        lines,
        circles,
        outline_paths,
        background_paths,
    };
    Ok((result, diagnostics))
}

fn vectorize_diagnostics(
    duration: Duration,
    options: &VectorizeOptions,
    paths: &[EdgePath],
) -> StageDiagnostics {
    StageDiagnostics {
        duration,
        metrics: StageMetrics::Vectorize {
            threshold: options.threshold,
            simplification: options.simplification,
            path_count: paths.len(),
            point_count: diagnostics::total_points(paths),
        },
    }
}

/// Clock for runs that discard diagnostics.
struct NoClock;

impl Clock for NoClock {
    type Instant = ();

    fn now(&self) {}

    fn elapsed(&self, _since: &()) -> Duration {
        Duration::ZERO
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;

    /// Clock that advances one millisecond per reading.
    struct StepClock(Cell<u64>);

    impl Clock for StepClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.0.get();
            self.0.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    fn black_frame(width: u32, height: u32) -> Raster {
        Raster::new(
            width,
            height,
            Channels::Rgb,
            vec![0; (width * height * 3) as usize],
        )
        .unwrap()
    }

    /// A white square on black, large enough for both detectors.
    fn square_frame() -> Raster {
        let img = GrayImage::from_fn(160, 160, |x, y| {
            image::Luma([if (40..120).contains(&x) && (40..120).contains(&y) { 255 } else { 0 }])
        });
        Raster::from_gray(&img)
    }

    #[test]
    fn black_frame_yields_nothing() {
        let result = process_tick(&CpuProcessor::new(), &black_frame(64, 48), &TickConfig::default())
            .unwrap();
        assert_eq!(result.dimensions, Dimensions::new(64, 48));
        assert_eq!(result.edges.edge_pixel_count(), 0);
        assert!(result.lines.is_empty());
        assert!(result.circles.is_empty());
        assert!(result.outline_paths.is_empty());
        assert!(result.background_paths.is_empty());
    }

    #[test]
    fn zero_sized_frame_is_not_an_error() {
        let frame = Raster::new(0, 0, Channels::Rgba, Vec::new()).unwrap();
        let result = process_tick(&CpuProcessor::new(), &frame, &TickConfig::default()).unwrap();
        assert!(result.dimensions.is_empty());
        assert!(result.lines.is_empty());
        assert!(result.outline_paths.is_empty());
    }

    #[test]
    fn square_produces_outline_and_lines() {
        let result =
            process_tick(&CpuProcessor::new(), &square_frame(), &TickConfig::default()).unwrap();
        assert!(result.edges.edge_pixel_count() > 0);
        assert!(!result.outline_paths.is_empty());
        assert!(!result.lines.is_empty());
        // Background traces the bright square in the blurred frame.
        assert!(!result.background_paths.is_empty());
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn rayon_processor_produces_the_same_tick() {
        let config = TickConfig::default();
        let sequential = process_tick(&CpuProcessor::new(), &square_frame(), &config).unwrap();
        let parallel = process_tick(&RayonProcessor::new(), &square_frame(), &config).unwrap();
        assert_eq!(parallel.edges, sequential.edges);
        assert_eq!(parallel.lines, sequential.lines);
        assert_eq!(parallel.circles, sequential.circles);
        assert_eq!(parallel.outline_paths, sequential.outline_paths);
    }

    #[test]
    fn disabled_stages_are_skipped() {
        let config = TickConfig {
            lines: None,
            circles: None,
            background: None,
            ..TickConfig::default()
        };
        let (result, diag) = process_tick_with_diagnostics(
            &CpuProcessor::new(),
            &square_frame(),
            &config,
            &StepClock(Cell::new(0)),
        )
        .unwrap();
        assert!(result.lines.is_empty());
        assert!(result.background_paths.is_empty());
        assert!(diag.line_detection.is_none());
        assert!(diag.circle_detection.is_none());
        assert!(diag.background.is_none());
    }

    #[test]
    fn diagnostics_time_every_stage() {
        let (result, diag) = process_tick_with_diagnostics(
            &CpuProcessor::new(),
            &square_frame(),
            &TickConfig::default(),
            &StepClock(Cell::new(0)),
        )
        .unwrap();
        assert!(diag.edge_detection.duration > Duration::ZERO);
        assert!(diag.line_detection.is_some());
        assert!(diag.total_duration >= diag.edge_detection.duration);
        assert_eq!(diag.summary.line_count, result.lines.len());
        assert_eq!(
            diag.summary.path_count,
            result.outline_paths.len() + result.background_paths.len()
        );
    }

    #[test]
    fn missing_float_support_is_a_capability_error() {
        let processor = CpuProcessor::with_capabilities(Capabilities {
            float_intermediates: false,
            ..Capabilities::default()
        });
        let result = process_tick(&processor, &square_frame(), &TickConfig::default());
        assert!(matches!(
            result,
            Err(PipelineError::Capability(Capability::FloatIntermediates))
        ));

        let mut config = TickConfig::default();
        config.edges.precision = Precision::Byte;
        assert!(process_tick(&processor, &square_frame(), &config).is_ok());
    }

    #[test]
    fn config_serde_fills_missing_fields_with_defaults() {
        let config: TickConfig = serde_json::from_str(r#"{"lines": null}"#).unwrap();
        assert!(config.lines.is_none());
        assert_eq!(config.circles, Some(CircleSearch::default()));
        assert_eq!(config.outline, VectorizeOptions::default());
    }
}
