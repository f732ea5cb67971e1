//! vectrace-bench: CLI frame source for parameter experimentation and
//! diagnostics.
//!
//! Feeds an image file through the per-frame pipeline as one or more
//! ticks, printing per-stage diagnostics. Useful for:
//!
//! - Comparing blur modes, gradient precision, and line voting strategies
//! - Tuning hysteresis thresholds and Hough vote thresholds
//! - Measuring per-stage durations to identify bottlenecks
//! - Rendering the layered SVG and a detection overlay for inspection
//!
//! Circle detection runs here on scoped worker threads, one radius band
//! per thread, merged with the detector's duplicate suppression.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin vectrace-bench -- [OPTIONS] <IMAGE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread::ScopedJoinHandle;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vectrace_export::{
    BACKGROUND_LAYER, DEFAULT_LAYER_ORDER, DashStyle, OUTLINE_LAYER, PathOptions, PathStyle,
    RenderFrame, detections_svg, to_layer, to_svg_document,
};
use vectrace_pipeline::diagnostics::{Clock, StageDiagnostics, StageMetrics, TickDiagnostics};
use vectrace_pipeline::hough_circles::edge_pixels;
use vectrace_pipeline::{
    BlurMode, Capabilities, Capability, Circle, CircleSearch, CpuProcessor, Dimensions,
    EdgeConfig, EdgeRaster, LineDetector, LineSearch, PipelineError, PixelProcessor, Precision,
    Raster, RayonProcessor, TickConfig, TickResult, TracerKind, VectorizeOptions,
    VotingStrategy,
};

/// Per-frame pipeline experimentation and diagnostics for vectrace.
///
/// Runs one tick per `--runs` over a still image with configurable
/// parameters and prints detailed per-stage timing and count diagnostics.
#[derive(Parser)]
#[command(name = "vectrace-bench", version)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Mirror the frame horizontally, as a front-facing camera would.
    #[arg(long)]
    mirror: bool,

    /// Blur mode applied before the gradient.
    #[arg(long, value_enum, default_value_t = Blur::Gaussian)]
    blur: Blur,

    /// Gaussian blur sigma.
    #[arg(long, default_value_t = BlurMode::DEFAULT_SIGMA)]
    sigma: f32,

    /// Motion blur length in pixels.
    #[arg(long, default_value_t = BlurMode::DEFAULT_MOTION_LENGTH)]
    motion_length: f32,

    /// Motion blur angle in degrees.
    #[arg(long, default_value_t = BlurMode::DEFAULT_MOTION_ANGLE)]
    motion_angle: f32,

    /// Bokeh in-focus radius, as a fraction of the frame diagonal.
    #[arg(long, default_value_t = BlurMode::DEFAULT_APERTURE)]
    aperture: f32,

    /// Bokeh maximum blur radius in pixels.
    #[arg(long, default_value_t = BlurMode::DEFAULT_MAX_BLUR)]
    max_blur: f32,

    /// Hysteresis low threshold (Sobel units).
    #[arg(long, default_value_t = EdgeConfig::DEFAULT_LOW_THRESHOLD)]
    low_threshold: f32,

    /// Hysteresis high threshold (Sobel units).
    #[arg(long, default_value_t = EdgeConfig::DEFAULT_HIGH_THRESHOLD)]
    high_threshold: f32,

    /// Gradient magnitude precision.
    #[arg(long, value_enum, default_value_t = PrecisionArg::Float)]
    precision: PrecisionArg,

    /// Pretend the processor cannot hold float intermediates.
    #[arg(long)]
    no_float: bool,

    /// Run pixel kernels on the calling thread instead of the rayon pool.
    #[arg(long)]
    sequential: bool,

    /// Skip line detection.
    #[arg(long)]
    no_lines: bool,

    /// Minimum votes for a line.
    #[arg(long, default_value_t = LineSearch::DEFAULT_VOTES_THRESHOLD)]
    line_threshold: u32,

    /// Line voting strategy.
    #[arg(long, value_enum, default_value_t = Voting::Gather)]
    voting: Voting,

    /// Skip circle detection.
    #[arg(long)]
    no_circles: bool,

    /// Smallest circle radius tested.
    #[arg(long, default_value_t = CircleSearch::DEFAULT_MIN_RADIUS)]
    min_radius: u32,

    /// Largest circle radius tested.
    #[arg(long, default_value_t = CircleSearch::DEFAULT_MAX_RADIUS)]
    max_radius: u32,

    /// Minimum votes for a circle.
    #[arg(long, default_value_t = CircleSearch::DEFAULT_VOTES_THRESHOLD)]
    circle_threshold: u32,

    /// Worker threads for circle voting (defaults to available cores).
    #[arg(long)]
    threads: Option<NonZeroUsize>,

    /// Tracing algorithm for the outline layer.
    #[arg(long, value_enum, default_value_t = Tracer::ChainWalk)]
    tracer: Tracer,

    /// Tracing algorithm for the background layer.
    #[arg(long, value_enum, default_value_t = Tracer::BorderFollowing)]
    background_tracer: Tracer,

    /// Outline paths shorter than this are dropped.
    #[arg(long, default_value_t = VectorizeOptions::DEFAULT_MIN_PATH_LENGTH)]
    min_path_length: usize,

    /// Outline RDP simplification tolerance in pixels.
    #[arg(long, default_value_t = VectorizeOptions::DEFAULT_SIMPLIFICATION)]
    simplification: f64,

    /// Skip the background layer.
    #[arg(long)]
    no_background: bool,

    /// Background threshold on the blurred frame.
    #[arg(long, default_value_t = VectorizeOptions::BACKGROUND_THRESHOLD)]
    background_threshold: u8,

    /// Write the layered SVG to this file.
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Write the line/circle overlay SVG to this file.
    #[arg(long)]
    overlay: Option<PathBuf>,

    /// SVG viewport width (defaults to the frame width).
    #[arg(long)]
    width: Option<u32>,

    /// SVG viewport height (defaults to the frame height).
    #[arg(long)]
    height: Option<u32>,

    /// Draw straight segments instead of curves.
    #[arg(long)]
    straight: bool,

    /// Jitter curve endpoints.
    #[arg(long)]
    wiggle: bool,

    /// Merge each layer's paths into one path.
    #[arg(long)]
    connect: bool,

    /// Dash the outline layer, with this dash length.
    #[arg(long, num_args = 0..=1, default_missing_value = "8")]
    dash: Option<f64>,

    /// Render time in milliseconds for dash animation.
    #[arg(long)]
    time_ms: Option<f64>,

    /// Seed for curve jitter.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Number of ticks for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Full tick config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// The JSON must be a valid `TickConfig` serialization; missing
    /// fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,
}

/// Blur mode selection.
#[derive(Clone, Copy, ValueEnum)]
enum Blur {
    /// Isotropic Gaussian.
    Gaussian,
    /// Directional streak.
    Motion,
    /// Depth-of-field disc around the frame centre.
    Bokeh,
}

/// Gradient precision selection.
#[derive(Clone, Copy, ValueEnum)]
enum PrecisionArg {
    /// 32-bit float magnitudes.
    Float,
    /// Byte-quantized magnitudes.
    Byte,
}

/// Line voting strategy selection.
#[derive(Clone, Copy, ValueEnum)]
enum Voting {
    /// Each accumulator cell counts the pixels within tolerance.
    Gather,
    /// Each pixel votes for its nearest rho bin.
    Scatter,
}

/// Tracing algorithm selection.
#[derive(Clone, Copy, ValueEnum)]
enum Tracer {
    /// Walk 8-connected chains.
    ChainWalk,
    /// Suzuki-Abe border following.
    BorderFollowing,
}

/// Build a [`TickConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<TickConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    let tracer_kind = |tracer: Tracer| match tracer {
        Tracer::ChainWalk => TracerKind::ChainWalk,
        Tracer::BorderFollowing => TracerKind::BorderFollowing,
    };
    Ok(TickConfig {
        edges: EdgeConfig {
            low_threshold: cli.low_threshold,
            high_threshold: cli.high_threshold,
            blur: match cli.blur {
                Blur::Gaussian => BlurMode::Gaussian { sigma: cli.sigma },
                Blur::Motion => BlurMode::Motion {
                    angle_degrees: cli.motion_angle,
                    length: cli.motion_length,
                },
                Blur::Bokeh => BlurMode::Bokeh {
                    focus_x: 0.5,
                    focus_y: 0.5,
                    aperture: cli.aperture,
                    max_blur: cli.max_blur,
                },
            },
            precision: match cli.precision {
                PrecisionArg::Float => Precision::Float,
                PrecisionArg::Byte => Precision::Byte,
            },
        },
        lines: (!cli.no_lines).then(|| LineSearch {
            detector: LineDetector {
                voting: match cli.voting {
                    Voting::Gather => VotingStrategy::Gather,
                    Voting::Scatter => VotingStrategy::Scatter,
                },
                ..LineDetector::default()
            },
            votes_threshold: cli.line_threshold,
        }),
        circles: (!cli.no_circles).then(|| CircleSearch {
            min_radius: cli.min_radius,
            max_radius: cli.max_radius,
            votes_threshold: cli.circle_threshold,
            ..CircleSearch::default()
        }),
        outline: VectorizeOptions {
            min_path_length: cli.min_path_length,
            simplification: cli.simplification,
            tracer: tracer_kind(cli.tracer),
            ..VectorizeOptions::default()
        },
        background: (!cli.no_background).then(|| VectorizeOptions {
            threshold: cli.background_threshold,
            tracer: tracer_kind(cli.background_tracer),
            ..VectorizeOptions::background()
        }),
    })
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(&cli.image_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };
    let frame = match Raster::decode(&image_bytes) {
        Ok(raster) if cli.mirror => raster.mirrored_horizontal(),
        Ok(raster) => raster,
        Err(e) => {
            eprintln!("Error decoding {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    let capabilities = Capabilities {
        float_intermediates: !cli.no_float,
        ..Capabilities::default()
    };
    let threads = cli
        .threads
        .or_else(|| std::thread::available_parallelism().ok())
        .map_or(1, NonZeroUsize::get);

    info!(
        image = %cli.image_path.display(),
        bytes = image_bytes.len(),
        width = frame.dimensions().width,
        height = frame.dimensions().height,
        runs = cli.runs,
        threads,
        sequential = cli.sequential,
        "starting",
    );
    eprintln!("Config: {config:#?}");
    eprintln!();

    if cli.sequential {
        let processor = CpuProcessor::with_capabilities(capabilities);
        run_ticks(&cli, &processor, &frame, &config, threads)
    } else {
        let processor = RayonProcessor::with_capabilities(capabilities);
        run_ticks(&cli, &processor, &frame, &config, threads)
    }
}

/// Run `--runs` ticks, print their diagnostics, and write the requested
/// SVG files from the first tick.
fn run_ticks<P: PixelProcessor>(
    cli: &Cli,
    processor: &P,
    frame: &Raster,
    config: &TickConfig,
    threads: usize,
) -> ExitCode {
    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        let (result, diagnostics) = match run_tick(processor, frame, config, threads) {
            Ok(output) => output,
            Err(e) => {
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        };

        if cli.json {
            match serde_json::to_string_pretty(&diagnostics) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("Error serializing diagnostics: {e}");
                    return ExitCode::FAILURE;
                }
            }
        } else {
            println!("{}", diagnostics.report());
        }

        // Write SVGs on the first run only.
        if run == 0 {
            let mut outputs = Vec::new();
            if let Some(ref svg_path) = cli.svg {
                outputs.push((svg_path, layered_svg(cli, &result)));
            }
            if let Some(ref overlay_path) = cli.overlay {
                let svg = detections_svg(&result.lines, &result.circles, result.dimensions);
                outputs.push((overlay_path, svg));
            }
            for (path, contents) in outputs {
                if let Err(e) = write_file(path, &contents) {
                    eprintln!("Error writing {}: {e}", path.display());
                    return ExitCode::FAILURE;
                }
            }
        }

        all_diagnostics.push(diagnostics);

        if cli.runs > 1 {
            eprintln!();
        }
    }

    // Print summary when multiple runs.
    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// Run one tick, falling back to byte precision when the processor
/// lacks float support, then detect circles on worker threads.
fn run_tick<P: PixelProcessor>(
    processor: &P,
    frame: &Raster,
    config: &TickConfig,
    threads: usize,
) -> Result<(TickResult, TickDiagnostics), PipelineError> {
    let tick_config = TickConfig {
        circles: None,
        ..*config
    };
    let (mut result, mut diagnostics) = match vectrace_pipeline::process_tick_with_diagnostics(
        processor,
        frame,
        &tick_config,
        &StdClock,
    ) {
        Err(PipelineError::Capability(Capability::FloatIntermediates)) => {
            warn!("float intermediates unsupported, retrying with byte precision");
            let mut fallback = tick_config;
            fallback.edges.precision = Precision::Byte;
            vectrace_pipeline::process_tick_with_diagnostics(
                processor, frame, &fallback, &StdClock,
            )?
        }
        other => other?,
    };

    if let Some(search) = config.circles {
        let start = Instant::now();
        result.circles = detect_circles_banded(&search, &result.edges, threads)?;
        let duration = start.elapsed();
        diagnostics.circle_detection = Some(StageDiagnostics {
            duration,
            metrics: StageMetrics::CircleDetection {
                min_radius: search.min_radius,
                max_radius: search.max_radius,
                votes_threshold: search.votes_threshold,
                circle_count: result.circles.len(),
            },
        });
        diagnostics.summary.circle_count = result.circles.len();
        diagnostics.total_duration += duration;
    }

    Ok((result, diagnostics))
}

/// Split the radius range into contiguous bands, vote each band on its
/// own scoped thread, and merge the candidates.
///
/// Bands are concatenated in radius order, so the merged result equals
/// a single-threaded [`CircleSearch::detect`].
fn detect_circles_banded(
    search: &CircleSearch,
    edges: &EdgeRaster,
    threads: usize,
) -> Result<Vec<Circle>, PipelineError> {
    let pixels = edge_pixels(edges);
    if pixels.is_empty() {
        return Ok(Vec::new());
    }
    let detector = &search.detector;
    let dims: Dimensions = edges.dimensions();
    let radii = detector.radii(search.min_radius, search.max_radius);
    let band_len = radii.len().div_ceil(threads.max(1)).max(1);

    let bands: Vec<Result<Vec<Circle>, PipelineError>> = std::thread::scope(|scope| {
        let handles: Vec<_> = radii
            .chunks(band_len)
            .map(|band| {
                let pixels = &pixels;
                scope.spawn(move || {
                    detector.vote_band(pixels, dims, band, search.votes_threshold)
                })
            })
            .collect();
        handles.into_iter().map(join_band).collect()
    });

    let mut candidates = Vec::new();
    for band in bands {
        candidates.extend(band?);
    }
    let candidate_count = candidates.len();
    let circles = detector.suppress_duplicates(candidates);
    info!(
        bands = radii.chunks(band_len).len(),
        candidates = candidate_count,
        circles = circles.len(),
        "banded circle detection complete",
    );
    Ok(circles)
}

/// Join a band worker, re-raising its panic on the calling thread.
fn join_band<T>(handle: ScopedJoinHandle<'_, T>) -> T {
    handle
        .join()
        .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
}

/// Render the outline and background layers into one document.
fn layered_svg(cli: &Cli, result: &TickResult) -> String {
    let output = Dimensions::new(
        cli.width.unwrap_or(result.dimensions.width),
        cli.height.unwrap_or(result.dimensions.height),
    );
    let render = RenderFrame {
        source: result.dimensions,
        output,
        time_ms: cli.time_ms,
    };
    let options = PathOptions {
        use_bezier: !cli.straight,
        wiggle: cli.wiggle,
        connect_edges: cli.connect,
        ..PathOptions::default()
    };
    let mut rng = StdRng::seed_from_u64(cli.seed);
    let layers = [
        to_layer(
            BACKGROUND_LAYER,
            &result.background_paths,
            &render,
            &options,
            &PathStyle::background(),
            &mut rng,
        ),
        to_layer(
            OUTLINE_LAYER,
            &result.outline_paths,
            &render,
            &options,
            &PathStyle {
                dash: cli.dash.map(|size| DashStyle {
                    size,
                    ..DashStyle::default()
                }),
                ..PathStyle::default()
            },
            &mut rng,
        ),
    ];
    to_svg_document(output, &layers, &DEFAULT_LAYER_ORDER)
}

fn write_file(path: &Path, contents: &str) -> std::io::Result<()> {
    std::fs::write(path, contents)?;
    eprintln!("Wrote {} ({} bytes)", path.display(), contents.len());
    Ok(())
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&TickDiagnostics) -> Option<Duration>;

/// Min, mean, and max of a set of durations, in milliseconds.
struct Spread {
    min: f64,
    mean: f64,
    max: f64,
}

impl Spread {
    #[allow(clippy::cast_precision_loss)]
    fn of(durations: impl Iterator<Item = Duration>) -> Option<Self> {
        let ms: Vec<f64> = durations.map(|d| d.as_secs_f64() * 1000.0).collect();
        let min = ms.iter().copied().reduce(f64::min)?;
        let max = ms.iter().copied().reduce(f64::max)?;
        Some(Self {
            min,
            mean: ms.iter().sum::<f64>() / ms.len() as f64,
            max,
        })
    }
}

/// Print aggregated statistics across multiple runs.
fn print_multi_run_summary(all_diagnostics: &[TickDiagnostics]) {
    println!();
    println!(
        "Summary ({} ticks)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    let Some(total) = Spread::of(all_diagnostics.iter().map(|d| d.total_duration)) else {
        println!("Warning: no diagnostics to summarize");
        return;
    };
    println!(
        "Total duration: min={:.3}ms  mean={:.3}ms  max={:.3}ms",
        total.min, total.mean, total.max,
    );

    println!();
    println!("{:<20} {:>10} {:>10} {:>10}", "Stage", "Min", "Mean", "Max");
    println!("{}", "-".repeat(54));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Edge Detection", |d| Some(d.edge_detection.duration)),
        ("Line Detection", |d| d.line_detection.as_ref().map(|s| s.duration)),
        ("Circle Detection", |d| d.circle_detection.as_ref().map(|s| s.duration)),
        ("Outline", |d| Some(d.outline.duration)),
        ("Background", |d| d.background.as_ref().map(|s| s.duration)),
    ];

    for (name, extractor) in stage_extractors {
        // Stages disabled in every tick are omitted.
        if let Some(spread) = Spread::of(all_diagnostics.iter().filter_map(extractor)) {
            println!(
                "{name:<20} {:>8.3}ms {:>8.3}ms {:>8.3}ms",
                spread.min, spread.mean, spread.max,
            );
        }
    }
}
