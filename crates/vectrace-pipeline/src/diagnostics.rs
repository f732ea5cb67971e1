//! Tick diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation intended for
//! parameter tuning. [`process_tick_with_diagnostics`](crate::process_tick_with_diagnostics)
//! collects them alongside the tick result.
//!
//! The pipeline never reads a clock itself. Callers supply a [`Clock`],
//! so the same code runs under a real clock, a frame timer, or a fixed
//! clock in tests.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::processor::Precision;
use crate::types::EdgePath;

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque timestamp.
    type Instant;

    /// Current timestamp.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single tick.
///
/// Stages that were not configured for the tick are `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickDiagnostics {
    /// Grayscale conversion, blur, gradient, suppression and hysteresis.
    pub edge_detection: StageDiagnostics,
    /// Hough line voting and peak extraction.
    pub line_detection: Option<StageDiagnostics>,
    /// Hough circle voting and duplicate suppression.
    pub circle_detection: Option<StageDiagnostics>,
    /// Outline vectorization of the edge raster.
    pub outline: StageDiagnostics,
    /// Background vectorization of the blurred raster.
    pub background: Option<StageDiagnostics>,
    /// Total duration of the tick (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: TickSummary,
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Edge detection metrics.
    EdgeDetection {
        /// Precision of the gradient magnitude plane.
        precision: Precision,
        /// Low threshold (after clamping).
        low_threshold: f32,
        /// High threshold (after clamping).
        high_threshold: f32,
        /// Strongest gradient magnitude, in Sobel units.
        max_magnitude: f32,
        /// Number of edge pixels in the output.
        edge_pixel_count: u64,
        /// Total pixel count for computing edge density.
        total_pixel_count: u64,
    },
    /// Line detection metrics.
    LineDetection {
        /// Minimum votes for a peak.
        votes_threshold: u32,
        /// Lines returned.
        line_count: usize,
        /// Votes of the strongest line, 0 when none.
        top_votes: u32,
    },
    /// Circle detection metrics.
    CircleDetection {
        /// Smallest radius tested.
        min_radius: u32,
        /// Largest radius tested.
        max_radius: u32,
        /// Minimum votes for a peak.
        votes_threshold: u32,
        /// Circles returned.
        circle_count: usize,
    },
    /// Vectorization metrics.
    Vectorize {
        /// "On" threshold.
        threshold: u8,
        /// RDP tolerance in pixels.
        simplification: f64,
        /// Paths returned.
        path_count: usize,
        /// Total points across returned paths.
        point_count: usize,
    },
}

/// High-level summary counts for the tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickSummary {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Edge pixels found.
    pub edge_pixel_count: u64,
    /// Lines found.
    pub line_count: usize,
    /// Circles found.
    pub circle_count: usize,
    /// Outline plus background paths.
    pub path_count: usize,
}

impl TickDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Tick Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!("Frame: {}x{}", self.summary.width, self.summary.height));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        let stages = [
            ("Edge Detection", Some(&self.edge_detection)),
            ("Line Detection", self.line_detection.as_ref()),
            ("Circle Detection", self.circle_detection.as_ref()),
            ("Outline", Some(&self.outline)),
            ("Background", self.background.as_ref()),
        ];

        for (name, diag) in stages {
            let Some(diag) = diag else {
                continue;
            };
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Edges: {}  |  Lines: {}  |  Circles: {}  |  Paths: {}",
            self.summary.edge_pixel_count,
            self.summary.line_count,
            self.summary.circle_count,
            self.summary.path_count,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::EdgeDetection {
            precision,
            low_threshold,
            high_threshold,
            max_magnitude,
            edge_pixel_count,
            total_pixel_count,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *total_pixel_count > 0 {
                *edge_pixel_count as f64 / *total_pixel_count as f64 * 100.0
            } else {
                0.0
            };
            format!(
                "{precision:?} low={low_threshold:.1} high={high_threshold:.1} max={max_magnitude:.1} edges={edge_pixel_count} ({density:.1}%)",
            )
        }
        StageMetrics::LineDetection {
            votes_threshold,
            line_count,
            top_votes,
        } => format!("threshold={votes_threshold} lines={line_count} top={top_votes}"),
        StageMetrics::CircleDetection {
            min_radius,
            max_radius,
            votes_threshold,
            circle_count,
        } => format!(
            "r={min_radius}..={max_radius} threshold={votes_threshold} circles={circle_count}",
        ),
        StageMetrics::Vectorize {
            threshold,
            simplification,
            path_count,
            point_count,
        } => format!(
            "threshold={threshold} tol={simplification:.2} {path_count} paths, {point_count} pts",
        ),
    }
}

/// Total points across a slice of paths.
pub(crate) fn total_points(paths: &[EdgePath]) -> usize {
    paths.iter().map(EdgePath::len).sum()
}
