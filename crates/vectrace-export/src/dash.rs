//! Marching-dash animation.
//!
//! The offset runs linearly from `max` down to `min` once per period and
//! then wraps, so a dashed stroke appears to crawl in one direction.

use serde::{Deserialize, Serialize};

/// Sawtooth dash-offset generator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashAnimation {
    /// Length of one cycle in milliseconds.
    pub period_ms: f64,
    /// Offset reached at the end of a cycle.
    pub min: f64,
    /// Offset at the start of a cycle.
    pub max: f64,
}

impl DashAnimation {
    /// Default cycle length.
    pub const DEFAULT_PERIOD_MS: f64 = 35_000.0;
    /// Default lowest offset.
    pub const DEFAULT_MIN: f64 = -256.0;
    /// Default highest offset.
    pub const DEFAULT_MAX: f64 = 256.0;

    /// Offset at `time_ms`.
    ///
    /// `offset(t) == offset(t + period)` for every `t`, negative times
    /// included. A non-positive or non-finite period holds the offset at
    /// `max`.
    #[must_use]
    pub fn offset(&self, time_ms: f64) -> f64 {
        if !(self.period_ms.is_finite() && self.period_ms > 0.0) || !time_ms.is_finite() {
            return self.max;
        }
        let phase = time_ms.rem_euclid(self.period_ms) / self.period_ms;
        (self.max - self.min).mul_add(-phase, self.max)
    }
}

impl Default for DashAnimation {
    fn default() -> Self {
        Self {
            period_ms: Self::DEFAULT_PERIOD_MS,
            min: Self::DEFAULT_MIN,
            max: Self::DEFAULT_MAX,
        }
    }
}
