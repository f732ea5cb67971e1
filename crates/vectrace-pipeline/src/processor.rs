//! Parallel pixel processor abstraction.
//!
//! Every raster stage and the line accumulator are expressed as a pure
//! kernel `Fn(x, y) -> T` evaluated once per output cell. A
//! [`PixelProcessor`] decides how those evaluations are scheduled and
//! reports which features it supports, so a GPU-backed processor can
//! refuse work it cannot do precisely instead of degrading silently.

use serde::{Deserialize, Serialize};

use crate::types::{Capability, Dimensions, PipelineError};

/// Numeric precision of intermediate rasters (gradient magnitude and
/// suppressed magnitude).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Precision {
    /// 32-bit float intermediates.
    #[default]
    Float,
    /// Intermediates quantized to one byte per pixel.
    Byte,
}

/// Features a processor supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Whether float intermediate rasters can be stored.
    pub float_intermediates: bool,
    /// Longest raster axis accepted, in pixels.
    pub max_dimension: u32,
}

impl Capabilities {
    /// Default longest raster axis (matches common GPU texture limits).
    pub const DEFAULT_MAX_DIMENSION: u32 = 8192;

    /// Check that a raster of `dims` at `precision` can be processed.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Capability`] naming the first missing
    /// feature.
    pub fn require(
        self,
        dims: Dimensions,
        precision: Precision,
    ) -> Result<(), PipelineError> {
        let longest = dims.width.max(dims.height);
        if longest > self.max_dimension {
            return Err(PipelineError::Capability(Capability::RasterSize {
                requested: longest,
                supported: self.max_dimension,
            }));
        }
        if matches!(precision, Precision::Float) && !self.float_intermediates {
            return Err(PipelineError::Capability(Capability::FloatIntermediates));
        }
        Ok(())
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            float_intermediates: true,
            max_dimension: Self::DEFAULT_MAX_DIMENSION,
        }
    }
}

/// Executes per-cell kernels over a 2-D grid.
pub trait PixelProcessor {
    /// Features this processor supports.
    fn capabilities(&self) -> Capabilities;

    /// Evaluate `kernel` at every cell of `dims` and return the results in
    /// row-major order.
    ///
    /// The kernel must be pure: its result may depend only on its
    /// arguments and captured read-only state.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Allocation`] if the output buffer cannot
    /// be reserved.
    fn map_cells<T, F>(
        &self,
        dims: Dimensions,
        what: &'static str,
        kernel: F,
    ) -> Result<Vec<T>, PipelineError>
    where
        F: Fn(u32, u32) -> T + Sync,
        T: Send;
}

/// Reserve a zero-length vector with room for `len` elements, reporting
/// failure instead of aborting.
///
/// # Errors
///
/// Returns [`PipelineError::Allocation`] when the reservation fails.
pub fn try_alloc<T>(len: usize, what: &'static str) -> Result<Vec<T>, PipelineError> {
    let mut out = Vec::new();
    out.try_reserve_exact(len)
        .map_err(|_| PipelineError::Allocation {
            what,
            bytes: len.saturating_mul(size_of::<T>()),
        })?;
    Ok(out)
}

/// Sequential CPU processor.
///
/// Evaluates kernels in row-major order on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuProcessor {
    capabilities: Capabilities,
}

impl CpuProcessor {
    /// A processor with all features available.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A processor reporting the given capabilities. Used to emulate
    /// constrained accelerators.
    #[must_use]
    pub const fn with_capabilities(capabilities: Capabilities) -> Self {
        Self { capabilities }
    }
}

impl PixelProcessor for CpuProcessor {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn map_cells<T, F>(
        &self,
        dims: Dimensions,
        what: &'static str,
        kernel: F,
    ) -> Result<Vec<T>, PipelineError>
    where
        F: Fn(u32, u32) -> T + Sync,
        T: Send,
    {
        let len = usize::try_from(dims.pixel_count()).map_err(|_| PipelineError::Allocation {
            what,
            bytes: usize::MAX,
        })?;
        let mut out = try_alloc(len, what)?;
        for y in 0..dims.height {
            for x in 0..dims.width {
                out.push(kernel(x, y));
            }
        }
        Ok(out)
    }
}

/// Rayon-backed CPU processor.
///
/// Evaluates rows on the global rayon pool. Output order and values match
/// [`CpuProcessor`] because kernels are pure.
#[cfg(feature = "parallel")]
#[derive(Debug, Clone, Copy, Default)]
pub struct RayonProcessor {
    capabilities: Capabilities,
}

#[cfg(feature = "parallel")]
impl RayonProcessor {
    /// A processor with all features available.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A processor reporting the given capabilities.
    #[must_use]
    pub const fn with_capabilities(capabilities: Capabilities) -> Self {
        Self { capabilities }
    }
}

#[cfg(feature = "parallel")]
impl PixelProcessor for RayonProcessor {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn map_cells<T, F>(
        &self,
        dims: Dimensions,
        what: &'static str,
        kernel: F,
    ) -> Result<Vec<T>, PipelineError>
    where
        F: Fn(u32, u32) -> T + Sync,
        T: Send,
    {
        use rayon::prelude::*;

        let len = usize::try_from(dims.pixel_count()).map_err(|_| PipelineError::Allocation {
            what,
            bytes: usize::MAX,
        })?;
        let mut out = try_alloc(len, what)?;
        let kernel = &kernel;
        out.par_extend(
            (0..dims.height)
                .into_par_iter()
                .flat_map_iter(|y| (0..dims.width).map(move |x| kernel(x, y))),
        );
        Ok(out)
    }
}
