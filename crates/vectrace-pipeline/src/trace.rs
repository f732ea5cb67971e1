//! Edge tracing: extract ordered polylines from a raster.
//!
//! This module defines the [`EdgeTracer`] trait for pluggable tracing
//! algorithms and the [`TracerKind`] enum for selecting one at runtime.
//! A pixel is "on" when its value is at least the caller's threshold.
//! Every traced point carries the pixel value scaled to `[0, 1]`.

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::types::{EdgePath, EdgePoint};

/// 8-neighbour offsets, orthogonal first so walks prefer straight steps.
const NEIGHBORS: [(i64, i64); 8] = [
    (1, 0),
    (0, 1),
    (-1, 0),
    (0, -1),
    (1, 1),
    (-1, 1),
    (-1, -1),
    (1, -1),
];

/// Selects which tracing algorithm to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TracerKind {
    /// Walk 8-connected chains of on pixels in both directions from the
    /// first unvisited pixel in scan order.
    ///
    /// Suited to one-pixel-wide edges: each chain becomes one open path.
    #[default]
    ChainWalk,
    /// Suzuki-Abe border following via `imageproc::contours::find_contours`.
    ///
    /// Traces region outlines; on thin edges this produces doubled
    /// borders that simplification collapses.
    BorderFollowing,
}

/// Trait for tracing strategies.
///
/// Input: a raster and an "on" threshold.
/// Output: disconnected paths whose points are spatially contiguous.
pub trait EdgeTracer {
    /// Trace paths through pixels with value `>= threshold`.
    fn trace(&self, raster: &GrayImage, threshold: u8) -> Vec<EdgePath>;
}

impl EdgeTracer for TracerKind {
    fn trace(&self, raster: &GrayImage, threshold: u8) -> Vec<EdgePath> {
        let threshold = threshold.max(1);
        match *self {
            Self::ChainWalk => trace_chains(raster, threshold),
            Self::BorderFollowing => trace_border_following(raster, threshold),
        }
    }
}

fn edge_point(raster: &GrayImage, x: u32, y: u32) -> EdgePoint {
    EdgePoint::new(
        f64::from(x),
        f64::from(y),
        f32::from(raster.get_pixel(x, y).0[0]) / 255.0,
    )
}

/// Visited-pixel bookkeeping for chain walking.
struct Walker<'a> {
    raster: &'a GrayImage,
    threshold: u8,
    visited: Vec<bool>,
}

impl Walker<'_> {
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.raster.width() as usize + x as usize
    }

    fn is_free(&self, x: u32, y: u32) -> bool {
        self.raster.get_pixel(x, y).0[0] >= self.threshold && !self.visited[self.index(x, y)]
    }

    fn claim(&mut self, x: u32, y: u32) {
        let i = self.index(x, y);
        self.visited[i] = true;
    }

    fn next_from(&self, x: u32, y: u32) -> Option<(u32, u32)> {
        let (w, h) = (i64::from(self.raster.width()), i64::from(self.raster.height()));
        NEIGHBORS.iter().find_map(|&(dx, dy)| {
            let nx = i64::from(x) + dx;
            let ny = i64::from(y) + dy;
            if !(0..w).contains(&nx) || !(0..h).contains(&ny) {
                return None;
            }
            let (nx, ny) = (u32::try_from(nx).ok()?, u32::try_from(ny).ok()?);
            self.is_free(nx, ny).then_some((nx, ny))
        })
    }

    /// Follow unvisited neighbours from `(x, y)` until the chain ends.
    fn walk(&mut self, mut x: u32, mut y: u32) -> Vec<(u32, u32)> {
        let mut chain = Vec::new();
        while let Some((nx, ny)) = self.next_from(x, y) {
            self.claim(nx, ny);
            chain.push((nx, ny));
            (x, y) = (nx, ny);
        }
        chain
    }
}

fn trace_chains(raster: &GrayImage, threshold: u8) -> Vec<EdgePath> {
    let (w, h) = raster.dimensions();
    let mut walker = Walker {
        raster,
        threshold,
        visited: vec![false; w as usize * h as usize],
    };
    let mut paths = Vec::new();
    for y in 0..h {
        for x in 0..w {
            if !walker.is_free(x, y) {
                continue;
            }
            walker.claim(x, y);
            let forward = walker.walk(x, y);
            let backward = walker.walk(x, y);
            let points = backward
                .iter()
                .rev()
                .chain(std::iter::once(&(x, y)))
                .chain(forward.iter())
                .map(|&(px, py)| edge_point(raster, px, py))
                .collect();
            paths.push(EdgePath::new(points));
        }
    }
    paths
}

/// Suzuki-Abe border following via `imageproc::contours::find_contours`.
fn trace_border_following(raster: &GrayImage, threshold: u8) -> Vec<EdgePath> {
    let binary = GrayImage::from_fn(raster.width(), raster.height(), |x, y| {
        image::Luma([if raster.get_pixel(x, y).0[0] >= threshold { 255 } else { 0 }])
    });
    let contours: Vec<imageproc::contours::Contour<u32>> =
        imageproc::contours::find_contours(&binary);

    contours
        .into_iter()
        .filter(|c| c.points.len() >= 2)
        .map(|c| {
            let points = c
                .points
                .into_iter()
                .map(|p| edge_point(raster, p.x, p.y))
                .collect();
            EdgePath::new(points)
        })
        .collect()
}
