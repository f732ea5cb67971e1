//! Path ordering: reorder and orient traced paths so each one starts near
//! where the previous one ended.
//!
//! Uses a nearest-neighbor greedy heuristic on path endpoints. Each path
//! may be reversed to shorten the gap from the previous path's end. When
//! paths are later merged into one connected stroke, shorter gaps mean
//! fewer breaks and shorter bridges.

use crate::types::{EdgePath, Point};

/// Reorder and orient paths to minimize the total gap between them.
///
/// Starting from the first path, greedily visits the nearest unvisited
/// path, reversing it if its end is closer than its start.
///
/// Empty paths are filtered out.
#[must_use = "returns the reordered paths"]
pub fn optimize_path_order(paths: &[EdgePath]) -> Vec<EdgePath> {
    let candidates: Vec<&EdgePath> = paths.iter().filter(|p| !p.is_empty()).collect();
    let Some(&first) = candidates.first() else {
        return Vec::new();
    };

    let n = candidates.len();
    let mut visited = vec![false; n];
    let mut result = Vec::with_capacity(n);

    visited[0] = true;
    result.push(first.clone());

    for _ in 1..n {
        let current_end = result
            .last()
            .and_then(EdgePath::last)
            .unwrap_or(Point::new(0.0, 0.0));

        let mut best: Option<(usize, bool)> = None;
        let mut best_dist = f64::INFINITY;

        for (j, candidate) in candidates.iter().enumerate() {
            if visited[j] {
                continue;
            }
            let (Some(start), Some(end)) = (candidate.first(), candidate.last()) else {
                continue;
            };

            let dist_forward = current_end.distance_squared(start);
            let dist_reverse = current_end.distance_squared(end);
            let (dist, reversed) = if dist_forward <= dist_reverse {
                (dist_forward, false)
            } else {
                (dist_reverse, true)
            };

            if dist < best_dist {
                best_dist = dist;
                best = Some((j, reversed));
            }
        }

        let Some((best_idx, reversed)) = best else {
            continue;
        };
        visited[best_idx] = true;
        result.push(if reversed {
            candidates[best_idx].reversed()
        } else {
            candidates[best_idx].clone()
        });
    }

    result
}
