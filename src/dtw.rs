//! Dynamic Time Warping distance and distance→similarity conversion.
//!
//! Grounded on the flat-`Vec` cumulative-cost matrix from
//! `saorsa-labs-fae`'s `wakeword::dtw_distance`, extended with a
//! Sakoe-Chiba band constraint and hard memory caps enforced before any
//! allocation (spec 4.C).

use crate::config::MatcherConfig;
use crate::error::MatcherError;
use crate::features::FeatureMatrix;

/// Result of comparing two feature matrices: the path-length-normalized
/// DTW distance plus the similarity score derived from it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DtwResult {
    pub distance: f32,
    pub similarity: f64,
}

/// Compare `a` against `b` (spec 4.C). Step 1: trim both to `cfg.max_frames`,
/// then if the cell budget still exceeds `cfg.max_cells`, shrink both to
/// `min(floor(sqrt(MAX_CELLS)), Tx, Ty)` — a precision/latency trade-off, not
/// a failure. Step 2: reject empty or non-finite matrices. Step 3-4: banded
/// DTW, then distance→similarity.
pub fn compare(a: &FeatureMatrix, b: &FeatureMatrix, scale: f64, cfg: &MatcherConfig) -> Result<DtwResult, MatcherError> {
    if a.is_empty() || b.is_empty() {
        return Err(MatcherError::DtwFailed("empty feature matrix".into()));
    }
    if !a.is_finite() || !b.is_finite() {
        return Err(MatcherError::DtwFailed("feature matrix contains NaN/Inf".into()));
    }
    if a.dim() != b.dim() {
        return Err(MatcherError::DtwFailed(format!(
            "dimension mismatch: {} vs {}",
            a.dim(),
            b.dim()
        )));
    }

    let mut n = a.n_frames().min(cfg.max_frames);
    let mut m = b.n_frames().min(cfg.max_frames);

    if let Some(cells) = n.checked_mul(m) {
        if cells > cfg.max_cells {
            let side = (cfg.max_cells as f64).sqrt().floor() as usize;
            n = side.min(n);
            m = side.min(m);
        }
    } else {
        let side = (cfg.max_cells as f64).sqrt().floor() as usize;
        n = side.min(n);
        m = side.min(m);
    }
    n = n.max(1);
    m = m.max(1);

    let distance = dtw_distance(&a.frames[..n], &b.frames[..m], cfg.sakoe_chiba_band);
    let similarity = distance_to_similarity(distance, scale);

    Ok(DtwResult { distance, similarity })
}

/// Band-constrained DTW distance, normalized by path length.
///
/// `band` is the Sakoe-Chiba radius: cell `(i, j)` is only reachable when
/// `|i - j| <= band` (scaled by the length ratio when `n != m`), matching
/// the teacher's full-matrix recurrence but skipping cells outside the band.
fn dtw_distance(a: &[Vec<f32>], b: &[Vec<f32>], band: usize) -> f32 {
    let n = a.len();
    let m = b.len();

    let mut cost = vec![f32::MAX; (n + 1) * (m + 1)];
    let idx = |i: usize, j: usize| i * (m + 1) + j;
    cost[idx(0, 0)] = 0.0;

    let ratio = m as f32 / n as f32;

    for i in 1..=n {
        let center = ((i - 1) as f32 * ratio).round() as isize;
        let lo = (center - band as isize).max(0) as usize;
        let hi = ((center + band as isize).max(0) as usize).min(m - 1);

        for j in lo.max(1)..=hi.max(1).min(m) {
            let d = euclidean_distance(&a[i - 1], &b[j - 1]);
            let prev = cost[idx(i - 1, j)]
                .min(cost[idx(i, j - 1)])
                .min(cost[idx(i - 1, j - 1)]);
            if prev < f32::MAX {
                cost[idx(i, j)] = d + prev;
            }
        }
    }

    let total = cost[idx(n, m)];
    if total >= f32::MAX {
        // Band excluded the final cell (pathological aspect ratio); fall
        // back to an unconstrained pass rather than report a bogus score.
        return dtw_distance_unbanded(a, b);
    }
    total / (n + m) as f32
}

fn dtw_distance_unbanded(a: &[Vec<f32>], b: &[Vec<f32>]) -> f32 {
    let n = a.len();
    let m = b.len();
    let mut cost = vec![f32::MAX; (n + 1) * (m + 1)];
    let idx = |i: usize, j: usize| i * (m + 1) + j;
    cost[idx(0, 0)] = 0.0;

    for i in 1..=n {
        for j in 1..=m {
            let d = euclidean_distance(&a[i - 1], &b[j - 1]);
            let prev = cost[idx(i - 1, j)]
                .min(cost[idx(i, j - 1)])
                .min(cost[idx(i - 1, j - 1)]);
            cost[idx(i, j)] = d + prev;
        }
    }
    cost[idx(n, m)] / (n + m) as f32
}

fn euclidean_distance(x: &[f32], y: &[f32]) -> f32 {
    x.iter()
        .zip(y.iter())
        .map(|(&a, &b)| (a - b) * (a - b))
        .sum::<f32>()
        .sqrt()
}

/// Map a DTW distance to a 0-100 similarity score via exponential decay:
/// `100 * exp(-distance / scale)`. `scale` is the per-feature constant from
/// `cfg.scale` (spec 4.C) — smaller scale means distance penalizes harder.
fn distance_to_similarity(distance: f32, scale: f64) -> f64 {
    let d = distance as f64;
    (100.0 * (-d / scale).exp()).clamp(0.0, 100.0)
}
