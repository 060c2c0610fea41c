//! Robust homography estimation from matched point pairs.
//!
//! Normalized DLT inside a seeded RANSAC loop with an adaptive iteration
//! bound. The caller decides whether the inlier count is good enough; this
//! module only reports what it found.

use nalgebra::{DMatrix, Matrix3, Vector3};
use rand::prelude::*;

use super::features::Correspondence;

/// RANSAC controls for homography fitting.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RansacHomographyConfig {
    /// Maximum RANSAC iterations.
    pub max_iters: usize,
    /// Reprojection inlier threshold in pixels.
    pub inlier_threshold: f64,
    /// Early-stop confidence for the adaptive iteration bound.
    pub confidence: f64,
    /// RNG seed for minimal-sample selection.
    pub seed: u64,
}

impl Default for RansacHomographyConfig {
    fn default() -> Self {
        Self {
            max_iters: 2000,
            inlier_threshold: 3.0,
            confidence: 0.995,
            seed: 42,
        }
    }
}

/// Fitted homography with its inlier support.
#[derive(Debug, Clone)]
pub struct RansacHomographyResult {
    /// Patient-to-template homography.
    pub h: Matrix3<f64>,
    /// Inlier count under the final model.
    pub n_inliers: usize,
}

/// Fit a patient→template homography robustly.
///
/// Returns `None` with fewer than 4 correspondences or when every sampled
/// model is degenerate.
pub fn fit_homography_ransac(
    matches: &[Correspondence],
    config: &RansacHomographyConfig,
) -> Option<RansacHomographyResult> {
    let n = matches.len();
    if n < 4 {
        return None;
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut best_count = 0usize;
    let mut best_mask: Vec<bool> = vec![false; n];
    let mut max_iters = config.max_iters;

    let mut iter = 0usize;
    while iter < max_iters {
        iter += 1;
        let sample = sample_indices(&mut rng, n, 4);
        let subset: Vec<Correspondence> = sample.iter().map(|&i| matches[i]).collect();
        let Some(h) = fit_homography_dlt(&subset) else {
            continue;
        };

        let mut count = 0usize;
        let mut mask = vec![false; n];
        for (i, m) in matches.iter().enumerate() {
            if reprojection_error(&h, m) < config.inlier_threshold {
                mask[i] = true;
                count += 1;
            }
        }

        if count > best_count {
            best_count = count;
            best_mask = mask;

            // Standard adaptive bound: stop once the chance of having missed
            // an all-inlier sample drops below 1 - confidence.
            let w = count as f64 / n as f64;
            let p_sample = w.powi(4);
            if p_sample > 1e-12 {
                let needed =
                    ((1.0 - config.confidence).ln() / (1.0 - p_sample).ln()).ceil() as usize;
                max_iters = max_iters.min(iter + needed);
            }
        }
    }

    if best_count < 4 {
        return None;
    }

    // Re-fit on all inliers of the best model.
    let inliers: Vec<Correspondence> = best_mask
        .iter()
        .zip(matches.iter())
        .filter(|(&keep, _)| keep)
        .map(|(_, &m)| m)
        .collect();
    let h = fit_homography_dlt(&inliers)?;

    let n_inliers = matches
        .iter()
        .filter(|m| reprojection_error(&h, m) < config.inlier_threshold)
        .count();

    Some(RansacHomographyResult { h, n_inliers })
}

/// Reprojection error of one correspondence under `h` (patient→template).
pub fn reprojection_error(h: &Matrix3<f64>, m: &Correspondence) -> f64 {
    match project(h, m.patient) {
        Some([x, y]) => ((x - m.template[0]).powi(2) + (y - m.template[1]).powi(2)).sqrt(),
        None => f64::INFINITY,
    }
}

/// Apply a homography to a point. `None` when the point maps to infinity.
pub fn project(h: &Matrix3<f64>, p: [f64; 2]) -> Option<[f64; 2]> {
    let v = h * Vector3::new(p[0], p[1], 1.0);
    if v.z.abs() < 1e-12 {
        return None;
    }
    Some([v.x / v.z, v.y / v.z])
}

/// Direct linear transform with Hartley normalization.
fn fit_homography_dlt(matches: &[Correspondence]) -> Option<Matrix3<f64>> {
    let n = matches.len();
    if n < 4 {
        return None;
    }

    let (t_src, src) = normalize(matches.iter().map(|m| m.patient));
    let (t_dst, dst) = normalize(matches.iter().map(|m| m.template));

    let mut a = DMatrix::<f64>::zeros(2 * n, 9);
    for i in 0..n {
        let [x, y] = src[i];
        let [u, v] = dst[i];
        let r0 = [-x, -y, -1.0, 0.0, 0.0, 0.0, u * x, u * y, u];
        let r1 = [0.0, 0.0, 0.0, -x, -y, -1.0, v * x, v * y, v];
        for c in 0..9 {
            a[(i * 2, c)] = r0[c];
            a[(i * 2 + 1, c)] = r1[c];
        }
    }

    let svd = a.svd(false, true);
    let v_t = svd.v_t?;
    let h_vec = v_t.row(v_t.nrows() - 1);
    let h_norm = Matrix3::new(
        h_vec[0], h_vec[1], h_vec[2],
        h_vec[3], h_vec[4], h_vec[5],
        h_vec[6], h_vec[7], h_vec[8],
    );

    // Denormalize: H = T_dst^-1 * Hn * T_src
    let t_dst_inv = t_dst.try_inverse()?;
    let mut h = t_dst_inv * h_norm * t_src;
    if h[(2, 2)].abs() < 1e-12 {
        return None;
    }
    h /= h[(2, 2)];
    Some(h)
}

/// Hartley normalization: translate to centroid, scale mean distance to √2.
fn normalize(points: impl Iterator<Item = [f64; 2]>) -> (Matrix3<f64>, Vec<[f64; 2]>) {
    let pts: Vec<[f64; 2]> = points.collect();
    let n = pts.len() as f64;
    let (cx, cy) = pts
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p[0], sy + p[1]));
    let (cx, cy) = (cx / n, cy / n);
    let mean_dist: f64 = pts
        .iter()
        .map(|p| ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    let s = if mean_dist > 1e-12 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };
    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let out = pts
        .iter()
        .map(|p| [s * (p[0] - cx), s * (p[1] - cy)])
        .collect();
    (t, out)
}

/// Sample `k` distinct indices from `0..n` using Fisher–Yates partial shuffle.
fn sample_indices(rng: &mut impl Rng, n: usize, k: usize) -> Vec<usize> {
    debug_assert!(k <= n);
    let mut indices: Vec<usize> = (0..n).collect();
    for i in 0..k {
        let j = rng.gen_range(i..n);
        indices.swap(i, j);
    }
    indices.truncate(k);
    indices
}
