//! Similarity metrics between aligned binary images and the composite
//! figure-reproduction score.

use image::GrayImage;

use crate::align::Alignment;
use crate::preprocess::count_on;

/// Weights and caps for the composite figure score.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SimilarityWeights {
    /// Weight of the Dice overlap term.
    pub dice: f64,
    /// Weight of the rescaled SSIM term.
    pub ssim: f64,
    /// Weight of the normalized PSNR term.
    pub psnr: f64,
    /// PSNR value that saturates the PSNR term, in dB.
    pub psnr_full_scale_db: f64,
    /// Foreground fraction below which a low-confidence reason is recorded.
    pub min_foreground_fraction: f64,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            dice: 0.70,
            ssim: 0.20,
            psnr: 0.10,
            psnr_full_scale_db: 40.0,
            min_foreground_fraction: 0.001,
        }
    }
}

/// Figure-reproduction result.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FigureScore {
    /// Dice coefficient of the aligned edge maps, in [0, 1].
    pub dice: f64,
    /// Global single-window SSIM, roughly in [−1, 1].
    pub ssim: f64,
    /// Peak signal-to-noise ratio in dB, capped at 99.
    pub psnr: f64,
    /// Composite fidelity score, 0–100.
    pub final_score: u32,
    /// How the patient image was registered onto the template.
    pub alignment: Alignment,
    /// Diagnostic notes (low confidence, fallbacks taken).
    pub reasons: Vec<String>,
}

/// PSNR cap used when MSE is negligibly small.
pub const PSNR_CAP_DB: f64 = 99.0;

/// Dice = 2|A∩B| / (|A| + |B|); 1 when both masks are empty.
pub fn dice(a: &GrayImage, b: &GrayImage) -> f64 {
    debug_assert_eq!(a.dimensions(), b.dimensions());
    let mut inter = 0u64;
    for (pa, pb) in a.pixels().zip(b.pixels()) {
        if pa.0[0] > 0 && pb.0[0] > 0 {
            inter += 1;
        }
    }
    let total = count_on(a) + count_on(b);
    if total == 0 {
        return 1.0;
    }
    2.0 * inter as f64 / total as f64
}

/// Global single-window SSIM over the full image.
///
/// Means, variances, and covariance are computed once; the standard local
/// windowing is deliberately omitted.
pub fn ssim_global(a: &GrayImage, b: &GrayImage) -> f64 {
    debug_assert_eq!(a.dimensions(), b.dimensions());
    let n = (a.width() as f64) * (a.height() as f64);
    if n == 0.0 {
        return 1.0;
    }

    let (mut sum_a, mut sum_b) = (0.0f64, 0.0f64);
    for (pa, pb) in a.pixels().zip(b.pixels()) {
        sum_a += f64::from(pa.0[0]);
        sum_b += f64::from(pb.0[0]);
    }
    let (mu_a, mu_b) = (sum_a / n, sum_b / n);

    let (mut var_a, mut var_b, mut cov) = (0.0f64, 0.0f64, 0.0f64);
    for (pa, pb) in a.pixels().zip(b.pixels()) {
        let da = f64::from(pa.0[0]) - mu_a;
        let db = f64::from(pb.0[0]) - mu_b;
        var_a += da * da;
        var_b += db * db;
        cov += da * db;
    }
    var_a /= n;
    var_b /= n;
    cov /= n;

    let c1 = (0.01f64 * 255.0).powi(2);
    let c2 = (0.03f64 * 255.0).powi(2);
    ((2.0 * mu_a * mu_b + c1) * (2.0 * cov + c2))
        / ((mu_a * mu_a + mu_b * mu_b + c1) * (var_a + var_b + c2))
}

/// PSNR in dB, capped at [`PSNR_CAP_DB`] for negligible MSE.
pub fn psnr(a: &GrayImage, b: &GrayImage) -> f64 {
    debug_assert_eq!(a.dimensions(), b.dimensions());
    let n = (a.width() as f64) * (a.height() as f64);
    if n == 0.0 {
        return PSNR_CAP_DB;
    }
    let mut se = 0.0f64;
    for (pa, pb) in a.pixels().zip(b.pixels()) {
        let d = f64::from(pa.0[0]) - f64::from(pb.0[0]);
        se += d * d;
    }
    let mse = se / n;
    if mse < 1e-9 {
        return PSNR_CAP_DB;
    }
    (10.0 * (255.0f64.powi(2) / mse).log10()).min(PSNR_CAP_DB)
}

/// Clamp a ratio into [0, 1].
pub(crate) fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

/// Combine the three metrics into the 0–100 composite.
pub fn composite_score(dice: f64, ssim: f64, psnr: f64, weights: &SimilarityWeights) -> u32 {
    let blended = weights.dice * clamp01(dice)
        + weights.ssim * clamp01((ssim + 1.0) / 2.0)
        + weights.psnr * clamp01(psnr / weights.psnr_full_scale_db);
    (100.0 * clamp01(blended)).round() as u32
}

/// Score an aligned patient edge map against the template edge map.
pub fn score_aligned(
    template_edges: &GrayImage,
    patient_edges_aligned: &GrayImage,
    alignment: Alignment,
    weights: &SimilarityWeights,
) -> FigureScore {
    let dice_v = dice(template_edges, patient_edges_aligned);
    let ssim_v = ssim_global(template_edges, patient_edges_aligned);
    let psnr_v = psnr(template_edges, patient_edges_aligned);

    let mut reasons = Vec::new();
    let total = (template_edges.width() as u64) * (template_edges.height() as u64);
    let patient_fg = count_on(patient_edges_aligned) as f64 / total.max(1) as f64;
    let template_fg = count_on(template_edges) as f64 / total.max(1) as f64;
    if patient_fg < weights.min_foreground_fraction && template_fg >= weights.min_foreground_fraction
    {
        reasons.push("patient drawing is blank or nearly blank; low confidence".to_string());
    }
    if alignment.n_inliers == 0 {
        reasons.push("feature alignment unavailable; bounding-box fallback used".to_string());
    }

    let final_score = composite_score(dice_v, ssim_v, psnr_v, weights);
    tracing::info!(
        dice = dice_v,
        ssim = ssim_v,
        psnr = psnr_v,
        final_score,
        "figure similarity scored"
    );

    FigureScore {
        dice: dice_v,
        ssim: ssim_v,
        psnr: psnr_v,
        final_score,
        alignment,
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::test_utils::filled_disc_mask;

    #[test]
    fn dice_of_identical_masks_is_one() {
        let m = filled_disc_mask(64, [32.0, 32.0], 12.0);
        assert_relative_eq!(dice(&m, &m), 1.0);
    }

    #[test]
    fn dice_of_empty_masks_is_one() {
        let e = GrayImage::new(32, 32);
        assert_relative_eq!(dice(&e, &e), 1.0);
    }

    #[test]
    fn dice_of_disjoint_masks_is_zero() {
        let a = filled_disc_mask(128, [30.0, 30.0], 10.0);
        let b = filled_disc_mask(128, [100.0, 100.0], 10.0);
        assert_relative_eq!(dice(&a, &b), 0.0);
    }

    #[test]
    fn dice_grows_with_overlap() {
        let a = filled_disc_mask(128, [64.0, 64.0], 20.0);
        let near = filled_disc_mask(128, [68.0, 64.0], 20.0);
        let far = filled_disc_mask(128, [90.0, 64.0], 20.0);
        assert!(dice(&a, &near) > dice(&a, &far));
    }

    #[test]
    fn psnr_caps_for_identical_images() {
        let m = filled_disc_mask(64, [32.0, 32.0], 12.0);
        assert_relative_eq!(psnr(&m, &m), PSNR_CAP_DB);
    }

    #[test]
    fn ssim_of_identical_nonuniform_images_is_one() {
        let m = filled_disc_mask(64, [32.0, 32.0], 12.0);
        assert_relative_eq!(ssim_global(&m, &m), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn composite_is_100_for_perfect_metrics() {
        let w = SimilarityWeights::default();
        assert_eq!(composite_score(1.0, 1.0, PSNR_CAP_DB, &w), 100);
    }

    #[test]
    fn composite_is_low_for_blank_patient() {
        let w = SimilarityWeights::default();
        // Blank vs non-blank: dice 0, ssim near 0, psnr low.
        let score = composite_score(0.0, 0.0, 5.0, &w);
        assert!(score <= 15, "got {score}");
    }
}
