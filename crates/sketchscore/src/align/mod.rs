//! Patient-to-template image registration.
//!
//! Strategy chain: feature-based homography first; when matching or RANSAC
//! support is too weak (< 4 matches or < 10 inliers), the bounding-box
//! similarity fallback takes over. The aligner always returns a transform —
//! poor alignment only degrades downstream scores.

mod bbox_fallback;
mod features;
mod homography;

pub use bbox_fallback::{similarity_from_bounding_boxes, SimilarityParams};
pub use features::{detect_and_describe, match_ratio_test, Correspondence, FeatureConfig};
pub use homography::{
    fit_homography_ransac, project, RansacHomographyConfig, RansacHomographyResult,
};

use image::{GrayImage, Luma};
use imageproc::geometric_transformations::{warp, Interpolation, Projection};
use nalgebra::Matrix3;

use crate::preprocess::Preprocessed;

/// Alignment controls.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AlignConfig {
    /// Feature detection and matching controls.
    pub features: FeatureConfig,
    /// Homography RANSAC controls.
    pub ransac: RansacHomographyConfig,
    /// Minimum ratio-test matches required to attempt a homography.
    pub min_matches: usize,
    /// Minimum RANSAC inliers required to accept a homography.
    pub min_inliers: usize,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            features: FeatureConfig::default(),
            ransac: RansacHomographyConfig::default(),
            min_matches: 4,
            min_inliers: 10,
        }
    }
}

/// The chosen registration transform.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum AlignmentTransform {
    /// Full projective registration (row-major 3×3).
    Homography([[f64; 3]; 3]),
    /// Scale-and-translate fallback.
    Similarity(SimilarityParams),
}

impl AlignmentTransform {
    /// Map a patient-frame point into the template frame.
    pub fn apply(&self, p: [f64; 2]) -> [f64; 2] {
        match self {
            Self::Homography(h) => {
                project(&matrix3_from_array(h), p).unwrap_or([f64::NAN, f64::NAN])
            }
            Self::Similarity(s) => s.apply(p),
        }
    }
}

/// Alignment outcome with match diagnostics.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Alignment {
    /// The accepted transform.
    pub transform: AlignmentTransform,
    /// Ratio-test matches found.
    pub n_matches: usize,
    /// RANSAC inliers of the fitted homography (0 when the fallback ran).
    pub n_inliers: usize,
}

/// Register the patient image onto the template.
///
/// Never fails: when the feature path cannot be trusted the bounding-box
/// similarity estimate is returned instead.
pub fn align(template: &Preprocessed, patient: &Preprocessed, config: &AlignConfig) -> Alignment {
    let t_kps = detect_and_describe(&template.gray, &config.features);
    let p_kps = detect_and_describe(&patient.gray, &config.features);
    let matches = match_ratio_test(&p_kps, &t_kps, &config.features);
    let n_matches = matches.len();

    if n_matches >= config.min_matches {
        if let Some(result) = fit_homography_ransac(&matches, &config.ransac) {
            if result.n_inliers >= config.min_inliers {
                tracing::debug!(
                    n_matches,
                    n_inliers = result.n_inliers,
                    "homography alignment accepted"
                );
                return Alignment {
                    transform: AlignmentTransform::Homography(matrix3_to_array(&result.h)),
                    n_matches,
                    n_inliers: result.n_inliers,
                };
            }
            tracing::debug!(
                n_inliers = result.n_inliers,
                min = config.min_inliers,
                "homography support too weak, using bounding-box fallback"
            );
        }
    } else {
        tracing::debug!(
            n_matches,
            min = config.min_matches,
            "too few feature matches, using bounding-box fallback"
        );
    }

    let sim = similarity_from_bounding_boxes(&template.mask, &patient.mask);
    Alignment {
        transform: AlignmentTransform::Similarity(sim),
        n_matches,
        n_inliers: 0,
    }
}

/// Warp a patient-frame image into the template frame.
///
/// Output has the same dimensions as the input; out-of-frame pixels become
/// background. A non-invertible transform leaves the image untouched.
pub fn warp_to_template(img: &GrayImage, transform: &AlignmentTransform) -> GrayImage {
    let arr: [f32; 9] = match transform {
        AlignmentTransform::Homography(h) => [
            h[0][0] as f32,
            h[0][1] as f32,
            h[0][2] as f32,
            h[1][0] as f32,
            h[1][1] as f32,
            h[1][2] as f32,
            h[2][0] as f32,
            h[2][1] as f32,
            h[2][2] as f32,
        ],
        AlignmentTransform::Similarity(s) => [
            s.scale as f32,
            0.0,
            s.tx as f32,
            0.0,
            s.scale as f32,
            s.ty as f32,
            0.0,
            0.0,
            1.0,
        ],
    };
    match Projection::from_matrix(arr) {
        Some(projection) => warp(img, &projection, Interpolation::Bilinear, Luma([0u8])),
        None => {
            tracing::warn!("non-invertible alignment transform, skipping warp");
            img.clone()
        }
    }
}

fn matrix3_to_array(m: &Matrix3<f64>) -> [[f64; 3]; 3] {
    [
        [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
        [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
        [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
    ]
}

fn matrix3_from_array(a: &[[f64; 3]; 3]) -> Matrix3<f64> {
    Matrix3::new(
        a[0][0], a[0][1], a[0][2], a[1][0], a[1][1], a[1][2], a[2][0], a[2][1], a[2][2],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::preprocess::{preprocess_decoded, PreprocessConfig};
    use crate::test_utils::{filled_disc_mask, white_canvas_with_disc};

    fn preprocessed(img: &image::GrayImage) -> Preprocessed {
        let dynimg = image::DynamicImage::ImageLuma8(img.clone());
        preprocess_decoded(&dynimg, &PreprocessConfig::default())
    }

    #[test]
    fn blank_patient_falls_back_to_similarity() {
        let template = preprocessed(&white_canvas_with_disc(256, [128.0, 128.0], 60.0));
        let patient = preprocessed(&image::GrayImage::from_pixel(256, 256, Luma([255u8])));
        let alignment = align(&template, &patient, &AlignConfig::default());
        assert!(matches!(
            alignment.transform,
            AlignmentTransform::Similarity(_)
        ));
        assert_eq!(alignment.n_inliers, 0);
    }

    #[test]
    fn fallback_centers_patient_on_template() {
        // Feature-poor smooth discs: the homography path cannot gather
        // enough matches, so the bbox similarity must engage and center
        // the patient disc on the template disc.
        let t_mask = filled_disc_mask(256, [130.0, 120.0], 50.0);
        let p_mask = filled_disc_mask(256, [60.0, 200.0], 25.0);
        let sim = similarity_from_bounding_boxes(&t_mask, &p_mask);
        let mapped = sim.apply([60.0, 200.0]);
        assert_relative_eq!(mapped[0], 130.0, epsilon = 1.5);
        assert_relative_eq!(mapped[1], 120.0, epsilon = 1.5);
    }

    #[test]
    fn similarity_warp_moves_foreground() {
        let mask = filled_disc_mask(128, [40.0, 40.0], 15.0);
        let transform = AlignmentTransform::Similarity(SimilarityParams {
            scale: 1.0,
            tx: 30.0,
            ty: 20.0,
        });
        let warped = warp_to_template(&mask, &transform);
        assert_eq!(warped.get_pixel(70, 60)[0], 255);
        assert_eq!(warped.get_pixel(40, 40)[0], 0);
    }
}
