//! Bounding-box similarity fallback for alignment.
//!
//! Used whenever feature matching cannot support a homography. Scales the
//! patient's largest foreground box onto the template's and centers it;
//! rotation is fixed at zero. Always produces a transform.

use image::GrayImage;

use crate::contour::largest_outer_contour;

/// Similarity transform parameters: uniform scale followed by translation.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SimilarityParams {
    /// Uniform scale.
    pub scale: f64,
    /// Translation x (applied after scaling).
    pub tx: f64,
    /// Translation y (applied after scaling).
    pub ty: f64,
}

impl SimilarityParams {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            scale: 1.0,
            tx: 0.0,
            ty: 0.0,
        }
    }

    /// Map a patient-frame point into the template frame.
    pub fn apply(&self, p: [f64; 2]) -> [f64; 2] {
        [self.scale * p[0] + self.tx, self.scale * p[1] + self.ty]
    }
}

/// Estimate the similarity transform mapping the patient's largest
/// foreground bounding box onto the template's.
///
/// Falls back to the identity when either mask is empty (a blank drawing
/// cannot be centered; downstream metrics already penalize it).
pub fn similarity_from_bounding_boxes(
    template_mask: &GrayImage,
    patient_mask: &GrayImage,
) -> SimilarityParams {
    let (Some(t_box), Some(p_box)) = (
        largest_outer_contour(template_mask).and_then(|c| c.bounding_box()),
        largest_outer_contour(patient_mask).and_then(|c| c.bounding_box()),
    ) else {
        return SimilarityParams::identity();
    };

    let p_size = p_box.max_side();
    if p_size < 1.0 {
        return SimilarityParams::identity();
    }
    let scale = t_box.max_side() / p_size;

    let [tcx, tcy] = t_box.center();
    let [pcx, pcy] = p_box.center();
    SimilarityParams {
        scale,
        tx: tcx - scale * pcx,
        ty: tcy - scale * pcy,
    }
}
