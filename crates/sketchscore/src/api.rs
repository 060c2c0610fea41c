//! High-level scoring API.
//!
//! [`Scorer`] is the primary entry point. It wraps a [`ScoreConfig`] and
//! exposes one method per task, each taking raw image bytes. Create once,
//! score many drawings.

use crate::align::{align, warp_to_template};
use crate::clock::{analyze_clock, ClockAnalysisResult};
use crate::config::ScoreConfig;
use crate::error::ScoreError;
use crate::overlay;
use crate::preprocess::preprocess;
use crate::shape::{score_shape, ShapeScore, ShapeTarget};
use crate::similarity::{score_aligned, FigureScore};

/// Primary scoring interface.
///
/// # Examples
///
/// ```no_run
/// use sketchscore::Scorer;
///
/// let scorer = Scorer::new();
/// let bytes = std::fs::read("clock.png").unwrap();
/// let result = scorer.score_clock(&bytes, 10, 10).unwrap();
/// println!("passed: {}", result.passed);
/// ```
pub struct Scorer {
    config: ScoreConfig,
}

impl Scorer {
    /// Create a scorer with default configuration.
    pub fn new() -> Self {
        Self {
            config: ScoreConfig::default(),
        }
    }

    /// Create with full config control.
    pub fn with_config(config: ScoreConfig) -> Self {
        Self { config }
    }

    /// Access the current configuration.
    pub fn config(&self) -> &ScoreConfig {
        &self.config
    }

    /// Analyze a clock drawing against an expected time.
    ///
    /// Only undecodable input errors; every analysis failure is reported
    /// through the result's `passed` flag and `reasons`.
    pub fn score_clock(
        &self,
        image_bytes: &[u8],
        hour: u32,
        minute: u32,
    ) -> Result<ClockAnalysisResult, ScoreError> {
        let pre = preprocess(image_bytes, &self.config.preprocess)?;
        Ok(analyze_clock(&pre, hour, minute, &self.config.clock))
    }

    /// [`Self::score_clock`] plus a PNG debug overlay.
    pub fn score_clock_with_overlay(
        &self,
        image_bytes: &[u8],
        hour: u32,
        minute: u32,
    ) -> Result<(ClockAnalysisResult, Vec<u8>), ScoreError> {
        let pre = preprocess(image_bytes, &self.config.preprocess)?;
        let result = analyze_clock(&pre, hour, minute, &self.config.clock);
        let png = overlay::to_png_bytes(&overlay::clock_overlay(&pre, &result))?;
        Ok((result, png))
    }

    /// Score a patient's copy of a template figure.
    pub fn score_figure(
        &self,
        template_bytes: &[u8],
        patient_bytes: &[u8],
    ) -> Result<FigureScore, ScoreError> {
        let template = preprocess(template_bytes, &self.config.preprocess)?;
        let patient = preprocess(patient_bytes, &self.config.preprocess)?;
        let alignment = align(&template, &patient, &self.config.align);
        let warped_edges = warp_to_template(&patient.edges, &alignment.transform);
        Ok(score_aligned(
            &template.edges,
            &warped_edges,
            alignment,
            &self.config.similarity,
        ))
    }

    /// [`Self::score_figure`] plus a PNG debug overlay of the aligned masks.
    pub fn score_figure_with_overlay(
        &self,
        template_bytes: &[u8],
        patient_bytes: &[u8],
    ) -> Result<(FigureScore, Vec<u8>), ScoreError> {
        let template = preprocess(template_bytes, &self.config.preprocess)?;
        let patient = preprocess(patient_bytes, &self.config.preprocess)?;
        let alignment = align(&template, &patient, &self.config.align);
        let warped_edges = warp_to_template(&patient.edges, &alignment.transform);
        let warped_mask = warp_to_template(&patient.mask, &alignment.transform);
        let score = score_aligned(
            &template.edges,
            &warped_edges,
            alignment,
            &self.config.similarity,
        );
        let png = overlay::to_png_bytes(&overlay::figure_overlay(&template.mask, &warped_mask))?;
        Ok((score, png))
    }

    /// Score a drawing against an ideal shape.
    pub fn score_shape(
        &self,
        image_bytes: &[u8],
        target: &ShapeTarget,
    ) -> Result<ShapeScore, ScoreError> {
        let pre = preprocess(image_bytes, &self.config.preprocess)?;
        Ok(score_shape(&pre, target, &self.config.shape))
    }

    /// [`Self::score_shape`] plus a PNG debug overlay.
    pub fn score_shape_with_overlay(
        &self,
        image_bytes: &[u8],
        target: &ShapeTarget,
    ) -> Result<(ShapeScore, Vec<u8>), ScoreError> {
        let pre = preprocess(image_bytes, &self.config.preprocess)?;
        let score = score_shape(&pre, target, &self.config.shape);
        let png = overlay::to_png_bytes(&overlay::shape_overlay(&pre, target))?;
        Ok((score, png))
    }
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{draw_clock, encode_png, white_canvas_with_circle_outline};
    use image::Luma;

    #[test]
    fn clock_end_to_end_passes_for_correct_time() {
        let bytes = encode_png(&draw_clock(512, 10, 10));
        let result = Scorer::new().score_clock(&bytes, 10, 10).unwrap();
        assert!(result.passed, "reasons: {:?}", result.reasons);
    }

    #[test]
    fn identical_figure_scores_high() {
        let bytes = encode_png(&draw_clock(512, 3, 0));
        let score = Scorer::new().score_figure(&bytes, &bytes).unwrap();
        assert!(score.final_score >= 90, "score {}", score.final_score);
    }

    #[test]
    fn blank_patient_figure_scores_low_with_reason() {
        let template = encode_png(&draw_clock(512, 3, 0));
        let blank = encode_png(&image::GrayImage::from_pixel(512, 512, Luma([255u8])));
        let score = Scorer::new().score_figure(&template, &blank).unwrap();
        assert!(score.final_score <= 40, "score {}", score.final_score);
        assert!(score
            .reasons
            .iter()
            .any(|r| r.contains("blank or nearly blank")));
    }

    #[test]
    fn undecodable_bytes_error_out() {
        let err = Scorer::new().score_clock(&[0xde, 0xad], 1, 30).unwrap_err();
        assert!(matches!(err, ScoreError::Decode(_)));
    }

    #[test]
    fn shape_overlay_variant_returns_png() {
        let bytes = encode_png(&white_canvas_with_circle_outline(
            256,
            [128.0, 128.0],
            80.0,
            3,
        ));
        let target = ShapeTarget::Circle {
            center: [256.0, 256.0],
            radius: 160.0,
        };
        let (_, png) = Scorer::new()
            .score_shape_with_overlay(&bytes, &target)
            .unwrap();
        assert_eq!(&png[..4], &[0x89, b'P', b'N', b'G']);
    }
}
