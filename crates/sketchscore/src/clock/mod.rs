//! Clock Drawing Test analysis.
//!
//! State machine: dial search → hand search → pair selection → evaluation.
//! Every stage degrades gracefully: a missing dial or missing hands produces
//! a failed result with reasons, never an error.
//!
//! Angle convention everywhere: 0° points to 12 o'clock, increasing
//! clockwise, normalized to [0, 360).

mod dial;
mod hands;
mod pair;

pub use dial::DialGeometry;
pub use hands::{HandCandidate, HandStrategy};
pub use pair::expected_angles;

use crate::preprocess::Preprocessed;

/// One Hough relaxation level for the hand line search.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LinePassConfig {
    /// Hough accumulator vote threshold.
    pub vote_threshold: u32,
    /// Minimum accepted segment length, as a fraction of the dial radius.
    pub min_length_frac: f64,
    /// Maximum gap bridged when tracing a segment, in pixels.
    pub max_gap_px: f64,
    /// Maximum line-to-center distance, as a fraction of the dial radius.
    pub center_tol_frac: f64,
}

/// Clock analysis controls.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Block radius of the adaptive threshold used for dial search.
    pub adaptive_block_radius: u32,
    /// Minimum dial contour area as a fraction of the image area.
    pub min_dial_area_fraction: f64,
    /// Minimum dial circularity for a passing result.
    pub min_dial_circularity: f64,
    /// Inner bound of the hand-search annulus (fraction of dial radius).
    pub annulus_inner_frac: f64,
    /// Outer bound of the hand-search annulus (fraction of dial radius).
    pub annulus_outer_frac: f64,
    /// A hand's nearer endpoint must lie within this fraction of the radius.
    pub near_endpoint_max_frac: f64,
    /// A hand's farther endpoint must lie beyond this fraction of the radius.
    pub far_endpoint_min_frac: f64,
    /// Ordered Hough passes, strictest first.
    pub line_passes: Vec<LinePassConfig>,
    /// Candidates closer than this angular separation are merged.
    pub dedup_separation_deg: f64,
    /// Maximum surviving candidates handed to pair selection.
    pub max_candidates: usize,
    /// Inner bound of the radial energy band (fraction of dial radius).
    pub radial_band_inner_frac: f64,
    /// Outer bound of the radial energy band (fraction of dial radius).
    pub radial_band_outer_frac: f64,
    /// Suppression window applied around the strongest radial peak.
    pub radial_suppression_deg: f64,
    /// Length of the primary synthetic ray (fraction of dial radius).
    pub synthetic_primary_frac: f64,
    /// Length of the secondary synthetic ray (fraction of dial radius).
    pub synthetic_secondary_frac: f64,
    /// Maximum accepted minute-hand angular error, degrees.
    pub minute_tolerance_deg: f64,
    /// Maximum accepted hour-hand angular error, degrees.
    pub hour_tolerance_deg: f64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            adaptive_block_radius: 16,
            min_dial_area_fraction: 0.02,
            min_dial_circularity: 0.70,
            annulus_inner_frac: 0.07,
            annulus_outer_frac: 0.85,
            near_endpoint_max_frac: 0.18,
            far_endpoint_min_frac: 0.40,
            line_passes: vec![
                LinePassConfig {
                    vote_threshold: 60,
                    min_length_frac: 0.45,
                    max_gap_px: 4.0,
                    center_tol_frac: 0.10,
                },
                LinePassConfig {
                    vote_threshold: 45,
                    min_length_frac: 0.40,
                    max_gap_px: 6.0,
                    center_tol_frac: 0.14,
                },
                LinePassConfig {
                    vote_threshold: 30,
                    min_length_frac: 0.32,
                    max_gap_px: 8.0,
                    center_tol_frac: 0.18,
                },
                LinePassConfig {
                    vote_threshold: 20,
                    min_length_frac: 0.25,
                    max_gap_px: 10.0,
                    center_tol_frac: 0.25,
                },
            ],
            dedup_separation_deg: 6.0,
            max_candidates: 6,
            radial_band_inner_frac: 0.10,
            radial_band_outer_frac: 0.55,
            radial_suppression_deg: 15.0,
            synthetic_primary_frac: 0.95,
            synthetic_secondary_frac: 0.60,
            minute_tolerance_deg: 15.0,
            hour_tolerance_deg: 20.0,
        }
    }
}

/// Detected minute/hour reading with per-hand angular errors.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HandReading {
    /// Detected minute-hand angle, degrees.
    pub minute_angle_deg: f64,
    /// Detected hour-hand angle, degrees.
    pub hour_angle_deg: f64,
    /// Wrap-aware error of the minute hand against the expected angle.
    pub minute_error_deg: f64,
    /// Wrap-aware error of the hour hand against the expected angle.
    pub hour_error_deg: f64,
}

/// Full clock analysis result.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ClockAnalysisResult {
    /// Dial geometry, when a dial was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dial: Option<DialGeometry>,
    /// Expected minute-hand angle for the requested time.
    pub expected_minute_angle_deg: f64,
    /// Expected hour-hand angle for the requested time.
    pub expected_hour_angle_deg: f64,
    /// Detected reading, when two hands could be paired.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reading: Option<HandReading>,
    /// Candidates that survived dedup (for diagnostics and overlays).
    pub candidates: Vec<HandCandidate>,
    /// Overall pass/fail verdict.
    pub passed: bool,
    /// Ordered human-readable findings.
    pub reasons: Vec<String>,
}

/// Normalize an angle in degrees into [0, 360).
pub fn normalize_deg(angle: f64) -> f64 {
    let a = angle % 360.0;
    if a < 0.0 {
        a + 360.0
    } else {
        a
    }
}

/// Clock-convention angle of `p` as seen from `center`:
/// 0° at 12 o'clock, increasing clockwise.
pub fn clock_angle_deg(center: [f64; 2], p: [f64; 2]) -> f64 {
    let dx = p[0] - center[0];
    let dy = p[1] - center[1];
    // Image y grows downward, so "up" is -dy.
    normalize_deg(dx.atan2(-dy).to_degrees())
}

/// Smallest angular distance between two directions, in [0, 180].
pub fn angular_error_deg(a: f64, b: f64) -> f64 {
    let d = (normalize_deg(a) - normalize_deg(b)).abs();
    d.min(360.0 - d)
}

/// Analyze a preprocessed clock drawing against an expected time.
pub fn analyze_clock(
    pre: &Preprocessed,
    hour: u32,
    minute: u32,
    config: &ClockConfig,
) -> ClockAnalysisResult {
    let (expected_minute, expected_hour) = expected_angles(hour, minute);
    let mut reasons = Vec::new();

    let Some(dial) = dial::find_dial(pre, config) else {
        reasons.push("no dial contour found (largest blob below area threshold)".to_string());
        tracing::info!("clock analysis aborted: no dial");
        return ClockAnalysisResult {
            dial: None,
            expected_minute_angle_deg: expected_minute,
            expected_hour_angle_deg: expected_hour,
            reading: None,
            candidates: Vec::new(),
            passed: false,
            reasons,
        };
    };
    tracing::debug!(
        cx = dial.center[0],
        cy = dial.center[1],
        radius = dial.radius,
        circularity = dial.circularity,
        "dial located"
    );

    let candidates = hands::detect_hand_candidates(pre, &dial, config);
    tracing::debug!(n_candidates = candidates.len(), "hand search complete");

    let selected = pair::select_pair(&candidates, expected_minute, expected_hour);
    let reading = selected.map(|(minute_hand, hour_hand)| HandReading {
        minute_angle_deg: minute_hand.angle_deg,
        hour_angle_deg: hour_hand.angle_deg,
        minute_error_deg: angular_error_deg(minute_hand.angle_deg, expected_minute),
        hour_error_deg: angular_error_deg(hour_hand.angle_deg, expected_hour),
    });

    let mut passed = true;
    if dial.circularity < config.min_dial_circularity {
        passed = false;
        reasons.push(format!(
            "dial not sufficiently circular ({:.2} < {:.2})",
            dial.circularity, config.min_dial_circularity
        ));
    }
    match &reading {
        Some(r) => {
            if r.minute_error_deg > config.minute_tolerance_deg {
                passed = false;
                reasons.push(format!(
                    "minute hand off by {:.1}° (tolerance {:.0}°)",
                    r.minute_error_deg, config.minute_tolerance_deg
                ));
            }
            if r.hour_error_deg > config.hour_tolerance_deg {
                passed = false;
                reasons.push(format!(
                    "hour hand off by {:.1}° (tolerance {:.0}°)",
                    r.hour_error_deg, config.hour_tolerance_deg
                ));
            }
        }
        None => {
            passed = false;
            reasons.push("fewer than two clock hands detected".to_string());
        }
    }

    tracing::info!(passed, n_reasons = reasons.len(), "clock analysis complete");
    ClockAnalysisResult {
        dial: Some(dial),
        expected_minute_angle_deg: expected_minute,
        expected_hour_angle_deg: expected_hour,
        reading,
        candidates,
        passed,
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::preprocess::{preprocess_decoded, PreprocessConfig};
    use crate::test_utils::draw_clock;

    fn analyze(hour: u32, minute: u32) -> ClockAnalysisResult {
        let img = draw_clock(512, hour, minute);
        let pre = preprocess_decoded(
            &image::DynamicImage::ImageLuma8(img),
            &PreprocessConfig::default(),
        );
        analyze_clock(&pre, hour, minute, &ClockConfig::default())
    }

    #[test]
    fn angle_normalization() {
        assert_relative_eq!(normalize_deg(-90.0), 270.0);
        assert_relative_eq!(normalize_deg(360.0), 0.0);
        assert_relative_eq!(normalize_deg(725.0), 5.0);
    }

    #[test]
    fn clock_angle_convention() {
        let c = [100.0, 100.0];
        assert_relative_eq!(clock_angle_deg(c, [100.0, 50.0]), 0.0); // up
        assert_relative_eq!(clock_angle_deg(c, [150.0, 100.0]), 90.0); // right
        assert_relative_eq!(clock_angle_deg(c, [100.0, 150.0]), 180.0); // down
        assert_relative_eq!(clock_angle_deg(c, [50.0, 100.0]), 270.0); // left
    }

    #[test]
    fn angular_error_wraps() {
        assert_relative_eq!(angular_error_deg(350.0, 10.0), 20.0);
        assert_relative_eq!(angular_error_deg(10.0, 350.0), 20.0);
        assert_relative_eq!(angular_error_deg(0.0, 180.0), 180.0);
    }

    #[test]
    fn twelve_o_clock_passes_with_zero_errors() {
        let result = analyze(12, 0);
        let dial = result.dial.as_ref().expect("dial found");
        assert!(dial.circularity >= 0.70, "dial circularity {}", dial.circularity);
        let reading = result.reading.as_ref().expect("hands paired");
        assert!(reading.minute_error_deg <= 3.0, "minute err {}", reading.minute_error_deg);
        assert!(reading.hour_error_deg <= 3.0, "hour err {}", reading.hour_error_deg);
        assert!(result.passed, "reasons: {:?}", result.reasons);
    }

    #[test]
    fn ten_past_ten_detects_both_hands() {
        let result = analyze(10, 10);
        assert_relative_eq!(result.expected_minute_angle_deg, 60.0);
        assert_relative_eq!(result.expected_hour_angle_deg, 305.0);
        let reading = result.reading.as_ref().expect("hands paired");
        assert!(
            reading.minute_error_deg <= 15.0,
            "minute err {}",
            reading.minute_error_deg
        );
        assert!(
            reading.hour_error_deg <= 20.0,
            "hour err {}",
            reading.hour_error_deg
        );
        assert!(result.passed, "reasons: {:?}", result.reasons);
    }

    #[test]
    fn wrong_time_fails_with_reason() {
        // Hands drawn at 3:00 but 9:00 requested: minute matches, hour 180° off.
        let img = draw_clock(512, 3, 0);
        let pre = preprocess_decoded(
            &image::DynamicImage::ImageLuma8(img),
            &PreprocessConfig::default(),
        );
        let result = analyze_clock(&pre, 9, 0, &ClockConfig::default());
        assert!(!result.passed);
        assert!(result
            .reasons
            .iter()
            .any(|r| r.contains("hour hand off")));
    }

    #[test]
    fn blank_image_reports_missing_dial() {
        let pre = preprocess_decoded(
            &image::DynamicImage::ImageLuma8(image::GrayImage::from_pixel(
                256,
                256,
                image::Luma([255u8]),
            )),
            &PreprocessConfig::default(),
        );
        let result = analyze_clock(&pre, 10, 10, &ClockConfig::default());
        assert!(!result.passed);
        assert!(result.dial.is_none());
        assert!(!result.reasons.is_empty());
    }

    #[test]
    fn all_candidate_angles_are_normalized() {
        let result = analyze(10, 10);
        for c in &result.candidates {
            assert!((0.0..360.0).contains(&c.angle_deg), "angle {}", c.angle_deg);
        }
    }
}
