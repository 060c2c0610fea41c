//! Dial search: locate the drawn clock face.

use imageproc::contrast::adaptive_threshold;
use imageproc::filter::gaussian_blur_f32;

use image::{GrayImage, Luma};

use super::ClockConfig;
use crate::contour::outer_contours;
use crate::preprocess::Preprocessed;

/// Located dial: center, mean radius, and contour circularity.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct DialGeometry {
    /// Dial center in canvas pixels.
    pub center: [f64; 2],
    /// Mean distance from center to the dial outline.
    pub radius: f64,
    /// Circularity of the dial contour (1.0 = ideal circle).
    pub circularity: f64,
}

/// Find the dial as the largest sufficiently-big external contour of the
/// adaptively-thresholded drawing.
///
/// Returns `None` when nothing reaches the area floor — the caller records
/// the diagnostic reason.
pub fn find_dial(pre: &Preprocessed, config: &ClockConfig) -> Option<DialGeometry> {
    let ink = adaptive_ink(&pre.gray, config.adaptive_block_radius);
    let (w, h) = ink.dimensions();
    let min_area = config.min_dial_area_fraction * f64::from(w) * f64::from(h);

    outer_contours(&ink)
        .into_iter()
        .filter(|c| c.area() >= min_area)
        .max_by(|a, b| a.area().partial_cmp(&b.area()).unwrap())
        .map(|c| DialGeometry {
            center: c.centroid(),
            radius: c.mean_radius(),
            circularity: c.circularity(),
        })
}

/// Adaptive-threshold the blurred grayscale into an ink-as-white map.
///
/// `adaptive_threshold` marks pixels at or above the local mean as white;
/// drawn strokes are dark, so the result is inverted.
fn adaptive_ink(gray: &GrayImage, block_radius: u32) -> GrayImage {
    let blurred = gaussian_blur_f32(gray, 1.2);
    let thresholded = adaptive_threshold(&blurred, block_radius);
    let (w, h) = thresholded.dimensions();
    let mut ink = GrayImage::new(w, h);
    for (x, y, p) in thresholded.enumerate_pixels() {
        ink.put_pixel(x, y, Luma([if p.0[0] > 0 { 0 } else { 255 }]));
    }
    ink
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::preprocess::{preprocess_decoded, PreprocessConfig};
    use crate::test_utils::draw_clock;

    #[test]
    fn finds_the_dial_of_a_synthetic_clock() {
        let img = draw_clock(512, 10, 10);
        let pre = preprocess_decoded(
            &image::DynamicImage::ImageLuma8(img),
            &PreprocessConfig::default(),
        );
        let dial = find_dial(&pre, &ClockConfig::default()).expect("dial");
        assert_relative_eq!(dial.center[0], 256.0, epsilon = 8.0);
        assert_relative_eq!(dial.center[1], 256.0, epsilon = 8.0);
        assert!(dial.radius > 150.0, "radius {}", dial.radius);
        assert!(dial.circularity > 0.8, "circularity {}", dial.circularity);
    }

    #[test]
    fn tiny_blobs_do_not_qualify() {
        // A single small dot is below the 2% area floor.
        let mut img = image::GrayImage::from_pixel(256, 256, Luma([255u8]));
        imageproc::drawing::draw_filled_circle_mut(&mut img, (128, 128), 5, Luma([0u8]));
        let pre = preprocess_decoded(
            &image::DynamicImage::ImageLuma8(img),
            &PreprocessConfig::default(),
        );
        assert!(find_dial(&pre, &ClockConfig::default()).is_none());
    }
}
