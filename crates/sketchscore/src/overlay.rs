//! Debug overlay rendering.
//!
//! Overlays paint the analysis on top of the preprocessed drawing so a
//! reviewer can see what the engine actually detected: dial circle and hand
//! rays for clocks, drawn contour against the ideal outline for shapes, and
//! a channel-coded mask comparison for figure copies.

use image::{GrayImage, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use crate::clock::ClockAnalysisResult;
use crate::contour::largest_outer_contour;
use crate::error::ScoreError;
use crate::preprocess::Preprocessed;
use crate::shape::ShapeTarget;

const DIAL: Rgb<u8> = Rgb([0, 170, 0]);
const DETECTED: Rgb<u8> = Rgb([220, 0, 0]);
const EXPECTED: Rgb<u8> = Rgb([0, 90, 220]);
const CANDIDATE: Rgb<u8> = Rgb([230, 150, 0]);
const CONTOUR: Rgb<u8> = Rgb([220, 0, 0]);
const IDEAL: Rgb<u8> = Rgb([0, 90, 220]);
const BBOX: Rgb<u8> = Rgb([0, 170, 0]);

/// PNG-encode an overlay.
pub fn to_png_bytes(overlay: &RgbImage) -> Result<Vec<u8>, ScoreError> {
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(overlay.clone())
        .write_to(&mut out, image::ImageFormat::Png)
        .map_err(|e| ScoreError::Encode(e.to_string()))?;
    Ok(out.into_inner())
}

/// Clock overlay: dial circle, surviving candidates, the selected hands,
/// and the expected hand directions.
pub fn clock_overlay(pre: &Preprocessed, result: &ClockAnalysisResult) -> RgbImage {
    let mut img = gray_to_rgb(&pre.gray);

    let Some(dial) = &result.dial else {
        return img;
    };
    draw_hollow_circle_mut(
        &mut img,
        (dial.center[0].round() as i32, dial.center[1].round() as i32),
        dial.radius.round() as i32,
        DIAL,
    );

    for c in &result.candidates {
        draw_line_segment_mut(
            &mut img,
            (c.origin[0] as f32, c.origin[1] as f32),
            (c.far[0] as f32, c.far[1] as f32),
            CANDIDATE,
        );
    }

    draw_ray(
        &mut img,
        dial.center,
        result.expected_minute_angle_deg,
        0.90 * dial.radius,
        EXPECTED,
    );
    draw_ray(
        &mut img,
        dial.center,
        result.expected_hour_angle_deg,
        0.60 * dial.radius,
        EXPECTED,
    );
    if let Some(reading) = &result.reading {
        draw_ray(
            &mut img,
            dial.center,
            reading.minute_angle_deg,
            0.90 * dial.radius,
            DETECTED,
        );
        draw_ray(
            &mut img,
            dial.center,
            reading.hour_angle_deg,
            0.60 * dial.radius,
            DETECTED,
        );
    }
    img
}

/// Shape overlay: the drawn contour and its bounding box against the ideal
/// primitive's outline.
pub fn shape_overlay(pre: &Preprocessed, target: &ShapeTarget) -> RgbImage {
    let mut img = gray_to_rgb(&pre.gray);

    match target {
        ShapeTarget::Circle { center, radius } => {
            draw_hollow_circle_mut(
                &mut img,
                (center[0].round() as i32, center[1].round() as i32),
                radius.round() as i32,
                IDEAL,
            );
        }
        ShapeTarget::Square { vertices } | ShapeTarget::Triangle { vertices } => {
            draw_closed_polyline(&mut img, vertices, IDEAL);
        }
    }

    if let Some(contour) = largest_outer_contour(&pre.mask) {
        for p in &contour.points {
            let (x, y) = (p[0].round() as i64, p[1].round() as i64);
            if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
                img.put_pixel(x as u32, y as u32, CONTOUR);
            }
        }
        if let Some(bb) = contour.bounding_box() {
            let w = bb.width().max(1.0).round() as u32;
            let h = bb.height().max(1.0).round() as u32;
            draw_hollow_rect_mut(
                &mut img,
                Rect::at(bb.min_x.round() as i32, bb.min_y.round() as i32).of_size(w, h),
                BBOX,
            );
        }
    }
    img
}

/// Figure overlay: template ink in blue, aligned patient ink in red,
/// agreement in magenta, on the template background.
pub fn figure_overlay(template_mask: &GrayImage, aligned_patient_mask: &GrayImage) -> RgbImage {
    let (w, h) = template_mask.dimensions();
    RgbImage::from_fn(w, h, |x, y| {
        let on_t = template_mask.get_pixel(x, y)[0] > 0;
        let on_p = aligned_patient_mask
            .get_pixel_checked(x, y)
            .map_or(false, |p| p.0[0] > 0);
        match (on_t, on_p) {
            (true, true) => Rgb([200, 0, 200]),
            (true, false) => Rgb([0, 90, 220]),
            (false, true) => Rgb([220, 0, 0]),
            (false, false) => Rgb([255, 255, 255]),
        }
    })
}

fn gray_to_rgb(gray: &GrayImage) -> RgbImage {
    RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y)[0];
        Rgb([v, v, v])
    })
}

/// Ray from `origin` at a clock-convention angle (0° = up, clockwise).
fn draw_ray(img: &mut RgbImage, origin: [f64; 2], angle_deg: f64, length: f64, color: Rgb<u8>) {
    let a = angle_deg.to_radians();
    let end = (
        (origin[0] + length * a.sin()) as f32,
        (origin[1] - length * a.cos()) as f32,
    );
    draw_line_segment_mut(img, (origin[0] as f32, origin[1] as f32), end, color);
}

fn draw_closed_polyline(img: &mut RgbImage, vertices: &[[f64; 2]], color: Rgb<u8>) {
    for i in 0..vertices.len() {
        let a = vertices[i];
        let b = vertices[(i + 1) % vertices.len()];
        draw_line_segment_mut(
            img,
            (a[0] as f32, a[1] as f32),
            (b[0] as f32, b[1] as f32),
            color,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{analyze_clock, ClockConfig};
    use crate::preprocess::{preprocess_decoded, PreprocessConfig};
    use crate::test_utils::{draw_clock, filled_disc_mask};

    #[test]
    fn clock_overlay_paints_colored_pixels() {
        let img = draw_clock(512, 10, 10);
        let pre = preprocess_decoded(
            &image::DynamicImage::ImageLuma8(img),
            &PreprocessConfig::default(),
        );
        let result = analyze_clock(&pre, 10, 10, &ClockConfig::default());
        let overlay = clock_overlay(&pre, &result);
        let colored = overlay
            .pixels()
            .filter(|p| !(p.0[0] == p.0[1] && p.0[1] == p.0[2]))
            .count();
        assert!(colored > 100, "only {colored} colored pixels");
    }

    #[test]
    fn figure_overlay_codes_agreement_and_disagreement() {
        let t = filled_disc_mask(64, [30.0, 32.0], 10.0);
        let p = filled_disc_mask(64, [34.0, 32.0], 10.0);
        let overlay = figure_overlay(&t, &p);
        let has = |c: Rgb<u8>| overlay.pixels().any(|p| *p == c);
        assert!(has(Rgb([200, 0, 200])), "no agreement pixels");
        assert!(has(Rgb([0, 90, 220])), "no template-only pixels");
        assert!(has(Rgb([220, 0, 0])), "no patient-only pixels");
    }

    #[test]
    fn png_bytes_carry_the_signature() {
        let overlay = RgbImage::from_pixel(8, 8, Rgb([1, 2, 3]));
        let bytes = to_png_bytes(&overlay).unwrap();
        assert_eq!(&bytes[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    }
}
