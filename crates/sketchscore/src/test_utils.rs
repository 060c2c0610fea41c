//! Synthetic drawing builders shared by the unit tests.

use image::{DynamicImage, GrayImage, Luma};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut};

/// PNG-encode a grayscale image.
pub(crate) fn encode_png(img: &GrayImage) -> Vec<u8> {
    let mut out = std::io::Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(img.clone())
        .write_to(&mut out, image::ImageFormat::Png)
        .expect("png encode");
    out.into_inner()
}

/// White canvas with a black filled disc. A radius below one pixel leaves
/// the canvas blank.
pub(crate) fn white_canvas_with_disc(size: u32, center: [f64; 2], radius: f64) -> GrayImage {
    let mut img = GrayImage::from_pixel(size, size, Luma([255u8]));
    if radius >= 1.0 {
        draw_filled_circle_mut(
            &mut img,
            (center[0].round() as i32, center[1].round() as i32),
            radius.round() as i32,
            Luma([0u8]),
        );
    }
    img
}

/// Binary mask (white-on-black) of a filled disc.
pub(crate) fn filled_disc_mask(size: u32, center: [f64; 2], radius: f64) -> GrayImage {
    let mut mask = GrayImage::new(size, size);
    draw_filled_circle_mut(
        &mut mask,
        (center[0].round() as i32, center[1].round() as i32),
        radius.round() as i32,
        Luma([255u8]),
    );
    mask
}

/// Coarse random black/white grid. Non-repeating, so every corner's
/// neighborhood is unique — useful for descriptor matching tests.
pub(crate) fn random_grid(size: u32, cell: u32, seed: u64) -> GrayImage {
    use rand::prelude::*;
    let cells = size.div_ceil(cell);
    let mut rng = StdRng::seed_from_u64(seed);
    let values: Vec<u8> = (0..cells * cells)
        .map(|_| if rng.gen_bool(0.5) { 255 } else { 0 })
        .collect();
    GrayImage::from_fn(size, size, |x, y| {
        Luma([values[((y / cell) * cells + x / cell) as usize]])
    })
}

/// Alternating black/white checkerboard, a dense corner source.
pub(crate) fn checkerboard(size: u32, cell: u32) -> GrayImage {
    GrayImage::from_fn(size, size, |x, y| {
        if ((x / cell) + (y / cell)) % 2 == 0 {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// White canvas with a black circle outline of the given stroke thickness.
pub(crate) fn white_canvas_with_circle_outline(
    size: u32,
    center: [f64; 2],
    radius: f64,
    thickness: i32,
) -> GrayImage {
    let mut img = GrayImage::from_pixel(size, size, Luma([255u8]));
    stroke_circle(&mut img, center, radius, thickness);
    img
}

/// White canvas with a black polygon outline of the given stroke thickness.
pub(crate) fn outline_polygon(size: u32, vertices: &[[f64; 2]], thickness: i32) -> GrayImage {
    let mut img = GrayImage::from_pixel(size, size, Luma([255u8]));
    for i in 0..vertices.len() {
        stroke_segment(
            &mut img,
            vertices[i],
            vertices[(i + 1) % vertices.len()],
            thickness,
        );
    }
    img
}

/// Hand-drawn-style clock: hollow dial plus minute and hour hands at the
/// angles the requested time implies.
pub(crate) fn draw_clock(size: u32, hour: u32, minute: u32) -> GrayImage {
    let mut img = GrayImage::from_pixel(size, size, Luma([255u8]));
    let c = f64::from(size) / 2.0;
    let radius = 0.39 * f64::from(size);
    stroke_circle(&mut img, [c, c], radius, 2);

    let minute_deg = f64::from(minute % 60) * 6.0;
    let hour_deg = f64::from(hour % 12) * 30.0 + f64::from(minute % 60) * 0.5;
    stroke_ray(&mut img, [c, c], minute_deg, 0.80 * radius, 2);
    stroke_ray(&mut img, [c, c], hour_deg, 0.55 * radius, 2);
    img
}

/// Stroke a ray from `origin` at a clock-convention angle (0° = up,
/// clockwise) with round pen tips.
fn stroke_ray(img: &mut GrayImage, origin: [f64; 2], angle_deg: f64, length: f64, pen: i32) {
    let a = angle_deg.to_radians();
    let dir = [a.sin(), -a.cos()];
    let steps = length.ceil() as u32;
    for s in 0..=steps {
        let t = f64::from(s);
        let x = (origin[0] + t * dir[0]).round() as i32;
        let y = (origin[1] + t * dir[1]).round() as i32;
        draw_filled_circle_mut(img, (x, y), pen, Luma([0u8]));
    }
}

fn stroke_segment(img: &mut GrayImage, a: [f64; 2], b: [f64; 2], pen: i32) {
    let len = ((b[0] - a[0]).powi(2) + (b[1] - a[1]).powi(2)).sqrt();
    let steps = len.ceil().max(1.0) as u32;
    for s in 0..=steps {
        let t = f64::from(s) / f64::from(steps);
        let x = (a[0] + t * (b[0] - a[0])).round() as i32;
        let y = (a[1] + t * (b[1] - a[1])).round() as i32;
        draw_filled_circle_mut(img, (x, y), pen, Luma([0u8]));
    }
}

fn stroke_circle(img: &mut GrayImage, center: [f64; 2], radius: f64, pen: i32) {
    let c = (center[0].round() as i32, center[1].round() as i32);
    let r = radius.round() as i32;
    // Concentric hollow circles close the Bresenham gaps a thick pen needs.
    for dr in -pen..=pen {
        if r + dr > 0 {
            draw_hollow_circle_mut(img, c, r + dr, Luma([0u8]));
        }
    }
}
