//! Raster preprocessing: decode, canonical resize, foreground mask, edge map.
//!
//! Every scoring call starts here. The output buffers are exclusively owned
//! by the call; nothing is cached or shared across requests.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::{close, dilate};

use crate::error::ScoreError;

/// Configuration for raster preprocessing.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Canonical square resolution every input is resized to.
    pub canvas_size: u32,
    /// Gaussian blur sigma applied before thresholding and edge detection.
    pub blur_sigma: f32,
    /// Canny low threshold.
    pub canny_low: f32,
    /// Canny high threshold.
    pub canny_high: f32,
    /// Radius (LInf) of the morphological closing that removes speckle
    /// from the foreground mask.
    pub close_radius: u8,
    /// Radius (L1) of the dilation applied to the raw Canny output.
    pub edge_dilate_radius: u8,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            canvas_size: 512,
            blur_sigma: 1.4,
            canny_low: 40.0,
            canny_high: 110.0,
            close_radius: 1,
            edge_dilate_radius: 1,
        }
    }
}

/// Canonical-resolution views derived from one input image.
///
/// `mask` holds ink as 255 on a 0 background; `edges` is the dilated Canny
/// map intersected with `mask` to suppress background noise.
#[derive(Debug, Clone)]
pub struct Preprocessed {
    /// Grayscale image at canvas resolution.
    pub gray: GrayImage,
    /// Binary foreground mask (ink = 255).
    pub mask: GrayImage,
    /// Edge map restricted to foreground.
    pub edges: GrayImage,
}

impl Preprocessed {
    /// Canvas width/height (always square).
    pub fn size(&self) -> u32 {
        self.gray.width()
    }
}

/// Decode image bytes and derive the canonical gray/mask/edge views.
///
/// Fails only on undecodable or empty input; every downstream degeneracy is
/// handled by the scoring stages.
pub fn preprocess(bytes: &[u8], config: &PreprocessConfig) -> Result<Preprocessed, ScoreError> {
    if bytes.is_empty() {
        return Err(ScoreError::Decode("empty input".into()));
    }
    let decoded =
        image::load_from_memory(bytes).map_err(|err| ScoreError::Decode(err.to_string()))?;
    if decoded.width() == 0 || decoded.height() == 0 {
        return Err(ScoreError::Decode("zero-sized image".into()));
    }
    Ok(preprocess_decoded(&decoded, config))
}

/// Derive canonical views from an already-decoded image.
pub fn preprocess_decoded(decoded: &DynamicImage, config: &PreprocessConfig) -> Preprocessed {
    let side = config.canvas_size.max(1);
    let resized = decoded.resize_exact(side, side, FilterType::Triangle);
    let gray = resized.to_luma8();

    let mask = if has_meaningful_alpha(&resized) {
        mask_from_alpha(&resized, config)
    } else {
        mask_from_otsu(&gray, config)
    };

    let edges = edge_map(&gray, &mask, config);
    tracing::debug!(
        side,
        foreground_px = count_on(&mask),
        edge_px = count_on(&edges),
        "preprocess complete"
    );

    Preprocessed { gray, mask, edges }
}

/// True when the image carries an alpha channel with at least one
/// transparent pixel. Fully opaque alpha carries no foreground information.
fn has_meaningful_alpha(img: &DynamicImage) -> bool {
    let rgba = match img {
        DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageLumaA16(_)
        | DynamicImage::ImageRgba8(_)
        | DynamicImage::ImageRgba16(_)
        | DynamicImage::ImageRgba32F(_) => img.to_rgba8(),
        _ => return false,
    };
    rgba.pixels().any(|p| p.0[3] == 0)
}

fn mask_from_alpha(img: &DynamicImage, config: &PreprocessConfig) -> GrayImage {
    let rgba = img.to_rgba8();
    let (w, h) = rgba.dimensions();
    let mut mask = GrayImage::new(w, h);
    for (x, y, p) in rgba.enumerate_pixels() {
        let on = if p.0[3] > 0 { 255u8 } else { 0u8 };
        mask.put_pixel(x, y, Luma([on]));
    }
    close(&mask, Norm::LInf, config.close_radius)
}

/// Otsu-threshold the blurred grayscale, inverted so ink becomes white.
///
/// On near-uniform input Otsu has no valley to split and can label the whole
/// canvas as ink; a drawing never covers the full canvas, so such a mask is
/// replaced by an empty one.
fn mask_from_otsu(gray: &GrayImage, config: &PreprocessConfig) -> GrayImage {
    let blurred = gaussian_blur_f32(gray, config.blur_sigma);
    let level = otsu_level(&blurred);
    let (w, h) = blurred.dimensions();
    let mut mask = GrayImage::new(w, h);
    for (x, y, p) in blurred.enumerate_pixels() {
        let on = if p.0[0] <= level { 255u8 } else { 0u8 };
        mask.put_pixel(x, y, Luma([on]));
    }
    let total = u64::from(w) * u64::from(h);
    if count_on(&mask) * 100 > total * 85 {
        return GrayImage::new(w, h);
    }
    close(&mask, Norm::LInf, config.close_radius)
}

fn edge_map(gray: &GrayImage, mask: &GrayImage, config: &PreprocessConfig) -> GrayImage {
    let blurred = gaussian_blur_f32(gray, config.blur_sigma);
    let raw = canny(&blurred, config.canny_low, config.canny_high);
    let dilated = dilate(&raw, Norm::L1, config.edge_dilate_radius);
    intersect(&dilated, mask)
}

/// Pixel-wise AND of two binary images.
pub(crate) fn intersect(a: &GrayImage, b: &GrayImage) -> GrayImage {
    debug_assert_eq!(a.dimensions(), b.dimensions());
    let (w, h) = a.dimensions();
    let mut out = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let on = a.get_pixel(x, y)[0] > 0 && b.get_pixel(x, y)[0] > 0;
            out.put_pixel(x, y, Luma([if on { 255 } else { 0 }]));
        }
    }
    out
}

/// Count foreground pixels of a binary image.
pub(crate) fn count_on(img: &GrayImage) -> u64 {
    img.pixels().filter(|p| p.0[0] > 0).count() as u64
}
