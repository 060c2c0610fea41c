//! Keypoint detection, binary description, and ratio-test matching.
//!
//! FAST-9 corners from `imageproc` plus a 256-bit BRIEF-style descriptor
//! sampled from the blurred grayscale. Test pairs are generated from a fixed
//! seed so matching is deterministic across runs.

use image::GrayImage;
use imageproc::corners::corners_fast9;
use imageproc::filter::gaussian_blur_f32;
use rand::prelude::*;

/// Feature detection and matching controls.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// FAST-9 intensity threshold.
    pub fast_threshold: u8,
    /// Keep at most this many corners (strongest first).
    pub max_keypoints: usize,
    /// Half-size of the square descriptor patch, in pixels.
    pub patch_radius: i32,
    /// Blur sigma applied before descriptor sampling.
    pub descriptor_blur_sigma: f32,
    /// Nearest/second-nearest Hamming distance ratio gate.
    pub ratio_threshold: f32,
    /// Seed for the descriptor test-pair layout.
    pub pair_seed: u64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            fast_threshold: 20,
            max_keypoints: 500,
            patch_radius: 15,
            descriptor_blur_sigma: 2.0,
            ratio_threshold: 0.75,
            pair_seed: 7,
        }
    }
}

const DESCRIPTOR_WORDS: usize = 4; // 256 bits

/// A keypoint with its 256-bit intensity-comparison descriptor.
#[derive(Debug, Clone)]
pub struct DescribedKeypoint {
    /// Pixel position.
    pub xy: [f64; 2],
    bits: [u64; DESCRIPTOR_WORDS],
}

impl DescribedKeypoint {
    fn hamming(&self, other: &Self) -> u32 {
        self.bits
            .iter()
            .zip(other.bits.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }
}

/// A matched template/patient point pair.
#[derive(Debug, Clone, Copy)]
pub struct Correspondence {
    /// Point in the patient image.
    pub patient: [f64; 2],
    /// Point in the template image.
    pub template: [f64; 2],
}

/// Detect corners and describe them.
///
/// Corners too close to the border for a full descriptor patch are dropped.
pub fn detect_and_describe(gray: &GrayImage, config: &FeatureConfig) -> Vec<DescribedKeypoint> {
    let mut corners = corners_fast9(gray, config.fast_threshold);
    corners.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
    corners.truncate(config.max_keypoints);

    let blurred = gaussian_blur_f32(gray, config.descriptor_blur_sigma);
    let pairs = test_pairs(config);
    let (w, h) = (gray.width() as i32, gray.height() as i32);
    let r = config.patch_radius;

    corners
        .iter()
        .filter(|c| {
            let (x, y) = (c.x as i32, c.y as i32);
            x >= r && y >= r && x + r < w && y + r < h
        })
        .map(|c| {
            let mut bits = [0u64; DESCRIPTOR_WORDS];
            for (i, &([ax, ay], [bx, by])) in pairs.iter().enumerate() {
                let pa = sample(&blurred, c.x as i32 + ax, c.y as i32 + ay);
                let pb = sample(&blurred, c.x as i32 + bx, c.y as i32 + by);
                if pa > pb {
                    bits[i / 64] |= 1u64 << (i % 64);
                }
            }
            DescribedKeypoint {
                xy: [f64::from(c.x), f64::from(c.y)],
                bits,
            }
        })
        .collect()
}

/// Match patient keypoints against template keypoints with the Lowe ratio
/// test: a match is kept only when the best Hamming distance is below
/// `ratio_threshold` times the second-best.
pub fn match_ratio_test(
    patient: &[DescribedKeypoint],
    template: &[DescribedKeypoint],
    config: &FeatureConfig,
) -> Vec<Correspondence> {
    if template.len() < 2 {
        return Vec::new();
    }
    let mut out = Vec::new();
    for p in patient {
        let mut best = u32::MAX;
        let mut second = u32::MAX;
        let mut best_idx = usize::MAX;
        for (j, t) in template.iter().enumerate() {
            let d = p.hamming(t);
            if d < best {
                second = best;
                best = d;
                best_idx = j;
            } else if d < second {
                second = d;
            }
        }
        if best_idx != usize::MAX
            && (best as f32) < config.ratio_threshold * (second.max(1) as f32)
        {
            out.push(Correspondence {
                patient: p.xy,
                template: template[best_idx].xy,
            });
        }
    }
    out
}

/// Fixed seeded test-pair layout inside the descriptor patch.
fn test_pairs(config: &FeatureConfig) -> Vec<([i32; 2], [i32; 2])> {
    let mut rng = StdRng::seed_from_u64(config.pair_seed);
    let r = config.patch_radius;
    (0..DESCRIPTOR_WORDS * 64)
        .map(|_| {
            (
                [rng.gen_range(-r..=r), rng.gen_range(-r..=r)],
                [rng.gen_range(-r..=r), rng.gen_range(-r..=r)],
            )
        })
        .collect()
}

#[inline]
fn sample(img: &GrayImage, x: i32, y: i32) -> u8 {
    // Callers keep patches inside the image.
    img.get_pixel(x as u32, y as u32)[0]
}
