//! Hand search: cascading detection strategies inside the dial annulus.
//!
//! Ordered strategy chain:
//! 1. Hough line passes with progressively relaxed parameters, run against
//!    both the edge map and a dilated binary map;
//! 2. connected-component analysis for blob-like hands;
//! 3. a radial energy scan with peak suppression;
//! 4. synthetic rays fabricated from the radial peaks.
//!
//! The chain stops as soon as two deduplicated directions survive.

use image::GrayImage;
use imageproc::distance_transform::Norm;
use imageproc::hough::{detect_lines, LineDetectionOptions};
use imageproc::morphology::dilate;
use imageproc::region_labelling::{connected_components, Connectivity};

use super::dial::DialGeometry;
use super::{clock_angle_deg, ClockConfig, LinePassConfig};
use crate::preprocess::{intersect, Preprocessed};

/// Which detection pass produced a hand candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum HandStrategy {
    /// Hough line pass (0 = strictest).
    HoughPass(usize),
    /// Connected-component fallback.
    Component,
    /// Radial energy peak.
    RadialPeak,
    /// Fabricated ray from the radial peaks.
    Synthetic,
}

/// A candidate clock hand.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct HandCandidate {
    /// Endpoint nearest the dial center.
    pub origin: [f64; 2],
    /// Endpoint farthest from the dial center.
    pub far: [f64; 2],
    /// Segment length in pixels.
    pub length: f64,
    /// Direction from dial center to `far`, clock convention, [0, 360).
    pub angle_deg: f64,
    /// Detection pass that produced this candidate.
    pub strategy: HandStrategy,
}

/// Run the full strategy chain and return at most
/// `config.max_candidates` deduplicated candidates.
pub fn detect_hand_candidates(
    pre: &Preprocessed,
    dial: &DialGeometry,
    config: &ClockConfig,
) -> Vec<HandCandidate> {
    let annulus = annulus_mask(
        pre.size(),
        dial.center,
        dial.radius * config.annulus_inner_frac,
        dial.radius * config.annulus_outer_frac,
    );
    let masked_edges = intersect(&pre.edges, &annulus);
    let masked_binary = intersect(&dilate(&pre.mask, Norm::L1, 1), &annulus);

    let mut candidates: Vec<HandCandidate> = Vec::new();
    for (pass_idx, pass) in config.line_passes.iter().enumerate() {
        for source in [&masked_edges, &masked_binary] {
            candidates.extend(hough_candidates(source, dial, pass, pass_idx, config));
        }
        if count_distinct_directions(&candidates, config) >= 2 {
            tracing::debug!(pass_idx, n = candidates.len(), "line pass satisfied");
            break;
        }
    }

    if count_distinct_directions(&candidates, config) < 2 {
        tracing::debug!("line passes insufficient, trying connected components");
        candidates.extend(component_candidates(&masked_binary, dial, config));
    }

    let mut used_radial = false;
    if count_distinct_directions(&candidates, config) < 2 {
        tracing::debug!("component fallback insufficient, trying radial scan");
        candidates.extend(radial_candidates(&masked_binary, dial, config));
        used_radial = true;
    }

    let mut deduped = dedup_candidates(candidates, config.dedup_separation_deg);
    if deduped.len() < 2 && !used_radial {
        // Dedup collapsed the set; the radial scan can still contribute a
        // second independent direction.
        let extra = radial_candidates(&masked_binary, dial, config);
        deduped = dedup_candidates(
            deduped.into_iter().chain(extra).collect(),
            config.dedup_separation_deg,
        );
    }
    if deduped.len() < 2 {
        // Terminal strategy: synthetic rays are appended without angular
        // dedup — overlapping hands legitimately share one direction.
        for c in synthetic_candidates(&masked_binary, dial, config) {
            if deduped.len() >= 2 {
                break;
            }
            deduped.push(c);
        }
    }

    deduped.truncate(config.max_candidates);
    deduped
}

/// Binary annulus between the two radii.
fn annulus_mask(size: u32, center: [f64; 2], r_inner: f64, r_outer: f64) -> GrayImage {
    let mut mask = GrayImage::new(size, size);
    for y in 0..size {
        for x in 0..size {
            let dx = f64::from(x) - center[0];
            let dy = f64::from(y) - center[1];
            let d = (dx * dx + dy * dy).sqrt();
            if d >= r_inner && d <= r_outer {
                mask.put_pixel(x, y, image::Luma([255u8]));
            }
        }
    }
    mask
}

/// Hough pass: detect polar lines, keep those passing near the center, and
/// trace each into one or two radial segments.
fn hough_candidates(
    source: &GrayImage,
    dial: &DialGeometry,
    pass: &LinePassConfig,
    pass_idx: usize,
    config: &ClockConfig,
) -> Vec<HandCandidate> {
    let options = LineDetectionOptions {
        vote_threshold: pass.vote_threshold,
        suppression_radius: 8,
    };
    let lines = detect_lines(source, options);
    let [cx, cy] = dial.center;
    let mut out = Vec::new();

    for line in lines {
        let theta = f64::from(line.angle_in_degrees).to_radians();
        let (cos_t, sin_t) = (theta.cos(), theta.sin());
        let signed = cx * cos_t + cy * sin_t - f64::from(line.r);
        if signed.abs() > pass.center_tol_frac * dial.radius {
            continue;
        }
        // Foot of the perpendicular from the dial center onto the line.
        let foot = [cx - signed * cos_t, cy - signed * sin_t];
        let dir = [-sin_t, cos_t];
        for candidate in trace_segments(source, dial, foot, dir, pass, config) {
            out.push(HandCandidate {
                strategy: HandStrategy::HoughPass(pass_idx),
                ..candidate
            });
        }
    }
    out
}

/// Walk along a line through the annulus and extract up to one radial
/// segment per side of the center, bridging gaps up to `max_gap_px`.
fn trace_segments(
    source: &GrayImage,
    dial: &DialGeometry,
    foot: [f64; 2],
    dir: [f64; 2],
    pass: &LinePassConfig,
    config: &ClockConfig,
) -> Vec<HandCandidate> {
    let r = dial.radius;
    let mut on_ts: Vec<f64> = Vec::new();
    let mut t = -r;
    while t <= r {
        let x = foot[0] + t * dir[0];
        let y = foot[1] + t * dir[1];
        if sample_on(source, x, y) {
            on_ts.push(t);
        }
        t += 1.0;
    }
    if on_ts.is_empty() {
        return Vec::new();
    }

    let mut out = Vec::new();
    for side in [-1.0f64, 1.0f64] {
        let mut side_ts: Vec<f64> = on_ts
            .iter()
            .copied()
            .filter(|&t| t * side >= 0.0)
            .collect();
        if side < 0.0 {
            side_ts.reverse(); // ascending |t|
        }
        // Extend outward from the center until the allowed gap is exceeded.
        let mut extent: Option<(f64, f64)> = None;
        for &t in &side_ts {
            match extent {
                None => {
                    extent = Some((t, t));
                }
                Some((t0, t1)) => {
                    if (t.abs() - t1.abs()) <= pass.max_gap_px {
                        extent = Some((t0, t));
                    } else {
                        break;
                    }
                }
            }
        }
        let Some((t_near, t_far)) = extent else {
            continue;
        };

        let near = [foot[0] + t_near * dir[0], foot[1] + t_near * dir[1]];
        let far = [foot[0] + t_far * dir[0], foot[1] + t_far * dir[1]];
        let near_d = dist(near, dial.center);
        let far_d = dist(far, dial.center);
        let length = dist(near, far);
        if near_d > config.near_endpoint_max_frac * r {
            continue;
        }
        if far_d < config.far_endpoint_min_frac * r {
            continue;
        }
        if length < pass.min_length_frac * r {
            continue;
        }
        out.push(HandCandidate {
            origin: near,
            far,
            length,
            angle_deg: clock_angle_deg(dial.center, far),
            strategy: HandStrategy::HoughPass(0), // overwritten by caller
        });
    }
    out
}

/// Connected-component fallback: keep blobs that touch the center region
/// and reach far enough outward.
fn component_candidates(
    masked_binary: &GrayImage,
    dial: &DialGeometry,
    config: &ClockConfig,
) -> Vec<HandCandidate> {
    let labels = connected_components(masked_binary, Connectivity::Eight, image::Luma([0u8]));
    let mut extremes: std::collections::HashMap<u32, ([f64; 2], f64, [f64; 2], f64)> =
        std::collections::HashMap::new();

    for (x, y, p) in labels.enumerate_pixels() {
        let label = p.0[0];
        if label == 0 {
            continue;
        }
        let pt = [f64::from(x), f64::from(y)];
        let d = dist(pt, dial.center);
        extremes
            .entry(label)
            .and_modify(|(near, near_d, far, far_d)| {
                if d < *near_d {
                    *near = pt;
                    *near_d = d;
                }
                if d > *far_d {
                    *far = pt;
                    *far_d = d;
                }
            })
            .or_insert((pt, d, pt, d));
    }

    extremes
        .into_values()
        .filter(|&(_, near_d, _, far_d)| {
            near_d <= config.near_endpoint_max_frac * dial.radius
                && far_d >= config.far_endpoint_min_frac * dial.radius
        })
        .map(|(near, _, far, _)| HandCandidate {
            origin: near,
            far,
            length: dist(near, far),
            angle_deg: clock_angle_deg(dial.center, far),
            strategy: HandStrategy::Component,
        })
        .collect()
}

/// Radial energy scan: per-degree ink energy inside a near-center band,
/// smoothed; the strongest peak and (after suppression) the second one
/// become hand directions.
fn radial_candidates(
    masked_binary: &GrayImage,
    dial: &DialGeometry,
    config: &ClockConfig,
) -> Vec<HandCandidate> {
    let energy = smoothed_radial_energy(masked_binary, dial, config);

    let Some(primary) = peak_index(&energy, None) else {
        return Vec::new();
    };
    let suppression = config.radial_suppression_deg;
    let secondary = peak_index(&energy, Some((primary as f64, suppression)));

    let mut out = Vec::new();
    for angle_idx in std::iter::once(primary).chain(secondary) {
        let angle = angle_idx as f64;
        if let Some(c) = ray_candidate(masked_binary, dial, angle, config) {
            out.push(c);
        }
    }
    out
}

/// Fabricate two rays from the radial peaks at fixed fractions of the
/// radius. Last-resort strategy; when only a single peak carries energy the
/// drawn hands overlap, so both rays share its direction.
fn synthetic_candidates(
    masked_binary: &GrayImage,
    dial: &DialGeometry,
    config: &ClockConfig,
) -> Vec<HandCandidate> {
    let energy = smoothed_radial_energy(masked_binary, dial, config);
    let Some(primary) = peak_index(&energy, None) else {
        return Vec::new();
    };
    let secondary = peak_index(&energy, Some((primary as f64, config.radial_suppression_deg)))
        .unwrap_or(primary);

    [
        (primary as f64, config.synthetic_primary_frac),
        (secondary as f64, config.synthetic_secondary_frac),
    ]
    .into_iter()
    .map(|(angle, frac)| {
        let far = point_at(dial.center, angle, dial.radius * frac);
        HandCandidate {
            origin: dial.center,
            far,
            length: dial.radius * frac,
            angle_deg: angle,
            strategy: HandStrategy::Synthetic,
        }
    })
    .collect()
}

fn smoothed_radial_energy(
    masked_binary: &GrayImage,
    dial: &DialGeometry,
    config: &ClockConfig,
) -> Vec<f64> {
    let r0 = dial.radius * config.radial_band_inner_frac;
    let r1 = dial.radius * config.radial_band_outer_frac;
    let mut energy = vec![0.0f64; 360];
    for (angle, e) in energy.iter_mut().enumerate() {
        let mut rr = r0;
        while rr <= r1 {
            let p = point_at(dial.center, angle as f64, rr);
            if sample_on(masked_binary, p[0], p[1]) {
                *e += 1.0;
            }
            rr += 1.0;
        }
    }
    // ±2° moving average.
    let n = energy.len();
    (0..n)
        .map(|i| {
            (-2i32..=2)
                .map(|k| energy[(i as i32 + k).rem_euclid(n as i32) as usize])
                .sum::<f64>()
                / 5.0
        })
        .collect()
}

/// Index of the strongest positive bin, optionally suppressing a window
/// around a previous peak.
fn peak_index(energy: &[f64], suppress: Option<(f64, f64)>) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, &e) in energy.iter().enumerate() {
        if e <= 0.0 {
            continue;
        }
        if let Some((center, window)) = suppress {
            let d = (i as f64 - center).abs();
            if d.min(360.0 - d) <= window {
                continue;
            }
        }
        if best.map_or(true, |b| e > energy[b]) {
            best = Some(i);
        }
    }
    best
}

/// Walk outward along a direction and build a candidate from the farthest
/// ink pixel.
fn ray_candidate(
    masked_binary: &GrayImage,
    dial: &DialGeometry,
    angle_deg: f64,
    config: &ClockConfig,
) -> Option<HandCandidate> {
    let mut far_d = 0.0f64;
    let mut rr = dial.radius * config.annulus_inner_frac;
    let r_max = dial.radius * config.annulus_outer_frac;
    let mut gap = 0.0f64;
    while rr <= r_max {
        let p = point_at(dial.center, angle_deg, rr);
        if sample_on(masked_binary, p[0], p[1]) {
            far_d = rr;
            gap = 0.0;
        } else {
            gap += 1.0;
            if far_d > 0.0 && gap > 12.0 {
                break;
            }
        }
        rr += 1.0;
    }
    if far_d < config.far_endpoint_min_frac * dial.radius {
        return None;
    }
    let far = point_at(dial.center, angle_deg, far_d);
    Some(HandCandidate {
        origin: dial.center,
        far,
        length: far_d,
        angle_deg,
        strategy: HandStrategy::RadialPeak,
    })
}

/// Suppress near-duplicate directions: sort longest-first, drop any
/// candidate within `separation_deg` of a kept one.
fn dedup_candidates(mut candidates: Vec<HandCandidate>, separation_deg: f64) -> Vec<HandCandidate> {
    candidates.sort_by(|a, b| b.length.partial_cmp(&a.length).unwrap());
    let mut kept: Vec<HandCandidate> = Vec::new();
    for c in candidates {
        let dup = kept.iter().any(|k| {
            let d = (k.angle_deg - c.angle_deg).abs();
            d.min(360.0 - d) < separation_deg
        });
        if !dup {
            kept.push(c);
        }
    }
    kept
}

fn count_distinct_directions(candidates: &[HandCandidate], config: &ClockConfig) -> usize {
    dedup_candidates(candidates.to_vec(), config.dedup_separation_deg).len()
}

fn point_at(center: [f64; 2], angle_deg: f64, radius: f64) -> [f64; 2] {
    let a = angle_deg.to_radians();
    // Clock convention: 0° is up, clockwise positive, image y grows down.
    [center[0] + radius * a.sin(), center[1] - radius * a.cos()]
}

fn sample_on(img: &GrayImage, x: f64, y: f64) -> bool {
    let (xi, yi) = (x.round() as i64, y.round() as i64);
    if xi < 0 || yi < 0 || xi >= i64::from(img.width()) || yi >= i64::from(img.height()) {
        return false;
    }
    img.get_pixel(xi as u32, yi as u32)[0] > 0
}

fn dist(a: [f64; 2], b: [f64; 2]) -> f64 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::angular_error_deg;
    use crate::preprocess::{preprocess_decoded, PreprocessConfig};
    use crate::test_utils::draw_clock;

    fn candidates_for(hour: u32, minute: u32) -> (Vec<HandCandidate>, DialGeometry) {
        let img = draw_clock(512, hour, minute);
        let pre = preprocess_decoded(
            &image::DynamicImage::ImageLuma8(img),
            &PreprocessConfig::default(),
        );
        let config = ClockConfig::default();
        let dial = super::super::dial::find_dial(&pre, &config).expect("dial");
        (detect_hand_candidates(&pre, &dial, &config), dial)
    }

    #[test]
    fn finds_two_directions_for_ten_past_ten() {
        let (candidates, _) = candidates_for(10, 10);
        assert!(candidates.len() >= 2, "got {} candidates", candidates.len());
        let has_minute = candidates
            .iter()
            .any(|c| angular_error_deg(c.angle_deg, 60.0) <= 15.0);
        let has_hour = candidates
            .iter()
            .any(|c| angular_error_deg(c.angle_deg, 305.0) <= 20.0);
        assert!(has_minute, "no ~60° candidate: {candidates:?}");
        assert!(has_hour, "no ~305° candidate: {candidates:?}");
    }

    #[test]
    fn overlapping_hands_still_give_two_candidates() {
        // Both hands at 12: a single stroke direction must still produce
        // two candidates via the synthetic fallback.
        let (candidates, _) = candidates_for(12, 0);
        assert!(candidates.len() >= 2, "got {candidates:?}");
        for c in &candidates {
            assert!(
                angular_error_deg(c.angle_deg, 0.0) <= 15.0,
                "stray direction: {candidates:?}"
            );
        }
    }

    #[test]
    fn candidate_cap_is_respected() {
        let (candidates, _) = candidates_for(10, 10);
        assert!(candidates.len() <= ClockConfig::default().max_candidates);
    }

    #[test]
    fn dedup_keeps_the_longest_of_a_pair() {
        let mk = |angle_deg: f64, length: f64| HandCandidate {
            origin: [0.0, 0.0],
            far: [0.0, 0.0],
            length,
            angle_deg,
            strategy: HandStrategy::Component,
        };
        let kept = dedup_candidates(vec![mk(10.0, 50.0), mk(12.0, 80.0), mk(100.0, 40.0)], 6.0);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].length, 80.0);
    }
}
