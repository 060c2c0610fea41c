//! Shape fit scoring: compare a drawn contour against an ideal
//! circle/square/triangle and produce a weighted 0–100 score with reasons.

use image::{GrayImage, Luma};
use imageproc::drawing::{draw_filled_circle_mut, draw_polygon_mut};
use imageproc::point::Point;
use rand::prelude::*;

use crate::contour::{largest_outer_contour, DrawnContour};
use crate::preprocess::Preprocessed;
use crate::similarity::clamp01;

/// Target primitive kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ShapeKind {
    /// Circle task.
    Circle,
    /// Square task (target interior angle 90°).
    Square,
    /// Triangle task (target interior angle 60°).
    Triangle,
}

/// The ideal primitive a drawing is scored against.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum ShapeTarget {
    /// Ideal circle given center and radius, in canvas pixels.
    Circle {
        /// Center.
        center: [f64; 2],
        /// Radius.
        radius: f64,
    },
    /// Ideal square given its vertex list, in canvas pixels.
    Square {
        /// Vertices in drawing order.
        vertices: Vec<[f64; 2]>,
    },
    /// Ideal triangle given its vertex list, in canvas pixels.
    Triangle {
        /// Vertices in drawing order.
        vertices: Vec<[f64; 2]>,
    },
}

impl ShapeTarget {
    /// The primitive kind of this target.
    pub fn kind(&self) -> ShapeKind {
        match self {
            Self::Circle { .. } => ShapeKind::Circle,
            Self::Square { .. } => ShapeKind::Square,
            Self::Triangle { .. } => ShapeKind::Triangle,
        }
    }

}

/// Weights and gates for shape scoring.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ShapeWeights {
    /// Circle: IoU weight.
    pub circle_iou: f64,
    /// Circle: circularity weight.
    pub circle_circularity: f64,
    /// Circle: radial-consistency weight.
    pub circle_radial: f64,
    /// Square and triangle: IoU weight.
    pub polygon_iou: f64,
    /// Square and triangle: angle-score weight.
    pub polygon_angle: f64,
    /// Square and triangle: side-score weight.
    pub polygon_side: f64,
    /// Square: angle RMSE (degrees) that zeroes the angle score.
    pub square_angle_divisor: f64,
    /// Square: side CV that zeroes the side score.
    pub square_side_divisor: f64,
    /// Triangle: angle RMSE (degrees) that zeroes the angle score.
    pub triangle_angle_divisor: f64,
    /// Triangle: side CV that zeroes the side score.
    pub triangle_side_divisor: f64,
    /// Sub-scores below this ratio append an explanatory reason.
    pub reason_threshold: f64,
    /// Douglas–Peucker tolerance as a fraction of the contour bbox diagonal.
    pub simplify_tolerance_frac: f64,
    /// Seed for the minimum-enclosing-circle shuffle.
    pub mec_seed: u64,
}

impl Default for ShapeWeights {
    fn default() -> Self {
        Self {
            circle_iou: 0.6,
            circle_circularity: 0.3,
            circle_radial: 0.1,
            polygon_iou: 0.5,
            polygon_angle: 0.3,
            polygon_side: 0.2,
            square_angle_divisor: 20.0,
            square_side_divisor: 0.25,
            triangle_angle_divisor: 25.0,
            triangle_side_divisor: 0.3,
            reason_threshold: 0.6,
            simplify_tolerance_frac: 0.02,
            mec_seed: 17,
        }
    }
}

/// Shape fit result.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ShapeScore {
    /// Target primitive kind.
    pub kind: ShapeKind,
    /// Mask IoU between the filled drawing and the ideal primitive.
    pub iou: f64,
    /// Area ratio against the minimum enclosing circle (circle tasks).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circularity: Option<f64>,
    /// Interior-angle RMSE in degrees (polygon tasks).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub angle_rmse_deg: Option<f64>,
    /// Side-length coefficient of variation (polygon tasks).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side_cv: Option<f64>,
    /// Composite score, 0–100.
    pub final_score: u32,
    /// Explanatory findings for low sub-scores.
    pub reasons: Vec<String>,
}

/// Angle penalty substituted for degenerate (< 3 point) polygons, degrees.
pub const DEGENERATE_ANGLE_PENALTY_DEG: f64 = 180.0;

/// Score a preprocessed drawing against a target primitive.
pub fn score_shape(pre: &Preprocessed, target: &ShapeTarget, weights: &ShapeWeights) -> ShapeScore {
    let size = pre.size();
    let ideal = ideal_mask(target, size);

    let Some(contour) = largest_outer_contour(&pre.mask) else {
        return ShapeScore {
            kind: target.kind(),
            iou: 0.0,
            circularity: None,
            angle_rmse_deg: None,
            side_cv: None,
            final_score: 0,
            reasons: vec!["no drawn shape found".to_string()],
        };
    };

    let drawn = fill_contour(&contour, size);
    let iou_v = iou(&drawn, &ideal);
    tracing::debug!(kind = ?target.kind(), iou = iou_v, "shape masks compared");

    match target.kind() {
        ShapeKind::Circle => score_circle(&contour, iou_v, weights),
        ShapeKind::Square | ShapeKind::Triangle => {
            score_polygon(&contour, target.kind(), iou_v, weights)
        }
    }
}

fn score_circle(contour: &DrawnContour, iou_v: f64, weights: &ShapeWeights) -> ShapeScore {
    let (_, mec_radius) = min_enclosing_circle(&contour.points, weights.mec_seed);
    let circularity = if mec_radius > f64::EPSILON {
        clamp01(contour.area() / (std::f64::consts::PI * mec_radius * mec_radius))
    } else {
        0.0
    };
    let radial = radial_consistency(contour);

    let mut reasons = Vec::new();
    if iou_v < weights.reason_threshold {
        reasons.push("poor overlap with the ideal circle".to_string());
    }
    if circularity < weights.reason_threshold {
        reasons.push("drawing is not close to circular".to_string());
    }
    if radial < weights.reason_threshold {
        reasons.push("uneven distance from center along the outline".to_string());
    }

    let blended = weights.circle_iou * clamp01(iou_v)
        + weights.circle_circularity * circularity
        + weights.circle_radial * radial;
    ShapeScore {
        kind: ShapeKind::Circle,
        iou: iou_v,
        circularity: Some(circularity),
        angle_rmse_deg: None,
        side_cv: None,
        final_score: (100.0 * clamp01(blended)).round() as u32,
        reasons,
    }
}

fn score_polygon(
    contour: &DrawnContour,
    kind: ShapeKind,
    iou_v: f64,
    weights: &ShapeWeights,
) -> ShapeScore {
    let (target_angle, angle_divisor, side_divisor) = match kind {
        ShapeKind::Square => (90.0, weights.square_angle_divisor, weights.square_side_divisor),
        ShapeKind::Triangle => (
            60.0,
            weights.triangle_angle_divisor,
            weights.triangle_side_divisor,
        ),
        // Circles never reach this path.
        ShapeKind::Circle => return score_circle(contour, iou_v, weights),
    };

    let simplified = simplify_closed(&contour.points, simplify_tolerance(contour, weights));
    let angle_rmse = interior_angle_rmse(&simplified, target_angle);
    let side_cv = side_length_cv(&simplified);

    let angle_score = clamp01(1.0 - angle_rmse / angle_divisor);
    let side_score = clamp01(1.0 - side_cv / side_divisor);

    let mut reasons = Vec::new();
    if iou_v < weights.reason_threshold {
        reasons.push(format!("poor overlap with the ideal {}", kind_name(kind)));
    }
    if angle_score < weights.reason_threshold {
        reasons.push(format!("angles far from {target_angle:.0}°"));
    }
    if side_score < weights.reason_threshold {
        reasons.push("sides are markedly unequal".to_string());
    }

    let blended = weights.polygon_iou * clamp01(iou_v)
        + weights.polygon_angle * angle_score
        + weights.polygon_side * side_score;
    ShapeScore {
        kind,
        iou: iou_v,
        circularity: None,
        angle_rmse_deg: Some(angle_rmse),
        side_cv: Some(side_cv),
        final_score: (100.0 * clamp01(blended)).round() as u32,
        reasons,
    }
}

fn kind_name(kind: ShapeKind) -> &'static str {
    match kind {
        ShapeKind::Circle => "circle",
        ShapeKind::Square => "square",
        ShapeKind::Triangle => "triangle",
    }
}

/// Rasterize the ideal primitive as a filled mask.
pub fn ideal_mask(target: &ShapeTarget, size: u32) -> GrayImage {
    let mut mask = GrayImage::new(size, size);
    match target {
        ShapeTarget::Circle { center, radius } => {
            draw_filled_circle_mut(
                &mut mask,
                (center[0].round() as i32, center[1].round() as i32),
                radius.round() as i32,
                Luma([255u8]),
            );
        }
        ShapeTarget::Square { vertices } | ShapeTarget::Triangle { vertices } => {
            fill_polygon(&mut mask, vertices);
        }
    }
    mask
}

/// Fill a drawn contour into a mask.
fn fill_contour(contour: &DrawnContour, size: u32) -> GrayImage {
    let mut mask = GrayImage::new(size, size);
    fill_polygon(&mut mask, &contour.points);
    mask
}

fn fill_polygon(mask: &mut GrayImage, vertices: &[[f64; 2]]) {
    if vertices.len() < 3 {
        return;
    }
    let mut pts: Vec<Point<i32>> = vertices
        .iter()
        .map(|&[x, y]| Point::new(x.round() as i32, y.round() as i32))
        .collect();
    pts.dedup();
    // draw_polygon_mut requires an open ring.
    if pts.len() > 1 && pts.first() == pts.last() {
        pts.pop();
    }
    if pts.len() < 3 {
        return;
    }
    draw_polygon_mut(mask, &pts, Luma([255u8]));
}

/// IoU of two binary masks; 0 when the union is empty.
pub fn iou(a: &GrayImage, b: &GrayImage) -> f64 {
    debug_assert_eq!(a.dimensions(), b.dimensions());
    let (mut inter, mut union) = (0u64, 0u64);
    for (pa, pb) in a.pixels().zip(b.pixels()) {
        let (on_a, on_b) = (pa.0[0] > 0, pb.0[0] > 0);
        if on_a && on_b {
            inter += 1;
        }
        if on_a || on_b {
            union += 1;
        }
    }
    if union == 0 {
        return 0.0;
    }
    inter as f64 / union as f64
}

/// Minimum enclosing circle via the randomized incremental (Welzl) scheme.
pub fn min_enclosing_circle(points: &[[f64; 2]], seed: u64) -> ([f64; 2], f64) {
    if points.is_empty() {
        return ([0.0, 0.0], 0.0);
    }
    let mut pts = points.to_vec();
    let mut rng = StdRng::seed_from_u64(seed);
    pts.shuffle(&mut rng);

    let inside = |c: ([f64; 2], f64), p: [f64; 2]| {
        ((p[0] - c.0[0]).powi(2) + (p[1] - c.0[1]).powi(2)).sqrt() <= c.1 + 1e-7
    };

    let mut circle = (pts[0], 0.0f64);
    for i in 1..pts.len() {
        if inside(circle, pts[i]) {
            continue;
        }
        circle = (pts[i], 0.0);
        for j in 0..i {
            if inside(circle, pts[j]) {
                continue;
            }
            circle = circle_from_two(pts[i], pts[j]);
            for k in 0..j {
                if inside(circle, pts[k]) {
                    continue;
                }
                circle = circle_from_three(pts[i], pts[j], pts[k]);
            }
        }
    }
    circle
}

fn circle_from_two(a: [f64; 2], b: [f64; 2]) -> ([f64; 2], f64) {
    let center = [0.5 * (a[0] + b[0]), 0.5 * (a[1] + b[1])];
    let r = 0.5 * ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt();
    (center, r)
}

fn circle_from_three(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> ([f64; 2], f64) {
    let d = 2.0 * (a[0] * (b[1] - c[1]) + b[0] * (c[1] - a[1]) + c[0] * (a[1] - b[1]));
    if d.abs() < 1e-9 {
        // Collinear: widest two-point circle encloses all three.
        let ab = circle_from_two(a, b);
        let ac = circle_from_two(a, c);
        let bc = circle_from_two(b, c);
        return [ab, ac, bc]
            .into_iter()
            .max_by(|x, y| x.1.partial_cmp(&y.1).unwrap())
            .unwrap();
    }
    let a2 = a[0] * a[0] + a[1] * a[1];
    let b2 = b[0] * b[0] + b[1] * b[1];
    let c2 = c[0] * c[0] + c[1] * c[1];
    let ux = (a2 * (b[1] - c[1]) + b2 * (c[1] - a[1]) + c2 * (a[1] - b[1])) / d;
    let uy = (a2 * (c[0] - b[0]) + b2 * (a[0] - c[0]) + c2 * (b[0] - a[0])) / d;
    let r = ((a[0] - ux).powi(2) + (a[1] - uy).powi(2)).sqrt();
    ([ux, uy], r)
}

/// clamp01(1 − CV of centroid distances / 0.25): 1 for a perfect circle.
fn radial_consistency(contour: &DrawnContour) -> f64 {
    let [cx, cy] = contour.centroid();
    let dists: Vec<f64> = contour
        .points
        .iter()
        .map(|p| ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt())
        .collect();
    clamp01(1.0 - coefficient_of_variation(&dists) / 0.25)
}

/// stddev/mean; 1.0 (worst case) for degenerate inputs.
fn coefficient_of_variation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 1.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean <= f64::EPSILON {
        return 1.0;
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    var.sqrt() / mean
}

/// RMSE of interior angles against a target angle, degrees.
///
/// Degenerate polygons (< 3 vertices) yield the full 180° penalty.
pub fn interior_angle_rmse(vertices: &[[f64; 2]], target_deg: f64) -> f64 {
    if vertices.len() < 3 {
        return DEGENERATE_ANGLE_PENALTY_DEG;
    }
    let n = vertices.len();
    let mut sq_sum = 0.0;
    for i in 0..n {
        let prev = vertices[(i + n - 1) % n];
        let v = vertices[i];
        let next = vertices[(i + 1) % n];
        let a = [prev[0] - v[0], prev[1] - v[1]];
        let b = [next[0] - v[0], next[1] - v[1]];
        let na = (a[0] * a[0] + a[1] * a[1]).sqrt();
        let nb = (b[0] * b[0] + b[1] * b[1]).sqrt();
        if na <= f64::EPSILON || nb <= f64::EPSILON {
            sq_sum += DEGENERATE_ANGLE_PENALTY_DEG.powi(2);
            continue;
        }
        let cos = ((a[0] * b[0] + a[1] * b[1]) / (na * nb)).clamp(-1.0, 1.0);
        let angle = cos.acos().to_degrees();
        sq_sum += (angle - target_deg).powi(2);
    }
    (sq_sum / n as f64).sqrt()
}

/// Coefficient of variation of consecutive edge lengths. Degenerate
/// polygons yield the worst case, 1.0.
pub fn side_length_cv(vertices: &[[f64; 2]]) -> f64 {
    if vertices.len() < 2 {
        return 1.0;
    }
    let n = vertices.len();
    let lengths: Vec<f64> = (0..n)
        .map(|i| {
            let a = vertices[i];
            let b = vertices[(i + 1) % n];
            ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
        })
        .collect();
    coefficient_of_variation(&lengths).min(1.0)
}

fn simplify_tolerance(contour: &DrawnContour, weights: &ShapeWeights) -> f64 {
    let diag = contour
        .bounding_box()
        .map(|bb| (bb.width().powi(2) + bb.height().powi(2)).sqrt())
        .unwrap_or(0.0);
    (weights.simplify_tolerance_frac * diag).max(1.0)
}

/// Douglas–Peucker simplification of a closed ring.
///
/// The ring is split at its two mutually-farthest extreme points so the
/// open-polyline reduction applies to each half.
pub fn simplify_closed(points: &[[f64; 2]], tolerance: f64) -> Vec<[f64; 2]> {
    if points.len() < 4 {
        return points.to_vec();
    }
    // Extremes: leftmost and the point farthest from it.
    let i0 = (0..points.len())
        .min_by(|&a, &b| points[a][0].partial_cmp(&points[b][0]).unwrap())
        .unwrap();
    let i1 = (0..points.len())
        .max_by(|&a, &b| {
            dist2(points[a], points[i0])
                .partial_cmp(&dist2(points[b], points[i0]))
                .unwrap()
        })
        .unwrap();
    let (lo, hi) = (i0.min(i1), i0.max(i1));

    let first: Vec<[f64; 2]> = points[lo..=hi].to_vec();
    let second: Vec<[f64; 2]> = points[hi..]
        .iter()
        .chain(points[..=lo].iter())
        .copied()
        .collect();

    let mut out = Vec::new();
    let a = rdp(&first, tolerance);
    let b = rdp(&second, tolerance);
    out.extend_from_slice(&a[..a.len().saturating_sub(1)]);
    out.extend_from_slice(&b[..b.len().saturating_sub(1)]);
    out
}

fn rdp(points: &[[f64; 2]], tolerance: f64) -> Vec<[f64; 2]> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let (first, last) = (points[0], points[points.len() - 1]);
    let mut max_d = 0.0;
    let mut idx = 0;
    for (i, &p) in points.iter().enumerate().skip(1).take(points.len() - 2) {
        let d = point_segment_distance(p, first, last);
        if d > max_d {
            max_d = d;
            idx = i;
        }
    }
    if max_d <= tolerance {
        return vec![first, last];
    }
    let mut left = rdp(&points[..=idx], tolerance);
    let right = rdp(&points[idx..], tolerance);
    left.pop();
    left.extend(right);
    left
}

fn point_segment_distance(p: [f64; 2], a: [f64; 2], b: [f64; 2]) -> f64 {
    let ab = [b[0] - a[0], b[1] - a[1]];
    let len2 = ab[0] * ab[0] + ab[1] * ab[1];
    if len2 <= f64::EPSILON {
        return dist2(p, a).sqrt();
    }
    let t = (((p[0] - a[0]) * ab[0] + (p[1] - a[1]) * ab[1]) / len2).clamp(0.0, 1.0);
    let proj = [a[0] + t * ab[0], a[1] + t * ab[1]];
    dist2(p, proj).sqrt()
}

fn dist2(a: [f64; 2], b: [f64; 2]) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)
}
