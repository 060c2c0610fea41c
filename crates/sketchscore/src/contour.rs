//! Contour extraction and derived geometry.
//!
//! Contours are closed ordered integer point sequences extracted from binary
//! masks. All derived quantities tolerate degenerate inputs (< 3 points)
//! without panicking; callers substitute penalty values where needed.

use imageproc::contours::{find_contours, BorderType};

use image::GrayImage;

/// Axis-aligned bounding box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BoundingBox {
    /// Minimum x.
    pub min_x: f64,
    /// Minimum y.
    pub min_y: f64,
    /// Maximum x.
    pub max_x: f64,
    /// Maximum y.
    pub max_y: f64,
}

impl BoundingBox {
    /// Box center.
    pub fn center(&self) -> [f64; 2] {
        [
            0.5 * (self.min_x + self.max_x),
            0.5 * (self.min_y + self.max_y),
        ]
    }

    /// Box width.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Box height.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Longest side, used by the similarity-transform fallback.
    pub fn max_side(&self) -> f64 {
        self.width().max(self.height())
    }
}

/// A closed drawn outline with its derived geometry.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DrawnContour {
    /// Ordered boundary points.
    pub points: Vec<[f64; 2]>,
}

impl DrawnContour {
    /// Build from integer boundary points.
    pub fn new(points: Vec<[f64; 2]>) -> Self {
        Self { points }
    }

    /// Number of boundary points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when the contour has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Enclosed area via the shoelace formula. Zero for degenerate contours.
    pub fn area(&self) -> f64 {
        if self.points.len() < 3 {
            return 0.0;
        }
        let mut sum = 0.0;
        for i in 0..self.points.len() {
            let [x0, y0] = self.points[i];
            let [x1, y1] = self.points[(i + 1) % self.points.len()];
            sum += x0 * y1 - x1 * y0;
        }
        (sum * 0.5).abs()
    }

    /// Mean of the boundary points. `[0, 0]` when empty.
    pub fn centroid(&self) -> [f64; 2] {
        if self.points.is_empty() {
            return [0.0, 0.0];
        }
        let n = self.points.len() as f64;
        let (sx, sy) = self
            .points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p[0], sy + p[1]));
        [sx / n, sy / n]
    }

    /// Mean distance from the centroid to the boundary.
    pub fn mean_radius(&self) -> f64 {
        if self.points.is_empty() {
            return 0.0;
        }
        let [cx, cy] = self.centroid();
        let sum: f64 = self
            .points
            .iter()
            .map(|p| ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt())
            .sum();
        sum / self.points.len() as f64
    }

    /// Circularity = area / (π r²) with r the mean centroid distance.
    ///
    /// 1.0 for an ideal circle, lower for everything else. Clamped to [0, 1];
    /// degenerate contours yield 0.
    pub fn circularity(&self) -> f64 {
        let r = self.mean_radius();
        if r <= f64::EPSILON {
            return 0.0;
        }
        (self.area() / (std::f64::consts::PI * r * r)).clamp(0.0, 1.0)
    }

    /// Bounding box, or `None` when the contour is empty.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        if self.points.is_empty() {
            return None;
        }
        let mut bb = BoundingBox {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        };
        for &[x, y] in &self.points {
            bb.min_x = bb.min_x.min(x);
            bb.min_y = bb.min_y.min(y);
            bb.max_x = bb.max_x.max(x);
            bb.max_y = bb.max_y.max(y);
        }
        Some(bb)
    }
}

/// Extract all outer (external) contours of a binary mask.
pub fn outer_contours(mask: &GrayImage) -> Vec<DrawnContour> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer)
        .map(|c| {
            DrawnContour::new(
                c.points
                    .iter()
                    .map(|p| [f64::from(p.x), f64::from(p.y)])
                    .collect(),
            )
        })
        .collect()
}

/// Largest-area outer contour of a mask, if any foreground exists.
pub fn largest_outer_contour(mask: &GrayImage) -> Option<DrawnContour> {
    outer_contours(mask)
        .into_iter()
        .max_by(|a, b| a.area().partial_cmp(&b.area()).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::test_utils::filled_disc_mask;

    fn unit_square() -> DrawnContour {
        DrawnContour::new(vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]])
    }

    #[test]
    fn shoelace_area_of_square() {
        assert_relative_eq!(unit_square().area(), 100.0);
    }

    #[test]
    fn centroid_of_square() {
        let c = unit_square().centroid();
        assert_relative_eq!(c[0], 5.0);
        assert_relative_eq!(c[1], 5.0);
    }

    #[test]
    fn degenerate_contour_has_zero_area_and_circularity() {
        let degenerate = DrawnContour::new(vec![[1.0, 1.0], [2.0, 2.0]]);
        assert_relative_eq!(degenerate.area(), 0.0);
        assert_relative_eq!(degenerate.circularity(), 0.0);
        assert!(degenerate.bounding_box().is_some());
        assert!(DrawnContour::new(vec![]).bounding_box().is_none());
    }

    #[test]
    fn circle_contour_is_nearly_circular() {
        let n = 360;
        let pts: Vec<[f64; 2]> = (0..n)
            .map(|i| {
                let t = 2.0 * std::f64::consts::PI * i as f64 / n as f64;
                [100.0 + 50.0 * t.cos(), 100.0 + 50.0 * t.sin()]
            })
            .collect();
        let c = DrawnContour::new(pts);
        assert!(c.circularity() > 0.98, "got {}", c.circularity());
        assert_relative_eq!(c.mean_radius(), 50.0, epsilon = 0.1);
    }

    #[test]
    fn largest_outer_contour_finds_the_disc() {
        let mask = filled_disc_mask(128, [64.0, 64.0], 30.0);
        let c = largest_outer_contour(&mask).expect("disc contour");
        let [cx, cy] = c.centroid();
        assert_relative_eq!(cx, 64.0, epsilon = 2.0);
        assert_relative_eq!(cy, 64.0, epsilon = 2.0);
        assert!(c.circularity() > 0.9, "got {}", c.circularity());
    }
}
