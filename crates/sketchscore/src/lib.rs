//! sketchscore — geometric scoring engine for hand-drawn task responses.
//!
//! Takes raster images of pen-on-paper style drawings and scores them
//! against the task that prompted them. The pipeline stages are:
//!
//! 1. **Preprocess** – decode, resize to the canonical canvas, binarize
//!    (Otsu or alpha), extract a foreground-restricted edge map.
//! 2. **Align** – register a patient drawing onto a template: feature
//!    homography (FAST + binary descriptors + RANSAC) with a bounding-box
//!    similarity fallback.
//! 3. **Similarity** – Dice / SSIM / PSNR composite for figure copies.
//! 4. **Clock** – dial search, multi-pass hand detection with cascading
//!    fallbacks, minute/hour pairing, tolerance evaluation.
//! 5. **Shape** – circle/square/triangle fit: IoU, circularity, interior
//!    angles, side regularity.
//!
//! # Public API
//! - [`Scorer`] as the primary entry point
//! - [`ScoreConfig`] for advanced tuning
//! - per-task result structures ([`ClockAnalysisResult`], [`FigureScore`],
//!   [`ShapeScore`])
//!
//! Only undecodable input surfaces as an error; geometric degeneracies
//! degrade scores and append diagnostic reasons instead.

pub mod align;
mod api;
pub mod clock;
mod config;
pub mod contour;
mod error;
pub mod overlay;
pub mod preprocess;
pub mod shape;
pub mod similarity;
#[cfg(test)]
pub(crate) mod test_utils;

pub use align::{AlignConfig, Alignment, AlignmentTransform};
pub use api::Scorer;
pub use clock::{ClockAnalysisResult, ClockConfig, DialGeometry, HandCandidate, HandReading};
pub use config::ScoreConfig;
pub use error::ScoreError;
pub use preprocess::{Preprocessed, PreprocessConfig};
pub use shape::{ShapeKind, ShapeScore, ShapeTarget, ShapeWeights};
pub use similarity::{FigureScore, SimilarityWeights};
