//! Engine-wide configuration.

use crate::align::AlignConfig;
use crate::clock::ClockConfig;
use crate::preprocess::PreprocessConfig;
use crate::shape::ShapeWeights;
use crate::similarity::SimilarityWeights;

/// Full configuration of the scoring engine.
///
/// Every knob has a calibrated default; construct with
/// `ScoreConfig::default()` and override the sections that matter.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ScoreConfig {
    /// Decode, resize, binarize, edge-extract.
    pub preprocess: PreprocessConfig,
    /// Patient-to-template registration.
    pub align: AlignConfig,
    /// Figure-reproduction similarity weights.
    pub similarity: SimilarityWeights,
    /// Clock Drawing Test analysis.
    pub clock: ClockConfig,
    /// Shape fit weights.
    pub shape: ShapeWeights,
}
