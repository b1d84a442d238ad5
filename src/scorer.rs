//! Anomaly scorer seam
//!
//! The trained outlier model is an external collaborator; the engine only
//! depends on this trait and its sign convention.

use crate::encoder::FEATURE_COUNT;

/// Scores a normalized feature vector for anomalousness.
///
/// Higher means more anomalous: implementations wrapping a model whose raw
/// decision function reports "higher = more normal" (the usual
/// isolation-forest convention) must negate it before returning. Must be
/// stateless and deterministic for a fixed input.
pub trait AnomalyScorer: Send + Sync {
    fn score(&self, features: &[f64; FEATURE_COUNT]) -> f64;
}

impl<F> AnomalyScorer for F
where
    F: Fn(&[f64; FEATURE_COUNT]) -> f64 + Send + Sync,
{
    fn score(&self, features: &[f64; FEATURE_COUNT]) -> f64 {
        self(features)
    }
}

/// Scorer returning a fixed value regardless of input.
///
/// Stands in for the trained model in tests, pinning the decision branch
/// under examination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedScorer(pub f64);

impl AnomalyScorer for FixedScorer {
    fn score(&self, _features: &[f64; FEATURE_COUNT]) -> f64 {
        self.0
    }
}
