//! Decision policy configuration
//!
//! Every threshold the engine branches on lives here as a named field
//! rather than a literal, so deployments can tune the policy without
//! touching decision code.

use serde::{Deserialize, Serialize};

/// Threshold set for the blended decision policy.
///
/// Two threshold families exist: the anomaly-score split used when no
/// tracked feature changed since the last allowed login, and the blended
/// total-score split used when at least one did. Defaults reproduce the
/// production policy (the −0.11/−0.05 no-change variant).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskPolicy {
    /// Hard physical-plausibility gate: implied travel faster than this
    /// (km/h) blocks outright, before any scoring.
    pub max_geo_velocity_kmh: f64,
    /// No-change branch: anomaly scores strictly below this allow.
    pub allow_below_score: f64,
    /// No-change branch: scores in `[allow_below_score, mfa_below_score]`
    /// challenge with MFA; anything above blocks.
    pub mfa_below_score: f64,
    /// Change branch: blended total at or above this blocks.
    pub change_block_at: f64,
    /// Change branch: blended total at or above this (and below
    /// `change_block_at`) challenges with MFA.
    pub change_mfa_at: f64,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            max_geo_velocity_kmh: 1000.0,
            allow_below_score: -0.11,
            mfa_below_score: -0.05,
            change_block_at: 8.0,
            change_mfa_at: 4.0,
        }
    }
}
