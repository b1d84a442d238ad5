//! Feature-change detection against the last allowed login
//!
//! A deliberately simple, interpretable rule layer: fixed weights per
//! changed dimension, no learning. It complements the anomaly model with
//! a signal an operator can read off the audit log.

use serde::{Deserialize, Serialize};

use crate::types::{AttemptInput, LoginAttempt};

/// A dimension that differs from the previous allowed login.
///
/// Serializes as the human-readable diagnostic label ("IP Address", ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangedFeature {
    #[serde(rename = "IP Address")]
    IpAddress,
    Device,
    Timezone,
    Location,
}

impl ChangedFeature {
    /// Fixed additive weight contributed when this dimension changes.
    #[must_use]
    pub const fn weight(self) -> u32 {
        match self {
            Self::IpAddress => 2,
            Self::Device => 3,
            Self::Timezone => 3,
            Self::Location => 5,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::IpAddress => "IP Address",
            Self::Device => "Device",
            Self::Timezone => "Timezone",
            Self::Location => "Location",
        }
    }
}

impl std::fmt::Display for ChangedFeature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of diffing the current attempt against the previous one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureChange {
    /// Sum of weights of changed dimensions, 0..=13.
    pub score: u32,
    /// Changed dimensions in fixed order: IP, Device, Timezone, Location.
    pub changed: Vec<ChangedFeature>,
}

impl FeatureChange {
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.changed.is_empty()
    }
}

/// Diff the current attempt against the last allowed login.
///
/// No history means no signal: score 0, nothing changed. Location compares
/// the (lat, lon) pair exactly; near-misses are the anomaly model's job.
#[must_use]
pub fn detect(curr: &AttemptInput, prev: Option<&LoginAttempt>) -> FeatureChange {
    let Some(prev) = prev else {
        return FeatureChange::default();
    };

    let mut change = FeatureChange::default();
    let mut record = |feature: ChangedFeature| {
        change.score += feature.weight();
        change.changed.push(feature);
    };

    if curr.ip_address != prev.ip_address {
        record(ChangedFeature::IpAddress);
    }
    if curr.device_info != prev.device_info {
        record(ChangedFeature::Device);
    }
    if curr.timezone != prev.timezone {
        record(ChangedFeature::Timezone);
    }
    if (curr.latitude, curr.longitude) != (prev.latitude, prev.longitude) {
        record(ChangedFeature::Location);
    }

    change
}
