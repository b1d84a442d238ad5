//! Feature encoding: categorical lookups, vector assembly, scaling
//!
//! The encoding tables and scaling parameters are fit offline alongside the
//! anomaly model; at inference time they are opaque, read-only calibration
//! data loaded once and shared for the process lifetime.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, RiskError};
use crate::types::{AttemptInput, UNKNOWN_LABEL};

/// Number of dimensions in the scored feature vector:
/// [latitude, longitude, typing_speed, mouse_speed, geo_velocity,
/// login_hour, ip_frequency].
pub const FEATURE_COUNT: usize = 7;

/// Frequency assigned to an IP the offline tables have never seen.
pub const UNSEEN_IP_FREQUENCY: f64 = 0.0001;

/// Offline-built categorical lookup tables.
///
/// Label maps are guaranteed to contain an "Unknown" entry; construction
/// and [`EncodingTables::validate`] enforce it so every input maps to a
/// valid code even for unseen categories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingTables {
    ip_freq: HashMap<String, f64>,
    timezone_labels: HashMap<String, i64>,
    device_labels: HashMap<String, i64>,
}

impl EncodingTables {
    /// # Errors
    /// Returns [`RiskError::Configuration`] if a label map lacks the
    /// "Unknown" entry.
    pub fn new(
        ip_freq: HashMap<String, f64>,
        timezone_labels: HashMap<String, i64>,
        device_labels: HashMap<String, i64>,
    ) -> Result<Self> {
        let tables = Self { ip_freq, timezone_labels, device_labels };
        tables.validate()?;
        Ok(tables)
    }

    /// Load tables from their JSON artifact and validate them.
    ///
    /// # Errors
    /// Returns a JSON error on malformed input or
    /// [`RiskError::Configuration`] on a missing "Unknown" entry.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        let tables: Self = serde_json::from_slice(bytes)?;
        tables.validate()?;
        Ok(tables)
    }

    /// # Errors
    /// Returns [`RiskError::Configuration`] if a label map lacks the
    /// "Unknown" entry.
    pub fn validate(&self) -> Result<()> {
        for (name, map) in
            [("timezone", &self.timezone_labels), ("device_info", &self.device_labels)]
        {
            if !map.contains_key(UNKNOWN_LABEL) {
                return Err(RiskError::Configuration(format!(
                    "{name} label table is missing the \"{UNKNOWN_LABEL}\" entry"
                )));
            }
        }
        Ok(())
    }

    /// Frequency for this IP, or the unseen-IP default.
    #[must_use]
    pub fn ip_frequency(&self, ip_address: &str) -> f64 {
        self.ip_freq.get(ip_address).copied().unwrap_or(UNSEEN_IP_FREQUENCY)
    }

    /// # Errors
    /// Returns [`RiskError::Configuration`] if the table lost its
    /// "Unknown" entry (only possible via untrusted deserialization).
    pub fn timezone_code(&self, timezone: &str) -> Result<i64> {
        label_code(&self.timezone_labels, timezone, "timezone")
    }

    /// # Errors
    /// Returns [`RiskError::Configuration`] if the table lost its
    /// "Unknown" entry (only possible via untrusted deserialization).
    pub fn device_code(&self, device_info: &str) -> Result<i64> {
        label_code(&self.device_labels, device_info, "device_info")
    }
}

fn label_code(map: &HashMap<String, i64>, value: &str, table: &str) -> Result<i64> {
    if let Some(code) = map.get(value) {
        return Ok(*code);
    }
    map.get(UNKNOWN_LABEL).copied().ok_or_else(|| {
        RiskError::Configuration(format!(
            "{table} label table is missing the \"{UNKNOWN_LABEL}\" entry"
        ))
    })
}

/// Pre-fit normalization applied before the anomaly scorer sees a vector.
/// Stateless and deterministic.
pub trait Scaler: Send + Sync {
    fn transform(&self, features: [f64; FEATURE_COUNT]) -> [f64; FEATURE_COUNT];
}

/// Per-feature min-max scaling, the transform the offline pipeline fits.
///
/// Degenerate ranges (max == min) map to 0.0 rather than dividing by zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinMaxScaler {
    ranges: [(f64, f64); FEATURE_COUNT],
}

impl MinMaxScaler {
    /// # Errors
    /// Returns [`RiskError::Configuration`] if a bound is non-finite or
    /// inverted.
    pub fn new(ranges: [(f64, f64); FEATURE_COUNT]) -> Result<Self> {
        for (i, (min, max)) in ranges.iter().enumerate() {
            if !min.is_finite() || !max.is_finite() || min > max {
                return Err(RiskError::Configuration(format!(
                    "scaler range {i} is not a finite (min <= max) pair: ({min}, {max})"
                )));
            }
        }
        Ok(Self { ranges })
    }

    /// The identity transform, for tests and uncalibrated setups.
    #[must_use]
    pub fn identity() -> Self {
        Self { ranges: [(0.0, 1.0); FEATURE_COUNT] }
    }
}

impl Scaler for MinMaxScaler {
    fn transform(&self, features: [f64; FEATURE_COUNT]) -> [f64; FEATURE_COUNT] {
        let mut scaled = [0.0; FEATURE_COUNT];
        for (i, value) in features.iter().enumerate() {
            let (min, max) = self.ranges[i];
            let span = max - min;
            scaled[i] = if span > 0.0 { (value - min) / span } else { 0.0 };
        }
        scaled
    }
}

/// Assembles and normalizes the 7-dimensional feature vector.
#[derive(Clone)]
pub struct FeatureEncoder {
    tables: Arc<EncodingTables>,
    scaler: Arc<dyn Scaler>,
}

impl FeatureEncoder {
    #[must_use]
    pub fn new(tables: Arc<EncodingTables>, scaler: Arc<dyn Scaler>) -> Self {
        Self { tables, scaler }
    }

    /// Encode an attempt into the normalized vector the scorer consumes.
    ///
    /// Timezone and device codes are resolved here (with the "Unknown"
    /// fallback) so a broken table fails the request, but they are not part
    /// of the scored vector; those dimensions feed history diffing only.
    ///
    /// # Errors
    /// Returns [`RiskError::Configuration`] when a label table is unusable.
    pub fn encode(
        &self,
        input: &AttemptInput,
        login_time: DateTime<Utc>,
        geo_velocity: f64,
    ) -> Result<[f64; FEATURE_COUNT]> {
        let ip_frequency = self.tables.ip_frequency(&input.ip_address);
        let timezone_code = self.tables.timezone_code(&input.timezone)?;
        let device_code = self.tables.device_code(&input.device_info)?;
        let login_hour = f64::from(login_time.hour());

        debug!(
            user_id = %input.user_id,
            timezone_code,
            device_code,
            ip_frequency,
            "encoded categorical context"
        );

        let raw = [
            input.latitude,
            input.longitude,
            input.typing_speed,
            input.mouse_speed,
            geo_velocity,
            login_hour,
            ip_frequency,
        ];
        Ok(self.scaler.transform(raw))
    }
}
