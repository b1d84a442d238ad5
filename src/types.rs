//! Core data types: login attempts and risk decisions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RiskError};

/// Reserved fallback value for free-form categorical fields.
pub const UNKNOWN_LABEL: &str = "Unknown";

fn default_unknown() -> String {
    UNKNOWN_LABEL.to_string()
}

/// A login attempt as submitted by the caller.
///
/// Behavioral numerics (typing/mouse speed, coordinates) default to 0.0
/// when absent; categorical fields default to "Unknown". Identity fields
/// (`user_id`, `ip_address`) have no defaults and are validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptInput {
    pub user_id: String,
    pub ip_address: String,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default = "default_unknown")]
    pub timezone: String,
    #[serde(default = "default_unknown")]
    pub device_info: String,
    #[serde(default)]
    pub typing_speed: f64,
    #[serde(default)]
    pub mouse_speed: f64,
}

impl AttemptInput {
    /// Validate the attempt before any scoring runs.
    ///
    /// # Errors
    /// Returns [`RiskError::InvalidInput`] when an identity field is empty,
    /// a coordinate is outside its valid range, or a behavioral numeric is
    /// negative or non-finite.
    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(RiskError::InvalidInput("user_id must not be empty".into()));
        }
        if self.ip_address.trim().is_empty() {
            return Err(RiskError::InvalidInput("ip_address must not be empty".into()));
        }
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(RiskError::InvalidInput(format!(
                "latitude {} outside [-90, 90]",
                self.latitude
            )));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(RiskError::InvalidInput(format!(
                "longitude {} outside [-180, 180]",
                self.longitude
            )));
        }
        if !self.typing_speed.is_finite() || self.typing_speed < 0.0 {
            return Err(RiskError::InvalidInput(
                "typing_speed must be a non-negative number".into(),
            ));
        }
        if !self.mouse_speed.is_finite() || self.mouse_speed < 0.0 {
            return Err(RiskError::InvalidInput(
                "mouse_speed must be a non-negative number".into(),
            ));
        }
        Ok(())
    }
}

/// A recorded login attempt, immutable once persisted.
///
/// `geo_velocity` is always derived by the engine and `login_time` is
/// assigned by the system, never taken from the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginAttempt {
    pub user_id: String,
    pub ip_address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    pub device_info: String,
    pub typing_speed: f64,
    pub mouse_speed: f64,
    /// Implied travel speed against the previous allowed login, km/h.
    pub geo_velocity: f64,
    pub login_time: DateTime<Utc>,
}

impl LoginAttempt {
    /// Build the record that gets persisted after an Allow decision.
    #[must_use]
    pub fn from_input(input: &AttemptInput, geo_velocity: f64, login_time: DateTime<Utc>) -> Self {
        Self {
            user_id: input.user_id.clone(),
            ip_address: input.ip_address.clone(),
            latitude: input.latitude,
            longitude: input.longitude,
            timezone: input.timezone.clone(),
            device_info: input.device_info.clone(),
            typing_speed: input.typing_speed,
            mouse_speed: input.mouse_speed,
            geo_velocity,
            login_time,
        }
    }
}

/// Terminal outcome of a decision request.
///
/// MFA is terminal for this engine: a passed challenge must re-enter as a
/// new attempt, that boundary belongs to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskDecision {
    Allow,
    #[serde(rename = "MFA")]
    Mfa,
    Block,
}

impl std::fmt::Display for RiskDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allow => f.write_str("Allow"),
            Self::Mfa => f.write_str("MFA"),
            Self::Block => f.write_str("Block"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_input() -> AttemptInput {
        AttemptInput {
            user_id: "u1".into(),
            ip_address: "1.2.3.4".into(),
            latitude: 10.0,
            longitude: 10.0,
            timezone: "UTC".into(),
            device_info: "iPhone 14".into(),
            typing_speed: 25.0,
            mouse_speed: 4000.0,
        }
    }

    #[test]
    fn accepts_valid_input() {
        assert!(valid_input().validate().is_ok());
    }

    #[test]
    fn rejects_empty_identity_fields() {
        let mut input = valid_input();
        input.user_id = "  ".into();
        assert!(matches!(input.validate(), Err(RiskError::InvalidInput(_))));

        let mut input = valid_input();
        input.ip_address = String::new();
        assert!(matches!(input.validate(), Err(RiskError::InvalidInput(_))));
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        let mut input = valid_input();
        input.latitude = 95.0;
        assert!(input.validate().is_err());

        let mut input = valid_input();
        input.longitude = -200.0;
        assert!(input.validate().is_err());
    }

    #[test]
    fn rejects_non_finite_biometrics() {
        let mut input = valid_input();
        input.typing_speed = f64::NAN;
        assert!(input.validate().is_err());

        let mut input = valid_input();
        input.mouse_speed = -1.0;
        assert!(input.validate().is_err());
    }

    #[test]
    fn missing_optional_fields_default() {
        let input: AttemptInput =
            serde_json::from_str(r#"{"user_id":"u1","ip_address":"1.2.3.4"}"#)
                .expect("deserializes");
        assert_eq!(input.latitude, 0.0);
        assert_eq!(input.timezone, UNKNOWN_LABEL);
        assert_eq!(input.device_info, UNKNOWN_LABEL);
        assert_eq!(input.typing_speed, 0.0);
    }

    #[test]
    fn decision_serializes_with_mfa_label() {
        let json = serde_json::to_string(&RiskDecision::Mfa).expect("serializes");
        assert_eq!(json, r#""MFA""#);
        assert_eq!(RiskDecision::Mfa.to_string(), "MFA");
    }
}
