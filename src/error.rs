//! Error types for the login-risk gate

/// Result type alias for gate operations
pub type Result<T> = std::result::Result<T, RiskError>;

/// Main error type for the gate
#[derive(Debug, thiserror::Error)]
pub enum RiskError {
    /// The request is malformed and was rejected before any scoring.
    /// Identity fields (user id, IP) are never silently defaulted.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Calibration data (encoding tables, scaler) is missing or malformed.
    /// Fatal for the request: no partial decision is returned.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The history store failed. Lookup failures are degraded to
    /// first-login behavior by the engine; append failures surface here.
    #[error("history store error: {0}")]
    Store(String),

    #[error("JSON serialization/deserialization error")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a geo-velocity computation could not be trusted.
///
/// The calculator reports these instead of silently coercing bad inputs to
/// zero; the engine decides the fail-open policy and logs the reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DegradationReason {
    #[error("coordinate is not a finite number")]
    NonFiniteCoordinate,

    #[error("coordinate outside the valid latitude/longitude range")]
    CoordinateOutOfRange,
}
