//! Login-risk authentication gate
//!
//! Given a login attempt (location, device, typing/mouse biometrics, IP),
//! decides whether to allow it, challenge with MFA, or block. Three signals
//! feed the decision:
//!
//! - a hard physical-plausibility gate on implied travel speed between
//!   consecutive logins (impossible travel blocks outright),
//! - a rule-based feature-change score from diffing the attempt against the
//!   user's last allowed login,
//! - an anomaly score from an externally trained outlier model over a
//!   7-dimensional behavioral/contextual feature vector.
//!
//! The model, its scaling parameters, the categorical encoding tables, and
//! the history store backend are injected collaborators; this crate owns
//! only the inference-time decision logic and its data contracts.
//!
//! ```
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use login_risk_gate::{
//!     AttemptInput, EncodingTables, FixedScorer, MemoryHistoryStore, MinMaxScaler,
//!     RiskDecision, RiskDecisionEngine, RiskPolicy,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> login_risk_gate::Result<()> {
//! let tables = EncodingTables::new(
//!     HashMap::from([("1.2.3.4".to_string(), 0.4)]),
//!     HashMap::from([("UTC".to_string(), 0), ("Unknown".to_string(), 1)]),
//!     HashMap::from([("iPhone 14".to_string(), 0), ("Unknown".to_string(), 1)]),
//! )?;
//! let engine = RiskDecisionEngine::new(
//!     Arc::new(MemoryHistoryStore::new()),
//!     Arc::new(FixedScorer(-0.2)),
//!     Arc::new(tables),
//!     Arc::new(MinMaxScaler::identity()),
//!     RiskPolicy::default(),
//! );
//!
//! let result = engine
//!     .decide(AttemptInput {
//!         user_id: "alice".into(),
//!         ip_address: "1.2.3.4".into(),
//!         latitude: 10.0,
//!         longitude: 10.0,
//!         timezone: "UTC".into(),
//!         device_info: "iPhone 14".into(),
//!         typing_speed: 25.0,
//!         mouse_speed: 4000.0,
//!     })
//!     .await?;
//! assert_eq!(result.decision, RiskDecision::Allow);
//! # Ok(())
//! # }
//! ```

pub mod change;
pub mod config;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod geo;
pub mod scorer;
pub mod store;
pub mod types;

pub use change::{ChangedFeature, FeatureChange};
pub use config::RiskPolicy;
pub use encoder::{
    EncodingTables, FeatureEncoder, MinMaxScaler, Scaler, FEATURE_COUNT, UNSEEN_IP_FREQUENCY,
};
pub use engine::{DecisionResult, RiskDecisionEngine};
pub use error::{DegradationReason, Result, RiskError};
pub use scorer::{AnomalyScorer, FixedScorer};
pub use store::{HistoryStore, MemoryHistoryStore};
pub use types::{AttemptInput, LoginAttempt, RiskDecision, UNKNOWN_LABEL};
