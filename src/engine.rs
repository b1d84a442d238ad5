//! Risk decision engine
//!
//! Orchestrates the gate: impossible-travel check, feature-change rules,
//! anomaly scoring, blended decision policy, and conditional history
//! persistence.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::change::{self, ChangedFeature};
use crate::config::RiskPolicy;
use crate::encoder::{EncodingTables, FeatureEncoder, Scaler};
use crate::error::Result;
use crate::geo;
use crate::scorer::AnomalyScorer;
use crate::store::HistoryStore;
use crate::types::{AttemptInput, LoginAttempt, RiskDecision};

/// Outcome of a decision request, with the diagnostic breakdown.
///
/// On a hard velocity block the anomaly model never runs, so `risk_score`
/// and `total_risk_score` are `None` (JSON null).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionResult {
    pub decision: RiskDecision,
    /// Anomaly score, higher = riskier. Absent on a hard velocity block.
    pub risk_score: Option<f64>,
    /// Rule-based feature-change score, 0..=13.
    pub feature_change_score: u32,
    /// Changed dimensions, in fixed IP/Device/Timezone/Location order.
    pub changed_features: Vec<ChangedFeature>,
    /// `feature_change_score - risk_score`. Absent on a hard velocity block.
    pub total_risk_score: Option<f64>,
    /// Implied travel speed against the last allowed login, km/h.
    pub geo_velocity: f64,
    /// Set when the decision stands but its audit trail may be incomplete
    /// (history append failed after an Allow).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_warning: Option<String>,
}

/// The login-risk gate.
///
/// Collaborators are injected capabilities: the engine is testable with a
/// deterministic stub scorer and an in-memory store. Calibration data
/// (tables, scaler) is shared read-only for the process lifetime.
pub struct RiskDecisionEngine {
    store: Arc<dyn HistoryStore>,
    scorer: Arc<dyn AnomalyScorer>,
    encoder: FeatureEncoder,
    policy: RiskPolicy,
    /// Per-user permits serializing the read-latest → append window, so two
    /// concurrent decisions for one user cannot both persist against a
    /// stale previous attempt.
    permits: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl RiskDecisionEngine {
    #[must_use]
    pub fn new(
        store: Arc<dyn HistoryStore>,
        scorer: Arc<dyn AnomalyScorer>,
        tables: Arc<EncodingTables>,
        scaler: Arc<dyn Scaler>,
        policy: RiskPolicy,
    ) -> Self {
        Self {
            store,
            scorer,
            encoder: FeatureEncoder::new(tables, scaler),
            policy,
            permits: RwLock::new(HashMap::new()),
        }
    }

    /// Decide the current attempt, stamping it with the system clock.
    ///
    /// # Errors
    /// [`crate::RiskError::InvalidInput`] on a malformed attempt,
    /// [`crate::RiskError::Configuration`] on unusable calibration data.
    pub async fn decide(&self, input: AttemptInput) -> Result<DecisionResult> {
        self.decide_at(input, Utc::now()).await
    }

    /// Clock-injected variant of [`decide`](Self::decide), used by tests
    /// and replay tooling. `login_time` is the system-assigned timestamp;
    /// it is never taken from the client.
    ///
    /// # Errors
    /// Same conditions as [`decide`](Self::decide).
    pub async fn decide_at(
        &self,
        input: AttemptInput,
        login_time: DateTime<Utc>,
    ) -> Result<DecisionResult> {
        input.validate()?;

        let permit = self.user_permit(&input.user_id).await;
        let _serialized = permit.lock().await;

        let prev = match self.store.latest(&input.user_id).await {
            Ok(prev) => prev,
            Err(err) => {
                // Documented fail-open: a lookup failure is treated as
                // first-login behavior rather than failing the request.
                warn!(user_id = %input.user_id, error = %err, "history lookup failed, treating as first login");
                None
            }
        };

        let geo_velocity = match geo::geo_velocity_kmh(
            prev.as_ref().map(|p| (p.latitude, p.longitude, p.login_time)),
            (input.latitude, input.longitude, login_time),
        ) {
            Ok(velocity) => velocity,
            Err(reason) => {
                // Fail-open to zero, but leave the degradation on the audit log.
                warn!(user_id = %input.user_id, %reason, "geo-velocity degraded to 0.0");
                0.0
            }
        };

        let change = change::detect(&input, prev.as_ref());

        if geo_velocity > self.policy.max_geo_velocity_kmh {
            warn!(
                user_id = %input.user_id,
                geo_velocity,
                limit = self.policy.max_geo_velocity_kmh,
                "blocked on implausible travel speed"
            );
            return Ok(DecisionResult {
                decision: RiskDecision::Block,
                risk_score: None,
                feature_change_score: change.score,
                changed_features: change.changed,
                total_risk_score: None,
                geo_velocity,
                audit_warning: None,
            });
        }

        let features = self.encoder.encode(&input, login_time, geo_velocity)?;
        let risk_score = self.scorer.score(&features);
        let total_risk_score = f64::from(change.score) - risk_score;
        debug!(
            user_id = %input.user_id,
            ?features,
            risk_score,
            feature_change_score = change.score,
            total_risk_score,
            "scored attempt"
        );

        let decision = if change.is_unchanged() {
            self.decide_from_anomaly(risk_score)
        } else {
            self.decide_from_total(total_risk_score)
        };

        let mut audit_warning = None;
        if decision == RiskDecision::Allow {
            let attempt = LoginAttempt::from_input(&input, geo_velocity, login_time);
            if let Err(err) = self.store.append(attempt).await {
                // The decision stands; losing the history write only costs
                // audit fidelity for the next comparison.
                warn!(user_id = %input.user_id, error = %err, "failed to persist allowed attempt");
                audit_warning = Some(format!("history append failed: {err}"));
            }
        }

        info!(
            user_id = %input.user_id,
            %decision,
            risk_score,
            feature_change_score = change.score,
            geo_velocity,
            "login risk decision"
        );

        Ok(DecisionResult {
            decision,
            risk_score: Some(risk_score),
            feature_change_score: change.score,
            changed_features: change.changed,
            total_risk_score: Some(total_risk_score),
            geo_velocity,
            audit_warning,
        })
    }

    /// No tracked feature changed: decide from the anomaly score alone.
    fn decide_from_anomaly(&self, risk_score: f64) -> RiskDecision {
        if risk_score < self.policy.allow_below_score {
            RiskDecision::Allow
        } else if risk_score <= self.policy.mfa_below_score {
            RiskDecision::Mfa
        } else {
            RiskDecision::Block
        }
    }

    /// Changes present: decide from the blended total, where the integer
    /// rule score dominates the small centered anomaly score by design.
    fn decide_from_total(&self, total_risk_score: f64) -> RiskDecision {
        if total_risk_score >= self.policy.change_block_at {
            RiskDecision::Block
        } else if total_risk_score >= self.policy.change_mfa_at {
            RiskDecision::Mfa
        } else {
            RiskDecision::Allow
        }
    }

    async fn user_permit(&self, user_id: &str) -> Arc<Mutex<()>> {
        if let Some(permit) = self.permits.read().await.get(user_id) {
            return Arc::clone(permit);
        }
        let mut permits = self.permits.write().await;
        Arc::clone(permits.entry(user_id.to_string()).or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::MinMaxScaler;
    use crate::error::RiskError;
    use crate::scorer::FixedScorer;
    use crate::store::MemoryHistoryStore;
    use crate::types::UNKNOWN_LABEL;
    use async_trait::async_trait;
    use chrono::TimeZone;

    fn tables() -> Arc<EncodingTables> {
        Arc::new(
            EncodingTables::new(
                HashMap::from([("1.2.3.4".to_string(), 0.4)]),
                HashMap::from([("UTC".to_string(), 0_i64), (UNKNOWN_LABEL.to_string(), 1)]),
                HashMap::from([("iPhone 14".to_string(), 0_i64), (UNKNOWN_LABEL.to_string(), 1)]),
            )
            .expect("valid tables"),
        )
    }

    fn engine_with(store: Arc<dyn HistoryStore>, score: f64) -> RiskDecisionEngine {
        RiskDecisionEngine::new(
            store,
            Arc::new(FixedScorer(score)),
            tables(),
            Arc::new(MinMaxScaler::identity()),
            RiskPolicy::default(),
        )
    }

    fn input() -> AttemptInput {
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

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).single().expect("valid timestamp")
    }

    #[tokio::test]
    async fn no_change_branch_threshold_boundaries() {
        // score strictly below -0.11 allows; [-0.11, -0.05] challenges;
        // above -0.05 blocks
        for (score, expected) in [
            (-0.2, RiskDecision::Allow),
            (-0.111, RiskDecision::Allow),
            (-0.11, RiskDecision::Mfa),
            (-0.08, RiskDecision::Mfa),
            (-0.05, RiskDecision::Mfa),
            (-0.049, RiskDecision::Block),
            (0.3, RiskDecision::Block),
        ] {
            let engine = engine_with(Arc::new(MemoryHistoryStore::new()), score);
            let result = engine.decide_at(input(), at(0)).await.expect("decides");
            assert_eq!(result.decision, expected, "score {score}");
            assert!(result.changed_features.is_empty());
            assert_eq!(result.risk_score, Some(score));
        }
    }

    #[tokio::test]
    async fn change_branch_threshold_boundaries() {
        // Device (3) + Timezone (3) = 6 changed weight. With score 2.0 the
        // total is 4.0 (MFA); with score -2.01 it is 8.01 (Block); with
        // score 2.5 it is 3.5 (Allow).
        for (score, expected) in [
            (2.0, RiskDecision::Mfa),
            (-2.01, RiskDecision::Block),
            (2.5, RiskDecision::Allow),
        ] {
            let store = Arc::new(MemoryHistoryStore::new());
            let allow_engine = engine_with(store.clone(), -0.2);
            allow_engine.decide_at(input(), at(0)).await.expect("seeds history");

            let engine = engine_with(store, score);
            let mut second = input();
            second.device_info = "Pixel 9".into();
            second.timezone = "Asia/Tokyo".into();
            let result = engine.decide_at(second, at(3600)).await.expect("decides");
            assert_eq!(result.feature_change_score, 6);
            assert_eq!(result.decision, expected, "score {score}");
            assert_eq!(result.total_risk_score, Some(6.0 - score));
        }
    }

    #[tokio::test]
    async fn hard_gate_blocks_without_scoring() {
        let store = Arc::new(MemoryHistoryStore::new());
        let engine = engine_with(store.clone(), -10.0); // would otherwise always allow
        engine.decide_at(input(), at(0)).await.expect("seeds history");

        let mut hop = input();
        hop.latitude = 51.5;
        hop.longitude = -0.1;
        let result = engine.decide_at(hop, at(3600)).await.expect("decides");

        assert_eq!(result.decision, RiskDecision::Block);
        assert_eq!(result.risk_score, None);
        assert_eq!(result.total_risk_score, None);
        assert!(result.geo_velocity > 1000.0);
        // diagnostics still carried
        assert_eq!(result.feature_change_score, 5);
        assert_eq!(result.changed_features, vec![ChangedFeature::Location]);
        // the blocked probe must not poison history
        assert_eq!(store.history_len("u1").await, 1);
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_scoring() {
        let engine = engine_with(Arc::new(MemoryHistoryStore::new()), -0.2);
        let mut bad = input();
        bad.user_id = String::new();
        assert!(matches!(
            engine.decide_at(bad, at(0)).await,
            Err(RiskError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn corrupt_history_coordinates_degrade_to_zero_velocity() {
        let store = Arc::new(MemoryHistoryStore::new());
        let mut poisoned = LoginAttempt::from_input(&input(), 0.0, at(0));
        poisoned.latitude = f64::NAN;
        store.append(poisoned).await.expect("append");

        let engine = engine_with(store, -0.2);
        let result = engine.decide_at(input(), at(3600)).await.expect("decides");
        assert_eq!(result.geo_velocity, 0.0);
        assert_ne!(result.risk_score, None);
    }

    struct FailingStore {
        latest_fails: bool,
        append_fails: bool,
    }

    #[async_trait]
    impl HistoryStore for FailingStore {
        async fn latest(&self, _user_id: &str) -> Result<Option<LoginAttempt>> {
            if self.latest_fails {
                Err(RiskError::Store("lookup timed out".into()))
            } else {
                Ok(None)
            }
        }

        async fn append(&self, _attempt: LoginAttempt) -> Result<()> {
            if self.append_fails {
                Err(RiskError::Store("append refused".into()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn lookup_failure_falls_open_to_first_login() {
        let store = Arc::new(FailingStore { latest_fails: true, append_fails: false });
        let engine = engine_with(store, -0.2);
        let result = engine.decide_at(input(), at(0)).await.expect("decides");
        assert_eq!(result.decision, RiskDecision::Allow);
        assert_eq!(result.geo_velocity, 0.0);
        assert_eq!(result.feature_change_score, 0);
    }

    #[tokio::test]
    async fn append_failure_surfaces_but_never_flips_the_decision() {
        let store = Arc::new(FailingStore { latest_fails: false, append_fails: true });
        let engine = engine_with(store, -0.2);
        let result = engine.decide_at(input(), at(0)).await.expect("decides");
        assert_eq!(result.decision, RiskDecision::Allow);
        assert!(result.audit_warning.is_some());
    }

    #[tokio::test]
    async fn hard_block_serializes_null_scores() {
        let store = Arc::new(MemoryHistoryStore::new());
        let engine = engine_with(store, -10.0);
        engine.decide_at(input(), at(0)).await.expect("seeds history");

        let mut hop = input();
        hop.latitude = 51.5;
        let result = engine.decide_at(hop, at(60)).await.expect("decides");
        let json = serde_json::to_value(&result).expect("serializes");
        assert_eq!(json["risk_score"], serde_json::Value::Null);
        assert_eq!(json["total_risk_score"], serde_json::Value::Null);
        assert_eq!(json["decision"], "Block");
        assert_eq!(json["changed_features"][0], "Location");
    }
}
