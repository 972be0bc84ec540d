// src/services/scoring.rs - Scoring orchestration, fusion and decision
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use fraudguard_model::RiskScorer;
use fraudguard_store::{TransactionRecord, TransactionStatus, TransactionStore};

use crate::config::AppConfig;
use crate::middleware::error_handler::ApiError;
use crate::models::risk::RuleOutcome;
use crate::models::transaction::{
    RecommendedAction, RiskAssessmentResponse, TransactionInput,
};
use crate::services::features::FeatureExtractor;
use crate::services::rules::RuleEngine;
use crate::services::windows::BehaviorWindows;

/// Convex combination of rule and model scores, clamped to [0, 1].
pub fn fuse_scores(rule_score: f64, model_score: f64, config: &AppConfig) -> f64 {
    let fused = config.rule_weight * rule_score + config.model_weight * model_score;
    if !(0.0..=1.0).contains(&fused) {
        warn!(fused, rule_score, model_score, "Fused score out of bounds, clamping");
    }
    fused.clamp(0.0, 1.0)
}

/// The risk scoring engine: behavioral windows, rule engine and learned
/// scorer fused into one bounded score per transaction.
#[derive(Clone)]
pub struct RiskEngine {
    config: Arc<AppConfig>,
    windows: BehaviorWindows,
    rules: RuleEngine,
    features: FeatureExtractor,
    /// `None` when the learned model is disabled by configuration; the
    /// model score is then 0, not the fallback.
    scorer: Option<Arc<RiskScorer>>,
    records: Arc<dyn TransactionStore>,
}

impl RiskEngine {
    pub fn new(
        config: Arc<AppConfig>,
        windows: BehaviorWindows,
        rules: RuleEngine,
        features: FeatureExtractor,
        scorer: Option<Arc<RiskScorer>>,
        records: Arc<dyn TransactionStore>,
    ) -> Self {
        Self {
            config,
            windows,
            rules,
            features,
            scorer,
            records,
        }
    }

    /// Score one transaction under the caller deadline. Window writes that
    /// landed before a timeout self-expire by TTL and are not rolled back.
    pub async fn score(
        &self,
        input: TransactionInput,
        ip_address: Option<String>,
    ) -> Result<RiskAssessmentResponse, ApiError> {
        let deadline = Duration::from_millis(self.config.request_deadline_ms);
        match tokio::time::timeout(deadline, self.evaluate(input, ip_address)).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Timeout {
                millis: self.config.request_deadline_ms,
            }),
        }
    }

    #[instrument(skip(self, input, ip_address), fields(user_id = %input.user_id, amount = input.amount))]
    async fn evaluate(
        &self,
        input: TransactionInput,
        ip_address: Option<String>,
    ) -> Result<RiskAssessmentResponse, ApiError> {
        let now = input.created_at.unwrap_or_else(Utc::now);

        // write-before-read: this transaction participates in its own
        // velocity window
        self.windows
            .record_activity(&input.user_id, input.amount, now)
            .await?;
        if let Err(error) = self
            .windows
            .register_device(&input.user_id, &input.device_id)
            .await
        {
            warn!(user_id = %input.user_id, %error, "Device window write failed");
        }

        // rule engine and feature extractor read the same windows in parallel
        let (rule_outcome, feature_vector) = tokio::join!(
            self.rules.evaluate(&input, now),
            self.features
                .extract(&input.user_id, &input.device_id, input.amount, now),
        );
        let rule_outcome: RuleOutcome = rule_outcome?;

        let model_score = match &self.scorer {
            Some(scorer) => scorer.predict_risk(&feature_vector, input.amount).await,
            None => 0.0,
        };

        let final_score = fuse_scores(rule_outcome.rule_score, model_score, &self.config);
        let is_high_risk = final_score >= self.config.fraud_threshold;
        let status = if is_high_risk {
            TransactionStatus::Flagged
        } else {
            TransactionStatus::Pending
        };

        let record = TransactionRecord {
            id: Uuid::new_v4(),
            user_id: input.user_id,
            device_id: input.device_id,
            amount: input.amount,
            currency: input.currency,
            transaction_type: input.transaction_type,
            location: input.location,
            beneficiary_account: input.beneficiary_account,
            beneficiary_bank_code: input.beneficiary_bank_code,
            merchant_id: input.merchant_id,
            card_details: input.card_details,
            ip_address,
            risk_score: final_score,
            status,
            created_at: now,
            updated_at: now,
        };
        self.records.append(&record).await?;

        info!(
            transaction_id = %record.id,
            risk_score = final_score,
            rule_score = rule_outcome.rule_score,
            model_score,
            is_high_risk,
            reasons = ?rule_outcome.reasons,
            "Transaction scored"
        );

        Ok(RiskAssessmentResponse {
            transaction_id: record.id,
            risk_score: final_score,
            is_high_risk,
            reasons: rule_outcome.reasons,
            recommended_action: if is_high_risk {
                RecommendedAction::Deny
            } else {
                RecommendedAction::Allow
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fusion_respects_the_weights() {
        let config = AppConfig::default();
        let fused = fuse_scores(0.5, 1.0, &config);
        assert!((fused - (0.6 * 0.5 + 0.4 * 1.0)).abs() < 1e-12);
    }

    #[test]
    fn pure_rule_weights_pass_the_rule_score_through() {
        let config = AppConfig {
            rule_weight: 1.0,
            model_weight: 0.0,
            ..AppConfig::default()
        };
        for score in [0.0, 0.25, 0.8, 1.0] {
            assert!((fuse_scores(score, 0.9, &config) - score).abs() < 1e-12);
        }
    }

    #[test]
    fn fusion_clamps_into_unit_interval() {
        let config = AppConfig::default();
        assert_eq!(fuse_scores(5.0, 5.0, &config), 1.0);
        assert_eq!(fuse_scores(-2.0, 0.0, &config), 0.0);
    }
}
