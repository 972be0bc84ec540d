// src/services/feedback.rs - Ground-truth label intake
use std::sync::Arc;

use tracing::{info, instrument, warn};

use fraudguard_model::{ModelError, RiskScorer};
use fraudguard_store::{TransactionStatus, TransactionStore};

use crate::middleware::error_handler::ApiError;
use crate::models::transaction::{MessageResponse, ReportFraudRequest};
use crate::services::features::FeatureExtractor;

/// Accepts fraud/legitimate labels on prior transactions and feeds them to
/// the learned scorer as single-sample online updates.
#[derive(Clone)]
pub struct FeedbackService {
    records: Arc<dyn TransactionStore>,
    features: FeatureExtractor,
    scorer: Option<Arc<RiskScorer>>,
}

impl FeedbackService {
    pub fn new(
        records: Arc<dyn TransactionStore>,
        features: FeatureExtractor,
        scorer: Option<Arc<RiskScorer>>,
    ) -> Self {
        Self {
            records,
            features,
            scorer,
        }
    }

    #[instrument(skip(self), fields(transaction_id = %request.transaction_id))]
    pub async fn report(&self, request: ReportFraudRequest) -> Result<MessageResponse, ApiError> {
        let record = self
            .records
            .find_by_id(request.transaction_id)
            .await?
            .ok_or_else(|| ApiError::not_found("transaction"))?;

        // a record already labeled is not re-labeled; repeat feedback is an
        // acknowledged no-op
        if record.status.is_labeled() {
            info!(
                status = ?record.status,
                "Transaction already labeled, skipping duplicate feedback"
            );
            return Ok(MessageResponse::ok());
        }

        let status = if request.was_actually_fraud {
            TransactionStatus::Denied
        } else {
            TransactionStatus::Approved
        };
        self.records
            .update_status(request.transaction_id, status)
            .await?;

        if let Some(scorer) = &self.scorer {
            let feature_vector = self
                .features
                .extract(
                    &record.user_id,
                    &record.device_id,
                    record.amount,
                    record.created_at,
                )
                .await;
            match scorer
                .update_with_label(&feature_vector, request.was_actually_fraud)
                .await
            {
                Ok(version) => {
                    info!(
                        model_version = version,
                        was_fraud = request.was_actually_fraud,
                        "Applied feedback to the learned scorer"
                    );
                }
                // degraded mode: the label is recorded, the model just
                // cannot learn from it right now
                Err(ModelError::Unavailable) => {
                    warn!("Model unavailable, feedback recorded without an update");
                }
                Err(error) => return Err(error.into()),
            }
        }

        Ok(MessageResponse::ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_FEATURE_STATS;
    use crate::services::windows::BehaviorWindows;
    use chrono::Utc;
    use fraudguard_model::FeatureStat;
    use fraudguard_store::{
        KvRecords, KvStore, MemoryKv, TransactionRecord, TransactionType,
    };
    use uuid::Uuid;

    fn service(kv: Arc<dyn KvStore>) -> (FeedbackService, Arc<dyn TransactionStore>) {
        let records: Arc<dyn TransactionStore> = Arc::new(KvRecords::new(kv.clone()));
        let windows = BehaviorWindows::new(kv);
        let stats = DEFAULT_FEATURE_STATS
            .iter()
            .map(|&(mean, std)| FeatureStat { mean, std })
            .collect();
        let features = FeatureExtractor::new(windows, stats);
        (
            FeedbackService::new(records.clone(), features, None),
            records,
        )
    }

    fn pending_record() -> TransactionRecord {
        let now = Utc::now();
        TransactionRecord {
            id: Uuid::new_v4(),
            user_id: "u1".into(),
            device_id: "d1".into(),
            amount: 5_000.0,
            currency: "NGN".into(),
            transaction_type: TransactionType::Transfer,
            location: None,
            beneficiary_account: None,
            beneficiary_bank_code: None,
            merchant_id: None,
            card_details: None,
            ip_address: None,
            risk_score: 0.2,
            status: TransactionStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn unknown_transaction_is_not_found() {
        let (service, _) = service(Arc::new(MemoryKv::new()));
        let result = service
            .report(ReportFraudRequest {
                transaction_id: Uuid::new_v4(),
                was_actually_fraud: true,
            })
            .await;
        assert!(matches!(result, Err(ApiError::NotFound { .. })));
    }

    #[tokio::test]
    async fn fraud_label_denies_and_legit_label_approves() {
        let (service, records) = service(Arc::new(MemoryKv::new()));

        let fraud = pending_record();
        records.append(&fraud).await.unwrap();
        service
            .report(ReportFraudRequest {
                transaction_id: fraud.id,
                was_actually_fraud: true,
            })
            .await
            .unwrap();
        assert_eq!(
            records.find_by_id(fraud.id).await.unwrap().unwrap().status,
            TransactionStatus::Denied
        );

        let legit = pending_record();
        records.append(&legit).await.unwrap();
        service
            .report(ReportFraudRequest {
                transaction_id: legit.id,
                was_actually_fraud: false,
            })
            .await
            .unwrap();
        assert_eq!(
            records.find_by_id(legit.id).await.unwrap().unwrap().status,
            TransactionStatus::Approved
        );
    }

    #[tokio::test]
    async fn repeat_feedback_is_an_acknowledged_no_op() {
        let (service, records) = service(Arc::new(MemoryKv::new()));
        let record = pending_record();
        records.append(&record).await.unwrap();

        let request = ReportFraudRequest {
            transaction_id: record.id,
            was_actually_fraud: true,
        };
        service.report(request.clone()).await.unwrap();

        // the second label flips nothing
        let flipped = ReportFraudRequest {
            transaction_id: record.id,
            was_actually_fraud: false,
        };
        let response = service.report(flipped).await.unwrap();
        assert_eq!(response.message, "ok");
        assert_eq!(
            records.find_by_id(record.id).await.unwrap().unwrap().status,
            TransactionStatus::Denied
        );
    }
}
