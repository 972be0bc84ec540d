// src/services/stats.rs - Aggregates over the trailing 24 hours of records
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::instrument;

use fraudguard_store::{TransactionStatus, TransactionStore};

use crate::middleware::error_handler::ApiError;
use crate::models::risk::{RiskBucketCount, RiskLevel, StatisticsResponse, StatusBreakdown};

const STATUSES: [TransactionStatus; 4] = [
    TransactionStatus::Pending,
    TransactionStatus::Approved,
    TransactionStatus::Denied,
    TransactionStatus::Flagged,
];

const BUCKETS: [RiskLevel; 3] = [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High];

#[derive(Clone)]
pub struct StatsService {
    records: Arc<dyn TransactionStore>,
}

impl StatsService {
    pub fn new(records: Arc<dyn TransactionStore>) -> Self {
        Self { records }
    }

    #[instrument(skip(self))]
    pub async fn summary(&self) -> Result<StatisticsResponse, ApiError> {
        let since = Utc::now() - Duration::hours(24);
        let records = self.records.recent(since).await?;

        let mut by_status: HashMap<TransactionStatus, (u64, f64)> = HashMap::new();
        let mut by_bucket: HashMap<RiskLevel, u64> = HashMap::new();
        for record in &records {
            let entry = by_status.entry(record.status).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += record.amount;
            *by_bucket
                .entry(RiskLevel::from_score(record.risk_score))
                .or_insert(0) += 1;
        }

        Ok(StatisticsResponse {
            last_24_hours: STATUSES
                .iter()
                .map(|&status| {
                    let (count, total_amount) =
                        by_status.get(&status).copied().unwrap_or((0, 0.0));
                    StatusBreakdown {
                        status,
                        count,
                        total_amount,
                    }
                })
                .collect(),
            risk_distribution: BUCKETS
                .iter()
                .map(|&bucket| RiskBucketCount {
                    bucket,
                    count: by_bucket.get(&bucket).copied().unwrap_or(0),
                })
                .collect(),
        })
    }
}
