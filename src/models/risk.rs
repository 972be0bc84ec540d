// src/models/risk.rs - Risk scoring and statistics models
use serde::{Deserialize, Serialize};

use fraudguard_store::TransactionStatus;

use crate::constants::{RISK_BUCKET_HIGH_FROM, RISK_BUCKET_LOW_BELOW};

/// Risk distribution bucket.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Bucket a final risk score: LOW < 0.3 ≤ MEDIUM < 0.7 ≤ HIGH.
    pub fn from_score(score: f64) -> Self {
        if score < RISK_BUCKET_LOW_BELOW {
            RiskLevel::Low
        } else if score < RISK_BUCKET_HIGH_FROM {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

/// Aggregated result of one rule-engine pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    /// Sum of triggered contributions, clamped to [0, 1].
    pub rule_score: f64,
    /// Triggered rule reasons, first-occurrence order, no duplicates.
    pub reasons: Vec<String>,
}

impl RuleOutcome {
    pub fn clean() -> Self {
        Self {
            rule_score: 0.0,
            reasons: Vec::new(),
        }
    }
}

/// Per-status slice of the trailing 24 hours.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBreakdown {
    pub status: TransactionStatus,
    pub count: u64,
    pub total_amount: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskBucketCount {
    pub bucket: RiskLevel,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsResponse {
    #[serde(rename = "last24Hours")]
    pub last_24_hours: Vec<StatusBreakdown>,
    pub risk_distribution: Vec<RiskBucketCount>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_buckets() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(0.29), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(0.3), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(0.69), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(0.7), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(1.0), RiskLevel::High);
    }
}
