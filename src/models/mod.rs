// src/models/mod.rs - Data models for the risk scoring API
pub mod risk;
pub mod transaction;

pub use risk::{RiskBucketCount, RiskLevel, RuleOutcome, StatisticsResponse, StatusBreakdown};
pub use transaction::{
    LocationDto, MessageResponse, RecommendedAction, ReportFraudRequest,
    RiskAssessmentResponse, ScoreTransactionRequest, TransactionInput,
};
