// src/models/transaction.rs - Scoring request/response models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use fraudguard_store::{CardDetails, GeoPoint, TransactionType};

/// Transaction as the engine consumes it, after request validation.
#[derive(Debug, Clone)]
pub struct TransactionInput {
    pub user_id: String,
    pub device_id: String,
    pub amount: f64,
    pub currency: String,
    pub transaction_type: TransactionType,
    pub location: Option<GeoPoint>,
    pub beneficiary_account: Option<String>,
    pub beneficiary_bank_code: Option<String>,
    pub merchant_id: Option<String>,
    pub card_details: Option<CardDetails>,
    /// Engine falls back to wall-clock now when absent.
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LocationDto {
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lon: f64,
}

/// Request body for scoring one transaction.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ScoreTransactionRequest {
    #[validate(length(min = 1, message = "userId must not be empty"))]
    pub user_id: String,

    #[validate(length(min = 1, message = "deviceId must not be empty"))]
    pub device_id: String,

    #[validate(range(min = 0.0, message = "amount must be non-negative"))]
    pub amount: f64,

    #[validate(length(equal = 3, message = "currency must be an ISO-4217 code"))]
    pub currency: String,

    pub transaction_type: TransactionType,

    #[validate(nested)]
    pub location: Option<LocationDto>,

    pub beneficiary_account: Option<String>,
    pub beneficiary_bank_code: Option<String>,
    pub merchant_id: Option<String>,
    pub card_details: Option<CardDetails>,
    pub created_at: Option<DateTime<Utc>>,
}

impl ScoreTransactionRequest {
    pub fn into_input(self) -> TransactionInput {
        TransactionInput {
            user_id: self.user_id,
            device_id: self.device_id,
            amount: self.amount,
            currency: self.currency,
            transaction_type: self.transaction_type,
            location: self.location.map(|l| GeoPoint {
                lat: l.lat,
                lon: l.lon,
            }),
            beneficiary_account: self.beneficiary_account,
            beneficiary_bank_code: self.beneficiary_bank_code,
            merchant_id: self.merchant_id,
            card_details: self.card_details,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecommendedAction {
    Allow,
    Deny,
}

/// Response for a scored transaction.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessmentResponse {
    pub transaction_id: Uuid,
    pub risk_score: f64,
    pub is_high_risk: bool,
    pub reasons: Vec<String>,
    pub recommended_action: RecommendedAction,
}

/// Ground-truth label for a previously scored transaction.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportFraudRequest {
    pub transaction_id: Uuid,
    pub was_actually_fraud: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn ok() -> Self {
        Self {
            message: "ok".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_json() -> serde_json::Value {
        serde_json::json!({
            "userId": "u1",
            "deviceId": "d1",
            "amount": 5000.0,
            "currency": "NGN",
            "transactionType": "TRANSFER",
            "location": { "lat": 6.5244, "lon": 3.3792 }
        })
    }

    #[test]
    fn valid_request_passes_validation() {
        let request: ScoreTransactionRequest =
            serde_json::from_value(request_json()).unwrap();
        assert!(request.validate().is_ok());

        let input = request.into_input();
        assert_eq!(input.user_id, "u1");
        assert_eq!(input.transaction_type, TransactionType::Transfer);
        assert!(input.location.is_some());
        assert!(input.created_at.is_none());
    }

    #[test]
    fn empty_user_and_bad_latitude_fail_validation() {
        let mut json = request_json();
        json["userId"] = serde_json::json!("");
        json["location"]["lat"] = serde_json::json!(120.0);

        let request: ScoreTransactionRequest = serde_json::from_value(json).unwrap();
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("user_id"));
        assert!(errors.errors().contains_key("location"));
    }

    #[test]
    fn negative_amount_fails_validation() {
        let mut json = request_json();
        json["amount"] = serde_json::json!(-1.0);
        let request: ScoreTransactionRequest = serde_json::from_value(json).unwrap();
        assert!(request.validate().is_err());
    }
}
