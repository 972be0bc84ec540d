use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Retail payment channel the transaction arrived through.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Transfer,
    Card,
    Qr,
    Pos,
}

/// Lifecycle status of a persisted transaction record.
///
/// `Flagged` is assigned at creation iff the risk score reached the flag
/// threshold; feedback later moves records to `Approved` or `Denied`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Pending,
    Approved,
    Denied,
    Flagged,
}

impl TransactionStatus {
    /// Whether a ground-truth label has already been applied.
    pub fn is_labeled(&self) -> bool {
        matches!(self, TransactionStatus::Approved | TransactionStatus::Denied)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardDetails {
    pub last4: String,
    pub bin: String,
    pub country: String,
}

/// Transaction record as appended to the sink: the scored input plus the
/// engine-assigned identity, score and status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: Uuid,
    pub user_id: String,
    pub device_id: String,
    pub amount: f64,
    pub currency: String,
    pub transaction_type: TransactionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beneficiary_account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beneficiary_bank_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_details: Option<CardDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    pub risk_score: f64,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_labels() {
        assert!(!TransactionStatus::Pending.is_labeled());
        assert!(!TransactionStatus::Flagged.is_labeled());
        assert!(TransactionStatus::Approved.is_labeled());
        assert!(TransactionStatus::Denied.is_labeled());
    }

    #[test]
    fn record_round_trips_through_json() {
        let record = TransactionRecord {
            id: Uuid::new_v4(),
            user_id: "u1".into(),
            device_id: "d1".into(),
            amount: 5000.0,
            currency: "NGN".into(),
            transaction_type: TransactionType::Transfer,
            location: Some(GeoPoint {
                lat: 6.5244,
                lon: 3.3792,
            }),
            beneficiary_account: None,
            beneficiary_bank_code: None,
            merchant_id: None,
            card_details: None,
            ip_address: Some("10.0.0.1".into()),
            risk_score: 0.25,
            status: TransactionStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"transactionType\":\"TRANSFER\""));
        assert!(json.contains("\"status\":\"PENDING\""));

        let back: TransactionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, record.id);
        assert_eq!(back.status, TransactionStatus::Pending);
    }
}
