// Transaction record sink: append plus the minimal fetch surface the
// feedback and statistics flows need.
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::kv::{KvStore, StoreError};
use crate::models::{TransactionRecord, TransactionStatus};

const RECORD_KEY_PREFIX: &str = "tx";
const RECENT_INDEX_KEY: &str = "tx:recent";

/// Abstract sink for scored transaction records.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn append(&self, record: &TransactionRecord) -> Result<(), StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<TransactionRecord>, StoreError>;

    async fn update_status(&self, id: Uuid, status: TransactionStatus) -> Result<(), StoreError>;

    /// Records created at or after `since`, oldest first.
    async fn recent(&self, since: DateTime<Utc>) -> Result<Vec<TransactionRecord>, StoreError>;
}

/// Sink implementation over any [`KvStore`]: records are JSON strings keyed
/// by id, with a creation-time sorted set as the recency index.
pub struct KvRecords {
    kv: Arc<dyn KvStore>,
}

impl KvRecords {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    fn record_key(id: Uuid) -> String {
        format!("{RECORD_KEY_PREFIX}:{id}")
    }

    fn decode(key: &str, raw: &str) -> Result<TransactionRecord, StoreError> {
        serde_json::from_str(raw).map_err(|e| StoreError::Corrupt {
            key: key.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl TransactionStore for KvRecords {
    async fn append(&self, record: &TransactionRecord) -> Result<(), StoreError> {
        let key = Self::record_key(record.id);
        let encoded = serde_json::to_string(record).map_err(|e| StoreError::Corrupt {
            key: key.clone(),
            message: e.to_string(),
        })?;
        self.kv.set(&key, &encoded).await?;
        self.kv
            .zadd(
                RECENT_INDEX_KEY,
                record.created_at.timestamp_millis() as f64,
                &record.id.to_string(),
            )
            .await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<TransactionRecord>, StoreError> {
        let key = Self::record_key(id);
        match self.kv.get(&key).await? {
            None => Ok(None),
            Some(raw) => Ok(Some(Self::decode(&key, &raw)?)),
        }
    }

    async fn update_status(&self, id: Uuid, status: TransactionStatus) -> Result<(), StoreError> {
        let key = Self::record_key(id);
        let raw = self.kv.get(&key).await?.ok_or_else(|| StoreError::Corrupt {
            key: key.clone(),
            message: "record vanished during status update".to_string(),
        })?;
        let mut record = Self::decode(&key, &raw)?;
        record.status = status;
        record.updated_at = Utc::now();
        let encoded = serde_json::to_string(&record).map_err(|e| StoreError::Corrupt {
            key: key.clone(),
            message: e.to_string(),
        })?;
        self.kv.set(&key, &encoded).await
    }

    async fn recent(&self, since: DateTime<Utc>) -> Result<Vec<TransactionRecord>, StoreError> {
        let ids = self
            .kv
            .zrange_by_score(
                RECENT_INDEX_KEY,
                since.timestamp_millis() as f64,
                f64::MAX,
            )
            .await?;

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            let key = format!("{RECORD_KEY_PREFIX}:{id}");
            // index entries may outlive their record; skip the hole
            if let Some(raw) = self.kv.get(&key).await? {
                records.push(Self::decode(&key, &raw)?);
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryKv;
    use crate::models::{TransactionRecord, TransactionType};
    use chrono::Duration;

    fn record(amount: f64, created_at: DateTime<Utc>) -> TransactionRecord {
        TransactionRecord {
            id: Uuid::new_v4(),
            user_id: "u1".into(),
            device_id: "d1".into(),
            amount,
            currency: "NGN".into(),
            transaction_type: TransactionType::Transfer,
            location: None,
            beneficiary_account: None,
            beneficiary_bank_code: None,
            merchant_id: None,
            card_details: None,
            ip_address: None,
            risk_score: 0.1,
            status: TransactionStatus::Pending,
            created_at,
            updated_at: created_at,
        }
    }

    fn store() -> KvRecords {
        KvRecords::new(Arc::new(MemoryKv::new()))
    }

    #[tokio::test]
    async fn append_then_find() {
        let sink = store();
        let rec = record(5000.0, Utc::now());
        sink.append(&rec).await.unwrap();

        let found = sink.find_by_id(rec.id).await.unwrap().unwrap();
        assert_eq!(found.id, rec.id);
        assert_eq!(found.amount, 5000.0);

        assert!(sink.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_status_transitions() {
        let sink = store();
        let rec = record(100.0, Utc::now());
        sink.append(&rec).await.unwrap();

        sink.update_status(rec.id, TransactionStatus::Denied)
            .await
            .unwrap();
        let found = sink.find_by_id(rec.id).await.unwrap().unwrap();
        assert_eq!(found.status, TransactionStatus::Denied);
        assert!(found.updated_at >= rec.updated_at);
    }

    #[tokio::test]
    async fn recent_filters_by_creation_time() {
        let sink = store();
        let now = Utc::now();
        let old = record(10.0, now - Duration::hours(30));
        let fresh = record(20.0, now - Duration::hours(2));
        sink.append(&old).await.unwrap();
        sink.append(&fresh).await.unwrap();

        let last_day = sink.recent(now - Duration::hours(24)).await.unwrap();
        assert_eq!(last_day.len(), 1);
        assert_eq!(last_day[0].id, fresh.id);
    }
}
