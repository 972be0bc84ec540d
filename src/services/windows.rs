// src/services/windows.rs - Short-lived per-user behavioral state
//
// Every window write refreshes its TTL; readers tolerate absent keys. The
// engine writes the current transaction's samples before any rule reads so
// a request counts itself in its own velocity window.
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use fraudguard_store::{GeoPoint, KvStore, StoreError};

use crate::constants::*;

/// Compact transaction summary kept in the recent-activity lists.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TxSummary {
    pub amount: f64,
    /// Epoch milliseconds.
    pub t: i64,
}

/// Mean and sample count over an amount window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmountStats {
    pub mean: f64,
    pub count: u64,
}

#[derive(Clone)]
pub struct BehaviorWindows {
    kv: Arc<dyn KvStore>,
}

fn window_member(amount: f64, at_ms: i64) -> String {
    format!("{amount}:{at_ms}")
}

fn parse_member_amount(member: &str) -> Option<f64> {
    member.split(':').next()?.parse().ok()
}

impl BehaviorWindows {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Record the transaction's velocity sample and append its summary to
    /// the recent-activity lists. Must run before rule reads so the request
    /// counts itself in its own velocity window.
    pub async fn record_activity(
        &self,
        user_id: &str,
        amount: f64,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let at_ms = at.timestamp_millis();
        let member = window_member(amount, at_ms);

        let velocity_key = format!("{KEY_VELOCITY}:{user_id}");
        self.kv.zadd(&velocity_key, at_ms as f64, &member).await?;
        self.kv.expire(&velocity_key, TTL_VELOCITY).await?;

        let summary = serde_json::to_string(&TxSummary { amount, t: at_ms }).map_err(|e| {
            StoreError::Corrupt {
                key: KEY_TX_24H.to_string(),
                message: e.to_string(),
            }
        })?;
        for (key_prefix, ttl) in [(KEY_TX_24H, TTL_TX_24H), (KEY_TX_7D, TTL_TX_7D)] {
            let key = format!("{key_prefix}:{user_id}");
            self.kv.lpush(&key, &summary).await?;
            self.kv.ltrim(&key, 0, TX_LIST_MAX_LEN - 1).await?;
            self.kv.expire(&key, ttl).await?;
        }

        Ok(())
    }

    /// Append the amount to the 24 h history. Runs after the spike check so
    /// the current transaction is compared against prior history only.
    pub async fn record_amount(
        &self,
        user_id: &str,
        amount: f64,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let at_ms = at.timestamp_millis();
        let key = format!("{KEY_AMOUNT_HISTORY}:{user_id}");
        self.kv
            .zadd(&key, at_ms as f64, &window_member(amount, at_ms))
            .await?;
        self.kv.expire(&key, TTL_AMOUNT_HISTORY).await
    }

    /// Remember that `device_id` acted for `user_id` within the last day.
    pub async fn register_device(&self, user_id: &str, device_id: &str) -> Result<(), StoreError> {
        let key = format!("{KEY_USER_DEVICES_24H}:{user_id}");
        self.kv.sadd(&key, device_id).await?;
        self.kv.expire(&key, TTL_USER_DEVICES_24H).await
    }

    /// Number of velocity samples in `[from_ms, to_ms]`.
    pub async fn velocity_count(
        &self,
        user_id: &str,
        from_ms: i64,
        to_ms: i64,
    ) -> Result<u64, StoreError> {
        let key = format!("{KEY_VELOCITY}:{user_id}");
        let members = self
            .kv
            .zrange_by_score(&key, from_ms as f64, to_ms as f64)
            .await?;
        Ok(members.len() as u64)
    }

    /// Mean amount over the trailing 24 h history, `None` when empty.
    pub async fn amount_stats_24h(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AmountStats>, StoreError> {
        let key = format!("{KEY_AMOUNT_HISTORY}:{user_id}");
        let to_ms = now.timestamp_millis();
        let from_ms = to_ms - TTL_AMOUNT_HISTORY * 1000;
        let members = self
            .kv
            .zrange_by_score(&key, from_ms as f64, to_ms as f64)
            .await?;

        let amounts: Vec<f64> = members
            .iter()
            .filter_map(|member| parse_member_amount(member))
            .collect();
        if amounts.is_empty() {
            return Ok(None);
        }
        Ok(Some(AmountStats {
            mean: amounts.iter().sum::<f64>() / amounts.len() as f64,
            count: amounts.len() as u64,
        }))
    }

    pub async fn last_geo(&self, user_id: &str) -> Result<Option<GeoPoint>, StoreError> {
        let key = format!("{KEY_LAST_GEO}:{user_id}");
        let Some(raw) = self.kv.get(&key).await? else {
            return Ok(None);
        };
        let mut parts = raw.split(':');
        let lat = parts.next().and_then(|p| p.parse::<f64>().ok());
        let lon = parts.next().and_then(|p| p.parse::<f64>().ok());
        match (lat, lon) {
            (Some(lat), Some(lon)) => Ok(Some(GeoPoint { lat, lon })),
            _ => {
                warn!(key, raw, "Discarding malformed geo value");
                Ok(None)
            }
        }
    }

    /// Overwrite the user's last known location; no TTL.
    pub async fn set_last_geo(&self, user_id: &str, geo: GeoPoint) -> Result<(), StoreError> {
        let key = format!("{KEY_LAST_GEO}:{user_id}");
        self.kv.set(&key, &format!("{}:{}", geo.lat, geo.lon)).await
    }

    /// Users previously seen on the device. Read this before
    /// `add_device_user`; the known-user test is membership before insertion.
    pub async fn device_users(&self, device_id: &str) -> Result<Vec<String>, StoreError> {
        self.kv.smembers(&format!("{KEY_DEVICE}:{device_id}")).await
    }

    pub async fn add_device_user(&self, device_id: &str, user_id: &str) -> Result<(), StoreError> {
        self.kv
            .sadd(&format!("{KEY_DEVICE}:{device_id}"), user_id)
            .await
    }

    pub async fn device_user_count(&self, device_id: &str) -> Result<u64, StoreError> {
        self.kv.scard(&format!("{KEY_DEVICE}:{device_id}")).await
    }

    pub async fn unique_devices_24h(&self, user_id: &str) -> Result<u64, StoreError> {
        self.kv
            .scard(&format!("{KEY_USER_DEVICES_24H}:{user_id}"))
            .await
    }

    /// Summaries from the bounded recent lists, newest first, dropping
    /// entries older than `since_ms`.
    pub async fn recent_summaries(
        &self,
        user_id: &str,
        key_prefix: &str,
        since_ms: i64,
    ) -> Result<Vec<TxSummary>, StoreError> {
        let key = format!("{key_prefix}:{user_id}");
        let raw = self.kv.lrange(&key, 0, TX_LIST_MAX_LEN - 1).await?;
        Ok(raw
            .iter()
            .filter_map(|entry| serde_json::from_str::<TxSummary>(entry).ok())
            .filter(|summary| summary.t >= since_ms)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use fraudguard_store::MemoryKv;

    fn windows() -> BehaviorWindows {
        BehaviorWindows::new(Arc::new(MemoryKv::new()))
    }

    #[tokio::test]
    async fn own_sample_counts_in_velocity_window() {
        let windows = windows();
        let now = Utc::now();
        let now_ms = now.timestamp_millis();

        for seconds_ago in [50, 40, 30, 20, 10] {
            windows
                .record_activity("u1", 1000.0, now - Duration::seconds(seconds_ago))
                .await
                .unwrap();
        }
        windows.record_activity("u1", 1000.0, now).await.unwrap();

        let last_minute = windows
            .velocity_count("u1", now_ms - 60_000, now_ms)
            .await
            .unwrap();
        assert_eq!(last_minute, 6);
    }

    #[tokio::test]
    async fn amount_stats_cover_the_trailing_day() {
        let windows = windows();
        let now = Utc::now();

        windows
            .record_amount("u1", 100.0, now - Duration::hours(2))
            .await
            .unwrap();
        windows
            .record_amount("u1", 300.0, now - Duration::hours(1))
            .await
            .unwrap();
        // outside the 24 h read window
        windows
            .record_amount("u1", 9_999.0, now - Duration::hours(30))
            .await
            .unwrap();

        let stats = windows.amount_stats_24h("u1", now).await.unwrap().unwrap();
        assert_eq!(stats.count, 2);
        assert!((stats.mean - 200.0).abs() < 1e-9);

        assert!(windows.amount_stats_24h("u2", now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn geo_round_trips_and_overwrites() {
        let windows = windows();
        assert!(windows.last_geo("u1").await.unwrap().is_none());

        windows
            .set_last_geo(
                "u1",
                GeoPoint {
                    lat: 9.0765,
                    lon: 7.3986,
                },
            )
            .await
            .unwrap();
        let geo = windows.last_geo("u1").await.unwrap().unwrap();
        assert!((geo.lat - 9.0765).abs() < 1e-9);

        windows
            .set_last_geo(
                "u1",
                GeoPoint {
                    lat: 6.5244,
                    lon: 3.3792,
                },
            )
            .await
            .unwrap();
        let geo = windows.last_geo("u1").await.unwrap().unwrap();
        assert!((geo.lon - 3.3792).abs() < 1e-9);
    }

    #[tokio::test]
    async fn device_membership_is_read_before_insertion() {
        let windows = windows();
        windows.add_device_user("d1", "u2").await.unwrap();

        let before = windows.device_users("d1").await.unwrap();
        assert!(before.contains(&"u2".to_string()));
        assert!(!before.contains(&"u1".to_string()));

        windows.add_device_user("d1", "u1").await.unwrap();
        assert_eq!(windows.device_user_count("d1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn summaries_filter_by_age() {
        let windows = windows();
        let now = Utc::now();

        windows
            .record_activity("u1", 50.0, now - Duration::hours(30))
            .await
            .unwrap();
        windows.record_activity("u1", 70.0, now).await.unwrap();

        let since_24h = (now - Duration::hours(24)).timestamp_millis();
        let recent = windows
            .recent_summaries("u1", KEY_TX_24H, since_24h)
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert!((recent[0].amount - 70.0).abs() < 1e-9);

        let since_7d = (now - Duration::days(7)).timestamp_millis();
        let week = windows
            .recent_summaries("u1", KEY_TX_7D, since_7d)
            .await
            .unwrap();
        assert_eq!(week.len(), 2);
    }
}
