// src/services/features.rs - Fixed-length feature vector for the scorer
//
// Extraction is total: a failed window read yields the feature mean, which
// z-score normalization maps to zero. The output is always length 10 and
// finite.
use chrono::{DateTime, Datelike, Timelike, Utc};
use tracing::warn;

use fraudguard_model::FeatureStat;

use crate::constants::{KEY_TX_24H, KEY_TX_7D};
use crate::services::windows::BehaviorWindows;

pub const FEATURE_COUNT: usize = 10;

/// Bootstrap normalization table used until a model artifact provides one.
pub fn bootstrap_stats() -> Vec<FeatureStat> {
    crate::constants::DEFAULT_FEATURE_STATS
        .iter()
        .map(|&(mean, std)| FeatureStat { mean, std })
        .collect()
}

/// The fixed feature order: amount, hour, dayOfWeek, isNewDevice,
/// deviceUserCount, txCountLast24h, avgAmountLast24h, txCountLast7d,
/// avgAmountLast7d, uniqueDevicesLast24h.
#[derive(Clone)]
pub struct FeatureExtractor {
    windows: BehaviorWindows,
    stats: Vec<FeatureStat>,
}

impl FeatureExtractor {
    pub fn new(windows: BehaviorWindows, stats: Vec<FeatureStat>) -> Self {
        debug_assert_eq!(stats.len(), FEATURE_COUNT);
        Self { windows, stats }
    }

    /// Normalized feature vector for one transaction against the current
    /// window state.
    pub async fn extract(
        &self,
        user_id: &str,
        device_id: &str,
        amount: f64,
        at: DateTime<Utc>,
    ) -> [f64; FEATURE_COUNT] {
        let at_ms = at.timestamp_millis();

        let device_user_count = self.read_or_missing(
            self.windows.device_user_count(device_id).await,
            "device_user_count",
        );
        let unique_devices = self.read_or_missing(
            self.windows.unique_devices_24h(user_id).await,
            "unique_devices_24h",
        );
        let day_summaries = self.read_or_missing(
            self.windows
                .recent_summaries(user_id, KEY_TX_24H, at_ms - 86_400_000)
                .await,
            "tx_24h",
        );
        let week_summaries = self.read_or_missing(
            self.windows
                .recent_summaries(user_id, KEY_TX_7D, at_ms - 7 * 86_400_000)
                .await,
            "tx_7d",
        );

        let (day_count, day_avg) = summarize(day_summaries);
        let (week_count, week_avg) = summarize(week_summaries);

        let raw: [Option<f64>; FEATURE_COUNT] = [
            Some(amount),
            Some(at.hour() as f64),
            Some(at.weekday().num_days_from_monday() as f64),
            device_user_count.map(|count| if count == 0 { 1.0 } else { 0.0 }),
            device_user_count.map(|count| count as f64),
            day_count,
            day_avg,
            week_count,
            week_avg,
            unique_devices.map(|count| count as f64),
        ];

        let mut vector = [0.0; FEATURE_COUNT];
        for (index, (value, stat)) in raw.iter().zip(&self.stats).enumerate() {
            vector[index] = normalize(*value, *stat);
        }
        vector
    }

    fn read_or_missing<T>(
        &self,
        result: Result<T, fraudguard_store::StoreError>,
        window: &str,
    ) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                warn!(window, %error, "Window read failed, feature degrades to its mean");
                None
            }
        }
    }
}

fn summarize(
    summaries: Option<Vec<crate::services::windows::TxSummary>>,
) -> (Option<f64>, Option<f64>) {
    match summaries {
        None => (None, None),
        Some(entries) if entries.is_empty() => (Some(0.0), None),
        Some(entries) => {
            let count = entries.len() as f64;
            let total: f64 = entries.iter().map(|summary| summary.amount).sum();
            (Some(count), Some(total / count))
        }
    }
}

/// `(x - mean) / std`; missing or non-finite inputs land on the mean, a
/// zero deviation collapses to zero.
fn normalize(value: Option<f64>, stat: FeatureStat) -> f64 {
    let x = match value {
        Some(v) if v.is_finite() => v,
        _ => stat.mean,
    };
    if stat.std == 0.0 {
        return 0.0;
    }
    let z = (x - stat.mean) / stat.std;
    if z.is_finite() {
        z
    } else {
        0.0
    }
}
