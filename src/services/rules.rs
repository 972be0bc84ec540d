// src/services/rules.rs - Weighted rule evaluation over behavioral windows
//
// Rules touching disjoint key families run concurrently; contributions are
// combined by a commutative sum clamped to 1. Reasons keep first-occurrence
// order with a membership guard. Optional-input rules degrade to zero
// contribution when their KV reads fail; the velocity reads are required
// and fail the request.
use std::sync::Arc;

use chrono::{DateTime, Timelike, Utc};
use tracing::{debug, instrument, warn};

use fraudguard_store::{GeoPoint, StoreError};

use crate::config::AppConfig;
use crate::constants::*;
use crate::models::risk::RuleOutcome;
use crate::models::transaction::TransactionInput;
use crate::services::windows::BehaviorWindows;

/// One triggered rule: its additive contribution and reason.
#[derive(Debug, Clone, Copy)]
struct RuleHit {
    score: f64,
    reason: &'static str,
}

/// Great-circle distance between two points on a sphere of radius 6371 km.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let delta_phi = (b.lat - a.lat).to_radians();
    let delta_lambda = (b.lon - a.lon).to_radians();

    let h = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

#[derive(Clone)]
pub struct RuleEngine {
    windows: BehaviorWindows,
    config: Arc<AppConfig>,
}

impl RuleEngine {
    pub fn new(windows: BehaviorWindows, config: Arc<AppConfig>) -> Self {
        Self { windows, config }
    }

    /// Evaluate the fixed rule set against one transaction. Expects the
    /// transaction's own window samples to be recorded already.
    #[instrument(skip(self, tx), fields(user_id = %tx.user_id, device_id = %tx.device_id))]
    pub async fn evaluate(
        &self,
        tx: &TransactionInput,
        now: DateTime<Utc>,
    ) -> Result<RuleOutcome, StoreError> {
        let (velocity, amount_pattern, device, geo) = tokio::join!(
            self.velocity_rules(&tx.user_id, now),
            self.amount_pattern_rules(tx, now),
            self.device_rule(tx),
            self.geo_rule(tx),
        );

        // the velocity window is the engine's own write path; its failure
        // is fatal to the request
        let (per_minute, per_hour) = velocity?;
        let (spike, round_number) = amount_pattern;
        let cap = self.amount_cap_rule(tx);
        let night = self.night_rule(now);

        let mut outcome = RuleOutcome::clean();
        let hits = [
            per_minute,
            per_hour,
            spike,
            round_number,
            device,
            geo,
            cap,
            night,
        ];
        for hit in hits.into_iter().flatten() {
            outcome.rule_score += hit.score;
            if !outcome.reasons.iter().any(|reason| reason == hit.reason) {
                outcome.reasons.push(hit.reason.to_string());
            }
        }

        if outcome.rule_score > 1.0 {
            debug!(
                raw_score = outcome.rule_score,
                "Rule contributions exceed 1, clamping"
            );
        }
        outcome.rule_score = outcome.rule_score.min(1.0);

        Ok(outcome)
    }

    /// Per-minute and per-hour velocity; both may fire on one transaction.
    async fn velocity_rules(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(Option<RuleHit>, Option<RuleHit>), StoreError> {
        let now_ms = now.timestamp_millis();

        let per_minute = self
            .windows
            .velocity_count(user_id, now_ms - 60_000, now_ms)
            .await?;
        let per_hour = self
            .windows
            .velocity_count(user_id, now_ms - 3_600_000, now_ms)
            .await?;

        let minute_hit = (per_minute > self.config.max_velocity_per_minute).then_some(RuleHit {
            score: SCORE_VELOCITY_MINUTE,
            reason: REASON_VELOCITY_MINUTE,
        });
        let hour_hit = (per_hour > MAX_VELOCITY_PER_HOUR).then_some(RuleHit {
            score: SCORE_VELOCITY_HOUR,
            reason: REASON_VELOCITY_HOUR,
        });
        Ok((minute_hit, hour_hit))
    }

    /// Amount spike against the prior 24 h mean, and round-number amounts.
    /// The current amount joins the history after the check.
    async fn amount_pattern_rules(
        &self,
        tx: &TransactionInput,
        now: DateTime<Utc>,
    ) -> (Option<RuleHit>, Option<RuleHit>) {
        let spike = match self.windows.amount_stats_24h(&tx.user_id, now).await {
            Ok(Some(stats)) => (tx.amount > AMOUNT_SPIKE_MULTIPLIER * stats.mean
                && tx.amount > AMOUNT_SPIKE_FLOOR)
                .then_some(RuleHit {
                    score: SCORE_AMOUNT_SPIKE,
                    reason: REASON_AMOUNT_SPIKE,
                }),
            Ok(None) => None,
            Err(error) => {
                warn!(user_id = %tx.user_id, %error, "Amount history read failed, rule degrades to zero");
                None
            }
        };

        if let Err(error) = self.windows.record_amount(&tx.user_id, tx.amount, now).await {
            warn!(user_id = %tx.user_id, %error, "Amount history write failed");
        }

        let round_number = (tx.amount % ROUND_NUMBER_MODULUS == 0.0
            && tx.amount >= ROUND_NUMBER_FLOOR)
            .then_some(RuleHit {
                score: SCORE_ROUND_NUMBER,
                reason: REASON_ROUND_NUMBER,
            });

        (spike, round_number)
    }

    /// Device seen with other users. Membership is tested before this
    /// transaction's user is inserted.
    async fn device_rule(&self, tx: &TransactionInput) -> Option<RuleHit> {
        let hit = match self.windows.device_users(&tx.device_id).await {
            Ok(users) => (!users.is_empty() && !users.iter().any(|u| u == &tx.user_id))
                .then_some(RuleHit {
                    score: SCORE_DEVICE_SHARED,
                    reason: REASON_DEVICE_SHARED,
                }),
            Err(error) => {
                warn!(device_id = %tx.device_id, %error, "Device set read failed, rule degrades to zero");
                None
            }
        };

        if let Err(error) = self
            .windows
            .add_device_user(&tx.device_id, &tx.user_id)
            .await
        {
            warn!(device_id = %tx.device_id, %error, "Device set write failed");
        }
        hit
    }

    /// Geographical jump over 100 km from the last known location.
    /// Skipped entirely when the transaction carries no location.
    async fn geo_rule(&self, tx: &TransactionInput) -> Option<RuleHit> {
        let location = tx.location?;

        let hit = match self.windows.last_geo(&tx.user_id).await {
            Ok(Some(previous)) => {
                let distance_km = haversine_km(location, previous);
                (distance_km > GEO_JUMP_KM).then_some(RuleHit {
                    score: SCORE_GEO_JUMP,
                    reason: REASON_GEO_JUMP,
                })
            }
            Ok(None) => None,
            Err(error) => {
                warn!(user_id = %tx.user_id, %error, "Geo read failed, rule degrades to zero");
                None
            }
        };

        if let Err(error) = self.windows.set_last_geo(&tx.user_id, location).await {
            warn!(user_id = %tx.user_id, %error, "Geo write failed");
        }
        hit
    }

    /// Absolute amount cap.
    fn amount_cap_rule(&self, tx: &TransactionInput) -> Option<RuleHit> {
        (tx.amount > self.config.max_transaction_amount).then_some(RuleHit {
            score: SCORE_AMOUNT_CAP,
            reason: REASON_AMOUNT_CAP,
        })
    }

    /// Night-time hours, inclusive wrap-around range.
    fn night_rule(&self, now: DateTime<Utc>) -> Option<RuleHit> {
        let hour = now.hour();
        let start = self.config.night_time_start;
        let end = self.config.night_time_end;
        let is_night = if start <= end {
            hour >= start && hour <= end
        } else {
            hour >= start || hour <= end
        };
        is_night.then_some(RuleHit {
            score: SCORE_NIGHT_TIME,
            reason: REASON_NIGHT_TIME,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use fraudguard_store::{KvStore, MemoryKv};

    fn engine() -> (RuleEngine, BehaviorWindows, Arc<dyn KvStore>) {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let windows = BehaviorWindows::new(kv.clone());
        let config = Arc::new(AppConfig::default());
        (RuleEngine::new(windows.clone(), config), windows, kv)
    }

    fn transfer(user_id: &str, device_id: &str, amount: f64) -> TransactionInput {
        TransactionInput {
            user_id: user_id.to_string(),
            device_id: device_id.to_string(),
            amount,
            currency: "NGN".to_string(),
            transaction_type: fraudguard_store::TransactionType::Transfer,
            location: None,
            beneficiary_account: None,
            beneficiary_bank_code: None,
            merchant_id: None,
            card_details: None,
            created_at: None,
        }
    }

    fn midday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn clean_transaction_scores_zero() {
        let (engine, windows, _) = engine();
        let tx = transfer("u1", "d1", 5_000.0);
        let now = midday();

        windows.record_activity("u1", 5_000.0, now).await.unwrap();
        let outcome = engine.evaluate(&tx, now).await.unwrap();

        assert_eq!(outcome.rule_score, 0.0);
        assert!(outcome.reasons.is_empty());
    }

    #[tokio::test]
    async fn sixth_transaction_in_a_minute_fires_velocity() {
        let (engine, windows, _) = engine();
        let now = midday();

        for seconds_ago in [50, 40, 30, 20, 10] {
            windows
                .record_activity("u1", 1_000.0, now - Duration::seconds(seconds_ago))
                .await
                .unwrap();
        }
        windows.record_activity("u1", 1_000.0, now).await.unwrap();

        let outcome = engine
            .evaluate(&transfer("u1", "d1", 1_000.0), now)
            .await
            .unwrap();
        assert!(outcome
            .reasons
            .contains(&REASON_VELOCITY_MINUTE.to_string()));
        assert!(outcome.rule_score >= SCORE_VELOCITY_MINUTE);
    }

    #[tokio::test]
    async fn hourly_velocity_fires_alongside_per_minute() {
        let (engine, windows, _) = engine();
        let now = midday();

        // 21 samples inside the hour but outside the minute window
        for i in 0..21 {
            windows
                .record_activity("u1", 100.0, now - Duration::seconds(120 + i * 60))
                .await
                .unwrap();
        }
        // 6 samples inside the minute
        for i in 0..6 {
            windows
                .record_activity("u1", 100.0, now - Duration::seconds(i * 8))
                .await
                .unwrap();
        }

        let outcome = engine
            .evaluate(&transfer("u1", "d1", 100.0), now)
            .await
            .unwrap();
        assert!(outcome
            .reasons
            .contains(&REASON_VELOCITY_MINUTE.to_string()));
        assert!(outcome.reasons.contains(&REASON_VELOCITY_HOUR.to_string()));
        // both contributions add before the clamp
        assert_eq!(outcome.rule_score, 1.0);
    }

    #[tokio::test]
    async fn amount_spike_needs_history_and_floor() {
        let (engine, windows, _) = engine();
        let now = midday();

        for hours_ago in 1..=3 {
            windows
                .record_amount("u1", 1_000.0, now - Duration::hours(hours_ago))
                .await
                .unwrap();
        }
        let spike = 150_000.0;
        windows.record_activity("u1", spike, now).await.unwrap();

        let outcome = engine
            .evaluate(&transfer("u1", "d1", spike), now)
            .await
            .unwrap();
        assert!(outcome.reasons.contains(&REASON_AMOUNT_SPIKE.to_string()));

        // below the absolute floor no spike fires, whatever the ratio
        let (engine, windows, _) = self::engine();
        for hours_ago in 1..=3 {
            windows
                .record_amount("u2", 100.0, now - Duration::hours(hours_ago))
                .await
                .unwrap();
        }
        windows.record_activity("u2", 50_000.0, now).await.unwrap();
        let outcome = engine
            .evaluate(&transfer("u2", "d1", 50_000.0), now)
            .await
            .unwrap();
        assert!(!outcome.reasons.contains(&REASON_AMOUNT_SPIKE.to_string()));
    }

    #[tokio::test]
    async fn first_transaction_has_no_history_to_spike_against() {
        let (engine, windows, _) = engine();
        let now = midday();
        windows.record_activity("u1", 500_000.0, now).await.unwrap();

        let outcome = engine
            .evaluate(&transfer("u1", "d1", 500_000.0), now)
            .await
            .unwrap();
        assert!(!outcome.reasons.contains(&REASON_AMOUNT_SPIKE.to_string()));
    }

    #[tokio::test]
    async fn round_number_fires_at_the_floor() {
        let (engine, windows, _) = engine();
        let now = midday();
        windows.record_activity("u1", 50_000.0, now).await.unwrap();

        let outcome = engine
            .evaluate(&transfer("u1", "d1", 50_000.0), now)
            .await
            .unwrap();
        assert!(outcome.reasons.contains(&REASON_ROUND_NUMBER.to_string()));

        let outcome = engine
            .evaluate(&transfer("u1", "d1", 49_999.0), now)
            .await
            .unwrap();
        assert!(!outcome.reasons.contains(&REASON_ROUND_NUMBER.to_string()));
    }

    #[tokio::test]
    async fn shared_device_fires_before_user_is_inserted() {
        let (engine, windows, _) = engine();
        let now = midday();
        windows.add_device_user("d1", "u2").await.unwrap();
        windows.record_activity("u1", 1_000.0, now).await.unwrap();

        let outcome = engine
            .evaluate(&transfer("u1", "d1", 1_000.0), now)
            .await
            .unwrap();
        assert!(outcome.reasons.contains(&REASON_DEVICE_SHARED.to_string()));

        // u1 is now a known user of d1; a repeat does not fire
        windows.record_activity("u1", 1_000.0, now).await.unwrap();
        let outcome = engine
            .evaluate(&transfer("u1", "d1", 1_000.0), now)
            .await
            .unwrap();
        assert!(!outcome.reasons.contains(&REASON_DEVICE_SHARED.to_string()));
    }

    #[tokio::test]
    async fn abuja_to_lagos_is_a_geo_jump() {
        let (engine, windows, _) = engine();
        let now = midday();
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
        windows.record_activity("u1", 1_000.0, now).await.unwrap();

        let mut tx = transfer("u1", "d1", 1_000.0);
        tx.location = Some(GeoPoint {
            lat: 6.5244,
            lon: 3.3792,
        });

        let outcome = engine.evaluate(&tx, now).await.unwrap();
        assert!(outcome.reasons.contains(&REASON_GEO_JUMP.to_string()));

        // geo was overwritten; the same location again is no jump
        windows.record_activity("u1", 1_000.0, now).await.unwrap();
        let outcome = engine.evaluate(&tx, now).await.unwrap();
        assert!(!outcome.reasons.contains(&REASON_GEO_JUMP.to_string()));
    }

    #[tokio::test]
    async fn missing_location_skips_the_geo_rule() {
        let (engine, windows, _) = engine();
        let now = midday();
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
        windows.record_activity("u1", 1_000.0, now).await.unwrap();

        let outcome = engine
            .evaluate(&transfer("u1", "d1", 1_000.0), now)
            .await
            .unwrap();
        assert!(!outcome.reasons.contains(&REASON_GEO_JUMP.to_string()));
    }

    #[tokio::test]
    async fn amount_cap_and_night_add_up() {
        let (engine, windows, _) = engine();
        let night = Utc.with_ymd_and_hms(2024, 6, 1, 2, 0, 0).unwrap();
        windows
            .record_activity("u1", 2_000_000.0, night)
            .await
            .unwrap();

        let outcome = engine
            .evaluate(&transfer("u1", "d1", 2_000_000.0), night)
            .await
            .unwrap();
        assert!(outcome.reasons.contains(&REASON_AMOUNT_CAP.to_string()));
        assert!(outcome.reasons.contains(&REASON_NIGHT_TIME.to_string()));
        assert!((outcome.rule_score - 0.8).abs() < 1e-9);
    }

    #[tokio::test]
    async fn night_window_wraps_around_midnight() {
        let (engine, windows, _) = engine();
        for (hour, expected) in [(23, true), (2, true), (5, true), (6, false), (12, false)] {
            let at = Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap();
            windows.record_activity("u1", 10.0, at).await.unwrap();
            let outcome = engine.evaluate(&transfer("u1", "d1", 10.0), at).await.unwrap();
            assert_eq!(
                outcome.reasons.contains(&REASON_NIGHT_TIME.to_string()),
                expected,
                "hour {hour}"
            );
        }
    }

    #[test]
    fn haversine_is_symmetric_and_matches_known_distance() {
        let abuja = GeoPoint {
            lat: 9.0765,
            lon: 7.3986,
        };
        let lagos = GeoPoint {
            lat: 6.5244,
            lon: 3.3792,
        };

        let there = haversine_km(abuja, lagos);
        let back = haversine_km(lagos, abuja);
        assert!((there - back).abs() < 1e-9);
        // roughly 525 km apart
        assert!((there - 525.0).abs() < 15.0, "distance was {there}");

        assert!(haversine_km(abuja, abuja).abs() < 1e-9);
    }
}
