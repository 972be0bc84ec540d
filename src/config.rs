// src/config.rs - Environment-driven configuration management
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;

use crate::constants::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    // Server configuration
    pub port: u16,
    pub host: String,

    // KV store configuration
    pub redis_url: String,

    // Model artifact directory
    pub model_dir: String,

    // Rule thresholds
    pub max_transaction_amount: f64,
    pub max_velocity_per_minute: u64,
    pub max_daily_transactions: u64,
    pub night_time_start: u32,
    pub night_time_end: u32,

    // Fusion & decision
    pub fraud_threshold: f64,
    pub risk_threshold: f64,
    pub rule_weight: f64,
    pub model_weight: f64,

    // Feature flags
    pub enable_ml_model: bool,

    // Per-request deadline
    pub request_deadline_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_SERVER_PORT,
            host: DEFAULT_SERVER_HOST.to_string(),

            redis_url: DEFAULT_REDIS_URL.to_string(),
            model_dir: DEFAULT_MODEL_DIR.to_string(),

            max_transaction_amount: DEFAULT_MAX_TRANSACTION_AMOUNT,
            max_velocity_per_minute: DEFAULT_MAX_VELOCITY_PER_MINUTE,
            max_daily_transactions: DEFAULT_MAX_DAILY_TRANSACTIONS,
            night_time_start: DEFAULT_NIGHT_TIME_START,
            night_time_end: DEFAULT_NIGHT_TIME_END,

            fraud_threshold: DEFAULT_FRAUD_THRESHOLD,
            risk_threshold: DEFAULT_RISK_THRESHOLD,
            rule_weight: DEFAULT_RULE_WEIGHT,
            model_weight: DEFAULT_MODEL_WEIGHT,

            enable_ml_model: true,

            request_deadline_ms: DEFAULT_REQUEST_DEADLINE_MS,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        let mut config = Self::default();

        if let Ok(port) = env::var("PORT") {
            config.port = port.parse().context("Invalid PORT value")?;
        }

        if let Ok(host) = env::var("HOST") {
            config.host = host;
        }

        if let Ok(redis_url) = env::var("REDIS_URL") {
            config.redis_url = redis_url;
        }

        if let Ok(model_dir) = env::var("MODEL_DIR") {
            config.model_dir = model_dir;
        }

        if let Ok(value) = env::var("MAX_TRANSACTION_AMOUNT") {
            config.max_transaction_amount = value
                .parse()
                .context("Invalid MAX_TRANSACTION_AMOUNT value")?;
        }

        if let Ok(value) = env::var("MAX_VELOCITY_PER_MINUTE") {
            config.max_velocity_per_minute = value
                .parse()
                .context("Invalid MAX_VELOCITY_PER_MINUTE value")?;
        }

        if let Ok(value) = env::var("MAX_DAILY_TRANSACTIONS") {
            config.max_daily_transactions = value
                .parse()
                .context("Invalid MAX_DAILY_TRANSACTIONS value")?;
        }

        if let Ok(value) = env::var("NIGHT_TIME_START") {
            config.night_time_start =
                value.parse().context("Invalid NIGHT_TIME_START value")?;
        }

        if let Ok(value) = env::var("NIGHT_TIME_END") {
            config.night_time_end = value.parse().context("Invalid NIGHT_TIME_END value")?;
        }

        if let Ok(value) = env::var("FRAUD_THRESHOLD") {
            config.fraud_threshold = value.parse().context("Invalid FRAUD_THRESHOLD value")?;
        }

        if let Ok(value) = env::var("RISK_THRESHOLD") {
            config.risk_threshold = value.parse().context("Invalid RISK_THRESHOLD value")?;
        }

        if let Ok(value) = env::var("RULE_WEIGHT") {
            config.rule_weight = value.parse().context("Invalid RULE_WEIGHT value")?;
        }

        if let Ok(value) = env::var("MODEL_WEIGHT") {
            config.model_weight = value.parse().context("Invalid MODEL_WEIGHT value")?;
        }

        if let Ok(value) = env::var("ENABLE_ML_MODEL") {
            config.enable_ml_model = matches!(value.to_lowercase().as_str(), "true" | "1");
        }

        if let Ok(value) = env::var("REQUEST_DEADLINE_MS") {
            config.request_deadline_ms =
                value.parse().context("Invalid REQUEST_DEADLINE_MS value")?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject weight and threshold combinations the engine cannot honor.
    pub fn validate(&self) -> Result<()> {
        if (self.rule_weight + self.model_weight - 1.0).abs() > 1e-9 {
            anyhow::bail!(
                "rule_weight ({}) and model_weight ({}) must sum to 1",
                self.rule_weight,
                self.model_weight
            );
        }
        if !(0.0..=1.0).contains(&self.fraud_threshold) {
            anyhow::bail!("fraud_threshold must be within [0, 1]");
        }
        if self.night_time_start > 23 || self.night_time_end > 23 {
            anyhow::bail!("night time hours must be within [0, 23]");
        }
        Ok(())
    }
}
