// Global constants for the FraudGuard risk engine

// Server configuration
pub const DEFAULT_SERVER_HOST: &str = "0.0.0.0";
pub const DEFAULT_SERVER_PORT: u16 = 4100;

// Redis
pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";

// Model artifact directory
pub const DEFAULT_MODEL_DIR: &str = "./model";

// Rule thresholds
pub const DEFAULT_MAX_TRANSACTION_AMOUNT: f64 = 1_000_000.0;
pub const DEFAULT_MAX_VELOCITY_PER_MINUTE: u64 = 5;
pub const MAX_VELOCITY_PER_HOUR: u64 = 20;
pub const DEFAULT_MAX_DAILY_TRANSACTIONS: u64 = 50; // reserved, consumed by no rule
pub const DEFAULT_NIGHT_TIME_START: u32 = 23;
pub const DEFAULT_NIGHT_TIME_END: u32 = 5;

// Amount-pattern rule parameters
pub const AMOUNT_SPIKE_MULTIPLIER: f64 = 10.0;
pub const AMOUNT_SPIKE_FLOOR: f64 = 100_000.0;
pub const ROUND_NUMBER_MODULUS: f64 = 10_000.0;
pub const ROUND_NUMBER_FLOOR: f64 = 50_000.0;

// Geographic rule parameters
pub const GEO_JUMP_KM: f64 = 100.0;
pub const EARTH_RADIUS_KM: f64 = 6371.0;

// Rule contributions
pub const SCORE_VELOCITY_MINUTE: f64 = 0.8;
pub const SCORE_VELOCITY_HOUR: f64 = 0.6;
pub const SCORE_AMOUNT_SPIKE: f64 = 0.7;
pub const SCORE_ROUND_NUMBER: f64 = 0.3;
pub const SCORE_DEVICE_SHARED: f64 = 0.7;
pub const SCORE_GEO_JUMP: f64 = 0.6;
pub const SCORE_AMOUNT_CAP: f64 = 0.5;
pub const SCORE_NIGHT_TIME: f64 = 0.3;

// Rule reasons
pub const REASON_VELOCITY_MINUTE: &str = "High transaction velocity detected (per minute)";
pub const REASON_VELOCITY_HOUR: &str = "High transaction velocity detected (per hour)";
pub const REASON_AMOUNT_SPIKE: &str =
    "Transaction amount significantly higher than usual pattern";
pub const REASON_ROUND_NUMBER: &str = "Round number transaction detected";
pub const REASON_DEVICE_SHARED: &str = "Device associated with multiple users";
pub const REASON_GEO_JUMP: &str = "Unusual geographical location";
pub const REASON_AMOUNT_CAP: &str = "Transaction amount exceeds threshold";
pub const REASON_NIGHT_TIME: &str = "Night time transaction";

// Fusion & decision defaults
pub const DEFAULT_FRAUD_THRESHOLD: f64 = 0.7;
pub const DEFAULT_RISK_THRESHOLD: f64 = 0.5;
pub const DEFAULT_RULE_WEIGHT: f64 = 0.6;
pub const DEFAULT_MODEL_WEIGHT: f64 = 0.4;

// Risk distribution buckets
pub const RISK_BUCKET_LOW_BELOW: f64 = 0.3;
pub const RISK_BUCKET_HIGH_FROM: f64 = 0.7;

// Behavioral window key namespaces
pub const KEY_VELOCITY: &str = "velocity";
pub const KEY_AMOUNT_HISTORY: &str = "amount_history";
pub const KEY_LAST_GEO: &str = "last_geo";
pub const KEY_DEVICE: &str = "device";
pub const KEY_USER_DEVICES_24H: &str = "user_devices_24h";
pub const KEY_TX_24H: &str = "tx_24h";
pub const KEY_TX_7D: &str = "tx_7d";

// Window TTLs (seconds)
pub const TTL_VELOCITY: i64 = 3_600;
pub const TTL_AMOUNT_HISTORY: i64 = 86_400;
pub const TTL_USER_DEVICES_24H: i64 = 86_400;
pub const TTL_TX_24H: i64 = 86_400;
pub const TTL_TX_7D: i64 = 7 * 86_400;

// Recent-transaction list bound
pub const TX_LIST_MAX_LEN: i64 = 500;

// Request deadline
pub const DEFAULT_REQUEST_DEADLINE_MS: u64 = 5_000;

/// Bootstrap (mean, std) normalization table, one row per feature in
/// extraction order: amount, hour, dayOfWeek, isNewDevice, deviceUserCount,
/// txCountLast24h, avgAmountLast24h, txCountLast7d, avgAmountLast7d,
/// uniqueDevicesLast24h. The live table travels inside the model artifact.
pub const DEFAULT_FEATURE_STATS: [(f64, f64); 10] = [
    (50_000.0, 200_000.0),
    (12.0, 6.93),
    (3.0, 2.0),
    (0.1, 0.3),
    (1.5, 1.0),
    (5.0, 10.0),
    (50_000.0, 200_000.0),
    (20.0, 30.0),
    (50_000.0, 200_000.0),
    (1.2, 0.8),
];
