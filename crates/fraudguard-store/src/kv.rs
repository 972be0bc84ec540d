// Typed facade over the key-value operations the risk engine actually uses.
use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by the KV layer. No retries happen here; callers decide
/// whether a failed read is fatal to their request.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("KV backend error: {0}")]
    Backend(String),

    #[error("corrupt value at {key}: {message}")]
    Corrupt { key: String, message: String },
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// The store operations used by the behavioral windows, the record sink and
/// the model version counter. Absent keys are reported as empty results or
/// `None`, never as errors.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Add `member` to the sorted set at `key` with the given score.
    async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<(), StoreError>;

    /// Members of the sorted set at `key` with scores in `[min, max]`,
    /// ordered by ascending score.
    async fn zrange_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<Vec<String>, StoreError>;

    /// Add `value` to the set at `key`.
    async fn sadd(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// All members of the set at `key`.
    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Cardinality of the set at `key` (0 when absent).
    async fn scard(&self, key: &str) -> Result<u64, StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Set `key` to `value` with a TTL in seconds.
    async fn set_ex(&self, key: &str, ttl_seconds: u64, value: &str) -> Result<(), StoreError>;

    /// Refresh the TTL of an existing key.
    async fn expire(&self, key: &str, ttl_seconds: i64) -> Result<(), StoreError>;

    /// Push `value` to the head of the list at `key`.
    async fn lpush(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Elements `[start, stop]` of the list at `key` (negative indices count
    /// from the tail, Redis semantics).
    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, StoreError>;

    /// Trim the list at `key` to `[start, stop]`.
    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<(), StoreError>;

    /// Increment the counter at `key`, returning the new value.
    async fn incr(&self, key: &str) -> Result<u64, StoreError>;
}
