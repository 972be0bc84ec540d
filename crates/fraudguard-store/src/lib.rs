pub mod kv;
pub mod memory;
pub mod models;
pub mod records;
pub mod redis;

pub use kv::{KvStore, StoreError};
pub use memory::MemoryKv;
pub use models::{
    CardDetails, GeoPoint, TransactionRecord, TransactionStatus, TransactionType,
};
pub use records::{KvRecords, TransactionStore};
pub use self::redis::RedisKv;

use ::redis::aio::ConnectionManager;

/// Open a Redis connection manager for the engine's KV state.
pub async fn connect(redis_url: &str) -> anyhow::Result<ConnectionManager> {
    let client = ::redis::Client::open(redis_url)?;
    let manager = ConnectionManager::new(client).await?;
    Ok(manager)
}
