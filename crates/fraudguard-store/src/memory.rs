// In-memory KV store with TTL bookkeeping. Backs unit and integration
// tests so the engine can be exercised without a Redis instance.
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use crate::kv::{KvStore, StoreError};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    // kept ordered by (score, member)
    Sorted(Vec<(f64, String)>),
    Set(HashSet<String>),
    List(VecDeque<String>),
}

#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    expires_at_ms: Option<u64>,
}

#[derive(Default)]
pub struct MemoryKv {
    slots: Mutex<HashMap<String, Slot>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    fn wrong_type(key: &str) -> StoreError {
        StoreError::Backend(format!(
            "WRONGTYPE operation against key {key} holding the wrong kind of value"
        ))
    }
}

/// Run `f` over the live (non-expired) slot map.
fn with_slots<T>(kv: &MemoryKv, f: impl FnOnce(&mut HashMap<String, Slot>) -> T) -> T {
    let mut slots = kv.slots.lock().expect("memory kv poisoned");
    let now = MemoryKv::now_ms();
    slots.retain(|_, slot| slot.expires_at_ms.map(|at| at > now).unwrap_or(true));
    f(&mut slots)
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<(), StoreError> {
        with_slots(self, |slots| {
            let slot = slots.entry(key.to_string()).or_insert_with(|| Slot {
                value: Value::Sorted(Vec::new()),
                expires_at_ms: None,
            });
            match &mut slot.value {
                Value::Sorted(entries) => {
                    entries.retain(|(_, m)| m != member);
                    entries.push((score, member.to_string()));
                    entries.sort_by(|a, b| {
                        a.0.partial_cmp(&b.0)
                            .unwrap_or(std::cmp::Ordering::Equal)
                            .then_with(|| a.1.cmp(&b.1))
                    });
                    Ok(())
                }
                _ => Err(MemoryKv::wrong_type(key)),
            }
        })
    }

    async fn zrange_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<Vec<String>, StoreError> {
        with_slots(self, |slots| match slots.get(key) {
            None => Ok(Vec::new()),
            Some(slot) => match &slot.value {
                Value::Sorted(entries) => Ok(entries
                    .iter()
                    .filter(|(score, _)| *score >= min && *score <= max)
                    .map(|(_, member)| member.clone())
                    .collect()),
                _ => Err(MemoryKv::wrong_type(key)),
            },
        })
    }

    async fn sadd(&self, key: &str, value: &str) -> Result<(), StoreError> {
        with_slots(self, |slots| {
            let slot = slots.entry(key.to_string()).or_insert_with(|| Slot {
                value: Value::Set(HashSet::new()),
                expires_at_ms: None,
            });
            match &mut slot.value {
                Value::Set(members) => {
                    members.insert(value.to_string());
                    Ok(())
                }
                _ => Err(MemoryKv::wrong_type(key)),
            }
        })
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        with_slots(self, |slots| match slots.get(key) {
            None => Ok(Vec::new()),
            Some(slot) => match &slot.value {
                Value::Set(members) => Ok(members.iter().cloned().collect()),
                _ => Err(MemoryKv::wrong_type(key)),
            },
        })
    }

    async fn scard(&self, key: &str) -> Result<u64, StoreError> {
        with_slots(self, |slots| match slots.get(key) {
            None => Ok(0),
            Some(slot) => match &slot.value {
                Value::Set(members) => Ok(members.len() as u64),
                _ => Err(MemoryKv::wrong_type(key)),
            },
        })
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        with_slots(self, |slots| match slots.get(key) {
            None => Ok(None),
            Some(slot) => match &slot.value {
                Value::Str(value) => Ok(Some(value.clone())),
                _ => Err(MemoryKv::wrong_type(key)),
            },
        })
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        with_slots(self, |slots| {
            slots.insert(
                key.to_string(),
                Slot {
                    value: Value::Str(value.to_string()),
                    expires_at_ms: None,
                },
            );
            Ok(())
        })
    }

    async fn set_ex(&self, key: &str, ttl_seconds: u64, value: &str) -> Result<(), StoreError> {
        with_slots(self, |slots| {
            slots.insert(
                key.to_string(),
                Slot {
                    value: Value::Str(value.to_string()),
                    expires_at_ms: Some(MemoryKv::now_ms() + ttl_seconds * 1000),
                },
            );
            Ok(())
        })
    }

    async fn expire(&self, key: &str, ttl_seconds: i64) -> Result<(), StoreError> {
        with_slots(self, |slots| {
            if let Some(slot) = slots.get_mut(key) {
                let ttl_ms = ttl_seconds.max(0) as u64 * 1000;
                slot.expires_at_ms = Some(MemoryKv::now_ms() + ttl_ms);
            }
            Ok(())
        })
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<(), StoreError> {
        with_slots(self, |slots| {
            let slot = slots.entry(key.to_string()).or_insert_with(|| Slot {
                value: Value::List(VecDeque::new()),
                expires_at_ms: None,
            });
            match &mut slot.value {
                Value::List(items) => {
                    items.push_front(value.to_string());
                    Ok(())
                }
                _ => Err(MemoryKv::wrong_type(key)),
            }
        })
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, StoreError> {
        with_slots(self, |slots| match slots.get(key) {
            None => Ok(Vec::new()),
            Some(slot) => match &slot.value {
                Value::List(items) => {
                    let len = items.len() as i64;
                    let resolve = |index: i64| -> i64 {
                        if index < 0 {
                            (len + index).max(0)
                        } else {
                            index
                        }
                    };
                    let start = resolve(start);
                    let stop = resolve(stop).min(len - 1);
                    if len == 0 || start > stop {
                        return Ok(Vec::new());
                    }
                    Ok(items
                        .iter()
                        .skip(start as usize)
                        .take((stop - start + 1) as usize)
                        .cloned()
                        .collect())
                }
                _ => Err(MemoryKv::wrong_type(key)),
            },
        })
    }

    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<(), StoreError> {
        with_slots(self, |slots| {
            if let Some(slot) = slots.get_mut(key) {
                match &mut slot.value {
                    Value::List(items) => {
                        let len = items.len() as i64;
                        let resolve = |index: i64| -> i64 {
                            if index < 0 {
                                (len + index).max(0)
                            } else {
                                index
                            }
                        };
                        let start = resolve(start);
                        let stop = resolve(stop).min(len - 1);
                        let kept: VecDeque<String> = if len == 0 || start > stop {
                            VecDeque::new()
                        } else {
                            items
                                .iter()
                                .skip(start as usize)
                                .take((stop - start + 1) as usize)
                                .cloned()
                                .collect()
                        };
                        *items = kept;
                    }
                    _ => return Err(MemoryKv::wrong_type(key)),
                }
            }
            Ok(())
        })
    }

    async fn incr(&self, key: &str) -> Result<u64, StoreError> {
        with_slots(self, |slots| {
            let current = match slots.get(key) {
                None => 0,
                Some(slot) => match &slot.value {
                    Value::Str(value) => {
                        value.parse::<u64>().map_err(|_| StoreError::Corrupt {
                            key: key.to_string(),
                            message: "counter is not an integer".to_string(),
                        })?
                    }
                    _ => return Err(MemoryKv::wrong_type(key)),
                },
            };
            let next = current + 1;
            slots.insert(
                key.to_string(),
                Slot {
                    value: Value::Str(next.to_string()),
                    expires_at_ms: None,
                },
            );
            Ok(next)
        })
    }
}
