//! Cache store boundary
//!
//! The shared result cache (Redis or similar in production) is consumed
//! through [`CacheStore`]. Errors from the store are soft-failed by callers:
//! a broken cache degrades to direct computation, never a failed request.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::Result;

/// Key/value cache with per-entry TTL.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a value. `Ok(None)` is a miss; `Err` is a store failure.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value with an expiry.
    async fn set_ex(&self, key: &str, ttl_seconds: u64, value: &str) -> Result<()>;
}

/// In-memory TTL cache for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, MemoryEntry>>,
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.read().await;
        entries.values().filter(|e| e.expires_at > now).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every entry.
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.clear();
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            _ => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, ttl_seconds: u64, value: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: Instant::now() + Duration::from_secs(ttl_seconds),
            },
        );
        Ok(())
    }
}
