//! Cache-aside wrapper for search pages
//!
//! Pages are cached under a stable key derived from the normalized filter,
//! pagination and projection. Freshness is TTL-only: mutations do not
//! invalidate this cache, the bounded staleness window is an accepted
//! trade-off.

use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use crate::db::cache::CacheStore;
use crate::db::search::SearchFilter;
use crate::models::Page;
use crate::Result;

/// Build the cache key for one logical search request.
///
/// Filter fields are sorted by name and projection fields sorted and
/// deduplicated before hashing, so key equality matches logical-request
/// equality regardless of input ordering.
pub fn cache_key(filter: &SearchFilter, first: i64, after: Option<&str>, fields: &[&str]) -> String {
    let filter_value = serde_json::to_value(filter).unwrap_or(JsonValue::Null);
    let sorted_filter: BTreeMap<String, JsonValue> = match filter_value {
        JsonValue::Object(map) => map.into_iter().collect(),
        _ => BTreeMap::new(),
    };

    let mut sorted_fields: Vec<&str> = fields.to_vec();
    sorted_fields.sort_unstable();
    sorted_fields.dedup();

    let payload = serde_json::json!({
        "filter": sorted_filter,
        "first": first,
        "after": after,
        "fields": sorted_fields,
    });

    let digest = Sha256::digest(payload.to_string().as_bytes());
    format!("search:v1:{}", hex::encode(digest))
}

/// Cache-aside read path over a [`CacheStore`].
pub struct ResultCache {
    store: Arc<dyn CacheStore>,
    ttl_seconds: u64,
}

impl ResultCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl_seconds: u64) -> Self {
        Self { store, ttl_seconds }
    }

    /// Return the cached page for `key`, or compute, store and return it.
    ///
    /// Store failures and undecodable entries are treated as a miss: the
    /// cache degrades to direct computation rather than failing the request.
    pub async fn get_or_compute<F, Fut>(&self, key: &str, compute: F) -> Result<Page>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Page>>,
    {
        match self.store.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str::<Page>(&raw) {
                Ok(page) => {
                    tracing::debug!(key, "search cache hit");
                    return Ok(page);
                }
                Err(err) => {
                    tracing::warn!(key, error = %err, "discarding undecodable cache entry");
                }
            },
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(key, error = %err, "cache read failed, bypassing cache");
            }
        }

        let page = compute().await?;

        match serde_json::to_string(&page) {
            Ok(serialized) => {
                if let Err(err) = self.store.set_ex(key, self.ttl_seconds, &serialized).await {
                    tracing::warn!(key, error = %err, "cache write failed");
                }
            }
            Err(err) => {
                tracing::warn!(key, error = %err, "failed to serialize page for caching");
            }
        }

        Ok(page)
    }
}
