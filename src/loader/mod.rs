//! Per-request batch loading
//!
//! [`BatchLoader`] collapses the individual "load relation by key" calls a
//! resolver pass makes into one batched fetch per relation. The first load
//! of a window schedules a flush task that yields once before draining, so
//! every load issued during the same poll cycle coalesces into a single
//! [`BatchFetch::fetch`] invocation; loads issued later start an
//! independent batch.
//!
//! Loader instances live exactly as long as the owning request (see
//! [`crate::request_context::RequestContext`]); their caches are never
//! shared across requests.

pub mod fetchers;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;

use crate::{Error, Result};

/// Error shared by every caller coalesced into one failed batch.
pub type SharedError = Arc<Error>;

type LoadResult<V> = std::result::Result<Option<V>, SharedError>;
type SharedLoad<V> = Shared<BoxFuture<'static, LoadResult<V>>>;

/// A batched fetch over one relation.
///
/// `fetch` receives the deduplicated, first-seen-order union of the keys
/// registered in one batching window and returns the found values by key.
/// Keys absent from the map resolve to `None` for their callers; for
/// one-to-many relations the fetcher groups rows by foreign key first (see
/// [`fetchers::group_rows`]).
#[async_trait]
pub trait BatchFetch: Send + Sync + 'static {
    type Key: Eq + Hash + Clone + Send + Sync + 'static;
    type Value: Clone + Send + Sync + 'static;

    async fn fetch(&self, keys: &[Self::Key]) -> Result<HashMap<Self::Key, Self::Value>>;
}

/// Batching, deduplicating, per-request-caching loader.
pub struct BatchLoader<F: BatchFetch> {
    inner: Arc<Inner<F>>,
}

struct Inner<F: BatchFetch> {
    fetcher: F,
    state: Mutex<State<F::Key, F::Value>>,
}

struct State<K, V> {
    /// Settled and in-flight loads for the lifetime of this instance.
    cache: HashMap<K, SharedLoad<V>>,
    /// Keys registered since the last flush, first-seen order.
    pending: Vec<(K, oneshot::Sender<LoadResult<V>>)>,
}

impl<F: BatchFetch> BatchLoader<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            inner: Arc::new(Inner {
                fetcher,
                state: Mutex::new(State {
                    cache: HashMap::new(),
                    pending: Vec::new(),
                }),
            }),
        }
    }

    /// Load one value by key.
    ///
    /// Duplicate loads for the same key within one window share a single
    /// future; missing keys resolve to `Ok(None)`, never an error. A failed
    /// batch rejects every coalesced caller with the same shared error.
    pub async fn load(&self, key: F::Key) -> Result<Option<F::Value>> {
        let fut = {
            let mut state = self.inner.lock_state();
            if let Some(fut) = state.cache.get(&key) {
                fut.clone()
            } else {
                let (tx, rx) = oneshot::channel();
                let fut: SharedLoad<F::Value> = async move {
                    match rx.await {
                        Ok(result) => result,
                        Err(_) => Err(Arc::new(Error::Internal(
                            "batch loader dropped a pending fetch".to_string(),
                        ))),
                    }
                }
                .boxed()
                .shared();
                state.cache.insert(key.clone(), fut.clone());
                // The first registration of a window schedules its flush; the
                // flush task survives even if every caller is cancelled.
                if state.pending.is_empty() {
                    let inner = self.inner.clone();
                    tokio::spawn(async move { inner.flush().await });
                }
                state.pending.push((key, tx));
                fut
            }
        };

        fut.await.map_err(Error::Batch)
    }

    /// Load many keys, preserving input order (duplicates allowed).
    pub async fn load_many(&self, keys: Vec<F::Key>) -> Result<Vec<Option<F::Value>>> {
        futures::future::try_join_all(keys.into_iter().map(|key| self.load(key))).await
    }

    /// Forget one key. Mutation handlers call this after changing the
    /// backing rows; the next load fetches fresh data.
    pub fn clear(&self, key: &F::Key) {
        self.inner.lock_state().cache.remove(key);
    }

    /// Forget every cached key.
    pub fn clear_all(&self) {
        self.inner.lock_state().cache.clear();
    }

    /// Number of cached (settled or in-flight) keys.
    pub fn cached_len(&self) -> usize {
        self.inner.lock_state().cache.len()
    }
}

impl<F: BatchFetch> Inner<F> {
    fn lock_state(&self) -> std::sync::MutexGuard<'_, State<F::Key, F::Value>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run the pending batch through the fetcher and settle every waiter.
    async fn flush(&self) {
        // Let every load issued during the registering task's poll cycle
        // enqueue before the batch is taken.
        tokio::task::yield_now().await;

        let batch = {
            let mut state = self.lock_state();
            std::mem::take(&mut state.pending)
        };
        if batch.is_empty() {
            return;
        }

        // pending is deduplicated via the cache, but a clear() between
        // registration and flush can reintroduce a key; dedup defensively.
        let mut keys: Vec<F::Key> = Vec::with_capacity(batch.len());
        for (key, _) in &batch {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }

        match self.fetcher.fetch(&keys).await {
            Ok(found) => {
                for (key, tx) in batch {
                    let _ = tx.send(Ok(found.get(&key).cloned()));
                }
            }
            Err(err) => {
                // Failures are not cached: a re-issued load gets a fresh
                // fetch instead of the stored rejection.
                {
                    let mut state = self.lock_state();
                    for (key, _) in &batch {
                        state.cache.remove(key);
                    }
                }
                let shared = Arc::new(err);
                for (_, tx) in batch {
                    let _ = tx.send(Err(shared.clone()));
                }
            }
        }
    }
}
