//! Single-flight comparison cache.
//!
//! [`ComparisonCache::get_or_compute`] serves a request from the
//! [`CacheStore`] when possible. On a miss, the first caller for a
//! fingerprint becomes the leader and runs the computation; later callers for
//! the same fingerprint subscribe to the leader's `watch` channel and receive
//! the same outcome. The in-flight entry is removed when the leader finishes,
//! fails, is cancelled, or is dropped mid-await.
//!
//! Store failures never fail a comparison: a failed read is a miss and a
//! failed write is logged.
//!
//! Each category carries an invalidation generation. A leader records the
//! generation before computing and only stores its result if no invalidation
//! of the category happened in the meantime. Invalidation also detaches the
//! category's in-flight entries, so requests that arrive afterwards start a
//! fresh computation instead of joining a stale one.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use pareto_core::cache_store::CacheStore;
use pareto_core::error::{CompareError, CompareResult};
use pareto_core::fingerprint::{category_prefix, Fingerprint, KEY_SEPARATOR};
use pareto_core::models::ComparisonResult;

type Outcome = Option<CompareResult<Arc<ComparisonResult>>>;

/// A comparison result and whether it came out of the store.
#[derive(Debug, Clone)]
pub struct Lookup {
    pub result: Arc<ComparisonResult>,
    pub cached: bool,
}

pub struct ComparisonCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    key_prefix: String,
    inflight: Mutex<HashMap<String, Inflight>>,
    generations: Mutex<HashMap<String, u64>>,
    /// Bumped by [`ComparisonCache::flush`]; part of every category's generation.
    epoch: AtomicU64,
    next_id: AtomicU64,
}

/// A running computation that new callers may join.
struct Inflight {
    id: u64,
    rx: watch::Receiver<Outcome>,
}

enum Role {
    Leader(u64, watch::Sender<Outcome>),
    Follower(watch::Receiver<Outcome>),
}

/// Owns the leader's in-flight entry. Dropping it unsettled tells every
/// waiter the computation was cancelled.
struct InflightGuard<'a> {
    cache: &'a ComparisonCache,
    key: String,
    id: u64,
    tx: watch::Sender<Outcome>,
    settled: bool,
}

impl InflightGuard<'_> {
    fn settle(mut self, outcome: CompareResult<Arc<ComparisonResult>>) {
        self.publish(outcome);
        self.settled = true;
    }

    fn publish(&self, outcome: CompareResult<Arc<ComparisonResult>>) {
        {
            let mut inflight = self.cache.inflight();
            // The entry may have been detached by an invalidation and
            // replaced by a newer leader.
            if inflight.get(&self.key).is_some_and(|entry| entry.id == self.id) {
                inflight.remove(&self.key);
            }
        }
        self.tx.send_replace(Some(outcome));
    }
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.publish(Err(CompareError::ComputationCancelled(
                "leading computation was dropped".to_string(),
            )));
        }
    }
}

impl ComparisonCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration, key_prefix: impl Into<String>) -> Self {
        Self {
            store,
            ttl,
            key_prefix: key_prefix.into(),
            inflight: Mutex::new(HashMap::new()),
            generations: Mutex::new(HashMap::new()),
            epoch: AtomicU64::new(0),
            next_id: AtomicU64::new(0),
        }
    }

    fn inflight(&self) -> MutexGuard<'_, HashMap<String, Inflight>> {
        // The maps are only mutated by insert/remove, so a poisoned lock still
        // holds a consistent map.
        self.inflight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn generations(&self) -> MutexGuard<'_, HashMap<String, u64>> {
        self.generations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Invalidation generation of a category; changes with every
    /// invalidation of the category and every flush.
    fn generation(&self, category_id: &str) -> u64 {
        let own = self.generations().get(category_id).copied().unwrap_or(0);
        self.epoch.load(Ordering::SeqCst) + own
    }

    /// Bumps the category's generation and detaches its in-flight entries.
    fn retire(&self, category_id: &str) {
        *self.generations().entry(category_id.to_string()).or_insert(0) += 1;

        let prefix = category_prefix(&self.key_prefix, category_id);
        self.inflight().retain(|key, _| !key.starts_with(&prefix));
    }

    /// Number of computations currently in flight.
    pub fn inflight_len(&self) -> usize {
        self.inflight().len()
    }

    pub fn key_for(&self, fingerprint: &Fingerprint) -> String {
        fingerprint.cache_key(&self.key_prefix)
    }

    /// Returns the cached result for `fingerprint`, or runs `compute` exactly
    /// once across all concurrent callers with the same fingerprint.
    ///
    /// Successful results are written back with the configured TTL. Errors,
    /// including cancellation, are handed to every waiter and never cached.
    pub async fn get_or_compute<F, Fut>(
        &self,
        fingerprint: &Fingerprint,
        cancel: &CancellationToken,
        compute: F,
    ) -> CompareResult<Lookup>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CompareResult<ComparisonResult>>,
    {
        let key = self.key_for(fingerprint);
        let generation = self.generation(&fingerprint.category_id);

        if let Some(result) = self.read(&key, cancel).await {
            return Ok(Lookup {
                result,
                cached: true,
            });
        }

        let role = {
            let mut inflight = self.inflight();
            match inflight.get(&key) {
                Some(entry) => Role::Follower(entry.rx.clone()),
                None => {
                    let (tx, rx) = watch::channel(None);
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    inflight.insert(key.clone(), Inflight { id, rx });
                    Role::Leader(id, tx)
                }
            }
        };

        match role {
            Role::Follower(rx) => {
                tracing::debug!(key = %key, "joining in-flight comparison");
                self.follow(rx, cancel).await
            }
            Role::Leader(id, tx) => {
                let guard = InflightGuard {
                    cache: self,
                    key,
                    id,
                    tx,
                    settled: false,
                };
                self.lead(guard, fingerprint, generation, cancel, compute)
                    .await
            }
        }
    }

    async fn follow(
        &self,
        mut rx: watch::Receiver<Outcome>,
        cancel: &CancellationToken,
    ) -> CompareResult<Lookup> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CompareError::ComputationCancelled(
                "request cancelled while waiting for an in-flight comparison".to_string(),
            )),
            outcome = rx.wait_for(|outcome| outcome.is_some()) => match outcome {
                Ok(outcome) => match &*outcome {
                    Some(Ok(result)) => Ok(Lookup { result: result.clone(), cached: false }),
                    Some(Err(e)) => Err(e.clone()),
                    None => Err(CompareError::Internal("in-flight outcome missing".to_string())),
                },
                Err(_) => Err(CompareError::ComputationCancelled(
                    "leading computation went away".to_string(),
                )),
            },
        }
    }

    async fn lead<F, Fut>(
        &self,
        guard: InflightGuard<'_>,
        fingerprint: &Fingerprint,
        generation: u64,
        cancel: &CancellationToken,
        compute: F,
    ) -> CompareResult<Lookup>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CompareResult<ComparisonResult>>,
    {
        // Another leader may have finished between our read and taking the slot.
        if let Some(result) = self.read(&guard.key, cancel).await {
            guard.settle(Ok(result.clone()));
            return Ok(Lookup {
                result,
                cached: true,
            });
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CompareError::ComputationCancelled(
                "request cancelled during comparison".to_string(),
            )),
            result = compute() => result.map(Arc::new),
        };

        if let Ok(result) = &outcome {
            if self.generation(&fingerprint.category_id) == generation {
                self.write(&guard.key, result, cancel).await;
            } else {
                tracing::debug!(
                    key = %guard.key,
                    "category invalidated during comparison; result not stored"
                );
            }
        }

        guard.settle(outcome.clone());
        outcome.map(|result| Lookup {
            result,
            cached: false,
        })
    }

    async fn read(&self, key: &str, cancel: &CancellationToken) -> Option<Arc<ComparisonResult>> {
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            fetched = self.store.get(key) => fetched,
        };

        match fetched {
            Ok(Some(raw)) => match serde_json::from_str::<ComparisonResult>(&raw) {
                Ok(result) => {
                    tracing::debug!(key = %key, "cache hit");
                    Some(Arc::new(result))
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => {
                tracing::debug!(key = %key, "cache miss");
                None
            }
            Err(e) => {
                let err = CompareError::CacheUnavailable(format!("{:#}", e));
                tracing::warn!(key = %key, error = %err, "cache read failed; computing uncached");
                None
            }
        }
    }

    async fn write(&self, key: &str, result: &ComparisonResult, cancel: &CancellationToken) {
        let raw = match serde_json::to_string(result) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "comparison result not serializable");
                return;
            }
        };

        let stored = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            stored = self.store.set(key, &raw, self.ttl) => stored,
        };

        if let Err(e) = stored {
            let err = CompareError::CacheUnavailable(format!("{:#}", e));
            tracing::warn!(key = %key, error = %err, "cache write failed");
        }
    }

    /// Removes the cached result of one request.
    pub async fn invalidate(&self, fingerprint: &Fingerprint) -> anyhow::Result<u64> {
        self.store.delete(&[self.key_for(fingerprint)]).await
    }

    /// Removes every cached comparison of a category.
    pub async fn invalidate_category(&self, category_id: &str) -> anyhow::Result<u64> {
        let category_id = category_id.trim();
        if category_id.is_empty() || category_id.contains(KEY_SEPARATOR) {
            anyhow::bail!("invalid category id for invalidation: {:?}", category_id);
        }
        self.retire(category_id);

        let prefix = category_prefix(&self.key_prefix, category_id);
        let removed = self.store.delete_prefix(&prefix).await?;
        tracing::info!(category = %category_id, removed, "invalidated category");
        Ok(removed)
    }

    /// Drops every cached entry.
    pub async fn flush(&self) -> anyhow::Result<()> {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.inflight().clear();
        self.store.clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pareto_core::cache_store::memory::InMemoryCacheStore;
    use pareto_core::models::{ComparisonRequest, Criterion, Direction};

    fn fingerprint(category: &str) -> Fingerprint {
        Fingerprint::of(&ComparisonRequest {
            category_id: category.to_string(),
            criteria: vec![Criterion::new("price", 1.0, Direction::Minimize)],
            filters: None,
            limit: None,
        })
    }

    fn empty_result() -> ComparisonResult {
        ComparisonResult {
            criteria: vec![Criterion::new("price", 1.0, Direction::Minimize)],
            pareto_frontier: Vec::new(),
            dominated: Vec::new(),
            total_candidates: 0,
            truncated: false,
            computed_at: Utc::now(),
        }
    }

    fn cache(store: Arc<InMemoryCacheStore>) -> ComparisonCache {
        ComparisonCache::new(store, Duration::from_secs(60), "compare:")
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let store = Arc::new(InMemoryCacheStore::new());
        let cache = cache(store.clone());
        let fp = fingerprint("phones");
        let cancel = CancellationToken::new();

        let first = cache
            .get_or_compute(&fp, &cancel, || async { Ok(empty_result()) })
            .await
            .unwrap();
        assert!(!first.cached);
        assert_eq!(store.len(), 1);

        let second = cache
            .get_or_compute(&fp, &cancel, || async {
                Err(CompareError::Internal("must not run".to_string()))
            })
            .await
            .unwrap();
        assert!(second.cached);
        assert_eq!(second.result.computed_at, first.result.computed_at);
        assert_eq!(cache.inflight_len(), 0);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let store = Arc::new(InMemoryCacheStore::new());
        let cache = cache(store.clone());
        let fp = fingerprint("phones");
        let cancel = CancellationToken::new();

        let err = cache
            .get_or_compute(&fp, &cancel, || async {
                Err(CompareError::CatalogUnavailable("down".to_string()))
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "catalog_unavailable");
        assert!(store.is_empty());
        assert_eq!(cache.inflight_len(), 0);
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_a_miss() {
        let store = Arc::new(InMemoryCacheStore::new());
        let cache = cache(store.clone());
        let fp = fingerprint("phones");
        store
            .set(&cache.key_for(&fp), "not json", Duration::from_secs(60))
            .await
            .unwrap();

        let lookup = cache
            .get_or_compute(&fp, &CancellationToken::new(), || async {
                Ok(empty_result())
            })
            .await
            .unwrap();
        assert!(!lookup.cached);
    }

    #[tokio::test]
    async fn test_cancelled_before_compute() {
        let store = Arc::new(InMemoryCacheStore::new());
        let cache = cache(store.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = cache
            .get_or_compute(&fingerprint("phones"), &cancel, || async {
                Ok(empty_result())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CompareError::ComputationCancelled(_)));
        assert!(store.is_empty());
        assert_eq!(cache.inflight_len(), 0);
    }

    #[tokio::test]
    async fn test_invalidate_category_only_touches_that_category() {
        let store = Arc::new(InMemoryCacheStore::new());
        let cache = cache(store.clone());
        let cancel = CancellationToken::new();

        for category in ["phones", "laptops"] {
            cache
                .get_or_compute(&fingerprint(category), &cancel, || async {
                    Ok(empty_result())
                })
                .await
                .unwrap();
        }
        assert_eq!(store.len(), 2);

        assert_eq!(cache.invalidate_category(" phones ").await.unwrap(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(cache.invalidate(&fingerprint("laptops")).await.unwrap(), 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_rejects_separator_in_category() {
        let store = Arc::new(InMemoryCacheStore::new());
        let cache = cache(store.clone());
        let cancel = CancellationToken::new();
        cache
            .get_or_compute(&fingerprint("phones"), &cancel, || async {
                Ok(empty_result())
            })
            .await
            .unwrap();

        assert!(cache.invalidate_category("phones:").await.is_err());
        assert!(cache.invalidate_category("  ").await.is_err());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_invalidation_during_compute_is_not_stored() {
        let store = Arc::new(InMemoryCacheStore::new());
        let cache = cache(store.clone());
        let fp = fingerprint("phones");
        let cancel = CancellationToken::new();

        let (lookup, removed) = tokio::join!(
            cache.get_or_compute(&fp, &cancel, || async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(empty_result())
            }),
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                let removed = cache.invalidate_category("phones").await.unwrap();
                // Detached: a new request would lead its own computation.
                assert_eq!(cache.inflight_len(), 0);
                removed
            }
        );

        assert!(!lookup.unwrap().cached);
        assert_eq!(removed, 0);
        assert!(store.is_empty());

        let next = cache
            .get_or_compute(&fp, &cancel, || async { Ok(empty_result()) })
            .await
            .unwrap();
        assert!(!next.cached);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_other_category_invalidation_still_stores() {
        let store = Arc::new(InMemoryCacheStore::new());
        let cache = cache(store.clone());
        let cancel = CancellationToken::new();

        let fp = fingerprint("phones");
        let (lookup, _) = tokio::join!(
            cache.get_or_compute(&fp, &cancel, || async {
                tokio::time::sleep(Duration::from_millis(60)).await;
                Ok(empty_result())
            }),
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                cache.invalidate_category("laptops").await.unwrap()
            }
        );

        assert!(!lookup.unwrap().cached);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_flush_during_compute_is_not_stored() {
        let store = Arc::new(InMemoryCacheStore::new());
        let cache = cache(store.clone());
        let cancel = CancellationToken::new();

        let fp = fingerprint("phones");
        let (lookup, flushed) = tokio::join!(
            cache.get_or_compute(&fp, &cancel, || async {
                tokio::time::sleep(Duration::from_millis(60)).await;
                Ok(empty_result())
            }),
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                cache.flush().await
            }
        );

        assert!(lookup.is_ok());
        assert!(flushed.is_ok());
        assert!(store.is_empty());
        assert_eq!(cache.inflight_len(), 0);
    }
}
