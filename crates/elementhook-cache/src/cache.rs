//! Query cache with stale-while-revalidate.
//!
//! Entries are JSON values keyed by [`QueryKey`]. Freshness comes from the
//! entry's [`CacheTier`]:
//!
//! - fresh hit: returned as-is
//! - stale hit (older than the tier's stale time): returned immediately while
//!   one background refresh runs
//! - miss or invalidated entry: fetched with retry, concurrent callers share
//!   the same fetch
//!
//! Every write, invalidation and removal moves the entry to a new epoch. A
//! fetch only stores its result if the entry is still at the epoch the fetch
//! started from, so a response that predates a mutation is never cached.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

use elementhook_remote::RemoteError;

use crate::error::CacheError;
use crate::key::QueryKey;
use crate::policy::{CacheTier, RetryPolicy};
use crate::retry::retry_with_backoff;

/// Type-erased fetcher kept for background refresh.
pub type Refetcher =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Value, RemoteError>> + Send + Sync>;

type SharedFetch = Shared<BoxFuture<'static, Result<Value, RemoteError>>>;

#[derive(Clone)]
struct InFlight {
    epoch: u64,
    fetch: SharedFetch,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Option<Value>,
    tier: CacheTier,
    updated_at: Instant,
    last_access: Instant,
    invalidated: bool,
    fetching: bool,
    error: Option<String>,
    epoch: u64,
}

impl CacheEntry {
    fn pending(tier: CacheTier, now: Instant, epoch: u64) -> Self {
        Self {
            value: None,
            tier,
            updated_at: now,
            last_access: now,
            invalidated: false,
            fetching: false,
            error: None,
            epoch,
        }
    }

    fn is_stale(&self, now: Instant) -> bool {
        self.invalidated
            || self.value.is_none()
            || now.saturating_duration_since(self.updated_at) >= self.tier.policy().stale_time
    }

    fn is_expired(&self, now: Instant) -> bool {
        !self.fetching
            && now.saturating_duration_since(self.last_access) >= self.tier.policy().gc_time
    }
}

enum Cached {
    Fresh(Value),
    Stale(Value),
    Invalidated,
}

/// Entry counts by state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total: usize,
    pub fresh: usize,
    pub stale: usize,
    pub fetching: usize,
    pub error: usize,
}

/// A cached value with its age, for persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySnapshot {
    pub key: QueryKey,
    pub tier: CacheTier,
    pub value: Value,
    pub age: Duration,
}

/// Shared query cache. Cloning shares the same entries.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    entries: DashMap<QueryKey, CacheEntry>,
    in_flight: DashMap<QueryKey, InFlight>,
    refetchers: DashMap<QueryKey, Refetcher>,
    retry: RetryPolicy,
    epochs: AtomicU64,
}

impl QueryCache {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: DashMap::new(),
                in_flight: DashMap::new(),
                refetchers: DashMap::new(),
                retry,
                epochs: AtomicU64::new(0),
            }),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.inner.retry
    }

    /// Read through the cache.
    pub async fn fetch<T, F, Fut>(
        &self,
        key: &QueryKey,
        tier: CacheTier,
        fetcher: F,
    ) -> Result<T, CacheError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, RemoteError>> + Send + 'static,
    {
        let refetcher = erase(fetcher);
        match self.lookup(key) {
            Some(Cached::Fresh(value)) => {
                debug!(key = %key, "Cache hit");
                decode(key, value)
            }
            Some(Cached::Stale(value)) => {
                debug!(key = %key, "Serving stale entry, revalidating");
                self.revalidate(key, tier, refetcher);
                decode(key, value)
            }
            Some(Cached::Invalidated) | None => {
                let value = self.shared_fetch(key, tier, refetcher).await?;
                decode(key, value)
            }
        }
    }

    /// Store a value, keeping the entry's tier (dynamic for new keys).
    pub fn set<T: Serialize>(&self, key: &QueryKey, value: &T) -> Result<(), CacheError> {
        let tier = self
            .inner
            .entries
            .get(key)
            .map(|e| e.tier)
            .unwrap_or_default();
        self.set_with_tier(key, tier, value)
    }

    pub fn set_with_tier<T: Serialize>(
        &self,
        key: &QueryKey,
        tier: CacheTier,
        value: &T,
    ) -> Result<(), CacheError> {
        let value = serde_json::to_value(value).map_err(|e| CacheError::Decode {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        self.inner.write(key, tier, value, Instant::now());
        Ok(())
    }

    /// Cached value regardless of freshness.
    pub fn get<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<T> {
        let value = self.get_value(key)?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key = %key, error = %e, "Cached value has unexpected shape");
                None
            }
        }
    }

    pub fn get_value(&self, key: &QueryKey) -> Option<Value> {
        let mut entry = self.inner.entries.get_mut(key)?;
        entry.last_access = Instant::now();
        entry.value.clone()
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.inner
            .entries
            .get(key)
            .is_some_and(|e| e.value.is_some())
    }

    /// Whether the next `fetch` would hit the remote. Missing keys are stale.
    pub fn is_stale(&self, key: &QueryKey) -> bool {
        let now = Instant::now();
        self.inner
            .entries
            .get(key)
            .is_none_or(|e| e.is_stale(now))
    }

    /// Drop the entry. A fetch still running for it is not cached.
    pub fn remove(&self, key: &QueryKey) -> bool {
        self.inner.refetchers.remove(key);
        self.inner.in_flight.remove(key);
        self.inner.entries.remove(key).is_some()
    }

    /// Mark every entry under `prefix` stale; the next read refetches.
    ///
    /// Fetches already running are detached: their callers still get the
    /// response, but it is not cached and later reads start a new fetch.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let count = self.inner.invalidate_where(|key| key.starts_with(prefix));
        debug!(prefix = %prefix, count, "Invalidated entries");
        count
    }

    pub fn invalidate_all(&self) -> usize {
        let count = self.inner.invalidate_where(|_| true);
        debug!(count, "Invalidated all entries");
        count
    }

    /// Drop entries idle for longer than their tier's gc time.
    pub fn gc(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.entries.len();
        self.inner.entries.retain(|_, entry| !entry.is_expired(now));
        let entries = &self.inner.entries;
        self.inner.refetchers.retain(|key, _| entries.contains_key(key));

        let removed = before.saturating_sub(self.inner.entries.len());
        if removed > 0 {
            debug!(removed, "Cache gc");
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let mut stats = CacheStats::default();
        for entry in self.inner.entries.iter() {
            stats.total += 1;
            if entry.value.is_some() {
                if entry.is_stale(now) {
                    stats.stale += 1;
                } else {
                    stats.fresh += 1;
                }
            }
            if entry.fetching {
                stats.fetching += 1;
            }
            if entry.error.is_some() {
                stats.error += 1;
            }
        }
        stats
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Most recently updated value under `prefix`.
    pub fn latest_under(&self, prefix: &QueryKey) -> Option<(QueryKey, Value)> {
        self.inner
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .filter_map(|e| {
                e.value
                    .clone()
                    .map(|value| (e.updated_at, e.key().clone(), value))
            })
            .max_by_key(|(updated_at, _, _)| *updated_at)
            .map(|(_, key, value)| (key, value))
    }

    /// Refresh every realtime entry that has a registered fetcher.
    pub fn refresh_realtime(&self) -> usize {
        let targets: Vec<(QueryKey, Refetcher)> = self
            .inner
            .refetchers
            .iter()
            .map(|r| (r.key().clone(), Arc::clone(r.value())))
            .collect();

        let mut started = 0;
        for (key, refetcher) in targets {
            let live = self
                .inner
                .entries
                .get(&key)
                .is_some_and(|e| e.tier == CacheTier::Realtime);
            if live && self.revalidate(&key, CacheTier::Realtime, refetcher) {
                started += 1;
            }
        }
        started
    }

    /// Valued entries that are not invalidated.
    pub fn export(&self) -> Vec<EntrySnapshot> {
        let now = Instant::now();
        self.inner
            .entries
            .iter()
            .filter(|e| !e.invalidated)
            .filter_map(|e| {
                e.value.clone().map(|value| EntrySnapshot {
                    key: e.key().clone(),
                    tier: e.tier,
                    value,
                    age: now.saturating_duration_since(e.updated_at),
                })
            })
            .collect()
    }

    /// Insert an entry that was last updated `age` ago.
    pub fn restore(&self, snapshot: EntrySnapshot) {
        let now = Instant::now();
        let updated_at = now.checked_sub(snapshot.age).unwrap_or(now);
        self.inner
            .write(&snapshot.key, snapshot.tier, snapshot.value, updated_at);
    }

    fn lookup(&self, key: &QueryKey) -> Option<Cached> {
        let now = Instant::now();
        let mut entry = self.inner.entries.get_mut(key)?;
        entry.last_access = now;
        if entry.invalidated {
            return Some(Cached::Invalidated);
        }
        let value = entry.value.clone()?;
        if entry.is_stale(now) {
            Some(Cached::Stale(value))
        } else {
            Some(Cached::Fresh(value))
        }
    }

    /// Spawn a background refresh unless one is already running.
    fn revalidate(&self, key: &QueryKey, tier: CacheTier, refetcher: Refetcher) -> bool {
        if self.inner.in_flight.contains_key(key) {
            return false;
        }
        let in_flight = self.in_flight(key, tier, refetcher);
        tokio::spawn(in_flight.fetch);
        true
    }

    async fn shared_fetch(
        &self,
        key: &QueryKey,
        tier: CacheTier,
        refetcher: Refetcher,
    ) -> Result<Value, RemoteError> {
        self.in_flight(key, tier, refetcher).fetch.await
    }

    fn in_flight(&self, key: &QueryKey, tier: CacheTier, refetcher: Refetcher) -> InFlight {
        match self.inner.in_flight.entry(key.clone()) {
            Entry::Occupied(existing) => existing.get().clone(),
            Entry::Vacant(slot) => {
                let epoch = self.inner.mark_fetching(key, tier);

                let inner = Arc::clone(&self.inner);
                let key = key.clone();
                let fetch = async move {
                    let label = key.to_string();
                    let result = retry_with_backoff(&inner.retry, &label, || refetcher()).await;
                    inner.complete(&key, tier, epoch, &result, refetcher);
                    result
                }
                .boxed()
                .shared();

                let in_flight = InFlight { epoch, fetch };
                slot.insert(in_flight.clone());
                in_flight
            }
        }
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl CacheInner {
    fn next_epoch(&self) -> u64 {
        self.epochs.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Store a value from outside a fetch; supersedes any running fetch.
    fn write(&self, key: &QueryKey, tier: CacheTier, value: Value, updated_at: Instant) {
        let now = Instant::now();
        let epoch = self.next_epoch();
        {
            let mut entry = self
                .entries
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::pending(tier, now, epoch));
            entry.value = Some(value);
            entry.tier = tier;
            entry.updated_at = updated_at;
            entry.last_access = now;
            entry.invalidated = false;
            entry.fetching = false;
            entry.error = None;
            entry.epoch = epoch;
        }
        self.in_flight.remove(key);
    }

    fn invalidate_where(&self, matches: impl Fn(&QueryKey) -> bool) -> usize {
        let mut detached = Vec::new();
        for mut entry in self.entries.iter_mut() {
            if matches(entry.key()) {
                let epoch = self.next_epoch();
                entry.invalidated = true;
                entry.fetching = false;
                entry.epoch = epoch;
                detached.push(entry.key().clone());
            }
        }
        for key in &detached {
            self.in_flight.remove(key);
        }
        detached.len()
    }

    /// Flag the entry as fetching and return the epoch the fetch belongs to.
    fn mark_fetching(&self, key: &QueryKey, tier: CacheTier) -> u64 {
        let now = Instant::now();
        let mut entry = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::pending(tier, now, self.next_epoch()));
        entry.fetching = true;
        entry.epoch
    }

    fn complete(
        &self,
        key: &QueryKey,
        tier: CacheTier,
        epoch: u64,
        result: &Result<Value, RemoteError>,
        refetcher: Refetcher,
    ) {
        self.in_flight.remove_if(key, |_, f| f.epoch == epoch);

        let Some(mut entry) = self.entries.get_mut(key).filter(|e| e.epoch == epoch) else {
            debug!(key = %key, "Entry changed while fetching, discarding response");
            return;
        };
        entry.fetching = false;
        match result {
            Ok(value) => {
                let now = Instant::now();
                entry.value = Some(value.clone());
                entry.tier = tier;
                entry.updated_at = now;
                entry.last_access = now;
                entry.invalidated = false;
                entry.error = None;
                drop(entry);
                if tier == CacheTier::Realtime {
                    self.refetchers.insert(key.clone(), refetcher);
                }
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Fetch failed");
                entry.error = Some(e.to_string());
            }
        }
    }
}

fn erase<T, F, Fut>(fetcher: F) -> Refetcher
where
    T: Serialize + Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, RemoteError>> + Send + 'static,
{
    Arc::new(move || {
        let fetch = fetcher();
        async move {
            let value = fetch.await?;
            Ok::<_, RemoteError>(serde_json::to_value(value)?)
        }
        .boxed()
    })
}

fn decode<T: DeserializeOwned>(key: &QueryKey, value: Value) -> Result<T, CacheError> {
    serde_json::from_value(value).map_err(|e| CacheError::Decode {
        key: key.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
