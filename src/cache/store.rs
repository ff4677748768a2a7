//! In-memory TTL store plus the table of in-flight requests.

use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use super::traits::CacheLookup;
use crate::error::FetchError;
use crate::triggers::Subscription;

/// Outcome of one network call, as seen by the cache.
pub type FetchResult = Result<Value, FetchError>;

/// A request shared by every caller asking for the same key.
pub type PendingRequest = Shared<BoxFuture<'static, FetchResult>>;

#[derive(Debug, Clone)]
struct CacheEntry {
  value: Value,
  written_at: Instant,
  ttl: Duration,
}

impl CacheEntry {
  fn is_expired(&self, now: Instant) -> bool {
    now.saturating_duration_since(self.written_at) > self.ttl
  }
}

struct InFlight {
  id: u64,
  request: PendingRequest,
}

#[derive(Default)]
struct State {
  entries: HashMap<String, CacheEntry>,
  pending: HashMap<String, InFlight>,
  next_request_id: u64,
}

/// Keyed response cache with request coalescing.
///
/// Cloning is cheap and every clone shares the same maps, so one instance is
/// built per session and handed to each query and aggregate. Values are opaque
/// JSON documents; decoding happens in the layer that knows the record type.
///
/// The lock is never held across an await point.
#[derive(Clone, Default)]
pub struct ResourceCache {
  state: Arc<Mutex<State>>,
}

impl ResourceCache {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, State> {
    // Every mutation is a single map operation, so the maps stay consistent
    // even if a holder panicked.
    self.state.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// True when nothing is cached for `key` or the entry expired.
  pub fn is_stale(&self, key: &str) -> bool {
    let now = Instant::now();
    self
      .lock()
      .entries
      .get(key)
      .map(|e| e.is_expired(now))
      .unwrap_or(true)
  }

  /// Classify the entry for `key` under a single lock.
  pub fn lookup(&self, key: &str) -> CacheLookup {
    let now = Instant::now();
    match self.lock().entries.get(key) {
      Some(entry) if entry.is_expired(now) => CacheLookup::Stale(entry.value.clone()),
      Some(entry) => CacheLookup::Fresh(entry.value.clone()),
      None => CacheLookup::Missing,
    }
  }

  /// Store `value`, replacing any previous entry and restarting its TTL.
  pub fn set(&self, key: &str, value: Value, ttl: Duration) {
    let entry = CacheEntry {
      value,
      written_at: Instant::now(),
      ttl,
    };
    self.lock().entries.insert(key.to_string(), entry);
  }

  /// Remove the entry for `key`. Returns whether one existed.
  pub fn delete(&self, key: &str) -> bool {
    self.lock().entries.remove(key).is_some()
  }

  /// Remove every entry. In-flight requests are left to settle on their own.
  pub fn clear(&self) {
    self.lock().entries.clear();
  }

  /// Number of stored entries, expired ones included.
  pub fn len(&self) -> usize {
    self.lock().entries.len()
  }

  /// Number of requests currently in flight.
  pub fn pending_len(&self) -> usize {
    self.lock().pending.len()
  }

  /// Join the call in flight for `key`, or start one with `make_request`.
  ///
  /// Check and registration happen under one lock, so two callers racing for
  /// the same key always end up sharing a single call.
  pub fn join_or_request<F>(&self, key: &str, make_request: F) -> PendingRequest
  where
    F: FnOnce() -> BoxFuture<'static, FetchResult>,
  {
    let mut state = self.lock();
    if let Some(in_flight) = state.pending.get(key) {
      debug!(key, id = in_flight.id, "joined in-flight request");
      return in_flight.request.clone();
    }
    self.register(&mut state, key, make_request())
  }

  fn register(
    &self,
    state: &mut State,
    key: &str,
    request: BoxFuture<'static, FetchResult>,
  ) -> PendingRequest {
    state.next_request_id += 1;
    let id = state.next_request_id;

    let cache = self.clone();
    let owned_key = key.to_string();
    let pending = async move {
      let result = request.await;
      cache.settle(&owned_key, id);
      result
    }
    .boxed()
    .shared();

    // Insert before spawning: settle() needs the lock we hold, so it cannot
    // run ahead of the insert.
    state.pending.insert(
      key.to_string(),
      InFlight {
        id,
        request: pending.clone(),
      },
    );
    tokio::spawn(pending.clone().map(|_| ()));

    debug!(key, id, "registered request");
    pending
  }

  /// Drop the pending entry for `key` if it is still the one numbered `id`.
  fn settle(&self, key: &str, id: u64) {
    let mut state = self.lock();
    if state.pending.get(key).is_some_and(|f| f.id == id) {
      state.pending.remove(key);
    }
  }

  /// Evict every expired entry. Returns how many were removed.
  pub fn cleanup(&self) -> usize {
    let now = Instant::now();
    let mut state = self.lock();
    let before = state.entries.len();
    state.entries.retain(|_, entry| !entry.is_expired(now));
    before - state.entries.len()
  }

  /// Run `cleanup` every `period` until the subscription is dropped.
  pub fn spawn_cleanup(&self, period: Duration) -> Subscription {
    let cache = self.clone();
    Subscription::spawn(async move {
      let mut ticker = tokio::time::interval(period);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
      // The first tick completes immediately
      ticker.tick().await;
      loop {
        ticker.tick().await;
        let evicted = cache.cleanup();
        if evicted > 0 {
          debug!(evicted, "cache sweep");
        }
      }
    })
  }
}

/// Single-step accessors. The orchestrators go through `lookup` and
/// `join_or_request`, which answer under one lock.
#[allow(dead_code)]
impl ResourceCache {
  /// Value for `key` if present and not expired.
  ///
  /// Expired entries are left in place so stale-while-revalidate can still
  /// serve them; `cleanup` reclaims the memory.
  pub fn get(&self, key: &str) -> Option<Value> {
    match self.lookup(key) {
      CacheLookup::Fresh(value) => Some(value),
      _ => None,
    }
  }

  /// Value for `key` regardless of expiry.
  pub fn get_stale(&self, key: &str) -> Option<Value> {
    self.lock().entries.get(key).map(|e| e.value.clone())
  }

  /// The request in flight for `key`, if any.
  pub fn get_pending_request(&self, key: &str) -> Option<PendingRequest> {
    self.lock().pending.get(key).map(|f| f.request.clone())
  }

  /// Register `request` as the in-flight call for `key`.
  ///
  /// The returned handle can be awaited by any number of callers. The request
  /// is driven on the runtime even if every caller drops its handle, and the
  /// table entry is removed as soon as it settles, whether it succeeded or not.
  pub fn set_pending_request(
    &self,
    key: &str,
    request: BoxFuture<'static, FetchResult>,
  ) -> PendingRequest {
    let mut state = self.lock();
    self.register(&mut state, key, request)
  }
}
