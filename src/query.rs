//! Single-resource orchestrator with stale-while-revalidate semantics.
//!
//! Inspired by TanStack Query, a `Query<T>` wraps one cached remote resource
//! and publishes its `ResourceState<T>` through a watch channel.
//!
//! # Example
//!
//! ```ignore
//! let stats: Query<DashboardStats> = sources.stats();
//! let mut rx = stats.subscribe();
//!
//! // Serve from cache when fresh, otherwise fetch (showing stale data meanwhile)
//! stats.spawn_fetch();
//!
//! // In render
//! let state = rx.borrow_and_update();
//! match state.phase() {
//!     Phase::Loading => render_spinner(),
//!     Phase::Error => render_error(state.error.as_ref()),
//!     _ => render_data(state.data.as_ref()),
//! }
//! ```

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::decode;
use crate::cache::{CacheLookup, Loader};
use crate::error::FetchError;
use crate::triggers::Refreshable;

/// Where a resource is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  /// Nothing requested yet
  Empty,
  /// Waiting for the first value
  Loading,
  /// Showing a value that is up to date
  Fresh,
  /// Showing a cached value while a newer one is fetched
  StaleServing,
  /// The last fetch failed and nothing newer is running (any previous value
  /// is still in `data`)
  Error,
}

/// Observable state of one resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceState<T> {
  pub data: Option<T>,
  /// True only until the first value, fresh or stale, is available
  pub loading: bool,
  pub error: Option<FetchError>,
  /// A background fetch is running while `data` is already shown
  pub is_refreshing: bool,
  /// Wall-clock time of the last successful network fetch
  pub updated_at: Option<DateTime<Utc>>,
}

impl<T> Default for ResourceState<T> {
  fn default() -> Self {
    Self {
      data: None,
      loading: false,
      error: None,
      is_refreshing: false,
      updated_at: None,
    }
  }
}

impl<T> ResourceState<T> {
  pub fn phase(&self) -> Phase {
    // A running revalidation outranks the error it may replace
    if self.loading {
      Phase::Loading
    } else if self.is_refreshing {
      Phase::StaleServing
    } else if self.error.is_some() {
      Phase::Error
    } else if self.data.is_some() {
      Phase::Fresh
    } else {
      Phase::Empty
    }
  }
}

/// Options for an explicit refetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefetchOptions {
  /// Evict cached entries first so every resource goes to the network
  pub hard: bool,
}

impl RefetchOptions {
  pub const HARD: Self = Self { hard: true };
}

/// How a run treats the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FetchMode {
  /// Fresh entries short-circuit the network
  Cached,
  /// Always go to the network, serving what is cached meanwhile
  Revalidate,
  /// Evict first, then go to the network
  Hard,
}

impl From<RefetchOptions> for FetchMode {
  fn from(options: RefetchOptions) -> Self {
    if options.hard {
      FetchMode::Hard
    } else {
      FetchMode::Cached
    }
  }
}

/// Cache-aware, retrying fetcher for one resource.
///
/// Clones share state; `dispose` on any clone stops all of them from
/// committing further updates.
pub struct Query<T> {
  inner: Arc<Inner<T>>,
}

struct Inner<T> {
  loader: Loader,
  state: watch::Sender<ResourceState<T>>,
  cancel: CancellationToken,
}

impl<T> Clone for Query<T> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
    }
  }
}

impl<T> Query<T>
where
  T: DeserializeOwned + Clone + Send + Sync + 'static,
{
  pub fn new(loader: Loader) -> Self {
    let (state, _) = watch::channel(ResourceState::default());
    Self {
      inner: Arc::new(Inner {
        loader,
        state,
        cancel: CancellationToken::new(),
      }),
    }
  }

  pub fn subscribe(&self) -> watch::Receiver<ResourceState<T>> {
    self.inner.state.subscribe()
  }

  /// Snapshot of the current state.
  pub fn state(&self) -> ResourceState<T> {
    self.inner.state.borrow().clone()
  }

  /// True when the cache entry behind this query is missing or expired.
  pub fn is_stale(&self) -> bool {
    self.inner.loader.is_stale()
  }

  /// Mount path: serve fresh data from cache, otherwise fetch.
  pub async fn fetch(&self) -> ResourceState<T> {
    self.run(FetchMode::Cached).await
  }

  /// Go to the network even if the cached value is fresh, keeping the
  /// current value visible meanwhile.
  pub async fn refresh(&self) -> ResourceState<T> {
    self.run(FetchMode::Revalidate).await
  }

  pub async fn refetch(&self, options: RefetchOptions) -> ResourceState<T> {
    self.run(options.into()).await
  }

  /// `fetch` on a background task, for callers that only watch the state.
  pub fn spawn_fetch(&self) {
    let query = self.clone();
    tokio::spawn(async move {
      query.fetch().await;
    });
  }

  pub fn spawn_refresh(&self) {
    let query = self.clone();
    tokio::spawn(async move {
      query.refresh().await;
    });
  }

  pub fn spawn_refetch(&self, options: RefetchOptions) {
    let query = self.clone();
    tokio::spawn(async move {
      query.refetch(options).await;
    });
  }

  /// Stop committing state. In-flight calls finish but are ignored.
  pub fn dispose(&self) {
    self.inner.cancel.cancel();
  }

  fn update(&self, f: impl FnOnce(&mut ResourceState<T>)) {
    if self.inner.cancel.is_cancelled() {
      return;
    }
    self.inner.state.send_modify(f);
  }

  async fn run(&self, mode: FetchMode) -> ResourceState<T> {
    let loader = &self.inner.loader;
    if self.inner.cancel.is_cancelled() {
      return self.state();
    }
    if mode == FetchMode::Hard {
      loader.invalidate();
    }

    let cached = match loader.lookup() {
      CacheLookup::Fresh(value) => Some((value, true)),
      CacheLookup::Stale(value) => Some((value, false)),
      CacheLookup::Missing => None,
    };
    let cached = cached.and_then(|(value, fresh)| match decode::<T>(value) {
      Ok(data) => Some((data, fresh)),
      Err(err) => {
        warn!(resource = %loader.label(), error = %err, "ignoring undecodable cache entry");
        None
      }
    });

    match cached {
      Some((data, true)) if mode == FetchMode::Cached => {
        debug!(resource = %loader.label(), "cache hit");
        self.update(|s| {
          s.data = Some(data);
          s.loading = false;
          s.is_refreshing = false;
          s.error = None;
        });
        return self.state();
      }
      Some((data, _)) => self.update(|s| {
        s.data = Some(data);
        s.loading = false;
        s.is_refreshing = true;
      }),
      None => self.update(|s| {
        if s.data.is_some() {
          s.is_refreshing = true;
        } else {
          s.loading = true;
        }
      }),
    }

    let Some(result) = loader.fetch(&self.inner.cancel).await else {
      return self.state();
    };

    match result.and_then(decode::<T>) {
      Ok(data) => self.update(|s| {
        s.data = Some(data);
        s.loading = false;
        s.is_refreshing = false;
        s.error = None;
        s.updated_at = Some(Utc::now());
      }),
      Err(err) => self.update(|s| {
        s.error = Some(err);
        s.loading = false;
        s.is_refreshing = false;
      }),
    }
    self.state()
  }
}

impl<T> Refreshable for Query<T>
where
  T: DeserializeOwned + Clone + Send + Sync + 'static,
{
  fn is_stale(&self) -> bool {
    Query::is_stale(self)
  }

  fn revalidate(&self) -> BoxFuture<'_, ()> {
    self.refresh().map(|_| ()).boxed()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::mock::{MockApi, Reply};
  use crate::api::types::DashboardStats;
  use crate::api::Endpoint;
  use crate::cache::{QueryKey, ResourceCache, RetryPolicy};
  use crate::dashboard::endpoint_loader;
  use serde_json::json;
  use std::time::Duration;

  const TTL: Duration = Duration::from_secs(30);
  const LATENCY: Duration = Duration::from_millis(100);

  fn stats_query(api: &MockApi, cache: &ResourceCache, retries: u32) -> Query<DashboardStats> {
    let retry = RetryPolicy {
      retries,
      delay_ms: 1000,
    };
    Query::new(endpoint_loader(
      Arc::new(api.clone()),
      cache,
      Endpoint::Stats,
      TTL,
      retry,
    ))
  }

  fn stats(total_users: u64) -> serde_json::Value {
    json!({"totalUsers": total_users, "activePlans": 1, "revenue": 10.0, "activeUsers": 2, "growth": 0.5})
  }

  async fn settle() {
    for _ in 0..10 {
      tokio::task::yield_now().await;
    }
  }

  #[tokio::test(start_paused = true)]
  async fn test_first_fetch_goes_through_loading() {
    let api = MockApi::new().with_latency(LATENCY);
    api.ok(Endpoint::Stats, stats(5));
    let cache = ResourceCache::new();
    let query = stats_query(&api, &cache, 0);

    assert_eq!(query.state().phase(), Phase::Empty);

    let task = tokio::spawn({
      let query = query.clone();
      async move { query.fetch().await }
    });
    settle().await;
    assert_eq!(query.state().phase(), Phase::Loading);

    let state = task.await.unwrap();
    assert_eq!(state.phase(), Phase::Fresh);
    assert_eq!(state.data.unwrap().total_users, 5);
    assert!(state.updated_at.is_some());
  }

  #[tokio::test(start_paused = true)]
  async fn test_fresh_cache_skips_network() {
    let api = MockApi::new();
    api.ok(Endpoint::Stats, stats(5));
    let cache = ResourceCache::new();

    stats_query(&api, &cache, 0).fetch().await;
    let state = stats_query(&api, &cache, 0).fetch().await;

    assert_eq!(api.calls(&Endpoint::Stats), 1);
    assert_eq!(state.phase(), Phase::Fresh);
    assert_eq!(state.data.unwrap().total_users, 5);
  }

  #[tokio::test(start_paused = true)]
  async fn test_concurrent_fetches_share_one_call() {
    let api = MockApi::new().with_latency(LATENCY);
    api.ok(Endpoint::Stats, stats(7));
    let cache = ResourceCache::new();
    let first = stats_query(&api, &cache, 0);
    let second = stats_query(&api, &cache, 0);

    let (a, b) = tokio::join!(first.fetch(), second.fetch());

    assert_eq!(api.calls(&Endpoint::Stats), 1);
    assert_eq!(a.data, b.data);
    assert_eq!(a.data.unwrap().total_users, 7);
  }

  #[tokio::test(start_paused = true)]
  async fn test_stale_value_served_while_revalidating() {
    let api = MockApi::new().with_latency(LATENCY);
    api.ok(Endpoint::Stats, stats(2));
    let cache = ResourceCache::new();
    let key = Endpoint::Stats.cache_hash();
    cache.set(&key, stats(1), TTL);
    tokio::time::advance(TTL + Duration::from_secs(1)).await;

    let query = stats_query(&api, &cache, 0);
    let task = tokio::spawn({
      let query = query.clone();
      async move { query.fetch().await }
    });
    settle().await;

    let during = query.state();
    assert!(!during.loading);
    assert!(during.is_refreshing);
    assert_eq!(during.phase(), Phase::StaleServing);
    assert_eq!(during.data.unwrap().total_users, 1);

    let after = task.await.unwrap();
    assert!(!after.is_refreshing);
    assert_eq!(after.data.unwrap().total_users, 2);
    assert_eq!(cache.get(&key), Some(stats(2)));
  }

  #[tokio::test(start_paused = true)]
  async fn test_retry_exhaustion_keeps_stale_value() {
    let api = MockApi::new();
    api.fail(Endpoint::Stats, "connection refused");
    let cache = ResourceCache::new();
    let key = Endpoint::Stats.cache_hash();
    cache.set(&key, stats(1), TTL);
    tokio::time::advance(TTL + Duration::from_secs(1)).await;

    let state = stats_query(&api, &cache, 3).fetch().await;

    assert_eq!(api.calls(&Endpoint::Stats), 4);
    assert_eq!(
      state.error,
      Some(FetchError::Transport("connection refused".into()))
    );
    assert_eq!(state.data.unwrap().total_users, 1);
    assert!(!state.loading);
    assert!(!state.is_refreshing);
  }

  #[tokio::test(start_paused = true)]
  async fn test_revalidating_after_failure_is_stale_serving() {
    let api = MockApi::new().with_latency(LATENCY);
    api
      .ok(Endpoint::Stats, stats(1))
      .fail(Endpoint::Stats, "connection refused")
      .ok(Endpoint::Stats, stats(2));
    let cache = ResourceCache::new();
    let query = stats_query(&api, &cache, 0);

    query.fetch().await;
    let failed = query.refresh().await;
    assert_eq!(failed.phase(), Phase::Error);

    let task = tokio::spawn({
      let query = query.clone();
      async move { query.refresh().await }
    });
    settle().await;
    let during = query.state();
    assert!(during.is_refreshing);
    assert_eq!(during.phase(), Phase::StaleServing);
    assert_eq!(during.data.unwrap().total_users, 1);

    let after = task.await.unwrap();
    assert_eq!(after.error, None);
    assert_eq!(after.phase(), Phase::Fresh);
    assert_eq!(after.data.unwrap().total_users, 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_retry_recovers_before_exhaustion() {
    let api = MockApi::new();
    api
      .fail(Endpoint::Stats, "timeout")
      .fail(Endpoint::Stats, "timeout")
      .ok(Endpoint::Stats, stats(9));
    let cache = ResourceCache::new();

    let state = stats_query(&api, &cache, 3).fetch().await;

    assert_eq!(api.calls(&Endpoint::Stats), 3);
    assert_eq!(state.error, None);
    assert_eq!(state.data.unwrap().total_users, 9);
  }

  #[tokio::test(start_paused = true)]
  async fn test_rejected_envelope_surfaces_message() {
    let api = MockApi::new();
    api.reply(Endpoint::Stats, Reply::Rejected("Admin access required".into()));
    let cache = ResourceCache::new();

    let state = stats_query(&api, &cache, 0).fetch().await;

    assert_eq!(
      state.error,
      Some(FetchError::Rejected("Admin access required".into()))
    );
    assert_eq!(state.phase(), Phase::Error);
    assert_eq!(state.data, None);
  }

  #[tokio::test(start_paused = true)]
  async fn test_hard_refetch_evicts_before_network() {
    let api = MockApi::new().with_latency(LATENCY);
    api.ok(Endpoint::Stats, stats(1)).ok(Endpoint::Stats, stats(2));
    let cache = ResourceCache::new();
    let key = Endpoint::Stats.cache_hash();
    let query = stats_query(&api, &cache, 0);

    query.fetch().await;
    assert_eq!(cache.get(&key), Some(stats(1)));

    let task = tokio::spawn({
      let query = query.clone();
      async move { query.refetch(RefetchOptions::HARD).await }
    });
    settle().await;
    assert!(cache.is_stale(&key));
    // The previous value stays on screen during a hard refresh
    assert!(query.state().is_refreshing);

    let state = task.await.unwrap();
    assert_eq!(cache.get(&key), Some(stats(2)));
    assert_eq!(state.data.unwrap().total_users, 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_refresh_bypasses_fresh_cache() {
    let api = MockApi::new();
    api.ok(Endpoint::Stats, stats(1)).ok(Endpoint::Stats, stats(2));
    let cache = ResourceCache::new();
    let query = stats_query(&api, &cache, 0);

    query.fetch().await;
    let state = query.refresh().await;

    assert_eq!(api.calls(&Endpoint::Stats), 2);
    assert_eq!(state.data.unwrap().total_users, 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_disposed_query_ignores_late_response() {
    let api = MockApi::new().with_latency(LATENCY);
    api.ok(Endpoint::Stats, stats(3));
    let cache = ResourceCache::new();
    let key = Endpoint::Stats.cache_hash();
    let query = stats_query(&api, &cache, 0);

    let task = tokio::spawn({
      let query = query.clone();
      async move { query.fetch().await }
    });
    settle().await;
    let before = query.state();
    query.dispose();

    task.await.unwrap();
    assert_eq!(query.state(), before);
    assert_eq!(cache.get_stale(&key), None);
  }

  #[tokio::test(start_paused = true)]
  async fn test_undecodable_payload_is_an_error() {
    let api = MockApi::new();
    api.ok(Endpoint::Stats, json!(["not", "stats"]));
    let cache = ResourceCache::new();

    let state = stats_query(&api, &cache, 3).fetch().await;

    assert!(matches!(state.error, Some(FetchError::Decode(_))));
    assert_eq!(api.calls(&Endpoint::Stats), 1);
  }
}
