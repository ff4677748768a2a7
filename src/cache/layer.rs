//! Cache layer that ties one cache key to its network fetcher.

use futures::future::BoxFuture;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::store::{FetchResult, ResourceCache};
use super::traits::CacheLookup;

/// Produces one network call for a resource.
pub type Fetcher = Arc<dyn Fn() -> BoxFuture<'static, FetchResult> + Send + Sync>;

/// Fixed-delay retry policy.
///
/// The delay is constant rather than exponential: a dashboard retries a
/// handful of times against its own backend, and a flat delay keeps the
/// worst-case wait predictable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
  /// Attempts made after the first one fails
  pub retries: u32,
  /// Pause before each retry, in milliseconds
  pub delay_ms: u64,
}

impl RetryPolicy {
  pub fn delay(&self) -> Duration {
    Duration::from_millis(self.delay_ms)
  }
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      retries: 3,
      delay_ms: 1000,
    }
  }
}

/// One cached remote resource: its key, TTL, retry policy and fetcher.
///
/// Clones share the underlying cache.
#[derive(Clone)]
pub struct Loader {
  cache: ResourceCache,
  key: String,
  label: String,
  ttl: Duration,
  retry: RetryPolicy,
  fetcher: Fetcher,
}

impl Loader {
  pub fn new(
    cache: ResourceCache,
    key: impl Into<String>,
    label: impl Into<String>,
    ttl: Duration,
    retry: RetryPolicy,
    fetcher: Fetcher,
  ) -> Self {
    Self {
      cache,
      key: key.into(),
      label: label.into(),
      ttl,
      retry,
      fetcher,
    }
  }

  pub fn key(&self) -> &str {
    &self.key
  }

  pub fn label(&self) -> &str {
    &self.label
  }

  pub fn lookup(&self) -> CacheLookup {
    self.cache.lookup(&self.key)
  }

  pub fn is_stale(&self) -> bool {
    self.cache.is_stale(&self.key)
  }

  /// Drop the cached entry so the next lookup misses.
  pub fn invalidate(&self) {
    if self.cache.delete(&self.key) {
      debug!(resource = %self.label, "invalidated");
    }
  }

  /// Fetch through the dedup table, retrying with a fixed delay.
  ///
  /// On success the value is written to the cache. Returns `None` as soon as
  /// `cancel` fires; nothing is written in that case. The shared request keeps
  /// running for other waiters.
  ///
  /// Retries run inside this future, so every attempt ends in exactly one
  /// returned outcome.
  pub async fn fetch(&self, cancel: &CancellationToken) -> Option<FetchResult> {
    let mut remaining = self.retry.retries;

    loop {
      if cancel.is_cancelled() {
        return None;
      }
      let request = self.cache.join_or_request(&self.key, || (self.fetcher)());
      let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
          debug!(resource = %self.label, "fetch cancelled, dropping result");
          return None;
        }
        result = request => result,
      };

      match result {
        Ok(value) => {
          self.cache.set(&self.key, value.clone(), self.ttl);
          return Some(Ok(value));
        }
        Err(err) if remaining > 0 && err.is_retryable() => {
          remaining -= 1;
          warn!(
            resource = %self.label,
            error = %err,
            retries_left = remaining,
            "fetch failed, retrying"
          );
          tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(self.retry.delay()) => {}
          }
        }
        Err(err) => {
          warn!(resource = %self.label, error = %err, "fetch failed, giving up");
          return Some(Err(err));
        }
      }
    }
  }
}
