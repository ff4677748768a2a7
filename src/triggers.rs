//! Background refresh triggers: periodic revalidation and refresh-on-focus.
//!
//! Every trigger is a `Subscription` owning a spawned task. Dropping the
//! subscription stops the task, so a view that goes away takes its timers
//! and listeners with it.

use futures::future::BoxFuture;
use std::future::Future;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Handle to a background task that is aborted on drop.
#[derive(Debug)]
pub struct Subscription {
  handle: JoinHandle<()>,
}

impl Subscription {
  pub fn spawn<F>(task: F) -> Self
  where
    F: Future<Output = ()> + Send + 'static,
  {
    Self {
      handle: tokio::spawn(task),
    }
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    self.handle.abort();
  }
}

/// Something a trigger can revalidate.
pub trait Refreshable: Send + Sync + 'static {
  /// True when at least one underlying cache entry is missing or expired.
  fn is_stale(&self) -> bool;

  /// Re-run the fetch path regardless of freshness, keeping current data
  /// visible while it runs.
  fn revalidate(&self) -> BoxFuture<'_, ()>;
}

/// Broadcasts "the terminal regained focus" to every focus subscription.
#[derive(Debug, Clone)]
pub struct FocusSignal {
  tx: broadcast::Sender<()>,
}

impl FocusSignal {
  pub fn new() -> Self {
    let (tx, _) = broadcast::channel(16);
    Self { tx }
  }

  pub fn notify(&self) {
    // No receivers simply means no view is listening
    let _ = self.tx.send(());
  }

  pub fn subscribe(&self) -> broadcast::Receiver<()> {
    self.tx.subscribe()
  }
}

impl Default for FocusSignal {
  fn default() -> Self {
    Self::new()
  }
}

/// Revalidate `target` every `period`, starting one period from now.
pub fn every<R: Refreshable>(target: R, period: Duration) -> Subscription {
  Subscription::spawn(async move {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;
    loop {
      ticker.tick().await;
      debug!("interval revalidation");
      target.revalidate().await;
    }
  })
}

/// Revalidate `target` whenever focus returns, but only if it is stale.
pub fn on_focus<R: Refreshable>(target: R, focus: &FocusSignal) -> Subscription {
  let mut rx = focus.subscribe();
  Subscription::spawn(async move {
    loop {
      match rx.recv().await {
        Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
          if target.is_stale() {
            debug!("focus regained with stale data, revalidating");
            target.revalidate().await;
          }
        }
        Err(broadcast::error::RecvError::Closed) => break,
      }
    }
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use futures::FutureExt;
  use crate::aggregate::{Aggregate, Criticality, Part, ViewModel};
  use crate::cache::{Fetcher, Loader, ResourceCache, RetryPolicy};
  use crate::error::FetchError;
  use serde_json::{json, Value};
  use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
  use std::sync::Arc;

  #[derive(Clone, Default)]
  struct Target {
    stale: Arc<AtomicBool>,
    runs: Arc<AtomicU32>,
  }

  impl Refreshable for Target {
    fn is_stale(&self) -> bool {
      self.stale.load(Ordering::SeqCst)
    }

    fn revalidate(&self) -> BoxFuture<'_, ()> {
      async move {
        self.runs.fetch_add(1, Ordering::SeqCst);
      }
      .boxed()
    }
  }

  async fn settle() {
    for _ in 0..20 {
      tokio::task::yield_now().await;
    }
  }

  #[tokio::test(start_paused = true)]
  async fn test_interval_runs_each_period() {
    let target = Target::default();
    let sub = every(target.clone(), Duration::from_secs(60));

    tokio::time::sleep(Duration::from_secs(59)).await;
    assert_eq!(target.runs.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(target.runs.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(target.runs.load(Ordering::SeqCst), 2);

    drop(sub);
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(target.runs.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_focus_skips_fresh_data() {
    let target = Target::default();
    let focus = FocusSignal::new();
    let _sub = on_focus(target.clone(), &focus);

    focus.notify();
    settle().await;
    assert_eq!(target.runs.load(Ordering::SeqCst), 0);

    target.stale.store(true, Ordering::SeqCst);
    focus.notify();
    settle().await;
    assert_eq!(target.runs.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_dropped_focus_subscription_stops_listening() {
    let target = Target::default();
    target.stale.store(true, Ordering::SeqCst);
    let focus = FocusSignal::new();

    let sub = on_focus(target.clone(), &focus);
    drop(sub);
    settle().await;

    focus.notify();
    settle().await;
    assert_eq!(target.runs.load(Ordering::SeqCst), 0);
  }

  #[derive(Debug, Clone, Default, PartialEq)]
  struct Count(u64);

  impl ViewModel for Count {
    fn apply(&mut self, _part: &str, value: Value) -> Result<(), FetchError> {
      self.0 = crate::api::decode(value)?;
      Ok(())
    }

    fn reset(&mut self, _part: &str) {
      self.0 = 0;
    }
  }

  #[tokio::test(start_paused = true)]
  async fn test_focus_revalidates_aggregate_only_when_stale() {
    let cache = ResourceCache::new();
    let calls = Arc::new(AtomicU32::new(0));
    let fetcher: Fetcher = {
      let calls = calls.clone();
      Arc::new(move || {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        async move { Ok::<_, FetchError>(json!(n)) }.boxed()
      })
    };
    let loader = Loader::new(
      cache,
      "count",
      "count",
      Duration::from_secs(60),
      RetryPolicy::default(),
      fetcher,
    );
    let aggregate = Aggregate::<Count>::new(
      "count",
      vec![Part::new("count", Criticality::Critical, loader)],
    );
    let focus = FocusSignal::new();

    aggregate.fetch().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let _sub = on_focus(aggregate.clone(), &focus);

    focus.notify();
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tokio::time::advance(Duration::from_secs(61)).await;
    assert!(aggregate.is_stale());
    focus.notify();
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(aggregate.state().view, Count(2));
    assert!(!aggregate.is_stale());
  }
}
