//! Multi-resource aggregation.
//!
//! An `Aggregate<V>` loads several resources that belong to one subject (for
//! example everything shown on a user's detail screen) in parallel and folds
//! them into a single view model `V`. Exactly one part is usually critical:
//! its failure is the aggregate's error. Optional parts that fail fall back to
//! their default and are only recorded as diagnostics, so one flaky endpoint
//! never blanks the whole screen.
//!
//! Every change goes through [`reduce`], which applies one part's outcome to
//! the aggregate state.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::{CacheLookup, Loader};
use crate::error::FetchError;
use crate::query::{FetchMode, RefetchOptions};
use crate::triggers::Refreshable;

/// Diagnostics kept per aggregate; older entries are dropped.
const MAX_DIAGNOSTICS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criticality {
  /// Failure is the aggregate's error
  Critical,
  /// Failure resets the field to its default
  Optional,
}

/// One resource contributing to an aggregate.
pub struct Part {
  pub name: &'static str,
  pub criticality: Criticality,
  pub loader: Loader,
}

impl Part {
  pub fn new(name: &'static str, criticality: Criticality, loader: Loader) -> Self {
    Self {
      name,
      criticality,
      loader,
    }
  }
}

/// Where one part stands.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
  /// No value yet
  Pending,
  /// A cached value is applied and a newer one is on its way
  Refreshing,
  Ready,
  Failed(FetchError),
}

/// An outcome for one part, fed to [`reduce`].
#[derive(Debug, Clone, PartialEq)]
pub enum PartResult {
  Pending,
  Stale(Value),
  Ok(Value),
  Failed(FetchError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
  pub part: &'static str,
  pub resource: String,
  pub error: FetchError,
  pub at: DateTime<Utc>,
}

/// A view model assembled from named parts.
pub trait ViewModel: Clone + Default + Send + Sync + 'static {
  /// Decode `value` into the field for `part`.
  fn apply(&mut self, part: &str, value: Value) -> Result<(), FetchError>;

  /// Put the field for `part` back to its default.
  fn reset(&mut self, part: &str);
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateState<V> {
  pub view: V,
  pub slots: Vec<(&'static str, Slot)>,
  /// True while any part has neither a value nor a final outcome
  pub loading: bool,
  /// Set only by critical parts
  pub error: Option<FetchError>,
  pub is_refreshing: bool,
  pub diagnostics: Vec<Diagnostic>,
}

impl<V: ViewModel> AggregateState<V> {
  fn new(parts: &[Part]) -> Self {
    Self {
      view: V::default(),
      slots: parts.iter().map(|p| (p.name, Slot::Pending)).collect(),
      loading: !parts.is_empty(),
      error: None,
      is_refreshing: false,
      diagnostics: Vec::new(),
    }
  }

  pub fn slot(&self, part: &str) -> Option<&Slot> {
    self
      .slots
      .iter()
      .find(|(name, _)| *name == part)
      .map(|(_, slot)| slot)
  }

  /// Latest diagnostic recorded for `part`.
  pub fn diagnostic(&self, part: &str) -> Option<&Diagnostic> {
    self.diagnostics.iter().rev().find(|d| d.part == part)
  }

  fn set_slot(&mut self, part: &'static str, slot: Slot) {
    match self.slots.iter_mut().find(|(name, _)| *name == part) {
      Some((_, existing)) => *existing = slot,
      None => self.slots.push((part, slot)),
    }
  }

  fn recompute(&mut self) {
    self.loading = self.slots.iter().any(|(_, s)| *s == Slot::Pending);
    self.is_refreshing = self.slots.iter().any(|(_, s)| *s == Slot::Refreshing);
  }
}

/// Apply one part's outcome to the aggregate state.
pub fn reduce<V: ViewModel>(state: &mut AggregateState<V>, part: &Part, result: PartResult) {
  let slot = match result {
    // A part that already settled once is revalidating, not loading
    PartResult::Pending => match state.slot(part.name) {
      Some(Slot::Ready | Slot::Refreshing | Slot::Failed(_)) => Slot::Refreshing,
      _ => Slot::Pending,
    },
    PartResult::Stale(value) => match state.view.apply(part.name, value) {
      Ok(()) => Slot::Refreshing,
      Err(err) => {
        warn!(part = part.name, error = %err, "ignoring undecodable cache entry");
        Slot::Pending
      }
    },
    PartResult::Ok(value) => match state.view.apply(part.name, value) {
      Ok(()) => {
        if part.criticality == Criticality::Critical {
          state.error = None;
        }
        Slot::Ready
      }
      Err(err) => fail(state, part, err),
    },
    PartResult::Failed(err) => fail(state, part, err),
  };
  state.set_slot(part.name, slot);
  state.recompute();
}

fn fail<V: ViewModel>(state: &mut AggregateState<V>, part: &Part, err: FetchError) -> Slot {
  match part.criticality {
    Criticality::Critical => {
      warn!(part = part.name, resource = %part.loader.label(), error = %err, "critical part failed");
      state.error = Some(err.clone());
    }
    Criticality::Optional => {
      warn!(part = part.name, resource = %part.loader.label(), error = %err, "optional part failed, using default");
      state.view.reset(part.name);
    }
  }

  state.diagnostics.push(Diagnostic {
    part: part.name,
    resource: part.loader.label().to_string(),
    error: err.clone(),
    at: Utc::now(),
  });
  if state.diagnostics.len() > MAX_DIAGNOSTICS {
    let excess = state.diagnostics.len() - MAX_DIAGNOSTICS;
    state.diagnostics.drain(..excess);
  }
  Slot::Failed(err)
}

/// Parallel loader for every part of one subject.
pub struct Aggregate<V> {
  inner: Arc<Inner<V>>,
}

struct Inner<V> {
  subject: String,
  parts: Vec<Part>,
  state: watch::Sender<AggregateState<V>>,
  cancel: CancellationToken,
}

impl<V> Clone for Aggregate<V> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
    }
  }
}

impl<V: ViewModel> Aggregate<V> {
  pub fn new(subject: impl Into<String>, parts: Vec<Part>) -> Self {
    let (state, _) = watch::channel(AggregateState::new(&parts));
    Self {
      inner: Arc::new(Inner {
        subject: subject.into(),
        parts,
        state,
        cancel: CancellationToken::new(),
      }),
    }
  }

  pub fn subject(&self) -> &str {
    &self.inner.subject
  }

  /// Cache keys of every part.
  #[cfg(test)]
  pub fn keys(&self) -> Vec<&str> {
    self.inner.parts.iter().map(|p| p.loader.key()).collect()
  }

  pub fn subscribe(&self) -> watch::Receiver<AggregateState<V>> {
    self.inner.state.subscribe()
  }

  pub fn state(&self) -> AggregateState<V> {
    self.inner.state.borrow().clone()
  }

  /// True when any part is missing or expired in the cache.
  pub fn is_stale(&self) -> bool {
    self.inner.parts.iter().any(|p| p.loader.is_stale())
  }

  pub async fn fetch(&self) -> AggregateState<V> {
    self.run(FetchMode::Cached).await
  }

  pub async fn refresh(&self) -> AggregateState<V> {
    self.run(FetchMode::Revalidate).await
  }

  pub async fn refetch(&self, options: RefetchOptions) -> AggregateState<V> {
    self.run(options.into()).await
  }

  pub fn spawn_fetch(&self) {
    let aggregate = self.clone();
    tokio::spawn(async move {
      aggregate.fetch().await;
    });
  }

  pub fn spawn_refresh(&self) {
    let aggregate = self.clone();
    tokio::spawn(async move {
      aggregate.refresh().await;
    });
  }

  pub fn spawn_refetch(&self, options: RefetchOptions) {
    let aggregate = self.clone();
    tokio::spawn(async move {
      aggregate.refetch(options).await;
    });
  }

  pub fn dispose(&self) {
    self.inner.cancel.cancel();
  }

  fn apply(&self, part: &Part, result: PartResult) {
    if self.inner.cancel.is_cancelled() {
      return;
    }
    self
      .inner
      .state
      .send_modify(|state| reduce(state, part, result));
  }

  async fn run(&self, mode: FetchMode) -> AggregateState<V> {
    let cancel = &self.inner.cancel;
    if cancel.is_cancelled() {
      return self.state();
    }
    if mode == FetchMode::Hard {
      debug!(subject = %self.inner.subject, "hard refresh");
      for part in &self.inner.parts {
        part.loader.invalidate();
      }
    }

    let mut in_flight = FuturesUnordered::new();
    for (idx, part) in self.inner.parts.iter().enumerate() {
      let (result, needs_fetch) = match part.loader.lookup() {
        CacheLookup::Fresh(value) if mode == FetchMode::Cached => (PartResult::Ok(value), false),
        CacheLookup::Fresh(value) | CacheLookup::Stale(value) => (PartResult::Stale(value), true),
        CacheLookup::Missing => (PartResult::Pending, true),
      };
      self.apply(part, result);
      if needs_fetch {
        in_flight.push(async move { (idx, part.loader.fetch(cancel).await) });
      }
    }

    // Parts are applied as they land, not when the slowest one does
    while let Some((idx, outcome)) = in_flight.next().await {
      let part = &self.inner.parts[idx];
      match outcome {
        Some(Ok(value)) => self.apply(part, PartResult::Ok(value)),
        Some(Err(err)) => self.apply(part, PartResult::Failed(err)),
        None => return self.state(),
      }
    }
    self.state()
  }
}

impl<V: ViewModel> Refreshable for Aggregate<V> {
  fn is_stale(&self) -> bool {
    Aggregate::is_stale(self)
  }

  fn revalidate(&self) -> BoxFuture<'_, ()> {
    self.refresh().map(|_| ()).boxed()
  }
}
