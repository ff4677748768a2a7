//! Queries and aggregates behind the admin screens.
//!
//! `DataSources` wires the remote API to the shared cache and hands out
//! orchestrators with the configured TTLs and retry policy.

use futures::FutureExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::aggregate::{Aggregate, Criticality, Part, ViewModel};
use crate::api::api_types::ApiResponse;
use crate::api::types::{
  Activity, DashboardStats, Notification, ReferralSummary, Strategy, UserRecord, UserSummary,
  WalletRecord,
};
use crate::api::{decode, Endpoint, RemoteApi};
use crate::cache::{Fetcher, Loader, QueryKey, ResourceCache, RetryPolicy};
use crate::config::{CacheConfig, Config};
use crate::error::FetchError;
use crate::query::Query;

/// Loader for one endpoint, keyed by its cache hash.
pub fn endpoint_loader(
  api: Arc<dyn RemoteApi>,
  cache: &ResourceCache,
  endpoint: Endpoint,
  ttl: Duration,
  retry: RetryPolicy,
) -> Loader {
  let key = endpoint.cache_hash();
  let label = endpoint.description();
  let fetcher: Fetcher = Arc::new(move || {
    api
      .call(&endpoint)
      .map(|response| response.and_then(ApiResponse::into_value))
      .boxed()
  });
  Loader::new(cache.clone(), key, label, ttl, retry, fetcher)
}

/// Everything on a user's detail screen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserDetail {
  pub user: Option<UserRecord>,
  pub wallet: Option<WalletRecord>,
  pub notifications: Vec<Notification>,
  pub referrals: ReferralSummary,
  pub strategies: Vec<Strategy>,
  pub activities: Vec<Activity>,
}

impl UserDetail {
  pub fn unread_notifications(&self) -> usize {
    self.notifications.iter().filter(|n| !n.read).count()
  }
}

impl ViewModel for UserDetail {
  fn apply(&mut self, part: &str, value: Value) -> Result<(), FetchError> {
    match part {
      "user" => self.user = Some(decode(value)?),
      "wallet" => self.wallet = decode(value)?,
      // A null list or summary means "none yet"
      "notifications" => self.notifications = decode::<Option<_>>(value)?.unwrap_or_default(),
      "referrals" => self.referrals = decode::<Option<_>>(value)?.unwrap_or_default(),
      "strategies" => self.strategies = decode::<Option<_>>(value)?.unwrap_or_default(),
      "activities" => self.activities = decode::<Option<_>>(value)?.unwrap_or_default(),
      other => return Err(FetchError::Decode(format!("unknown part {}", other))),
    }
    Ok(())
  }

  fn reset(&mut self, part: &str) {
    match part {
      "wallet" => self.wallet = None,
      "notifications" => self.notifications.clear(),
      "referrals" => self.referrals = ReferralSummary::default(),
      "strategies" => self.strategies.clear(),
      "activities" => self.activities.clear(),
      _ => {}
    }
  }
}

/// Factory for the orchestrators each screen uses.
#[derive(Clone)]
pub struct DataSources {
  api: Arc<dyn RemoteApi>,
  cache: ResourceCache,
  ttl: CacheConfig,
  retry: RetryPolicy,
  recent_users_limit: u32,
}

impl DataSources {
  pub fn new(api: Arc<dyn RemoteApi>, cache: ResourceCache, config: &Config) -> Self {
    Self::with_settings(
      api,
      cache,
      config.cache.clone(),
      config.retry,
      config.recent_users_limit,
    )
  }

  pub fn with_settings(
    api: Arc<dyn RemoteApi>,
    cache: ResourceCache,
    ttl: CacheConfig,
    retry: RetryPolicy,
    recent_users_limit: u32,
  ) -> Self {
    Self {
      api,
      cache,
      ttl,
      retry,
      recent_users_limit,
    }
  }

  fn loader(&self, endpoint: Endpoint, ttl: Duration) -> Loader {
    endpoint_loader(
      Arc::clone(&self.api),
      &self.cache,
      endpoint,
      ttl,
      self.retry,
    )
  }

  pub fn stats(&self) -> Query<DashboardStats> {
    Query::new(self.loader(Endpoint::Stats, self.ttl.stats_ttl()))
  }

  pub fn recent_users(&self) -> Query<Vec<UserSummary>> {
    let endpoint = Endpoint::RecentUsers {
      limit: self.recent_users_limit,
    };
    Query::new(self.loader(endpoint, self.ttl.users_ttl()))
  }

  /// The profile is critical; every other section degrades on its own.
  pub fn user_detail(&self, subject: &str) -> Aggregate<UserDetail> {
    let id = subject.trim().to_string();
    let part = |endpoint: Endpoint, criticality| {
      Part::new(
        endpoint.resource(),
        criticality,
        self.loader(endpoint, self.ttl.detail_ttl()),
      )
    };

    let parts = vec![
      part(Endpoint::User { id: id.clone() }, Criticality::Critical),
      part(Endpoint::Wallet { id: id.clone() }, Criticality::Optional),
      part(
        Endpoint::Notifications { id: id.clone() },
        Criticality::Optional,
      ),
      part(Endpoint::Referrals { id: id.clone() }, Criticality::Optional),
      part(Endpoint::Strategies { id: id.clone() }, Criticality::Optional),
      part(Endpoint::Activities { id: id.clone() }, Criticality::Optional),
    ];
    Aggregate::new(id, parts)
  }
}
