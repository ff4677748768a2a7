//! Core traits and types for the caching system.

use serde_json::Value;

/// Anything that names a cacheable remote query.
///
/// The hash must be a pure function of the query's identity so that two
/// queries for different subjects can never share an entry.
pub trait QueryKey {
  /// Stable cache key for this query.
  fn cache_hash(&self) -> String;

  /// Human readable label used in logs and diagnostics.
  fn description(&self) -> String;
}

/// What the cache holds for a key at the moment of lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
  /// Present and within its TTL
  Fresh(Value),
  /// Present but expired; still usable while a refetch runs
  Stale(Value),
  /// Never written, or deleted
  Missing,
}
