//! Response caching for the dashboard data layer.
//!
//! This module provides a domain-agnostic cache that:
//! - Stores JSON values with a per-entry TTL
//! - Coalesces concurrent requests for the same key into one network call
//! - Serves expired values while a refetch runs (stale-while-revalidate)
//! - Retries failed fetches with a fixed delay

mod layer;
mod store;
mod traits;

pub use layer::{Fetcher, Loader, RetryPolicy};
pub use store::ResourceCache;
pub use traits::{CacheLookup, QueryKey};
