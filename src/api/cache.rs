//! Endpoints of the admin API and the cache keys derived from them.

use sha2::{Digest, Sha256};

use crate::cache::QueryKey;

/// One remote query. Subject-scoped variants carry the user id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
  /// Headline counters for the overview
  Stats,
  /// Most recently registered users
  RecentUsers { limit: u32 },
  /// Full profile of one user
  User { id: String },
  Wallet { id: String },
  Notifications { id: String },
  Referrals { id: String },
  Strategies { id: String },
  Activities { id: String },
}

impl Endpoint {
  /// Short resource name, also used to name aggregate parts.
  pub fn resource(&self) -> &'static str {
    match self {
      Self::Stats => "stats",
      Self::RecentUsers { .. } => "recent_users",
      Self::User { .. } => "user",
      Self::Wallet { .. } => "wallet",
      Self::Notifications { .. } => "notifications",
      Self::Referrals { .. } => "referrals",
      Self::Strategies { .. } => "strategies",
      Self::Activities { .. } => "activities",
    }
  }

  /// The user this endpoint is scoped to, if any.
  pub fn subject(&self) -> Option<&str> {
    match self {
      Self::Stats | Self::RecentUsers { .. } => None,
      Self::User { id }
      | Self::Wallet { id }
      | Self::Notifications { id }
      | Self::Referrals { id }
      | Self::Strategies { id }
      | Self::Activities { id } => Some(id),
    }
  }

  /// Path segments relative to the API base URL.
  pub fn segments(&self) -> Vec<&str> {
    match self {
      Self::Stats => vec!["admin", "stats"],
      Self::RecentUsers { .. } => vec!["admin", "users", "recent"],
      Self::User { id } => vec!["users", id],
      Self::Wallet { id } => vec!["users", id, "wallet"],
      Self::Notifications { id } => vec!["users", id, "notifications"],
      Self::Referrals { id } => vec!["users", id, "referrals"],
      Self::Strategies { id } => vec!["users", id, "strategies"],
      Self::Activities { id } => vec!["users", id, "activities"],
    }
  }

  /// Query string parameters.
  pub fn query(&self) -> Vec<(&'static str, String)> {
    match self {
      Self::RecentUsers { limit } => vec![("limit", limit.to_string())],
      _ => Vec::new(),
    }
  }
}

impl QueryKey for Endpoint {
  fn cache_hash(&self) -> String {
    let input = match self {
      Self::Stats => "stats".to_string(),
      Self::RecentUsers { limit } => format!("recent_users:{}", limit),
      _ => format!(
        "{}:{}",
        self.resource(),
        normalize_subject(self.subject().unwrap_or_default())
      ),
    };

    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }

  fn description(&self) -> String {
    match self {
      Self::Stats => "dashboard stats".to_string(),
      Self::RecentUsers { limit } => format!("recent users (last {})", limit),
      _ => format!(
        "{} of user {}",
        self.resource(),
        self.subject().unwrap_or_default()
      ),
    }
  }
}

/// Ids arrive from URLs and list rows; stray whitespace must not split the cache.
fn normalize_subject(id: &str) -> &str {
  id.trim()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_cache_hash_is_deterministic() {
    let a = Endpoint::Wallet { id: "u1".into() };
    let b = Endpoint::Wallet { id: "u1".into() };
    assert_eq!(a.cache_hash(), b.cache_hash());
    assert_eq!(a.cache_hash().len(), 64);
  }

  #[test]
  fn test_subjects_never_collide() {
    let one = Endpoint::Wallet { id: "u1".into() };
    let two = Endpoint::Wallet { id: "u2".into() };
    assert_ne!(one.cache_hash(), two.cache_hash());
  }

  #[test]
  fn test_parts_of_one_subject_never_collide() {
    let id = "u1".to_string();
    let keys: std::collections::HashSet<String> = [
      Endpoint::User { id: id.clone() },
      Endpoint::Wallet { id: id.clone() },
      Endpoint::Notifications { id: id.clone() },
      Endpoint::Referrals { id: id.clone() },
      Endpoint::Strategies { id: id.clone() },
      Endpoint::Activities { id },
    ]
    .iter()
    .map(|e| e.cache_hash())
    .collect();
    assert_eq!(keys.len(), 6);
  }

  #[test]
  fn test_subject_whitespace_is_ignored() {
    let padded = Endpoint::User { id: " u1 ".into() };
    let plain = Endpoint::User { id: "u1".into() };
    assert_eq!(padded.cache_hash(), plain.cache_hash());
  }

  #[test]
  fn test_recent_users_limit_is_part_of_key() {
    let five = Endpoint::RecentUsers { limit: 5 };
    let ten = Endpoint::RecentUsers { limit: 10 };
    assert_ne!(five.cache_hash(), ten.cache_hash());
  }

  #[test]
  fn test_segments_and_query() {
    let wallet = Endpoint::Wallet { id: "u1".into() };
    assert_eq!(wallet.segments(), vec!["users", "u1", "wallet"]);
    assert!(wallet.query().is_empty());

    let recent = Endpoint::RecentUsers { limit: 5 };
    assert_eq!(recent.query(), vec![("limit", "5".to_string())]);
  }

  #[test]
  fn test_description() {
    assert_eq!(
      Endpoint::Strategies { id: "u9".into() }.description(),
      "strategies of user u9"
    );
    assert_eq!(Endpoint::Stats.description(), "dashboard stats");
  }
}
