//! Records returned by the admin API.
//!
//! Fields default when absent so an older backend that omits a column still
//! decodes. Ids accept the Mongo `_id` spelling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Headline numbers for the admin overview
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardStats {
  pub total_users: u64,
  pub active_plans: u64,
  pub revenue: f64,
  pub active_users: u64,
  /// Percent change over the previous period
  pub growth: f64,
}

/// Row in the recent users list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserSummary {
  #[serde(alias = "_id")]
  pub id: String,
  pub name: String,
  pub email: String,
  pub plan: Option<String>,
  pub created_at: Option<DateTime<Utc>>,
}

/// Full user profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserRecord {
  #[serde(alias = "_id")]
  pub id: String,
  pub name: String,
  pub email: String,
  pub phone: Option<String>,
  pub status: Option<String>,
  pub plan: Option<String>,
  pub is_verified: bool,
  pub created_at: Option<DateTime<Utc>>,
  pub last_login: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WalletRecord {
  pub balance: f64,
  pub currency: String,
  pub address: Option<String>,
  pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Notification {
  #[serde(alias = "_id")]
  pub id: String,
  pub title: String,
  pub message: String,
  pub read: bool,
  pub created_at: Option<DateTime<Utc>>,
}

/// A user's referral code and everyone who signed up with it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReferralSummary {
  pub referral_code: String,
  pub referrals: Vec<Referral>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Referral {
  #[serde(alias = "_id")]
  pub id: String,
  pub name: String,
  pub email: String,
  pub reward: f64,
  pub created_at: Option<DateTime<Utc>>,
}

/// Trading strategy attached to a user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Strategy {
  #[serde(alias = "_id")]
  pub id: String,
  pub name: String,
  pub status: String,
  pub allocated: f64,
  pub pnl: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Activity {
  #[serde(alias = "_id")]
  pub id: String,
  pub action: String,
  pub description: String,
  pub created_at: Option<DateTime<Utc>>,
}
