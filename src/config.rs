use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::RetryPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub retry: RetryPolicy,
  #[serde(default)]
  pub refresh: RefreshConfig,
  /// How many users the overview lists
  #[serde(default = "default_recent_users_limit")]
  pub recent_users_limit: u32,
}

fn default_recent_users_limit() -> u32 {
  10
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the admin API, e.g. https://admin.example.com/api
  pub url: String,
  /// Per-request timeout enforced by the HTTP client
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
  30
}

impl ApiConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

/// Time-to-live per resource family, in seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub stats_ttl_secs: u64,
  pub users_ttl_secs: u64,
  pub detail_ttl_secs: u64,
  /// How often expired entries are swept out of memory
  pub cleanup_interval_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      stats_ttl_secs: 30,
      users_ttl_secs: 60,
      detail_ttl_secs: 120,
      cleanup_interval_secs: 300,
    }
  }
}

impl CacheConfig {
  pub fn stats_ttl(&self) -> Duration {
    Duration::from_secs(self.stats_ttl_secs)
  }

  pub fn users_ttl(&self) -> Duration {
    Duration::from_secs(self.users_ttl_secs)
  }

  pub fn detail_ttl(&self) -> Duration {
    Duration::from_secs(self.detail_ttl_secs)
  }

  pub fn cleanup_interval(&self) -> Duration {
    Duration::from_secs(self.cleanup_interval_secs.max(1))
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
  /// Background revalidation period; 0 disables it
  pub interval_secs: u64,
  /// Revalidate stale views when the terminal regains focus
  pub on_focus: bool,
}

impl Default for RefreshConfig {
  fn default() -> Self {
    Self {
      interval_secs: 60,
      on_focus: true,
    }
  }
}

impl RefreshConfig {
  pub fn interval(&self) -> Option<Duration> {
    (self.interval_secs > 0).then(|| Duration::from_secs(self.interval_secs))
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./dashq.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/dashq/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/dashq/config.yaml\n\
                 with at least:\n\napi:\n  url: https://admin.example.com/api"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("dashq.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("dashq").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    url::Url::parse(&config.api.url)
      .map_err(|e| eyre!("api.url is not a valid URL ({}): {}", config.api.url, e))?;
    Ok(config)
  }

  /// Bearer token for the admin API, if one is set.
  ///
  /// Checks DASHQ_API_TOKEN. The session itself is owned by the backend.
  pub fn get_api_token() -> Option<String> {
    std::env::var("DASHQ_API_TOKEN")
      .ok()
      .filter(|t| !t.trim().is_empty())
  }

  /// Directory for the log file.
  pub fn data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("dashq"))
  }
}
