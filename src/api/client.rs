use color_eyre::{eyre::eyre, Result};
use futures::future::{self, BoxFuture, FutureExt};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::api_types::ApiResponse;
use super::cache::Endpoint;
use crate::config::Config;
use crate::error::FetchError;

/// One call to the remote API, resolved to its envelope.
pub type ApiFuture = BoxFuture<'static, Result<ApiResponse<Value>, FetchError>>;

/// The remote collaborator behind every cached resource.
///
/// Calls return `'static` futures so they can be registered in the cache's
/// pending table and outlive the caller that started them.
pub trait RemoteApi: Send + Sync {
  fn call(&self, endpoint: &Endpoint) -> ApiFuture;
}

/// Admin API client over HTTP
#[derive(Clone)]
pub struct HttpApi {
  client: reqwest::Client,
  base: Url,
  token: Option<String>,
}

impl HttpApi {
  pub fn new(config: &Config) -> Result<Self> {
    Self::with_base(
      &config.api.url,
      config.api.timeout(),
      Config::get_api_token(),
    )
  }

  pub fn with_base(base: &str, timeout: Duration, token: Option<String>) -> Result<Self> {
    let base = Url::parse(base).map_err(|e| eyre!("Invalid API URL {}: {}", base, e))?;
    if base.cannot_be_a_base() {
      return Err(eyre!("API URL {} cannot be used as a base", base));
    }

    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      client,
      base,
      token,
    })
  }

  /// Host (and port) of the API, for the header bar.
  pub fn host(&self) -> String {
    match (self.base.host_str(), self.base.port()) {
      (Some(host), Some(port)) => format!("{}:{}", host, port),
      (Some(host), None) => host.to_string(),
      _ => self.base.to_string(),
    }
  }

  fn url_for(&self, endpoint: &Endpoint) -> Result<Url, FetchError> {
    let mut url = self.base.clone();
    url
      .path_segments_mut()
      .map_err(|_| FetchError::Transport(format!("{} cannot be a base URL", self.base)))?
      .pop_if_empty()
      .extend(endpoint.segments());

    let query = endpoint.query();
    if !query.is_empty() {
      url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
  }
}

impl RemoteApi for HttpApi {
  fn call(&self, endpoint: &Endpoint) -> ApiFuture {
    let url = match self.url_for(endpoint) {
      Ok(url) => url,
      Err(err) => return future::ready(Err(err)).boxed(),
    };

    let mut request = self.client.get(url.clone());
    if let Some(token) = &self.token {
      request = request.bearer_auth(token);
    }

    async move {
      debug!(%url, "GET");
      let response = request.send().await?;
      let status = response.status();
      let body = response.text().await?;

      match serde_json::from_str::<ApiResponse<Value>>(&body) {
        // A non-2xx status with a well-formed failure envelope is a logical
        // failure and keeps the server's message.
        Ok(envelope) if status.is_success() || !envelope.success => Ok(envelope),
        Ok(_) => Err(FetchError::Transport(format!("HTTP {}", status))),
        Err(e) if status.is_success() => Err(FetchError::Decode(e.to_string())),
        Err(_) => Err(FetchError::Transport(format!("HTTP {}", status))),
      }
    }
    .boxed()
  }
}
