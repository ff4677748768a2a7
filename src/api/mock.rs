//! Scripted in-memory API for data-layer tests.

use futures::FutureExt;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::api_types::ApiResponse;
use super::cache::Endpoint;
use super::client::{ApiFuture, RemoteApi};
use crate::error::FetchError;

#[derive(Debug, Clone)]
pub enum Reply {
  Data(Value),
  Rejected(String),
  Transport(String),
}

#[derive(Default)]
struct Script {
  replies: HashMap<Endpoint, VecDeque<Reply>>,
  calls: HashMap<Endpoint, u32>,
}

/// Replies are consumed in order; the last one repeats forever.
#[derive(Clone, Default)]
pub struct MockApi {
  script: Arc<Mutex<Script>>,
  latency: Duration,
}

impl MockApi {
  pub fn new() -> Self {
    Self::default()
  }

  /// Every call waits this long before answering.
  pub fn with_latency(mut self, latency: Duration) -> Self {
    self.latency = latency;
    self
  }

  pub fn reply(&self, endpoint: Endpoint, reply: Reply) -> &Self {
    self
      .script
      .lock()
      .unwrap()
      .replies
      .entry(endpoint)
      .or_default()
      .push_back(reply);
    self
  }

  pub fn ok(&self, endpoint: Endpoint, data: Value) -> &Self {
    self.reply(endpoint, Reply::Data(data))
  }

  pub fn fail(&self, endpoint: Endpoint, message: &str) -> &Self {
    self.reply(endpoint, Reply::Transport(message.to_string()))
  }

  /// Network calls made so far for `endpoint`.
  pub fn calls(&self, endpoint: &Endpoint) -> u32 {
    self
      .script
      .lock()
      .unwrap()
      .calls
      .get(endpoint)
      .copied()
      .unwrap_or(0)
  }
}

impl RemoteApi for MockApi {
  fn call(&self, endpoint: &Endpoint) -> ApiFuture {
    let reply = {
      let mut script = self.script.lock().unwrap();
      *script.calls.entry(endpoint.clone()).or_default() += 1;
      match script.replies.get_mut(endpoint) {
        Some(queue) if queue.len() > 1 => queue.pop_front(),
        Some(queue) => queue.front().cloned(),
        None => None,
      }
    };
    let latency = self.latency;
    let endpoint = endpoint.clone();

    async move {
      if !latency.is_zero() {
        tokio::time::sleep(latency).await;
      }
      match reply {
        Some(Reply::Data(data)) => Ok(ApiResponse::ok(data)),
        Some(Reply::Rejected(message)) => Ok(ApiResponse::failed(message)),
        Some(Reply::Transport(message)) => Err(FetchError::Transport(message)),
        None => Err(FetchError::Transport(format!(
          "no reply scripted for {:?}",
          endpoint
        ))),
      }
    }
    .boxed()
  }
}
