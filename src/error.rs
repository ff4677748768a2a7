//! Errors produced by the data layer.
//!
//! `FetchError` is `Clone` because a single coalesced request hands the same
//! result to every caller that joined it.

use thiserror::Error;

/// Why a fetch did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
  /// The request never produced an envelope (network error, non-2xx status).
  #[error("request failed: {0}")]
  Transport(String),

  /// The server answered with `success: false`.
  #[error("{0}")]
  Rejected(String),

  /// The payload did not match the expected record shape.
  #[error("unexpected response: {0}")]
  Decode(String),
}

impl FetchError {
  /// Retrying a malformed payload yields the same payload, so only transport
  /// and logical failures are worth another attempt.
  pub fn is_retryable(&self) -> bool {
    !matches!(self, FetchError::Decode(_))
  }
}

impl From<reqwest::Error> for FetchError {
  fn from(err: reqwest::Error) -> Self {
    FetchError::Transport(err.to_string())
  }
}

impl From<serde_json::Error> for FetchError {
  fn from(err: serde_json::Error) -> Self {
    FetchError::Decode(err.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_decode_errors_are_not_retried() {
    assert!(FetchError::Transport("connection reset".into()).is_retryable());
    assert!(FetchError::Rejected("User not found".into()).is_retryable());
    assert!(!FetchError::Decode("missing field `id`".into()).is_retryable());
  }

  #[test]
  fn test_rejected_displays_server_message() {
    let err = FetchError::Rejected("Wallet not initialised".into());
    assert_eq!(err.to_string(), "Wallet not initialised");
  }
}
