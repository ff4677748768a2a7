//! Wire envelope shared by every endpoint of the admin API.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::error::FetchError;

/// `{success, data, error}` wrapper around every response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
  pub success: bool,
  #[serde(default)]
  pub data: Option<T>,
  #[serde(default)]
  pub error: Option<String>,
}

impl<T> ApiResponse<T> {
  #[cfg(test)]
  pub fn ok(data: T) -> Self {
    Self {
      success: true,
      data: Some(data),
      error: None,
    }
  }

  #[cfg(test)]
  pub fn failed(message: impl Into<String>) -> Self {
    Self {
      success: false,
      data: None,
      error: Some(message.into()),
    }
  }
}

impl ApiResponse<Value> {
  /// Collapse the envelope into the payload or a logical failure.
  ///
  /// A successful envelope without data (e.g. a user with no wallet yet)
  /// yields `Value::Null`.
  pub fn into_value(self) -> Result<Value, FetchError> {
    if self.success {
      Ok(self.data.unwrap_or(Value::Null))
    } else {
      Err(FetchError::Rejected(
        self
          .error
          .unwrap_or_else(|| "request was not successful".to_string()),
      ))
    }
  }
}

/// Decode a cached JSON payload into its record type.
pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, FetchError> {
  serde_json::from_value(value).map_err(FetchError::from)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_success_envelope_yields_data() {
    let envelope: ApiResponse<Value> =
      serde_json::from_value(json!({"success": true, "data": {"balance": 12.5}})).unwrap();
    assert_eq!(envelope.into_value(), Ok(json!({"balance": 12.5})));
  }

  #[test]
  fn test_null_data_is_not_an_error() {
    let envelope: ApiResponse<Value> =
      serde_json::from_value(json!({"success": true, "data": null, "error": null})).unwrap();
    assert_eq!(envelope.into_value(), Ok(Value::Null));
  }

  #[test]
  fn test_failed_envelope_carries_message() {
    let envelope: ApiResponse<Value> =
      serde_json::from_value(json!({"success": false, "error": "User not found"})).unwrap();
    assert_eq!(
      envelope.into_value(),
      Err(FetchError::Rejected("User not found".into()))
    );
  }

  #[test]
  fn test_failed_envelope_without_message() {
    let envelope: ApiResponse<Value> = ApiResponse {
      success: false,
      data: None,
      error: None,
    };
    assert_eq!(
      envelope.into_value(),
      Err(FetchError::Rejected("request was not successful".into()))
    );
  }

  #[test]
  fn test_decode_reports_shape_mismatch() {
    let result: Result<Vec<String>, _> = decode(json!({"not": "a list"}));
    assert!(matches!(result, Err(FetchError::Decode(_))));
  }
}
