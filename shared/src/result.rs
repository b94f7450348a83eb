//! Uniform response envelope for session operations

use crate::{FailureKind, SessionError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Result of a single operation: `{success, message, ...fields}`
///
/// Operation-specific fields are flattened next to `success` and `message`.
/// The failure kind is kept out of the serialized form and only drives
/// transport-level decisions such as HTTP status codes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    #[serde(skip)]
    pub failure: Option<FailureKind>,
}

impl CommandResult {
    /// Successful result with a message
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            fields: Map::new(),
            failure: None,
        }
    }

    /// Failed result with an explicit kind
    pub fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            fields: Map::new(),
            failure: Some(kind),
        }
    }

    /// Attach an operation-specific field
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// Look up an operation-specific field
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// True if this result failed because of a connection error
    pub fn is_connection_failure(&self) -> bool {
        self.failure == Some(FailureKind::Connection)
    }
}

impl From<SessionError> for CommandResult {
    fn from(err: SessionError) -> Self {
        CommandResult::failed(err.kind(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flattened_fields() {
        let result = CommandResult::ok("Connected to COM3 at 57600 baud")
            .with("port", "COM3")
            .with("baud", 57600);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            json!({
                "success": true,
                "message": "Connected to COM3 at 57600 baud",
                "port": "COM3",
                "baud": 57600
            })
        );
    }

    #[test]
    fn test_from_session_error() {
        let result = CommandResult::from(SessionError::NotConnected);
        assert!(!result.success);
        assert_eq!(result.message, "Not connected");
        assert_eq!(result.failure, Some(FailureKind::Precondition));

        // Failure kind never leaks into the envelope
        let value = serde_json::to_value(&result).unwrap();
        assert!(value.get("failure").is_none());
    }
}
