//! Shapes of the calls issued against the remote data store.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ToolError;

/// Ordering and range constraints for fetch and subscribe.
///
/// Applied in field order: ordering first, then range, then limits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueryParams {
    /// Order children by key.
    pub order_by_key: bool,
    /// Order children by value.
    pub order_by_value: bool,
    /// Order children by the named child field.
    pub order_by_child: Option<String>,
    /// Lower bound (inclusive) on the ordered field.
    pub start_at: Option<Value>,
    /// Exact match on the ordered field.
    pub equal_to: Option<Value>,
    /// Upper bound (inclusive) on the ordered field.
    pub end_at: Option<Value>,
    /// Keep only the first N children.
    pub limit_to_first: Option<usize>,
    /// Keep only the last N children.
    pub limit_to_last: Option<usize>,
}

impl QueryParams {
    /// An unconstrained query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Order by the named child field.
    pub fn order_by_child(mut self, child: &str) -> Self {
        self.order_by_child = Some(child.to_string());
        self
    }

    /// Keep only the first `n` children.
    pub fn limit_to_first(mut self, n: usize) -> Self {
        self.limit_to_first = Some(n);
        self
    }

    /// Keep only the last `n` children.
    pub fn limit_to_last(mut self, n: usize) -> Self {
        self.limit_to_last = Some(n);
        self
    }
}

/// One keyed child of a collection or one subscription event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Child key.
    pub key: String,
    /// Child value.
    pub value: Value,
}

impl Entry {
    /// Create an entry.
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Which change a subscription listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// The whole value at the path.
    Value,
    /// A child was added.
    ChildAdded,
    /// A child changed.
    ChildChanged,
    /// A child was removed.
    ChildRemoved,
    /// A child moved in the ordering.
    ChildMoved,
}

/// Payload handed to `data_upload`.
#[derive(Clone, PartialEq, Eq)]
pub enum UploadPayload {
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Standard base64 text, decoded before upload.
    Base64(String),
}

impl UploadPayload {
    /// Decode into the bytes that get uploaded.
    pub fn into_bytes(self) -> Result<Vec<u8>, ToolError> {
        match self {
            UploadPayload::Bytes(bytes) => Ok(bytes),
            UploadPayload::Base64(text) => STANDARD
                .decode(text.trim())
                .map_err(|e| ToolError::InvalidArgument(format!("upload payload: {e}"))),
        }
    }
}

impl std::fmt::Debug for UploadPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadPayload::Bytes(b) => write!(f, "Bytes([{} bytes])", b.len()),
            UploadPayload::Base64(t) => write!(f, "Base64([{} chars])", t.len()),
        }
    }
}

/// An authenticated user as returned by sign-up and sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Stable user identifier.
    pub uid: String,
    /// Email the account is registered with.
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_params_deserialize_camel_case() {
        let q: QueryParams =
            serde_json::from_value(json!({ "orderByChild": "age", "limitToLast": 3 })).unwrap();
        assert_eq!(q.order_by_child.as_deref(), Some("age"));
        assert_eq!(q.limit_to_last, Some(3));
        assert!(!q.order_by_key);
    }

    #[test]
    fn base64_payload_decodes() {
        let payload = UploadPayload::Base64("aGVsbG8=".to_string());
        assert_eq!(payload.into_bytes().unwrap(), b"hello");
    }

    #[test]
    fn invalid_base64_is_rejected() {
        let err = UploadPayload::Base64("not base64!!".to_string())
            .into_bytes()
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgument(_)));
    }

    #[test]
    fn upload_debug_hides_content() {
        let debug = format!("{:?}", UploadPayload::Bytes(vec![0xDE, 0xAD]));
        assert_eq!(debug, "Bytes([2 bytes])");
    }
}
