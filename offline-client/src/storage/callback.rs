//! Storage backed by host callbacks.

use super::Storage;
use crate::callback::{CallbackFn, CapabilityTable, TableKind};
use async_trait::async_trait;
use offline_first_types::{ConfigurationError, StorageError, ToolError};
use serde_json::Value;

/// Primitives every storage table must provide, with their data arity.
pub const STORAGE_PRIMITIVES: [(&str, usize); 4] = [
    ("getItem", 1),
    ("setItem", 2),
    ("removeItem", 1),
    ("getAllKeys", 0),
];

/// [`Storage`] over a table of callback-style host functions.
#[derive(Debug, Clone)]
pub struct CallbackStorage {
    get_item: CallbackFn,
    set_item: CallbackFn,
    remove_item: CallbackFn,
    get_all_keys: CallbackFn,
}

impl CallbackStorage {
    /// Bind every primitive, failing on the first missing or non-callable one.
    pub fn from_table(table: &CapabilityTable) -> Result<Self, ConfigurationError> {
        let [get_item, set_item, remove_item, get_all_keys] =
            STORAGE_PRIMITIVES.map(|(name, arity)| table.require(TableKind::Storage, name, arity));
        Ok(Self {
            get_item: get_item?,
            set_item: set_item?,
            remove_item: remove_item?,
            get_all_keys: get_all_keys?,
        })
    }
}

fn backend(error: ToolError) -> StorageError {
    StorageError::Backend(error.to_string())
}

fn text(value: &str) -> Option<Value> {
    Some(Value::String(value.to_string()))
}

#[async_trait]
impl Storage for CallbackStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.get_item.call(vec![text(key)]).await.map_err(backend)? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            other => Err(StorageError::Corrupt {
                key: key.to_string(),
                reason: format!("expected text, got {other}"),
            }),
        }
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.set_item
            .call(vec![text(key), text(value)])
            .await
            .map(|_| ())
            .map_err(backend)
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.remove_item
            .call(vec![text(key)])
            .await
            .map(|_| ())
            .map_err(backend)
    }

    async fn get_all_keys(&self) -> Result<Vec<String>, StorageError> {
        let value = self.get_all_keys.call(Vec::new()).await.map_err(backend)?;
        serde_json::from_value(value).map_err(|e| StorageError::Backend(e.to_string()))
    }
}
