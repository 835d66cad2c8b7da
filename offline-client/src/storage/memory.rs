//! In-memory storage for tests and ephemeral sessions.

use super::Storage;
use async_trait::async_trait;
use offline_first_types::StorageError;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// In-memory storage. Clones share the same map.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    inner: Arc<Mutex<MemoryStorageInner>>,
}

#[derive(Debug, Default)]
struct MemoryStorageInner {
    items: BTreeMap<String, String>,
    writes: usize,
    fail_next_get: Option<String>,
    fail_next_set: Option<String>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the stored value under `key`.
    pub fn peek(&self, key: &str) -> Option<String> {
        self.inner.lock().unwrap().items.get(key).cloned()
    }

    /// Store `value` directly, bypassing the trait.
    pub fn seed(&self, key: &str, value: &str) {
        self.inner
            .lock()
            .unwrap()
            .items
            .insert(key.to_string(), value.to_string());
    }

    /// Number of successful set_item() calls.
    pub fn write_count(&self) -> usize {
        self.inner.lock().unwrap().writes
    }

    /// Cause the next get_item() to fail with the given error.
    pub fn fail_next_get(&self, error: &str) {
        self.inner.lock().unwrap().fail_next_get = Some(error.to_string());
    }

    /// Cause the next set_item() to fail with the given error.
    pub fn fail_next_set(&self, error: &str) {
        self.inner.lock().unwrap().fail_next_set = Some(error.to_string());
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(error) = inner.fail_next_get.take() {
            return Err(StorageError::Backend(error));
        }
        Ok(inner.items.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(error) = inner.fail_next_set.take() {
            return Err(StorageError::Backend(error));
        }
        inner.items.insert(key.to_string(), value.to_string());
        inner.writes += 1;
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.inner.lock().unwrap().items.remove(key);
        Ok(())
    }

    async fn get_all_keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.inner.lock().unwrap().items.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_remove() {
        let storage = MemoryStorage::new();
        storage.set_item("k", "v").await.unwrap();
        assert_eq!(storage.get_item("k").await.unwrap(), Some("v".into()));
        assert_eq!(storage.get_all_keys().await.unwrap(), vec!["k".to_string()]);

        storage.remove_item("k").await.unwrap();
        storage.remove_item("k").await.unwrap();
        assert_eq!(storage.get_item("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn forced_failures_fire_once() {
        let storage = MemoryStorage::new();
        storage.fail_next_set("disk full");
        assert!(storage.set_item("k", "v").await.is_err());
        assert!(storage.set_item("k", "v").await.is_ok());
        assert_eq!(storage.write_count(), 1);

        storage.fail_next_get("locked");
        assert!(storage.get_item("k").await.is_err());
        assert!(storage.get_item("k").await.is_ok());
    }
}
