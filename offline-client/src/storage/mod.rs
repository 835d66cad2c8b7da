//! Storage layer for the offline queue.
//!
//! A string key-value store. The queue keeps its batch under one fixed key
//! and never touches anything else.

mod callback;
mod file;
mod memory;

pub use callback::{CallbackStorage, STORAGE_PRIMITIVES};
pub use file::{FileStorage, MAX_KEY_LEN};
pub use memory::MemoryStorage;

use async_trait::async_trait;
use offline_first_types::StorageError;

/// Trait for key-value storage backends.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read the value under `key`.
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write `value` under `key`, replacing any previous value.
    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Deleting a missing key succeeds.
    async fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// Every stored key.
    async fn get_all_keys(&self) -> Result<Vec<String>, StorageError>;
}
