//! Queued batch for the offline outbox.
//!
//! Every effect that could not be committed is merged into a single batch:
//! - Later writes to the same path win (last-write-wins)
//! - Absent markers are skipped, never written as tombstones
//! - The batch carries its failed-attempt count and enqueue time
//!
//! The batch is what gets persisted to storage and what a flush commits in
//! one call.

use offline_first_types::UpdateMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error type for batch encoding.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// Persisted text was not a valid batch.
    #[error("invalid persisted batch: {0}")]
    Decode(#[source] serde_json::Error),

    /// Batch could not be encoded.
    #[error("batch encoding failed: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Merged updates waiting for a successful commit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueuedEffect {
    /// Path → value, already merged.
    pub updates: UpdateMap,
    /// Failed commit attempts so far.
    #[serde(default)]
    pub attempts: u32,
    /// Unix milliseconds when the first effect was queued.
    #[serde(default)]
    pub enqueued_at: u64,
}

impl QueuedEffect {
    /// Create an empty batch stamped with `now_ms`.
    pub fn new(now_ms: u64) -> Self {
        Self {
            updates: UpdateMap::new(),
            attempts: 0,
            enqueued_at: now_ms,
        }
    }

    /// Merge already-pruned updates into the batch. Later writes win.
    pub fn merge_updates(&mut self, updates: UpdateMap) {
        self.updates.extend(updates);
    }

    /// Value queued for `path`, if any.
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.updates.get(path)
    }

    /// Number of queued paths.
    pub fn len(&self) -> usize {
        self.updates.len()
    }

    /// True if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    /// Encode for the storage backend.
    pub fn to_json(&self) -> Result<String, BatchError> {
        serde_json::to_string(self).map_err(BatchError::Encode)
    }

    /// Decode from the storage backend.
    pub fn from_json(text: &str) -> Result<Self, BatchError> {
        serde_json::from_str(text).map_err(BatchError::Decode)
    }
}
