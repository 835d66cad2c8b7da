//! Effects: remote mutations emitted by action handlers.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Action parameters: a JSON object.
pub type Params = Map<String, Value>;

/// A committed batch of updates: path → new value.
///
/// Ordered by path so persisted batches and commit payloads are stable.
pub type UpdateMap = BTreeMap<String, Value>;

/// A pending remote mutation.
///
/// Each path maps to `Some(value)` for a write or `None` for the absent
/// marker. Absent entries are dropped before the effect is committed or
/// merged, so "no-op" is never confused with "delete". A delete is written
/// as `Some(Value::Null)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Effect {
    updates: BTreeMap<String, Option<Value>>,
}

impl Effect {
    /// Create an effect with no updates.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `value` at `path`.
    pub fn set(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.updates.insert(path.into(), Some(value.into()));
        self
    }

    /// Mark `path` with the absent marker (dropped on emission).
    pub fn absent(mut self, path: impl Into<String>) -> Self {
        self.updates.insert(path.into(), None);
        self
    }

    /// Insert a raw entry. A later insert for the same path replaces the earlier one.
    pub fn insert(&mut self, path: impl Into<String>, value: Option<Value>) {
        self.updates.insert(path.into(), value);
    }

    /// All entries, including absent ones.
    pub fn updates(&self) -> &BTreeMap<String, Option<Value>> {
        &self.updates
    }

    /// True if the effect has no entries at all.
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    /// The entries that will actually be written, absent markers removed.
    pub fn into_updates(self) -> UpdateMap {
        self.updates
            .into_iter()
            .filter_map(|(path, value)| value.map(|v| (path, v)))
            .collect()
    }

    /// Interpret a handler's JSON result shaped like `{"updates": {...}}`.
    ///
    /// Returns `None` for anything else. JSON has no absent marker, so every
    /// entry becomes a write (`null` is a delete).
    pub fn from_value(value: &Value) -> Option<Self> {
        let updates = value.as_object()?.get("updates")?.as_object()?;
        Some(
            updates
                .iter()
                .map(|(path, v)| (path.clone(), Some(v.clone())))
                .collect(),
        )
    }
}

impl FromIterator<(String, Option<Value>)> for Effect {
    fn from_iter<I: IntoIterator<Item = (String, Option<Value>)>>(iter: I) -> Self {
        Self {
            updates: iter.into_iter().collect(),
        }
    }
}
