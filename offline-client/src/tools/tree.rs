//! Slash-path JSON tree used by the in-process tool backends.

use offline_first_types::{Entry, QueryParams, UpdateMap};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// A JSON document addressed by `a/b/c` paths.
///
/// Writing `Null` deletes the path and prunes parents left empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataTree {
    root: Value,
}

impl DataTree {
    /// An empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// A tree rooted at `root`.
    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    /// The whole document.
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Value at `path`. `None` for missing or null.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut node = &self.root;
        for segment in segments(path) {
            node = node.as_object()?.get(segment)?;
        }
        (!node.is_null()).then_some(node)
    }

    /// Write `value` at `path`.
    pub fn set(&mut self, path: &str, value: Value) {
        let segments: Vec<&str> = segments(path).collect();
        let Some((last, parents)) = segments.split_last() else {
            self.root = value;
            return;
        };
        if value.is_null() {
            remove(&mut self.root, &segments);
            return;
        }
        let mut node = &mut self.root;
        for segment in parents {
            node = ensure_object(node)
                .entry(segment.to_string())
                .or_insert(Value::Null);
        }
        ensure_object(node).insert(last.to_string(), value);
    }

    /// Apply a multi-path update in path order.
    pub fn apply(&mut self, updates: &UpdateMap) {
        for (path, value) in updates {
            self.set(path, value.clone());
        }
    }

    /// Children of `path`, ordered, filtered and limited by `query`.
    pub fn query(&self, path: &str, query: &QueryParams) -> Vec<Entry> {
        let Some(Value::Object(children)) = self.get(path) else {
            return Vec::new();
        };
        let sort_key = |entry: &Entry| -> Value {
            if let Some(child) = &query.order_by_child {
                entry.value.get(child.as_str()).cloned().unwrap_or(Value::Null)
            } else if query.order_by_value {
                entry.value.clone()
            } else {
                Value::String(entry.key.clone())
            }
        };

        let mut entries: Vec<Entry> = children
            .iter()
            .map(|(key, value)| Entry::new(key.clone(), value.clone()))
            .collect();
        entries.sort_by(|a, b| {
            compare(&sort_key(a), &sort_key(b)).then_with(|| a.key.cmp(&b.key))
        });

        if let Some(start) = &query.start_at {
            entries.retain(|e| compare(&sort_key(e), start) != Ordering::Less);
        }
        if let Some(end) = &query.end_at {
            entries.retain(|e| compare(&sort_key(e), end) != Ordering::Greater);
        }
        if let Some(equal) = &query.equal_to {
            entries.retain(|e| compare(&sort_key(e), equal) == Ordering::Equal);
        }
        if let Some(n) = query.limit_to_first {
            entries.truncate(n);
        }
        if let Some(n) = query.limit_to_last {
            let skip = entries.len().saturating_sub(n);
            entries.drain(..skip);
        }
        entries
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}

fn remove(node: &mut Value, segments: &[&str]) {
    let Value::Object(map) = node else {
        return;
    };
    match segments {
        [] => {}
        [last] => {
            map.remove(*last);
        }
        [head, rest @ ..] => {
            if let Some(child) = map.get_mut(*head) {
                remove(child, rest);
                if child.as_object().is_some_and(|m| m.is_empty()) {
                    map.remove(*head);
                }
            }
        }
    }
}

// null < bool < number < string < array < object
fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
