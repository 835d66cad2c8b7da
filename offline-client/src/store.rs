//! Reducer/selector store backing the dispatch context.
//!
//! Deliberately small: named reducers own one slice of state each,
//! selectors derive values from the whole state, and events are applied
//! one at a time under a write lock.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Event kind applied to every reducer when the store is created.
pub const INIT_EVENT: &str = "@@init";

/// An event dispatched to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreEvent {
    /// Event kind.
    pub kind: String,
    /// Event data.
    pub payload: Value,
}

impl StoreEvent {
    /// An event with a payload.
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// The initialization event.
    pub fn init() -> Self {
        Self::new(INIT_EVENT, Value::Null)
    }
}

/// Computes the next value of one state slice.
pub trait Reducer: Send + Sync {
    /// `state` is `None` only for the initialization event.
    fn reduce(&self, state: Option<&Value>, event: &StoreEvent) -> Value;
}

impl<F> Reducer for F
where
    F: Fn(Option<&Value>, &StoreEvent) -> Value + Send + Sync,
{
    fn reduce(&self, state: Option<&Value>, event: &StoreEvent) -> Value {
        self(state, event)
    }
}

/// Derives a value from the whole state.
pub trait Selector: Send + Sync {
    /// Compute the derived value.
    fn select(&self, state: &Map<String, Value>) -> Value;
}

impl<F> Selector for F
where
    F: Fn(&Map<String, Value>) -> Value + Send + Sync,
{
    fn select(&self, state: &Map<String, Value>) -> Value {
        self(state)
    }
}

/// Named reducers and selectors over a JSON state.
pub struct Store {
    reducers: BTreeMap<String, Arc<dyn Reducer>>,
    selectors: BTreeMap<String, Arc<dyn Selector>>,
    state: RwLock<Map<String, Value>>,
}

impl Store {
    /// Build a store and run the initialization event through every reducer.
    pub fn new(
        reducers: BTreeMap<String, Arc<dyn Reducer>>,
        selectors: BTreeMap<String, Arc<dyn Selector>>,
    ) -> Self {
        let init = StoreEvent::init();
        let state = reducers
            .iter()
            .map(|(name, reducer)| (name.clone(), reducer.reduce(None, &init)))
            .collect();
        Self {
            reducers,
            selectors,
            state: RwLock::new(state),
        }
    }

    /// Apply `event` to every reducer.
    pub async fn dispatch(&self, event: StoreEvent) {
        let mut state = self.state.write().await;
        for (name, reducer) in &self.reducers {
            let next = reducer.reduce(state.get(name), &event);
            state.insert(name.clone(), next);
        }
    }

    /// Snapshot of the whole state.
    pub async fn state(&self) -> Map<String, Value> {
        self.state.read().await.clone()
    }

    /// Run the named selector. `None` if no such selector exists.
    pub async fn select(&self, name: &str) -> Option<Value> {
        let selector = self.selectors.get(name)?;
        Some(selector.select(&*self.state.read().await))
    }

    /// Registered reducer names.
    pub fn reducer_names(&self) -> impl Iterator<Item = &str> {
        self.reducers.keys().map(String::as_str)
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("reducers", &self.reducers.keys().collect::<Vec<_>>())
            .field("selectors", &self.selectors.keys().collect::<Vec<_>>())
            .finish()
    }
}
