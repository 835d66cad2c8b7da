//! Callback-style capabilities with fixed arity.
//!
//! Some hosts hand us capabilities as "call with N positional arguments,
//! then a completion". [`CallbackFn`] normalizes every call to exactly the
//! declared number of data arguments: missing ones are padded with the
//! absent marker (`None`) and extras are dropped, so the completion never
//! lands in a data slot.

use offline_first_types::{ConfigurationError, ToolError};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;

/// Positional data arguments. `None` is the absent marker.
pub type Args = Vec<Option<Value>>;

/// The raw host function: data arguments, then the completion.
pub type RawCallback = Arc<dyn Fn(Args, Completion) + Send + Sync>;

/// Completion handed to a raw callback.
///
/// One-shot capabilities take the first result; streaming ones (subscribe,
/// network detection) may complete many times.
#[derive(Clone)]
pub struct Completion {
    sink: Arc<dyn Fn(Result<Value, ToolError>) + Send + Sync>,
}

impl Completion {
    /// Wrap a sink receiving every result.
    pub fn new(sink: impl Fn(Result<Value, ToolError>) + Send + Sync + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
        }
    }

    /// A completion that resolves a oneshot with its first result.
    pub fn oneshot() -> (Self, oneshot::Receiver<Result<Value, ToolError>>) {
        let (tx, rx) = oneshot::channel();
        let slot = Mutex::new(Some(tx));
        let completion = Self::new(move |result| {
            let sender = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
            if let Some(tx) = sender {
                let _ = tx.send(result);
            }
        });
        (completion, rx)
    }

    /// Report a result.
    pub fn complete(&self, result: Result<Value, ToolError>) {
        (self.sink)(result)
    }

    /// Report success.
    pub fn ok(&self, value: Value) {
        self.complete(Ok(value))
    }

    /// Report failure.
    pub fn fail(&self, error: ToolError) {
        self.complete(Err(error))
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Completion")
    }
}

/// A raw callback bound to its declared data arity.
#[derive(Clone)]
pub struct CallbackFn {
    name: String,
    arity: usize,
    callback: RawCallback,
}

impl CallbackFn {
    /// Bind `callback` to `arity` data arguments.
    pub fn new(name: impl Into<String>, arity: usize, callback: RawCallback) -> Self {
        Self {
            name: name.into(),
            arity,
            callback,
        }
    }

    /// Capability name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared number of data arguments.
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Pad with absent markers or truncate to exactly the declared arity.
    pub fn normalize(&self, mut args: Args) -> Args {
        args.resize(self.arity, None);
        args
    }

    /// Invoke with normalized arguments and a caller-supplied completion.
    pub fn invoke(&self, args: Args, completion: Completion) {
        (self.callback)(self.normalize(args), completion)
    }

    /// Invoke and wait for the first result.
    pub async fn call(&self, args: Args) -> Result<Value, ToolError> {
        let (completion, rx) = Completion::oneshot();
        self.invoke(args, completion);
        rx.await.map_err(|_| ToolError::Dropped)?
    }
}

impl fmt::Debug for CallbackFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackFn")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

/// One entry of a capability table as supplied by the host.
#[derive(Clone)]
pub enum Capability {
    /// A callable capability.
    Callback(RawCallback),
    /// Something that is not callable (rejected by settings validation).
    Value(Value),
}

/// Which settings table a capability belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// `settings.tools`
    Tools,
    /// `settings.storage`
    Storage,
}

impl TableKind {
    fn missing(self, name: &str) -> ConfigurationError {
        match self {
            TableKind::Tools => ConfigurationError::MissingTool(name.to_string()),
            TableKind::Storage => ConfigurationError::MissingStoragePrimitive(name.to_string()),
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            TableKind::Tools => "tools",
            TableKind::Storage => "storage",
        }
    }
}

/// Capability name → capability, as supplied by the host.
#[derive(Clone, Default)]
pub struct CapabilityTable {
    entries: BTreeMap<String, Capability>,
}

impl CapabilityTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a callable capability.
    pub fn callback(
        mut self,
        name: &str,
        callback: impl Fn(Args, Completion) + Send + Sync + 'static,
    ) -> Self {
        self.entries
            .insert(name.to_string(), Capability::Callback(Arc::new(callback)));
        self
    }

    /// Add a non-callable entry.
    pub fn value(mut self, name: &str, value: Value) -> Self {
        self.entries.insert(name.to_string(), Capability::Value(value));
        self
    }

    /// Remove an entry.
    pub fn without(mut self, name: &str) -> Self {
        self.entries.remove(name);
        self
    }

    /// Look up an entry.
    pub fn get(&self, name: &str) -> Option<&Capability> {
        self.entries.get(name)
    }

    /// Bind a callable entry to its arity.
    pub fn bind(&self, name: &str, arity: usize) -> Option<CallbackFn> {
        match self.entries.get(name)? {
            Capability::Callback(cb) => Some(CallbackFn::new(name, arity, Arc::clone(cb))),
            Capability::Value(_) => None,
        }
    }

    /// Bind a required capability, or say why it cannot be used.
    pub fn require(
        &self,
        kind: TableKind,
        name: &str,
        arity: usize,
    ) -> Result<CallbackFn, ConfigurationError> {
        match self.entries.get(name) {
            None => Err(kind.missing(name)),
            Some(Capability::Value(_)) => Err(ConfigurationError::NotCallable(format!(
                "{}.{name}",
                kind.prefix()
            ))),
            Some(Capability::Callback(cb)) => Ok(CallbackFn::new(name, arity, Arc::clone(cb))),
        }
    }

    /// Bind an optional capability. Present but not callable is an error.
    pub fn optional(
        &self,
        kind: TableKind,
        name: &str,
        arity: usize,
    ) -> Result<Option<CallbackFn>, ConfigurationError> {
        match self.entries.get(name) {
            None => Ok(None),
            Some(_) => self.require(kind, name, arity).map(Some),
        }
    }
}

impl fmt::Debug for CapabilityTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}
