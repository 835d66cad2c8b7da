//! # offline-client
//!
//! Runtime for offline-first actions.
//!
//! Applications declare actions (validation, middleware, handler) through
//! extensions, compile them once, and call them by name. A handler's
//! effect is committed immediately when online, or merged into a persisted
//! outbox and flushed when connectivity returns.
//!
//! ## Features
//!
//! - **Settings validation**: malformed hosts fail before anything runs
//! - **Action compiler**: validate → pre-middleware → handler, strictly in order
//! - **Offline effect queue**: last-write-wins batch, persisted, retried every 10 minutes
//! - **Pluggable capabilities**: [`Tools`] and [`Storage`] traits with callback,
//!   file, memory and mock implementations
//!
//! ## Example
//!
//! ```ignore
//! use offline_first_client::{AppBuilder, Settings};
//!
//! let settings = Settings::new(tools, storage, Platform::Web);
//! let mut builder = AppBuilder::new(settings);
//! builder.use_extension(todos);
//! let app = builder.compile()?;
//! app.start().await?;
//!
//! app.call("addTodo", Some(params)).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod action;
pub mod app;
pub mod callback;
pub mod queue;
pub mod settings;
pub mod storage;
pub mod store;
pub mod tools;

pub use action::{
    stage, ActionDefinition, ActionOutput, CompiledAction, DispatchContext, FnStage, Outcome,
    Stage,
};
pub use app::{App, AppBuilder, Extension};
pub use callback::{Args, CallbackFn, Capability, CapabilityTable, Completion, TableKind};
pub use queue::{Disposition, OfflineQueue, QueueError, OUTBOX_KEY};
pub use settings::{validate_settings, RawSettings, RehydrateHook, Settings};
pub use storage::{CallbackStorage, FileStorage, MemoryStorage, Storage};
pub use store::{Reducer, Selector, Store, StoreEvent};
pub use tools::{
    CallbackTools, DataTree, MockTools, NetworkHandler, Subscription, SubscriptionSender, ToolSet,
    Tools,
};

pub use offline_first_core::{
    Field, FixedInterval, Kind, OutboxEvent, OutboxState, QueuedEffect, RetryPolicy, Rule, Schema,
    ValidateOptions,
};
pub use offline_first_types::{
    ActionError, CompilationError, ConfigurationError, Effect, Entry, EventType, NetworkStatus,
    Params, Platform, QueryParams, StorageError, ToolError, UpdateMap, UploadPayload, UserRecord,
    ValidationError,
};
