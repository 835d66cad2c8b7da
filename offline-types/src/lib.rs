//! # offline-types
//!
//! Data model shared by every offline-first crate.
//!
//! This crate provides:
//! - [`Effect`] and [`UpdateMap`] - remote mutations emitted by action handlers
//! - [`NetworkStatus`] and [`Platform`] - environment facts the queue reads
//! - [`QueryParams`], [`Entry`], [`UserRecord`] - shapes of tool calls
//! - The error taxonomy used across the pipeline

#![warn(missing_docs)]
#![warn(clippy::all)]

mod effect;
mod error;
mod platform;
mod query;

pub use effect::{Effect, Params, UpdateMap};
pub use error::{
    ActionError, CompilationError, ConfigurationError, FieldError, StorageError, ToolError,
    ValidationError,
};
pub use platform::{NetworkStatus, Platform};
pub use query::{Entry, EventType, QueryParams, UploadPayload, UserRecord};
