//! # offline-core
//!
//! Pure logic for the offline-first action pipeline (no I/O, instant tests).
//!
//! This crate implements the outbox state machine, the queued-batch merge
//! rules, the retry policy and the parameter-schema interpreter without any
//! network or storage I/O.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. The outbox machine returns a list of [`Action`]s;
//! `offline-client` interprets them against real tools, storage and timers.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod pushkey;
pub mod retry;
pub mod schema;
pub mod state;

pub use batch::{BatchError, QueuedEffect};
pub use pushkey::{PushKeyGenerator, PUSH_KEY_LEN};
pub use retry::{FixedInterval, RetryPolicy, DEFAULT_RETRY_INTERVAL};
pub use schema::{Field, Kind, Rule, Schema, ValidateOptions};
pub use state::{Action, Event, OutboxEvent, OutboxState};
