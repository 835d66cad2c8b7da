//! Error taxonomy for the offline-first pipeline.
//!
//! Configuration and compilation errors abort startup. Validation, handler
//! and tool errors are local to one action invocation. Commit failures are
//! handled inside the queue and never reach an action caller.

use std::fmt;
use thiserror::Error;

/// Settings failed structural validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// Settings options were not a mapping.
    #[error("settings must be a mapping")]
    NotAMapping,

    /// No tool table supplied.
    #[error("'settings.tools' is required")]
    MissingTools,

    /// A required tool capability is missing.
    #[error("'settings.tools.{0}' is required")]
    MissingTool(String),

    /// No storage table supplied.
    #[error("'settings.storage' is required")]
    MissingStorage,

    /// A required storage primitive is missing.
    #[error("'settings.storage.{0}' is required")]
    MissingStoragePrimitive(String),

    /// A capability was supplied but is not callable.
    #[error("'settings.{0}' must be a functional callback")]
    NotCallable(String),

    /// Platform is not one of the accepted values.
    #[error("'settings.platform' must be either ios, android, web or react-native, got {0}")]
    InvalidPlatform(String),

    /// Validation options were present but malformed.
    #[error("'settings.validate' must be a mapping: {0}")]
    InvalidValidateOptions(String),
}

/// An action definition is malformed. Fails the whole compile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompilationError {
    /// Action registered under an empty name.
    #[error("action name must not be empty")]
    EmptyName,

    /// Action has no terminal handler.
    #[error("action '{action}' has no handler")]
    MissingHandler {
        /// The offending action.
        action: String,
    },

    /// Action's validation schema is malformed.
    #[error("action '{action}' has an invalid schema: {reason}")]
    InvalidSchema {
        /// The offending action.
        action: String,
        /// What is wrong with the schema.
        reason: String,
    },
}

/// One failed rule on one parameter path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Dotted path of the offending parameter.
    pub path: String,
    /// Human-readable reason.
    pub message: String,
}

impl FieldError {
    /// Create a field error.
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Action parameters failed the declared schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ValidationError {
    /// Every failed rule, in evaluation order.
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    /// A validation error with a single failure.
    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError::new(path, message)],
        }
    }

    /// True if `path` has at least one failure.
    pub fn has_path(&self, path: &str) -> bool {
        self.errors.iter().any(|e| e.path == path)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("validation failed")?;
        for (i, err) in self.errors.iter().enumerate() {
            f.write_str(if i == 0 { ": " } else { "; " })?;
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

/// A tool (remote capability) call failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    /// The backend reported a failure.
    #[error("tool failed: {0}")]
    Failed(String),

    /// The remote store is unreachable.
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    /// Authentication was refused.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// An argument could not be used.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The callback completed without reporting a result.
    #[error("tool completion dropped")]
    Dropped,
}

/// Failure of one action invocation. Returned to the caller unmodified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// Parameters failed the schema; no stage ran.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A middleware or handler stage failed.
    #[error("handler error: {0}")]
    Handler(String),

    /// A tool call made by a stage failed.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// No action is registered under the requested name.
    #[error("unknown action '{0}'")]
    UnknownAction(String),
}

impl ActionError {
    /// A handler failure with the given message.
    pub fn handler(message: impl Into<String>) -> Self {
        ActionError::Handler(message.into())
    }
}

/// Key-value storage backend failure.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend reported a failure.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// File-system error.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored value could not be decoded.
    #[error("corrupt value under '{key}': {reason}")]
    Corrupt {
        /// The storage key.
        key: String,
        /// Why decoding failed.
        reason: String,
    },
}
