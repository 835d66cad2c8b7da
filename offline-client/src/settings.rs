//! Settings validation.
//!
//! Everything the pipeline needs from its host arrives here first. Settings
//! are checked structurally before any other component is built, so a
//! malformed host fails at startup instead of on the first action.
//!
//! Two ways in:
//! - [`validate_settings`] for untyped options plus callback tables
//! - [`Settings::new`] when the host already has typed [`Tools`] and [`Storage`]

use crate::callback::CapabilityTable;
use crate::storage::{CallbackStorage, Storage};
use crate::tools::{CallbackTools, Tools};
use offline_first_core::{FixedInterval, RetryPolicy, ValidateOptions};
use offline_first_types::{ConfigurationError, Platform};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Called once after the persisted outbox has been read back.
pub type RehydrateHook = Arc<dyn Fn() + Send + Sync>;

/// Host-supplied settings before validation.
///
/// `options` carries the plain-data part (`platform`, `validate`); the
/// capability tables carry the callables.
#[derive(Clone, Default)]
pub struct RawSettings {
    /// Untyped options mapping.
    pub options: Value,
    /// `settings.tools`
    pub tools: Option<CapabilityTable>,
    /// `settings.storage`
    pub storage: Option<CapabilityTable>,
    /// `settings.onRehydrate`
    pub on_rehydrate: Option<RehydrateHook>,
}

/// Validated, normalized settings.
#[derive(Clone)]
pub struct Settings {
    /// Remote data-access capabilities.
    pub tools: Arc<dyn Tools>,
    /// Key-value storage for the outbox.
    pub storage: Arc<dyn Storage>,
    /// Host platform.
    pub platform: Platform,
    /// Options for action parameter validation.
    pub validate: ValidateOptions,
    /// Called after the outbox has been rehydrated.
    pub on_rehydrate: Option<RehydrateHook>,
    /// When to retry and when to give up on failed commits.
    pub retry_policy: Arc<dyn RetryPolicy>,
}

impl Settings {
    /// Settings from typed capabilities, with default validation and retry.
    pub fn new(tools: Arc<dyn Tools>, storage: Arc<dyn Storage>, platform: Platform) -> Self {
        Self {
            tools,
            storage,
            platform,
            validate: ValidateOptions::default(),
            on_rehydrate: None,
            retry_policy: Arc::new(FixedInterval::default()),
        }
    }

    /// Replace the validation options.
    pub fn with_validate(mut self, validate: ValidateOptions) -> Self {
        self.validate = validate;
        self
    }

    /// Set the rehydration callback.
    pub fn with_on_rehydrate(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_rehydrate = Some(Arc::new(hook));
        self
    }

    /// Replace the retry policy.
    pub fn with_retry_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.retry_policy = Arc::new(policy);
        self
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("platform", &self.platform)
            .field("validate", &self.validate)
            .field("on_rehydrate", &self.on_rehydrate.is_some())
            .finish_non_exhaustive()
    }
}

/// Check raw settings and produce normalized [`Settings`].
///
/// Returns an error if:
/// - `options` is not a mapping
/// - `tools` is missing, or lacks a required capability, or one is not callable
/// - `platform` is not ios, android, web or react-native
/// - `storage` is missing, or lacks a primitive, or one is not callable
/// - `validate` is present but not a mapping of known options
///
/// No capability is invoked during validation.
pub fn validate_settings(raw: RawSettings) -> Result<Settings, ConfigurationError> {
    let Value::Object(options) = &raw.options else {
        return Err(ConfigurationError::NotAMapping);
    };

    let tools = raw.tools.as_ref().ok_or(ConfigurationError::MissingTools)?;
    let tools = CallbackTools::from_table(tools)?;

    let platform = match options.get("platform") {
        Some(Value::String(s)) => s
            .parse::<Platform>()
            .map_err(|_| ConfigurationError::InvalidPlatform(format!("'{s}'")))?,
        Some(other) => return Err(ConfigurationError::InvalidPlatform(other.to_string())),
        None => return Err(ConfigurationError::InvalidPlatform("nothing".to_string())),
    };

    let storage = raw
        .storage
        .as_ref()
        .ok_or(ConfigurationError::MissingStorage)?;
    let storage = CallbackStorage::from_table(storage)?;

    let validate = match options.get("validate") {
        None => ValidateOptions::default(),
        Some(value @ Value::Object(_)) => serde_json::from_value(value.clone())
            .map_err(|e| ConfigurationError::InvalidValidateOptions(e.to_string()))?,
        Some(other) => {
            return Err(ConfigurationError::InvalidValidateOptions(format!(
                "got {other}"
            )))
        }
    };

    Ok(Settings {
        tools: Arc::new(tools),
        storage: Arc::new(storage),
        platform,
        validate,
        on_rehydrate: raw.on_rehydrate,
        retry_policy: Arc::new(FixedInterval::default()),
    })
}
