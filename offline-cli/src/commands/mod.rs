//! CLI command implementations.

pub mod clear;
pub mod flush;
pub mod queue;
pub mod status;

use anyhow::{Context, Result};
use offline_first_client::{
    stage, ActionDefinition, App, AppBuilder, Field, FileStorage, Outcome, Schema, Settings,
};
use offline_first_types::Effect;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::remote::FileRemote;

/// Action that writes one value at one path. A missing value deletes.
pub const SET_ACTION: &str = "set";

/// A compiled app over the outbox in a data dir and the configured remote.
pub struct Session {
    /// The compiled app. Its queue starts offline.
    pub app: App,
    /// Where flushed updates land.
    pub remote_path: PathBuf,
}

impl Session {
    /// Open the outbox in `data_dir` and compile the CLI's actions.
    pub async fn open(data_dir: &Path, config: &Config) -> Result<Self> {
        let storage = FileStorage::open(data_dir.join("outbox"))
            .await
            .context("Failed to open outbox storage")?;
        let remote_path = config.remote_path(data_dir);
        let remote = FileRemote::new(&remote_path);

        let settings = Settings::new(Arc::new(remote), Arc::new(storage), config.app.platform)
            .with_validate(config.app.validate.clone())
            .with_on_rehydrate(|| tracing::debug!("Outbox rehydrated"));

        let mut builder = AppBuilder::new(settings);
        builder.register_action(
            SET_ACTION,
            ActionDefinition::new()
                .validate(
                    Schema::new()
                        .field("path", Field::string().required().min(1.0))
                        .field("value", Field::new()),
                )
                .handler(stage(|params, _tools, _ctx| async move {
                    let path = params
                        .get("path")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    let value = params.get("value").cloned().unwrap_or(Value::Null);
                    Ok(Outcome::Effect(Effect::new().set(path, value)))
                })),
        );
        let app = builder.compile().context("Failed to compile actions")?;
        app.queue()
            .hydrate()
            .await
            .context("Failed to read the outbox")?;

        Ok(Self { app, remote_path })
    }
}

/// Parse `text` as JSON, falling back to a plain string.
pub fn parse_value(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Format a millisecond timestamp relative to now.
pub fn format_timestamp(ts_ms: u64) -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();

    let diff = now.saturating_sub(ts_ms / 1000);

    if diff < 60 {
        "just now".to_string()
    } else if diff < 3600 {
        format!("{} minutes ago", diff / 60)
    } else if diff < 86400 {
        format!("{} hours ago", diff / 3600)
    } else {
        format!("{} days ago", diff / 86400)
    }
}
