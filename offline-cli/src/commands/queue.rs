//! Queue one update while offline.

use anyhow::{Context, Result};
use offline_first_client::Disposition;
use serde_json::{Map, Value};
use std::path::Path;

use super::{parse_value, Session, SET_ACTION};
use crate::config::Config;

/// Run the queue command. Without a value the path is deleted on flush.
pub async fn run(data_dir: &Path, config: &Config, path: &str, value: Option<&str>) -> Result<()> {
    let session = Session::open(data_dir, config).await?;

    let mut params = Map::new();
    params.insert("path".to_string(), Value::String(path.to_string()));
    if let Some(text) = value {
        params.insert("value".to_string(), parse_value(text));
    }

    let output = session
        .app
        .call(SET_ACTION, Some(params))
        .await
        .context("Failed to queue update")?;

    match output.disposition {
        Some(Disposition::Queued) => {
            let batch = session.app.queue().snapshot().await;
            println!("Queued {} ({} paths in outbox)", path, batch.len());
        }
        Some(other) => println!("{}: {:?}", path, other),
        None => println!("Nothing to queue"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn queue_persists_across_sessions() {
        let dir = tempdir().unwrap();
        let config = Config::default();

        run(dir.path(), &config, "a/b", Some("1")).await.unwrap();
        run(dir.path(), &config, "c", Some("hello")).await.unwrap();

        let session = Session::open(dir.path(), &config).await.unwrap();
        let batch = session.app.queue().snapshot().await;
        assert_eq!(batch.get("a/b"), Some(&json!(1)));
        assert_eq!(batch.get("c"), Some(&json!("hello")));
    }

    #[tokio::test]
    async fn later_write_wins() {
        let dir = tempdir().unwrap();
        let config = Config::default();

        run(dir.path(), &config, "x", Some("1")).await.unwrap();
        run(dir.path(), &config, "x", Some("2")).await.unwrap();

        let session = Session::open(dir.path(), &config).await.unwrap();
        let batch = session.app.queue().snapshot().await;
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.get("x"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn missing_value_queues_delete() {
        let dir = tempdir().unwrap();
        let config = Config::default();

        run(dir.path(), &config, "gone", None).await.unwrap();

        let session = Session::open(dir.path(), &config).await.unwrap();
        assert_eq!(session.app.queue().snapshot().await.get("gone"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn empty_path_is_rejected() {
        let dir = tempdir().unwrap();
        let result = run(dir.path(), &Config::default(), "", Some("1")).await;
        assert!(result.is_err());
    }
}
