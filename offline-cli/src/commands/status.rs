//! Show the outbox.

use anyhow::Result;
use std::path::Path;

use super::{format_timestamp, Session};
use crate::config::Config;

/// Run the status command.
pub async fn run(data_dir: &Path, config: &Config) -> Result<()> {
    let session = Session::open(data_dir, config).await?;
    let batch = session.app.queue().snapshot().await;

    println!("=== offline-cli status ===");
    println!();
    println!("Platform: {}", session.app.platform());
    println!("Data dir: {}", data_dir.display());
    println!("Remote:   {}", session.remote_path.display());
    println!();

    if batch.is_empty() {
        println!("Outbox: EMPTY");
        return Ok(());
    }

    println!("Outbox:");
    println!("  Paths:    {}", batch.len());
    println!("  Attempts: {}", batch.attempts);
    println!("  Queued:   {}", format_timestamp(batch.enqueued_at));
    for (path, value) in &batch.updates {
        println!("    {} = {}", path, value);
    }
    println!();
    println!("Run 'offline-cli flush' to commit.");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn status_with_empty_outbox() {
        let dir = tempdir().unwrap();
        let result = run(dir.path(), &Config::default()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn status_with_queued_updates() {
        let dir = tempdir().unwrap();
        crate::commands::queue::run(dir.path(), &Config::default(), "a/b", Some("1"))
            .await
            .unwrap();

        let result = run(dir.path(), &Config::default()).await;
        assert!(result.is_ok());
    }
}
