//! Drop the outbox without committing it.

use anyhow::{Context, Result};
use std::path::Path;

use super::Session;
use crate::config::Config;

/// Run the clear command.
pub async fn run(data_dir: &Path, config: &Config) -> Result<()> {
    let session = Session::open(data_dir, config).await?;
    let queue = session.app.queue();
    let dropped = queue.snapshot().await.len();

    queue.clear().await.context("Failed to clear the outbox")?;

    println!("Cleared outbox ({} paths dropped)", dropped);
    Ok(())
}
