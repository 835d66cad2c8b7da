//! Commit the outbox to the remote file.

use anyhow::Result;
use offline_first_client::OutboxEvent;
use offline_first_types::NetworkStatus;
use std::path::Path;

use super::Session;
use crate::config::Config;

/// Run the flush command.
pub async fn run(data_dir: &Path, config: &Config) -> Result<()> {
    let session = Session::open(data_dir, config).await?;
    let queue = session.app.queue();

    let pending = queue.snapshot().await.len();
    if pending == 0 {
        println!("Outbox is empty, nothing to flush");
        return Ok(());
    }

    let mut events = queue.subscribe();
    queue.set_network(NetworkStatus::ONLINE).await;
    queue.shutdown().await;

    while let Ok(event) = events.try_recv() {
        match event {
            OutboxEvent::Flushed { attempts } => {
                println!(
                    "Flushed {} paths to {} (after {} failed attempts)",
                    pending,
                    session.remote_path.display(),
                    attempts
                );
                return Ok(());
            }
            OutboxEvent::CommitFailed { attempts, error } => {
                anyhow::bail!("Flush failed (attempt {}): {}", attempts, error);
            }
            OutboxEvent::Discarded { attempts, error } => {
                anyhow::bail!("Outbox discarded after {} attempts: {}", attempts, error);
            }
            _ => {}
        }
    }

    anyhow::bail!("Flush did not complete; {} paths still queued", queue.snapshot().await.len())
}
