use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::ImageStore;

/// Spawns the background task that evicts expired images every `every`.
/// The task exits when `shutdown` is cancelled.
pub fn spawn_sweeper(
    store: Arc<dyn ImageStore>,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let every = every.max(Duration::from_millis(1));

    tokio::spawn(async move {
        info!(interval_ms = every.as_millis() as u64, "Image sweeper started");

        let mut cadence = interval(every);
        cadence.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // First tick fires immediately; nothing can be expired yet.
        cadence.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = cadence.tick() => match store.sweep().await {
                    Ok(0) => {}
                    Ok(removed) => debug!(removed, "Swept expired images"),
                    Err(failure) => warn!(err_code = %failure.code, "Image sweep failed: {}", failure.message),
                },
            }
        }

        info!("Image sweeper stopped");
    })
}
