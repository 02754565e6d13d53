use std::{sync::Arc, time::Duration};

use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::{engine::SearchEngine, error::Error};

/// Periodically call [`SearchEngine::refresh_if_stale`] on a blocking
/// thread. Ticks that find a rebuild already running are skipped.
///
/// Must be called from within a tokio runtime. Abort the returned handle
/// to stop refreshing.
pub fn spawn_refresher(
    engine: Arc<SearchEngine>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let engine = Arc::clone(&engine);
            let outcome =
                tokio::task::spawn_blocking(move || engine.refresh_if_stale())
                    .await;

            match outcome {
                Ok(Ok(stats))
                    if stats.indexed_files > 0 || stats.removed_files > 0 =>
                {
                    info!(
                        indexed = stats.indexed_files,
                        removed = stats.removed_files,
                        generation = stats.generation,
                        "background refresh applied changes"
                    );
                }
                Ok(Ok(stats)) => debug!(
                    generation = stats.generation,
                    "background refresh found no changes"
                ),
                Ok(Err(Error::RebuildInProgress)) => {
                    debug!("background refresh skipped, rebuild in progress");
                }
                Ok(Err(err)) => {
                    warn!(error = %err, "background refresh failed");
                }
                Err(err) => error!(error = %err, "background refresh panicked"),
            }
        }
    })
}
