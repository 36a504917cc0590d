//! Periodic purge of old finished and cancelled timers

use std::{sync::Arc, time::Duration};

use tokio::{sync::watch, time::interval};
use tracing::{info, warn};

use crate::controller::TimerController;

/// Background task that deletes terminal timers past the retention window.
///
/// Runs on its own schedule, independent of the active-timer tick.
pub async fn retention_task(
    controller: Arc<TimerController>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Starting retention task (every {}s)", every.as_secs());

    let mut ticker = interval(every);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let purger = Arc::clone(&controller);
                match tokio::task::spawn_blocking(move || purger.purge_expired()).await {
                    Ok(Ok(0)) => {}
                    Ok(Ok(purged)) => info!("Purged {} expired timer(s)", purged),
                    Ok(Err(e)) => warn!("Failed to purge expired timers: {}", e),
                    Err(e) => warn!("Retention sweep aborted: {}", e),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("Retention task stopped");
}
