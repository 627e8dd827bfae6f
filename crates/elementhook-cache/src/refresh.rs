//! Background refresh of realtime-tier entries.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::QueryCache;

/// Refresh realtime entries every `period` until `cancel` fires.
pub async fn refresh_loop(cache: QueryCache, period: Duration, cancel: CancellationToken) {
    let mut ticker = interval(period.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    info!("Realtime refresh loop started (every {:?})", period);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let started = cache.refresh_realtime();
                if started > 0 {
                    debug!(started, "Refreshing realtime entries");
                }
            }
        }
    }
    info!("Realtime refresh loop stopped");
}

pub fn spawn_refresh_loop(
    cache: QueryCache,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(refresh_loop(cache, period, cancel))
}
