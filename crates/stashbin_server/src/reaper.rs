//! Background task running the active expiry sweep.

use chrono::Utc;
use stashbin_core::ExpiryReaper;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Sweep once immediately, then every `period`, until the runtime stops.
///
/// Each sweep runs on the blocking pool so storage I/O never stalls request
/// handlers. Failures are logged and the schedule continues.
pub fn spawn_reaper(reaper: ExpiryReaper, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let sweep = reaper.clone();
            match tokio::task::spawn_blocking(move || sweep.reap(Utc::now())).await {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => tracing::error!("Expiry sweep failed: {}", err),
                Err(err) => tracing::error!("Expiry sweep task panicked: {}", err),
            }
        }
    })
}
