//! Timer that drives periodic check cycles.

use crate::event::CycleOutcome;
use crate::manager::{saturating_millis, ResourceManager};
use std::sync::Arc;
use tabward_memory::{FrameHost, ResourceProbe};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

/// Handle to a running check loop.
///
/// Each tick awaits its cycle before the next tick is taken, and ticks
/// missed while a cycle runs are dropped rather than queued.
pub struct CheckScheduler {
    stop_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl CheckScheduler {
    /// Stop the loop, waiting for an in-flight cycle to finish.
    pub async fn stop(mut self) {
        let _ = self.stop_tx.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    /// Check if running
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for CheckScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Spawn the check loop on the current tokio runtime.
pub fn spawn_scheduler<P, H>(manager: Arc<ResourceManager<P, H>>) -> CheckScheduler
where
    P: ResourceProbe,
    H: FrameHost,
{
    let period = manager.limits().sample_interval();
    let (stop_tx, mut stop_rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        info!(
            period_ms = saturating_millis(period),
            "Check scheduler started"
        );

        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match manager.run_check_cycle().await {
                        CycleOutcome::Skipped => debug!("Tick skipped, cycle in flight"),
                        CycleOutcome::Completed(report) => debug!(
                            aggregate_mb = report.snapshot.aggregate_memory_mb,
                            evicted = report.evicted.len(),
                            "Check cycle completed"
                        ),
                    }
                }
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Check scheduler stopped");
    });

    CheckScheduler {
        stop_tx,
        handle: Some(handle),
    }
}
