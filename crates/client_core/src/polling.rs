//! Periodic refresh bound to the lifetime of a queue selection.

use std::{future::Future, time::Duration};

use shared::domain::QueueId;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::debug;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(3000);

struct ActivePoll {
    queue_id: QueueId,
    timer: JoinHandle<()>,
}

/// Runs one timer per active selection.
///
/// The first tick fires immediately. A tick still running when the next
/// interval elapses makes the scheduler skip that interval instead of
/// stacking a second tick on top. Stopping ends the timer only; a tick that
/// is already in flight runs to completion and its results are expected to
/// be discarded by the caller's staleness check.
pub struct PollingScheduler {
    interval: Duration,
    active: Option<ActivePoll>,
}

impl PollingScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            active: None,
        }
    }

    pub fn active_queue(&self) -> Option<QueueId> {
        self.active.as_ref().map(|poll| poll.queue_id)
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn start<F, Fut>(&mut self, queue_id: QueueId, tick: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.stop();

        let period = self.interval;
        let timer = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut running: Option<JoinHandle<()>> = None;
            loop {
                ticker.tick().await;
                if running.as_ref().is_some_and(|handle| !handle.is_finished()) {
                    debug!(queue_id = queue_id.0, "previous poll tick still running, skipping");
                    continue;
                }
                running = Some(tokio::spawn(tick()));
            }
        });

        debug!(queue_id = queue_id.0, interval_ms = period.as_millis() as u64, "polling started");
        self.active = Some(ActivePoll { queue_id, timer });
    }

    pub fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            active.timer.abort();
            debug!(queue_id = active.queue_id.0, "polling stopped");
        }
    }
}

impl Drop for PollingScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
#[path = "tests/polling_tests.rs"]
mod tests;
