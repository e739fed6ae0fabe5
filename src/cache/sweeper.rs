//! Background task that periodically evicts expired cache entries.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use super::ResponseCache;

pub(crate) async fn run(
    cache: ResponseCache,
    mut shutdown_rx: oneshot::Receiver<()>,
    period: Duration,
) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // Skip the first immediate tick
    interval.tick().await;
    tracing::info!("Cache sweeper started, period {period:?}");

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown_rx => {
                tracing::info!("Cache sweeper shut down");
                return;
            }

            _ = interval.tick() => {
                let evicted = cache.evict_expired();
                if evicted > 0 {
                    tracing::debug!("Evicted {evicted} expired cache entries");
                }
            }
        }
    }
}

/// Handle returned by [`ResponseCache::spawn_sweeper`].
///
/// Dropping the handle without calling [`shutdown`](Self::shutdown) also stops
/// the sweeper, at its next wakeup.
pub struct SweeperHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    pub(crate) fn new(shutdown: oneshot::Sender<()>, task: JoinHandle<()>) -> Self {
        Self {
            shutdown: Some(shutdown),
            task: Some(task),
        }
    }

    /// Stop the sweeper and wait for the task to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|task| task.is_finished())
    }
}
