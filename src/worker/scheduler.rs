//! Fixed-interval cycle scheduler

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::info;

use super::CycleOrchestrator;

/// Drives [`CycleOrchestrator::trigger`] on a fixed interval
///
/// Cycles run one after another on the scheduler task. Shutdown is only
/// observed between cycles, so an in-flight cycle always finishes.
pub struct Scheduler {
    orchestrator: Arc<CycleOrchestrator>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(orchestrator: Arc<CycleOrchestrator>, interval: Duration) -> Self {
        Self {
            orchestrator,
            interval,
        }
    }

    /// Run cycles until `shutdown` resolves; the first cycle starts immediately
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(interval = ?self.interval, "Scheduler started");
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => self.orchestrator.trigger().await,
            }
        }
        info!("Scheduler stopped");
    }
}
