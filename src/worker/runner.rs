//! Cycle runner - one poll, store, deliver, prune pass over all devices

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{Instant, timeout_at};
use tracing::{error, info, warn};

use super::CycleConfig;
use crate::delivery::{DeliveryOutcome, DeliveryTracker, ResendReport};
use crate::device::{self, DeviceReader};
use crate::health::HealthSignal;
use crate::ledger::{PruneStats, ReadingStore, RetentionManager};
use crate::observability::Metrics;

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("A cycle is already running")]
    AlreadyRunning,

    #[error("Cycle exceeded its budget of {budget:?} after storing {stored} readings")]
    Timeout { budget: Duration, stored: usize },
}

pub type Result<T> = std::result::Result<T, CycleError>;

/// What one cycle did
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub stored: usize,
    pub live: usize,
    pub deferred: usize,
    pub storage_failures: usize,
    pub field_failures: usize,
    pub resend: ResendReport,
    /// `None` when pruning failed
    pub pruned: Option<PruneStats>,
}

/// Coordinates a single poll-store-deliver-prune cycle
///
/// Only one cycle can be in flight; a concurrent call is rejected with
/// [`CycleError::AlreadyRunning`]. Readings captured in a cycle share the
/// cycle's timestamp.
pub struct CycleOrchestrator {
    config: CycleConfig,
    reader: Arc<dyn DeviceReader>,
    store: Arc<ReadingStore>,
    tracker: DeliveryTracker,
    retention: RetentionManager,
    health: Option<Arc<dyn HealthSignal>>,
    metrics: Arc<Metrics>,
    active: Mutex<()>,
}

impl CycleOrchestrator {
    pub fn new(
        config: CycleConfig,
        reader: Arc<dyn DeviceReader>,
        store: Arc<ReadingStore>,
        tracker: DeliveryTracker,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            config,
            reader,
            retention: RetentionManager::new(store.clone()),
            store,
            tracker,
            health: None,
            metrics,
            active: Mutex::new(()),
        }
    }

    /// Signal liveness after every completed cycle
    pub fn with_health(mut self, health: Arc<dyn HealthSignal>) -> Self {
        self.health = Some(health);
        self
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Scheduler entry point: run a cycle now and log any failure
    pub async fn trigger(&self) {
        match self.run_cycle(Utc::now()).await {
            Ok(_) => {}
            Err(CycleError::AlreadyRunning) => {
                warn!("Previous cycle still running, trigger skipped");
            }
            Err(e) => error!(error = %e, "Cycle failed"),
        }
    }

    /// Run one full cycle stamped `now`
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleReport> {
        let _active = self.active.try_lock().map_err(|_| CycleError::AlreadyRunning)?;
        info!(%now, devices = self.config.devices.len(), "Cycle started");

        let mut report = CycleReport::default();
        let budget = self.config.cycle_timeout;
        let deadline = Instant::now() + budget;

        if !self.poll_and_deliver(now, deadline, &mut report).await {
            self.metrics.cycle_failed();
            error!(
                budget = ?budget,
                stored = report.stored,
                "Cycle deadline exceeded, abandoning remaining work"
            );
            return Err(CycleError::Timeout {
                budget,
                stored: report.stored,
            });
        }

        match self.retention.prune(now, self.config.max_age) {
            Ok(stats) => {
                self.metrics.pruned(stats.removed);
                report.pruned = Some(stats);
            }
            Err(e) => {
                self.metrics.storage_failure();
                error!(error = %e, "Pruning failed");
            }
        }

        if let Some(health) = &self.health {
            if let Err(e) = health.beat(now) {
                warn!(error = %e, "Health ping failed");
            }
        }

        self.metrics.cycle_completed();
        info!(
            stored = report.stored,
            live = report.live,
            deferred = report.deferred,
            resent = report.resend.delivered,
            storage_failures = report.storage_failures,
            "Cycle finished"
        );
        Ok(report)
    }

    /// Poll, store and deliver every device, then flush the backlog
    ///
    /// Returns `false` once `deadline` passes. A reading that was captured
    /// is always stored before the remaining work is abandoned.
    async fn poll_and_deliver(
        &self,
        now: DateTime<Utc>,
        deadline: Instant,
        report: &mut CycleReport,
    ) -> bool {
        for &device_id in &self.config.devices {
            if Instant::now() >= deadline {
                return false;
            }

            let Ok(capture) =
                timeout_at(deadline, device::capture(self.reader.as_ref(), device_id, now)).await
            else {
                warn!(%device_id, "Cycle deadline reached while polling device");
                return false;
            };
            if capture.failed_fields > 0 {
                report.field_failures += capture.failed_fields;
                self.metrics.field_failures(capture.failed_fields);
            }

            let outcome = timeout_at(deadline, self.tracker.publish_now(&capture.reading))
                .await
                .unwrap_or_else(|_| {
                    warn!(%device_id, "Cycle deadline reached while publishing, deferring reading");
                    DeliveryOutcome::Failed
                });

            let id = match self.store.insert(&capture.reading, outcome.origin()) {
                Ok(id) => id,
                Err(e) => {
                    report.storage_failures += 1;
                    self.metrics.storage_failure();
                    error!(%device_id, error = %e, "Failed to store reading, dropping it");
                    continue;
                }
            };
            report.stored += 1;
            self.metrics.reading_stored();

            match outcome {
                DeliveryOutcome::Delivered => {
                    report.live += 1;
                    if let Err(e) = self.tracker.confirm(id) {
                        self.metrics.storage_failure();
                        error!(id, error = %e, "Failed to record live delivery");
                    }
                }
                DeliveryOutcome::Failed => report.deferred += 1,
            }
        }

        // Marking a resent reading never awaits; cancellation lands between readings
        match timeout_at(deadline, self.tracker.resend_backlog()).await {
            Ok(resend) => {
                report.resend = resend;
                true
            }
            Err(_) => {
                warn!("Cycle deadline reached during resend");
                false
            }
        }
    }
}
