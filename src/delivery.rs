//! Delivery tracking: live publish and backlog resend
//!
//! Publishing is best effort. A failed attempt is never retried in place;
//! the reading stays in the ledger's backlog and the next cycle's resend
//! pass picks it up.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::ledger::{ReadingStore, Result as StorageResult};
use crate::messaging::{Transport, TransportError};
use crate::observability::Metrics;
use crate::reading::{Origin, Reading, ReadingId, encode_payload};

/// Result of a live publish attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed,
}

impl DeliveryOutcome {
    /// Origin tag to store alongside the reading
    pub fn origin(&self) -> Origin {
        match self {
            DeliveryOutcome::Delivered => Origin::Live,
            DeliveryOutcome::Failed => Origin::Offline,
        }
    }
}

/// Summary of one resend pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResendReport {
    pub attempted: usize,
    pub delivered: usize,
    /// The pass stopped before the end of the backlog
    pub stopped_early: bool,
}

/// Publishes readings and records delivery in the ledger
///
/// Holds no mutable state of its own; connectivity is read from the
/// transport and delivery flags live in the store.
pub struct DeliveryTracker {
    store: Arc<ReadingStore>,
    transport: Arc<dyn Transport>,
    topic: String,
    publish_timeout: Duration,
    metrics: Arc<Metrics>,
}

impl DeliveryTracker {
    pub fn new(
        store: Arc<ReadingStore>,
        transport: Arc<dyn Transport>,
        topic: impl Into<String>,
        publish_timeout: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            transport,
            topic: topic.into(),
            publish_timeout,
            metrics,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    async fn publish(&self, payload: Vec<u8>) -> Result<(), TransportError> {
        match tokio::time::timeout(self.publish_timeout, self.transport.publish(&self.topic, payload))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        }
    }

    /// Try to hand a freshly captured reading to the collector
    ///
    /// Skips the publish entirely while disconnected. Never fails.
    pub async fn publish_now(&self, reading: &Reading) -> DeliveryOutcome {
        if !self.transport.is_connected() {
            debug!(device_id = %reading.device_id, "Transport offline, deferring reading");
            return DeliveryOutcome::Failed;
        }

        let payload = match encode_payload(reading, Origin::Live) {
            Ok(payload) => payload,
            Err(e) => {
                error!(device_id = %reading.device_id, error = %e, "Failed to encode payload");
                return DeliveryOutcome::Failed;
            }
        };

        match self.publish(payload).await {
            Ok(()) => {
                self.metrics.live_delivered();
                debug!(device_id = %reading.device_id, "Published live reading");
                DeliveryOutcome::Delivered
            }
            Err(e) => {
                warn!(device_id = %reading.device_id, error = %e, "Live publish failed");
                DeliveryOutcome::Failed
            }
        }
    }

    /// Record a successful live publish for a stored reading
    pub fn confirm(&self, id: ReadingId) -> StorageResult<bool> {
        self.store.mark_delivered(id)
    }

    /// Flush the undelivered backlog, oldest first
    ///
    /// Connectivity is checked once at entry. The pass stops at the first
    /// failed publish so that later readings are never sent ahead of an
    /// earlier one.
    pub async fn resend_backlog(&self) -> ResendReport {
        let mut report = ResendReport::default();

        if !self.transport.is_connected() {
            debug!("Transport offline, skipping resend");
            return report;
        }

        let backlog = match self.store.list_undelivered() {
            Ok(backlog) => backlog,
            Err(e) => {
                error!(error = %e, "Failed to list undelivered readings");
                report.stopped_early = true;
                return report;
            }
        };

        if backlog.is_empty() {
            return report;
        }
        info!(count = backlog.len(), "Resending backlog");

        for record in backlog {
            report.attempted += 1;

            let payload = match record.payload() {
                Ok(payload) => payload,
                Err(e) => {
                    error!(id = record.id, error = %e, "Failed to encode payload");
                    report.stopped_early = true;
                    break;
                }
            };

            if let Err(e) = self.publish(payload).await {
                warn!(id = record.id, error = %e, "Resend failed, stopping pass");
                report.stopped_early = true;
                break;
            }

            match self.store.mark_delivered(record.id) {
                Ok(_) => {
                    report.delivered += 1;
                    self.metrics.resent();
                    debug!(id = record.id, origin = %record.origin, "Resent reading");
                }
                Err(e) => {
                    error!(id = record.id, error = %e, "Failed to mark reading delivered");
                    self.metrics.storage_failure();
                    report.stopped_early = true;
                    break;
                }
            }
        }

        info!(
            delivered = report.delivered,
            attempted = report.attempted,
            stopped_early = report.stopped_early,
            "Resend pass finished"
        );
        report
    }
}
