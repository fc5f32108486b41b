//! In-process delivery metrics

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics handle for recording counters
#[derive(Debug, Default)]
pub struct Metrics {
    cycles_completed: AtomicU64,
    cycles_failed: AtomicU64,
    readings_stored: AtomicU64,
    live_delivered: AtomicU64,
    resent: AtomicU64,
    storage_failures: AtomicU64,
    field_failures: AtomicU64,
    pruned: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cycle_completed(&self) {
        self.cycles_completed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "cycles_completed", "Metric incremented");
    }

    pub fn cycle_failed(&self) {
        self.cycles_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "cycles_failed", "Metric incremented");
    }

    pub fn reading_stored(&self) {
        self.readings_stored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn live_delivered(&self) {
        self.live_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn resent(&self) {
        self.resent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn storage_failure(&self) {
        self.storage_failures.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "storage_failures", "Metric incremented");
    }

    pub fn field_failures(&self, count: usize) {
        self.field_failures.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn pruned(&self, count: usize) {
        self.pruned.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
            cycles_failed: self.cycles_failed.load(Ordering::Relaxed),
            readings_stored: self.readings_stored.load(Ordering::Relaxed),
            live_delivered: self.live_delivered.load(Ordering::Relaxed),
            resent: self.resent.load(Ordering::Relaxed),
            storage_failures: self.storage_failures.load(Ordering::Relaxed),
            field_failures: self.field_failures.load(Ordering::Relaxed),
            pruned: self.pruned.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    pub readings_stored: u64,
    pub live_delivered: u64,
    pub resent: u64,
    pub storage_failures: u64,
    pub field_failures: u64,
    pub pruned: u64,
}
