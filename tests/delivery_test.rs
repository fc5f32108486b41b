//! End-to-end delivery scenarios
//!
//! Each test wires a real fjall-backed store, the in-process transport and
//! the bench reader into a cycle orchestrator, then drives cycles while the
//! link goes up and down.

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use meterbox::delivery::DeliveryTracker;
use meterbox::device::SimulatedReader;
use meterbox::health::FileHealthPing;
use meterbox::ledger::ReadingStore;
use meterbox::messaging::MockTransport;
use meterbox::observability::Metrics;
use meterbox::reading::{DeviceId, FieldValue, Metric, Origin};
use meterbox::worker::{CycleConfig, CycleOrchestrator};

/// Test context holding all shared resources
struct Harness {
    orchestrator: CycleOrchestrator,
    store: Arc<ReadingStore>,
    transport: Arc<MockTransport>,
    reader: Arc<SimulatedReader>,
    metrics: Arc<Metrics>,
    temp_dir: TempDir,
}

impl Harness {
    fn new(devices: &[u32], connected: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        Self::open(temp_dir, devices, connected)
    }

    /// Build a harness over an existing data directory
    fn open(temp_dir: TempDir, devices: &[u32], connected: bool) -> Self {
        let store = Arc::new(
            ReadingStore::open(temp_dir.path().join("readings")).expect("Failed to open store"),
        );
        let transport = Arc::new(MockTransport::new(connected));
        let reader = Arc::new(SimulatedReader::default());
        let metrics = Arc::new(Metrics::new());

        let tracker = DeliveryTracker::new(
            store.clone(),
            transport.clone(),
            "smart-meter/",
            Duration::from_secs(1),
            metrics.clone(),
        );
        let config = CycleConfig {
            devices: devices.iter().copied().map(DeviceId).collect(),
            cycle_timeout: Duration::from_secs(5),
            max_age: ChronoDuration::hours(24),
        };
        let orchestrator = CycleOrchestrator::new(
            config,
            reader.clone(),
            store.clone(),
            tracker,
            metrics.clone(),
        )
        .with_health(Arc::new(FileHealthPing::new(
            temp_dir.path().join("watchdog-ping"),
        )));

        Self {
            orchestrator,
            store,
            transport,
            reader,
            metrics,
            temp_dir,
        }
    }

    /// Close every handle on the store and keep only its directory
    fn into_temp_dir(self) -> TempDir {
        self.temp_dir
    }

    fn undelivered_ids(&self) -> Vec<u64> {
        self.store
            .list_undelivered()
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect()
    }
}

fn without_source(mut payload: Value) -> Value {
    payload.as_object_mut().unwrap().remove("source");
    payload
}

#[tokio::test]
async fn test_offline_cycle_then_reconnect_flushes_backlog() {
    let harness = Harness::new(&[1, 2], false);

    let report = harness.orchestrator.run_cycle(Utc::now()).await.unwrap();
    assert_eq!(report.stored, 2);
    assert_eq!(report.deferred, 2);
    assert!(harness.transport.published().is_empty());

    let backlog = harness.store.list_undelivered().unwrap();
    assert_eq!(backlog.len(), 2);
    assert!(backlog.iter().all(|r| r.origin == Origin::Offline && !r.delivered));

    harness.transport.set_connected(true);
    let report = harness.orchestrator.run_cycle(Utc::now()).await.unwrap();

    // Two fresh live readings, then the two offline ones in id order
    assert_eq!(report.live, 2);
    assert_eq!(report.resend.delivered, 2);
    assert!(harness.undelivered_ids().is_empty());

    let sent = harness.transport.published_json();
    assert_eq!(sent.len(), 4);
    assert_eq!(sent[2]["source"], "offline");
    assert_eq!(sent[2]["meter_id"], 1);
    assert_eq!(sent[3]["meter_id"], 2);

    for id in [1, 2] {
        let stored = harness.store.get(id).unwrap().unwrap();
        assert!(stored.delivered);
        assert_eq!(stored.origin, Origin::Offline);
    }
}

#[tokio::test]
async fn test_resent_payload_matches_live_content() {
    let harness = Harness::new(&[7], false);
    let captured_at = Utc::now();

    harness.orchestrator.run_cycle(captured_at).await.unwrap();
    harness.transport.set_connected(true);
    harness.orchestrator.run_cycle(captured_at).await.unwrap();

    // Same capture time and device: live reading first, resent one last
    let sent = harness.transport.published_json();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0]["source"], "live");
    assert_eq!(sent[1]["source"], "offline");
    assert_eq!(without_source(sent[0].clone()), without_source(sent[1].clone()));
}

#[tokio::test]
async fn test_mid_backlog_failure_leaves_tail_undelivered() {
    let harness = Harness::new(&[1, 2, 3], false);
    harness.orchestrator.run_cycle(Utc::now()).await.unwrap();
    harness.orchestrator.run_cycle(Utc::now()).await.unwrap();
    assert_eq!(harness.undelivered_ids(), vec![1, 2, 3, 4, 5, 6]);

    // Three live publishes succeed, then two resends, then the link drops
    harness.transport.set_connected(true);
    harness.transport.fail_after(5);
    let report = harness.orchestrator.run_cycle(Utc::now()).await.unwrap();

    assert_eq!(report.live, 3);
    assert_eq!(report.resend.delivered, 2);
    assert!(report.resend.stopped_early);
    assert_eq!(harness.undelivered_ids(), vec![3, 4, 5, 6]);
}

#[tokio::test]
async fn test_delivered_readings_are_not_published_twice() {
    let harness = Harness::new(&[1], false);
    harness.orchestrator.run_cycle(Utc::now()).await.unwrap();

    harness.transport.set_connected(true);
    harness.orchestrator.run_cycle(Utc::now()).await.unwrap();
    let after_flush = harness.transport.published().len();

    assert!(!harness.store.mark_delivered(1).unwrap());

    harness.orchestrator.run_cycle(Utc::now()).await.unwrap();
    let sent = harness.transport.published_json();

    // Only the new live reading went out on the last pass
    assert_eq!(sent.len(), after_flush + 1);
    assert_eq!(sent.last().unwrap()["source"], "live");
}

#[tokio::test]
async fn test_field_failure_stored_as_unavailable() {
    let harness = Harness::new(&[1, 2], false);
    harness.reader.fail_field(DeviceId(1), Metric::AvgPf);

    let report = harness.orchestrator.run_cycle(Utc::now()).await.unwrap();

    assert_eq!(report.stored, 2);
    assert_eq!(report.field_failures, 1);

    let stored = harness.store.get(1).unwrap().unwrap();
    assert_eq!(stored.reading.fields.avg_pf, FieldValue::Unavailable);
    assert_eq!(stored.reading.fields.avg_vln, FieldValue::Value(230.0));

    let other = harness.store.get(2).unwrap().unwrap();
    assert_eq!(other.reading.fields.unavailable_count(), 0);
}

#[tokio::test]
async fn test_retention_drops_stale_undelivered_reading() {
    let harness = Harness::new(&[1], false);
    let now = Utc::now();

    harness
        .orchestrator
        .run_cycle(now - ChronoDuration::hours(25))
        .await
        .unwrap();
    assert_eq!(harness.undelivered_ids(), vec![1]);

    let report = harness.orchestrator.run_cycle(now).await.unwrap();

    let pruned = report.pruned.unwrap();
    assert_eq!(pruned.removed, 1);
    assert_eq!(pruned.undelivered_dropped, 1);
    assert!(harness.store.get(1).unwrap().is_none());
    assert_eq!(harness.undelivered_ids(), vec![2]);
}

#[tokio::test]
async fn test_backlog_survives_restart() {
    let harness = Harness::new(&[1, 2], false);
    harness.orchestrator.run_cycle(Utc::now()).await.unwrap();

    let restarted = Harness::open(harness.into_temp_dir(), &[1, 2], true);

    let report = restarted.orchestrator.run_cycle(Utc::now()).await.unwrap();

    assert_eq!(report.resend.delivered, 2);
    assert!(restarted.undelivered_ids().is_empty());

    // Ids continue after the pre-restart readings
    let newest = restarted.store.get(4).unwrap().unwrap();
    assert_eq!(newest.origin, Origin::Live);
}

#[tokio::test]
async fn test_completed_cycle_writes_health_ping() {
    let harness = Harness::new(&[1], true);
    let now = Utc::now();

    harness.orchestrator.run_cycle(now).await.unwrap();

    let ping = std::fs::read_to_string(harness.temp_dir.path().join("watchdog-ping")).unwrap();
    assert_eq!(ping, now.to_rfc3339());

    let snapshot = harness.metrics.snapshot();
    assert_eq!(snapshot.cycles_completed, 1);
    assert_eq!(snapshot.live_delivered, 1);
    assert_eq!(snapshot.readings_stored, 1);
}
