/// Age-based retention for the reading store
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use super::error::Result;
use super::store::ReadingStore;

/// Default retention window (hours)
pub const DEFAULT_MAX_AGE_HOURS: i64 = 24;

/// Pruning statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PruneStats {
    pub removed: usize,
    /// Removed readings that never reached the collector
    pub undelivered_dropped: usize,
}

/// Bounds ledger growth by deleting readings older than the retention window
///
/// Delivery status is not considered. Undelivered readings past the window
/// are dropped and counted in [`PruneStats::undelivered_dropped`].
#[derive(Clone)]
pub struct RetentionManager {
    store: Arc<ReadingStore>,
}

impl RetentionManager {
    pub fn new(store: Arc<ReadingStore>) -> Self {
        Self { store }
    }

    /// Delete every reading captured before `now - max_age`
    ///
    /// A window reaching past the earliest representable time removes nothing.
    pub fn prune(&self, now: DateTime<Utc>, max_age: Duration) -> Result<PruneStats> {
        let cutoff = now
            .checked_sub_signed(max_age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let stats = self.store.delete_older_than(cutoff)?;

        if stats.undelivered_dropped > 0 {
            warn!(
                count = stats.undelivered_dropped,
                %cutoff,
                "Dropped undelivered readings past the retention window"
            );
        }

        self.store.record_prune(now)?;
        info!(removed = stats.removed, %cutoff, "Pruning complete");
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::humanize::HumanDuration;
    use crate::reading::{DeviceId, MeterFields, Origin, Reading};
    use tempfile::TempDir;

    fn create_manager() -> (RetentionManager, Arc<ReadingStore>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(ReadingStore::open(temp_dir.path().join("ledger")).unwrap());
        (RetentionManager::new(store.clone()), store, temp_dir)
    }

    fn reading_at(timestamp: DateTime<Utc>) -> Reading {
        Reading::new(timestamp, DeviceId(7), MeterFields::default())
    }

    #[test]
    fn test_prunes_undelivered_reading_past_window() {
        let (manager, store, _temp) = create_manager();
        let now = Utc::now();
        let id = store
            .insert(&reading_at(now - Duration::hours(25)), Origin::Offline)
            .unwrap();

        let stats = manager
            .prune(now, Duration::hours(DEFAULT_MAX_AGE_HOURS))
            .unwrap();

        assert_eq!(stats.removed, 1);
        assert_eq!(stats.undelivered_dropped, 1);
        assert!(store.get(id).unwrap().is_none());
    }

    #[test]
    fn test_keeps_readings_inside_window() {
        let (manager, store, _temp) = create_manager();
        let now = Utc::now();
        let id = store.insert(&reading_at(now), Origin::Offline).unwrap();

        let stats = manager.prune(now, Duration::hours(24)).unwrap();

        assert_eq!(stats, PruneStats::default());
        assert!(store.get(id).unwrap().is_some());
    }

    #[test]
    fn test_oversized_window_keeps_everything() {
        let (manager, store, _temp) = create_manager();
        let now = Utc::now();
        let id = store
            .insert(&reading_at(now - Duration::days(3_650)), Origin::Offline)
            .unwrap();

        let max_age = "100000000d".parse::<HumanDuration>().unwrap().as_chrono();
        let stats = manager.prune(now, max_age).unwrap();

        assert_eq!(stats, PruneStats::default());
        assert!(store.get(id).unwrap().is_some());

        let stats = manager.prune(now, Duration::MAX).unwrap();
        assert_eq!(stats.removed, 0);
    }

    #[test]
    fn test_records_prune_time() {
        let (manager, store, _temp) = create_manager();
        let now = Utc::now();

        manager.prune(now, Duration::hours(24)).unwrap();

        let last = store.last_prune().unwrap().unwrap();
        assert_eq!(last.timestamp(), now.timestamp());
    }
}
