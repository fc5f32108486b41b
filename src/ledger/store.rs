use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use tracing::{debug, info, warn};

use crate::reading::{Origin, Reading, ReadingId, StoredReading};

use super::error::{Result, StorageError};
use super::pruning::PruneStats;
use super::partitions::{
    META_LAST_PRUNE, META_NEXT_ID, decode_id_key, decode_time_key, encode_id_key,
    encode_meta_key, encode_time_bound, encode_time_key,
};

/// Fjall-backed durable log of readings with a per-record delivery flag
///
/// Every write is committed as one atomic batch and synced to disk before
/// the call returns. Writers are serialized by `next_id`, which doubles as
/// the single-writer lock and the in-memory id counter.
pub struct ReadingStore {
    keyspace: Keyspace,
    readings: PartitionHandle,
    pending: PartitionHandle,
    by_time: PartitionHandle,
    metadata: PartitionHandle,
    next_id: Mutex<ReadingId>,
}

impl ReadingStore {
    /// Open or create a reading store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening reading store at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;

        let readings = keyspace.open_partition("readings", PartitionCreateOptions::default())?;
        let pending = keyspace.open_partition("pending", PartitionCreateOptions::default())?;
        let by_time = keyspace.open_partition("by_time", PartitionCreateOptions::default())?;
        let metadata = keyspace.open_partition("metadata", PartitionCreateOptions::default())?;

        let next_id = match metadata.get(encode_meta_key(META_NEXT_ID))? {
            Some(bytes) => decode_id_key(&bytes)
                .ok_or_else(|| StorageError::InvalidKey(META_NEXT_ID.to_string()))?,
            None => 1,
        };

        info!(next_id, "Reading store opened");
        Ok(Self {
            keyspace,
            readings,
            pending,
            by_time,
            metadata,
            next_id: Mutex::new(next_id),
        })
    }

    fn writer(&self) -> MutexGuard<'_, ReadingId> {
        self.next_id.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sync(&self) -> Result<()> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }

    /// Append a reading and return its newly assigned id
    ///
    /// The record starts undelivered. The id counter only advances once the
    /// batch is on disk, so a failed insert never burns an id.
    pub fn insert(&self, reading: &Reading, origin: Origin) -> Result<ReadingId> {
        let mut next_id = self.writer();
        let id = *next_id;

        let record = StoredReading {
            id,
            reading: reading.clone(),
            origin,
            delivered: false,
        };
        let value = serde_json::to_vec(&record)?;

        let mut batch = self.keyspace.batch();
        batch.insert(&self.readings, encode_id_key(id), value);
        batch.insert(&self.pending, encode_id_key(id), Vec::new());
        batch.insert(&self.by_time, encode_time_key(reading.timestamp, id), Vec::new());
        batch.insert(&self.metadata, encode_meta_key(META_NEXT_ID), encode_id_key(id + 1));
        batch.commit()?;
        self.sync()?;

        *next_id = id + 1;
        debug!(id, device_id = %reading.device_id, %origin, "Reading stored");
        Ok(id)
    }

    /// Flag a reading as delivered
    ///
    /// Returns `true` when the flag changed. Already delivered or pruned ids
    /// are a no-op.
    pub fn mark_delivered(&self, id: ReadingId) -> Result<bool> {
        let _writer = self.writer();

        let Some(mut record) = self.read_record(id)? else {
            debug!(id, "Mark delivered skipped, reading no longer stored");
            return Ok(false);
        };
        if record.delivered {
            return Ok(false);
        }
        record.delivered = true;

        let mut batch = self.keyspace.batch();
        batch.insert(&self.readings, encode_id_key(id), serde_json::to_vec(&record)?);
        batch.remove(&self.pending, encode_id_key(id));
        batch.commit()?;
        self.sync()?;

        debug!(id, "Reading marked delivered");
        Ok(true)
    }

    /// All undelivered readings in ascending id order
    pub fn list_undelivered(&self) -> Result<Vec<StoredReading>> {
        let mut backlog = Vec::new();

        for item in self.pending.iter() {
            let (key, _) = item?;
            let id = decode_id_key(&key)
                .ok_or_else(|| StorageError::InvalidKey(format!("pending:{:?}", &*key)))?;

            match self.read_record(id)? {
                Some(record) if !record.delivered => backlog.push(record),
                Some(_) => {}
                None => warn!(id, "Pending index entry without a stored reading"),
            }
        }

        Ok(backlog)
    }

    /// Delete every reading captured strictly before `cutoff`
    ///
    /// Delivery status is not considered. Returns how many readings were
    /// removed and how many of those were still undelivered.
    pub fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<PruneStats> {
        let _writer = self.writer();

        let mut stats = PruneStats::default();
        let mut batch = self.keyspace.batch();
        for item in self.by_time.range(..encode_time_bound(cutoff)) {
            let (key, _) = item?;
            let (_, id) = decode_time_key(&key)
                .ok_or_else(|| StorageError::InvalidKey(format!("by_time:{:?}", &*key)))?;

            if let Some(record) = self.read_record(id)? {
                // The bound is microsecond-granular; the record holds the exact instant
                if record.reading.timestamp >= cutoff {
                    continue;
                }
                stats.removed += 1;
                if !record.delivered {
                    stats.undelivered_dropped += 1;
                }
            }
            batch.remove(&self.readings, encode_id_key(id));
            batch.remove(&self.pending, encode_id_key(id));
            batch.remove(&self.by_time, key.to_vec());
        }

        if batch.is_empty() {
            return Ok(stats);
        }
        batch.commit()?;
        self.sync()?;

        debug!(count = stats.removed, %cutoff, "Deleted expired readings");
        Ok(stats)
    }

    /// Get a stored reading by id
    pub fn get(&self, id: ReadingId) -> Result<Option<StoredReading>> {
        self.read_record(id)
    }

    fn read_record(&self, id: ReadingId) -> Result<Option<StoredReading>> {
        match self.readings.get(encode_id_key(id))? {
            Some(value) => {
                let record: StoredReading = serde_json::from_slice(&value)?;
                if record.id != id {
                    return Err(StorageError::CorruptRecord(id));
                }
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Remember when retention last ran
    pub fn record_prune(&self, at: DateTime<Utc>) -> Result<()> {
        let _writer = self.writer();
        self.metadata
            .insert(encode_meta_key(META_LAST_PRUNE), at.to_rfc3339().into_bytes())?;
        self.sync()
    }

    /// When retention last ran, if ever
    pub fn last_prune(&self) -> Result<Option<DateTime<Utc>>> {
        let Some(value) = self.metadata.get(encode_meta_key(META_LAST_PRUNE))? else {
            return Ok(None);
        };
        let text = std::str::from_utf8(&value)
            .map_err(|_| StorageError::InvalidKey(META_LAST_PRUNE.to_string()))?;
        let at = DateTime::parse_from_rfc3339(text)
            .map_err(|_| StorageError::InvalidKey(META_LAST_PRUNE.to_string()))?;
        Ok(Some(at.with_timezone(&Utc)))
    }

    /// Health check - verify the keyspace is readable
    pub fn health_check(&self) -> Result<()> {
        let _ = self.metadata.get(encode_meta_key(META_NEXT_ID))?;
        Ok(())
    }

    /// Get record counts (for the status endpoint and CLI)
    pub fn stats(&self) -> Result<StoreStats> {
        let mut total = 0;
        let mut undelivered = 0;

        for item in self.readings.iter() {
            item?;
            total += 1;
        }

        for item in self.pending.iter() {
            item?;
            undelivered += 1;
        }

        Ok(StoreStats {
            total,
            undelivered,
            next_id: *self.writer(),
        })
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStats {
    pub total: usize,
    pub undelivered: usize,
    pub next_id: ReadingId,
}
