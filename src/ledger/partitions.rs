/// Key layout and encoding utilities for Fjall partitions
///
/// Partition structure:
/// - `readings`: {id:u64 BE} -> StoredReading (JSON)
/// - `pending`: {id:u64 BE} -> empty (undelivered backlog index)
/// - `by_time`: {timestamp_us:u64 BE}{id:u64 BE} -> empty (retention index)
/// - `metadata`: {name} -> value
///
/// Big-endian integers keep the natural iteration order of each partition
/// equal to ascending id or ascending capture time.
use chrono::{DateTime, Utc};

use crate::reading::ReadingId;

pub const META_NEXT_ID: &str = "next_id";
pub const META_LAST_PRUNE: &str = "last_prune";

/// Encode a reading id key
pub fn encode_id_key(id: ReadingId) -> Vec<u8> {
    id.to_be_bytes().to_vec()
}

/// Decode a reading id key
pub fn decode_id_key(key: &[u8]) -> Option<ReadingId> {
    let bytes: [u8; 8] = key.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

/// Microseconds since the Unix epoch, clamped at zero
fn timestamp_us(ts: DateTime<Utc>) -> u64 {
    ts.timestamp_micros().max(0) as u64
}

/// Encode a retention index key: {timestamp_us}{id}
pub fn encode_time_key(ts: DateTime<Utc>, id: ReadingId) -> Vec<u8> {
    let mut key = Vec::with_capacity(16);
    key.extend_from_slice(&timestamp_us(ts).to_be_bytes());
    key.extend_from_slice(&id.to_be_bytes());
    key
}

/// Upper bound for a range scan covering every entry older than `cutoff`
///
/// Keys in the cutoff's own microsecond are excluded when the cutoff falls
/// exactly on a microsecond and included otherwise, so callers must still
/// compare the stored timestamp for entries in that microsecond.
pub fn encode_time_bound(cutoff: DateTime<Utc>) -> Vec<u8> {
    let mut micros = timestamp_us(cutoff);
    if cutoff.timestamp_subsec_nanos() % 1_000 != 0 {
        micros = micros.saturating_add(1);
    }
    micros.to_be_bytes().to_vec()
}

/// Decode a retention index key into (timestamp_us, id)
pub fn decode_time_key(key: &[u8]) -> Option<(u64, ReadingId)> {
    if key.len() != 16 {
        return None;
    }
    let ts: [u8; 8] = key[..8].try_into().ok()?;
    let id: [u8; 8] = key[8..].try_into().ok()?;
    Some((u64::from_be_bytes(ts), u64::from_be_bytes(id)))
}

/// Encode a metadata key
pub fn encode_meta_key(name: &str) -> Vec<u8> {
    name.as_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_id_key_encoding() {
        let key = encode_id_key(42);
        assert_eq!(key, vec![0, 0, 0, 0, 0, 0, 0, 42]);
        assert_eq!(decode_id_key(&key), Some(42));
        assert_eq!(decode_id_key(b"short"), None);
    }

    #[test]
    fn test_id_keys_sort_numerically() {
        assert!(encode_id_key(9) < encode_id_key(10));
        assert!(encode_id_key(255) < encode_id_key(256));
    }

    #[test]
    fn test_time_key_roundtrip() {
        let ts = Utc.timestamp_micros(1_700_000_000_123_456).unwrap();
        let key = encode_time_key(ts, 7);
        assert_eq!(key.len(), 16);
        assert_eq!(decode_time_key(&key), Some((1_700_000_000_123_456, 7)));
    }

    #[test]
    fn test_time_bound_is_strict() {
        let cutoff = Utc.timestamp_micros(1_000).unwrap();
        let older = Utc.timestamp_micros(999).unwrap();
        let bound = encode_time_bound(cutoff);

        assert!(encode_time_key(older, u64::MAX) < bound);
        assert!(encode_time_key(cutoff, 0) > bound);
    }

    #[test]
    fn test_time_bound_covers_sub_microsecond_cutoff() {
        let cutoff = Utc.timestamp_nanos(1_000_500);
        let same_micro = Utc.timestamp_nanos(1_000_200);
        let bound = encode_time_bound(cutoff);

        assert!(encode_time_key(same_micro, u64::MAX) < bound);
        assert!(encode_time_key(Utc.timestamp_micros(1_001).unwrap(), 0) > bound);
    }
}
