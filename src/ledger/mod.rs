/// Fjall-based durable ledger of meter readings
///
/// The ledger is the local buffer behind at-least-once delivery. It persists
/// every captured reading with its delivery flag so that the backlog survives
/// transport outages and process restarts.
///
/// - `readings`: one JSON record per reading, keyed by increasing id
/// - `pending`: index of ids still waiting for delivery
/// - `by_time`: capture-time index used by retention
/// - `metadata`: id counter and pruning bookkeeping
///
/// ## Retention
///
/// Readings are pruned by age only (default 24 hours), delivered or not.
/// Pruning runs once per cycle through [`RetentionManager::prune`].
///
/// ## Usage
///
/// ```rust,ignore
/// use meterbox::ledger::ReadingStore;
///
/// let store = ReadingStore::open("data/readings")?;
/// let id = store.insert(&reading, Origin::Offline)?;
/// store.mark_delivered(id)?;
/// ```

pub mod error;
pub mod partitions;
pub mod pruning;
pub mod store;

pub use error::{Result, StorageError};
pub use pruning::{DEFAULT_MAX_AGE_HOURS, PruneStats, RetentionManager};
pub use store::{ReadingStore, StoreStats};
