// Core traits for pluggable storage backends
//
// The collector and the API share one store capability:
// - Postgres implementation for production (sensorlog-storage)
// - In-memory implementation for examples and testing (crate::memory)

use async_trait::async_trait;

use crate::device::Device;
use crate::error::Result;
use crate::event::EventTimestamp;
use crate::query::EventQuery;

// ============================================================================
// EventStore - Device registry plus per-device event partitions
// ============================================================================

/// Trait for the device registry and its time-keyed event partitions
///
/// Implementations provide per-record atomicity only. There is no transaction
/// spanning the registry and a partition.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Create or replace the registry entry for `device.id` (last write wins)
    async fn upsert_device(&self, device: &Device) -> Result<()>;

    /// All registry entries, in store-native order
    async fn list_devices(&self) -> Result<Vec<Device>>;

    /// Registry entry for `device_id`, if present
    async fn get_device(&self, device_id: &str) -> Result<Option<Device>>;

    /// Insert an event into the partition of `device_id`, keyed by `at`.
    /// An existing record with the same key is overwritten.
    async fn insert_event(&self, device_id: &str, at: EventTimestamp) -> Result<()>;

    /// Timestamps in `[query.start, query.end]`, after skipping `query.skip`
    /// and taking at most `query.limit` (0 = all). A missing partition yields
    /// an empty result.
    async fn range_query(&self, device_id: &str, query: &EventQuery)
        -> Result<Vec<EventTimestamp>>;

    /// Number of timestamps in `[query.start, query.end]`. Pagination is ignored.
    async fn count_range(&self, device_id: &str, query: &EventQuery) -> Result<u64>;
}
