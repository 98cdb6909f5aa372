// In-memory implementation for examples and testing
//
// Keeps the registry in a HashMap and each partition in a BTreeMap keyed by
// timestamp, so range scans come back in chronological order.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::device::Device;
use crate::error::Result;
use crate::event::EventTimestamp;
use crate::query::EventQuery;
use crate::traits::EventStore;

type Partition = BTreeMap<EventTimestamp, ()>;

// ============================================================================
// InMemoryEventStore - Registry and partitions in memory
// ============================================================================

/// In-memory event store
#[derive(Debug, Default, Clone)]
pub struct InMemoryEventStore {
    devices: Arc<RwLock<HashMap<String, Device>>>,
    partitions: Arc<RwLock<HashMap<String, Partition>>>,
}

impl InMemoryEventStore {
    /// Create a new in-memory event store
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifiers of every partition that holds at least one event
    pub async fn partition_ids(&self) -> Vec<String> {
        self.partitions.read().await.keys().cloned().collect()
    }

    /// Total number of records in a partition
    pub async fn partition_len(&self, device_id: &str) -> usize {
        self.partitions
            .read()
            .await
            .get(device_id)
            .map(|p| p.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn upsert_device(&self, device: &Device) -> Result<()> {
        self.devices
            .write()
            .await
            .insert(device.id.clone(), device.clone());
        Ok(())
    }

    async fn list_devices(&self) -> Result<Vec<Device>> {
        Ok(self.devices.read().await.values().cloned().collect())
    }

    async fn get_device(&self, device_id: &str) -> Result<Option<Device>> {
        Ok(self.devices.read().await.get(device_id).cloned())
    }

    async fn insert_event(&self, device_id: &str, at: EventTimestamp) -> Result<()> {
        self.partitions
            .write()
            .await
            .entry(device_id.to_string())
            .or_default()
            .insert(at, ());
        Ok(())
    }

    async fn range_query(
        &self,
        device_id: &str,
        query: &EventQuery,
    ) -> Result<Vec<EventTimestamp>> {
        if query.start > query.end {
            return Ok(Vec::new());
        }
        let partitions = self.partitions.read().await;
        let Some(partition) = partitions.get(device_id) else {
            return Ok(Vec::new());
        };

        let matches = partition
            .range(query.start..=query.end)
            .map(|(ts, _)| *ts)
            .skip(usize::try_from(query.skip).unwrap_or(usize::MAX));

        Ok(match query.limit_bound() {
            Some(limit) => matches
                .take(usize::try_from(limit).unwrap_or(usize::MAX))
                .collect(),
            None => matches.collect(),
        })
    }

    async fn count_range(&self, device_id: &str, query: &EventQuery) -> Result<u64> {
        if query.start > query.end {
            return Ok(0);
        }
        Ok(self
            .partitions
            .read()
            .await
            .get(device_id)
            .map(|p| p.range(query.start..=query.end).count() as u64)
            .unwrap_or(0))
    }
}
