// Database-backed EventStore implementation
//
// This module implements the core EventStore trait on top of the
// devices and device_events tables.

use async_trait::async_trait;
use sensorlog_core::{
    traits::EventStore, Device, EventQuery, EventTimestamp, Result, SensorError,
};

use crate::models::{DeviceEventRow, EventRange, UpsertDevice};
use crate::repositories::Database;

// ============================================================================
// DbEventStore - Registry and partitions in Postgres
// ============================================================================

/// Database-backed event store
///
/// Used by the collector to record events and by the API to serve queries.
#[derive(Clone)]
pub struct DbEventStore {
    db: Database,
}

impl DbEventStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn to_range(query: &EventQuery) -> EventRange {
    EventRange {
        start: query.start,
        end: query.end,
        offset: i64::try_from(query.skip).unwrap_or(i64::MAX),
        limit: query
            .limit_bound()
            .map(|limit| i64::try_from(limit).unwrap_or(i64::MAX)),
    }
}

#[async_trait]
impl EventStore for DbEventStore {
    async fn upsert_device(&self, device: &Device) -> Result<()> {
        self.db
            .upsert_device(UpsertDevice::from(device))
            .await
            .map_err(|e| SensorError::store(e.to_string()))?;
        Ok(())
    }

    async fn list_devices(&self) -> Result<Vec<Device>> {
        let rows = self
            .db
            .list_devices()
            .await
            .map_err(|e| SensorError::store(e.to_string()))?;
        Ok(rows.into_iter().map(Device::from).collect())
    }

    async fn get_device(&self, device_id: &str) -> Result<Option<Device>> {
        let row = self
            .db
            .get_device(device_id)
            .await
            .map_err(|e| SensorError::store(e.to_string()))?;
        Ok(row.map(Device::from))
    }

    async fn insert_event(&self, device_id: &str, at: EventTimestamp) -> Result<()> {
        self.db
            .insert_event(DeviceEventRow {
                device_id: device_id.to_string(),
                occurred_at: at,
            })
            .await
            .map_err(|e| SensorError::store(e.to_string()))
    }

    async fn range_query(
        &self,
        device_id: &str,
        query: &EventQuery,
    ) -> Result<Vec<EventTimestamp>> {
        let rows = self
            .db
            .list_events_in_range(device_id, &to_range(query))
            .await
            .map_err(|e| SensorError::store(e.to_string()))?;
        Ok(rows.into_iter().map(|row| row.occurred_at).collect())
    }

    async fn count_range(&self, device_id: &str, query: &EventQuery) -> Result<u64> {
        let count = self
            .db
            .count_events_in_range(device_id, &to_range(query))
            .await
            .map_err(|e| SensorError::store(e.to_string()))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

// ============================================================================
// Factory functions
// ============================================================================

/// Create a database-backed event store
pub fn create_db_event_store(db: Database) -> DbEventStore {
    DbEventStore::new(db)
}
