// Database models (internal, may differ from domain types)

use chrono::{DateTime, Utc};
use sensorlog_core::Device;
use sqlx::FromRow;

// ============================================
// Device registry
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct DeviceRow {
    pub id: String,
    pub name: String,
    pub device_type: String,
}

impl From<DeviceRow> for Device {
    fn from(row: DeviceRow) -> Self {
        Device {
            id: row.id,
            name: row.name,
            device_type: row.device_type,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpsertDevice {
    pub id: String,
    pub name: String,
    pub device_type: String,
}

impl From<&Device> for UpsertDevice {
    fn from(device: &Device) -> Self {
        Self {
            id: device.id.clone(),
            name: device.name.clone(),
            device_type: device.device_type.clone(),
        }
    }
}

// ============================================
// Event partitions
// ============================================

/// One event record. `(device_id, occurred_at)` is the primary key, so each
/// device's rows form its partition.
#[derive(Debug, Clone, FromRow)]
pub struct DeviceEventRow {
    pub device_id: String,
    pub occurred_at: DateTime<Utc>,
}

/// Range filter and pagination for a partition scan
#[derive(Debug, Clone)]
pub struct EventRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub offset: i64,
    /// `None` means no LIMIT
    pub limit: Option<i64>,
}
