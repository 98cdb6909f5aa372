// Inbound event payloads
//
// The transport delivers JSON documents of the form
// `{"id": "...", "name": "...", "type": "...", "trigger": bool}`.
// Only `id`, `name` and `type` reach the store (the registry entry);
// the event itself is persisted as its arrival instant alone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::device::Device;
use crate::error::{Result, SensorError};

/// Persisted event record: the arrival instant, which is also its key within the partition
pub type EventTimestamp = DateTime<Utc>;

/// Event descriptor decoded from an inbound message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventPayload {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub device_type: String,
    #[serde(default)]
    pub trigger: bool,
}

impl EventPayload {
    /// Decode a payload from raw message bytes
    pub fn decode(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Decode and reject payloads without a device identifier
    pub fn decode_valid(payload: &[u8]) -> Result<Self> {
        let event = Self::decode(payload)?;
        if event.id.trim().is_empty() {
            return Err(SensorError::decode("missing device id"));
        }
        Ok(event)
    }

    /// Registry entry carried by this event
    pub fn device(&self) -> Device {
        Device::new(&self.id, &self.name, &self.device_type)
    }
}
