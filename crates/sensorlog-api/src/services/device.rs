// Device registry reads

use sensorlog_core::{Device, EventStore, Result, SensorError};
use std::sync::Arc;

pub struct DeviceService {
    store: Arc<dyn EventStore>,
}

impl DeviceService {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// All registered devices, in store order
    pub async fn list(&self) -> Result<Vec<Device>> {
        self.store.list_devices().await
    }

    /// A single device, or `SensorError::DeviceNotFound`
    pub async fn get(&self, device_id: &str) -> Result<Device> {
        self.store
            .get_device(device_id)
            .await?
            .ok_or_else(|| SensorError::device_not_found(device_id))
    }
}
