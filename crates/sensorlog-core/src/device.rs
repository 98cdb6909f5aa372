// Device domain types
//
// A Device is a registry entry keyed by its identifier. The identifier also
// names the device's event partition.

use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Registry entry for a telemetry source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Device {
    /// Device identifier. Serialized as `_id` since the registry key doubles as the identifier.
    #[serde(rename = "_id")]
    #[cfg_attr(feature = "openapi", schema(example = "dev-1"))]
    pub id: String,
    #[cfg_attr(feature = "openapi", schema(example = "Hall Sensor"))]
    pub name: String,
    #[serde(rename = "type")]
    #[cfg_attr(feature = "openapi", schema(example = "motion"))]
    pub device_type: String,
}

impl Device {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        device_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            device_type: device_type.into(),
        }
    }
}
