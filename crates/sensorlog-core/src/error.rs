// Error types for ingestion and queries

use thiserror::Error;

/// Result type alias for sensor event operations
pub type Result<T> = std::result::Result<T, SensorError>;

/// Errors surfaced by the store capability and the query service
#[derive(Debug, Error)]
pub enum SensorError {
    /// Inbound message payload could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Query request body is structurally invalid
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Device is not present in the registry
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Backing store failed a read or write
    #[error("Store error: {0}")]
    Store(String),
}

impl SensorError {
    /// Create a decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        SensorError::Decode(msg.into())
    }

    /// Create an invalid query error
    pub fn invalid_query(msg: impl Into<String>) -> Self {
        SensorError::InvalidQuery(msg.into())
    }

    /// Create a device not found error
    pub fn device_not_found(device_id: impl Into<String>) -> Self {
        SensorError::DeviceNotFound(device_id.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        SensorError::Store(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SensorError::DeviceNotFound(_))
    }
}

impl From<serde_json::Error> for SensorError {
    fn from(err: serde_json::Error) -> Self {
        SensorError::Decode(err.to_string())
    }
}
